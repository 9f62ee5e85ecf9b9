use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),
    #[error("tensorflow: {0}")]
    TensorFlow(String),
    #[error("operation {0:?} not found in graph")]
    MissingOperation(String),
    #[error("model returned {actual} probabilities, but {expected} labels are loaded")]
    OutputMismatch { expected: usize, actual: usize },
    #[error("model returned no usable probabilities")]
    EmptyOutput,
    #[error("model session lock poisoned")]
    Poisoned,
    #[error("built without the tensorflow backend")]
    BackendUnavailable,
}

/// Runs one normalized 224x224x3 image through a model and returns the
/// probability for every class.
pub trait Classifier: Send + Sync {
    fn predict(&self, input: &[f32]) -> Result<Vec<f32>, ModelError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub index: usize,
    pub confidence: f32,
}

impl Prediction {
    /// Arg-max over the probabilities. Ties go to the lowest index, NaN is skipped.
    pub fn from_probabilities(probabilities: &[f32]) -> Result<Self, ModelError> {
        let mut best: Option<Prediction> = None;
        for (index, &confidence) in probabilities.iter().enumerate() {
            if confidence.is_nan() {
                continue;
            }
            match best {
                Some(b) if b.confidence >= confidence => {}
                _ => best = Some(Prediction { index, confidence }),
            }
        }
        best.ok_or(ModelError::EmptyOutput)
    }
}

#[cfg(feature = "tensorflow")]
pub fn load(config: &Config) -> Result<Arc<dyn Classifier>, ModelError> {
    let model = tf::TensorFlowModel::new(&config.model_path, &config.input_op, &config.output_op)?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "tensorflow"))]
pub fn load(_config: &Config) -> Result<Arc<dyn Classifier>, ModelError> {
    Err(ModelError::BackendUnavailable)
}

#[cfg(feature = "tensorflow")]
mod tf {
    use std::{path::Path, sync::Mutex};

    use tensorflow::{
        Graph, ImportGraphDefOptions, Operation, Session, SessionOptions, SessionRunArgs, Tensor,
    };

    use super::{Classifier, ModelError};
    use crate::preprocess::{CHANNELS, INPUT_SIZE};

    fn tf_err(status: tensorflow::Status) -> ModelError {
        ModelError::TensorFlow(status.to_string())
    }

    struct Loaded {
        session: Session,
        input: Operation,
        output: Operation,
        // Keeps the graph alive for as long as the session uses it.
        _graph: Graph,
    }

    /// Frozen TensorFlow graph. Session runs are serialized through the mutex.
    pub struct TensorFlowModel {
        loaded: Mutex<Loaded>,
    }

    impl TensorFlowModel {
        pub fn new(model_path: &Path, input_op: &str, output_op: &str) -> Result<Self, ModelError> {
            let model_bytes = std::fs::read(model_path)?;

            let mut graph = Graph::new();
            graph
                .import_graph_def(&model_bytes, &ImportGraphDefOptions::new())
                .map_err(tf_err)?;

            let input = graph
                .operation_by_name(input_op)
                .map_err(tf_err)?
                .ok_or_else(|| ModelError::MissingOperation(input_op.to_string()))?;
            let output = graph
                .operation_by_name(output_op)
                .map_err(tf_err)?
                .ok_or_else(|| ModelError::MissingOperation(output_op.to_string()))?;

            let session = Session::new(&SessionOptions::new(), &graph).map_err(tf_err)?;

            tracing::info!(path = %model_path.display(), input_op, output_op, "model loaded");

            Ok(TensorFlowModel {
                loaded: Mutex::new(Loaded {
                    session,
                    input,
                    output,
                    _graph: graph,
                }),
            })
        }
    }

    impl Classifier for TensorFlowModel {
        fn predict(&self, input: &[f32]) -> Result<Vec<f32>, ModelError> {
            let size = INPUT_SIZE as u64;
            let input_tensor = Tensor::new(&[1, size, size, CHANNELS as u64])
                .with_values(input)
                .map_err(tf_err)?;

            let loaded = self.loaded.lock().map_err(|_| ModelError::Poisoned)?;

            let mut args = SessionRunArgs::new();
            args.add_feed(&loaded.input, 0, &input_tensor);
            let output_token = args.request_fetch(&loaded.output, 0);
            loaded.session.run(&mut args).map_err(tf_err)?;

            let output_tensor: Tensor<f32> = args.fetch(output_token).map_err(tf_err)?;
            Ok(output_tensor.to_vec())
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Returns the same probabilities for every image.
    pub(crate) struct FixedClassifier(pub Vec<f32>);

    impl Classifier for FixedClassifier {
        fn predict(&self, input: &[f32]) -> Result<Vec<f32>, ModelError> {
            assert_eq!(input.len(), crate::preprocess::TENSOR_LEN);
            Ok(self.0.clone())
        }
    }

    #[test]
    fn picks_maximum() {
        let prediction = Prediction::from_probabilities(&[0.1, 0.7, 0.2]).unwrap();
        assert_eq!(prediction.index, 1);
        assert_eq!(prediction.confidence, 0.7);
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let prediction = Prediction::from_probabilities(&[0.2, 0.4, 0.4, 0.0]).unwrap();
        assert_eq!(prediction.index, 1);

        let prediction = Prediction::from_probabilities(&[0.25; 4]).unwrap();
        assert_eq!(prediction.index, 0);
    }

    #[test]
    fn low_confidence_is_still_reported() {
        let prediction = Prediction::from_probabilities(&[0.01, 0.03, 0.02]).unwrap();
        assert_eq!(prediction.index, 1);
        assert_eq!(prediction.confidence, 0.03);
    }

    #[test]
    fn nan_is_skipped() {
        let prediction = Prediction::from_probabilities(&[f32::NAN, 0.3, 0.6]).unwrap();
        assert_eq!(prediction.index, 2);
    }

    #[test]
    fn empty_output_is_an_error() {
        assert!(matches!(
            Prediction::from_probabilities(&[]),
            Err(ModelError::EmptyOutput)
        ));
        assert!(matches!(
            Prediction::from_probabilities(&[f32::NAN]),
            Err(ModelError::EmptyOutput)
        ));
    }

    #[cfg(not(feature = "tensorflow"))]
    #[test]
    fn load_without_backend_fails() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert!(matches!(load(&config), Err(ModelError::BackendUnavailable)));
    }

    #[cfg(feature = "tensorflow")]
    #[test]
    fn load_missing_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_lookup(|key| {
            (key == "MODEL_PATH").then(|| dir.path().join("absent.pb").display().to_string())
        })
        .unwrap();
        assert!(matches!(load(&config), Err(ModelError::Io(_))));
    }
}
