use std::io::Cursor;

use image::{imageops::FilterType, DynamicImage, ImageOutputFormat, RgbImage};

use crate::error::AppError;

pub const INPUT_SIZE: u32 = 224;
pub const CHANNELS: usize = 3;
pub const TENSOR_LEN: usize = (INPUT_SIZE * INPUT_SIZE) as usize * CHANNELS;

/// A decoded upload, cropped to the model input size, together with its
/// normalized NHWC tensor data.
pub struct PreparedImage {
    pub rgb: RgbImage,
    pub tensor: Vec<f32>,
}

pub fn preprocess(image_data: &[u8]) -> Result<PreparedImage, AppError> {
    let img = image::load_from_memory(image_data).map_err(AppError::InvalidImage)?;

    // Center crop to a square and scale, so the aspect ratio is kept
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8())
        .resize_to_fill(INPUT_SIZE, INPUT_SIZE, FilterType::Lanczos3)
        .to_rgb8();

    let tensor = normalize(&rgb);

    Ok(PreparedImage { rgb, tensor })
}

/// Maps every channel from [0, 255] to [-1, 1].
fn normalize(rgb: &RgbImage) -> Vec<f32> {
    let mut flat_img = Vec::with_capacity(rgb.as_raw().len());
    for pixel in rgb.pixels() {
        flat_img.push(pixel[0] as f32 / 127.5 - 1.0);
        flat_img.push(pixel[1] as f32 / 127.5 - 1.0);
        flat_img.push(pixel[2] as f32 / 127.5 - 1.0);
    }
    flat_img
}

pub fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>, AppError> {
    let mut jpeg_bytes = Vec::new();
    DynamicImage::ImageRgb8(rgb.clone())
        .write_to(
            &mut Cursor::new(&mut jpeg_bytes),
            ImageOutputFormat::Jpeg(quality),
        )
        .map_err(AppError::Encode)?;
    Ok(jpeg_bytes)
}

#[cfg(test)]
pub(crate) mod tests {
    use image::{GenericImageView, ImageBuffer, ImageFormat, Rgb};

    use super::*;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn output_shape_and_range() {
        for (width, height) in [(224, 224), (640, 480), (37, 900), (1, 1), (1000, 10)] {
            let prepared = preprocess(&png_bytes(width, height)).unwrap();
            assert_eq!(prepared.rgb.dimensions(), (INPUT_SIZE, INPUT_SIZE));
            assert_eq!(prepared.tensor.len(), TENSOR_LEN);
            assert!(
                prepared.tensor.iter().all(|v| (-1.0..=1.0).contains(v)),
                "{width}x{height} produced values outside [-1, 1]"
            );
        }
    }

    #[test]
    fn wide_image_is_center_cropped() {
        // Red outer quarters, green middle half
        let img: RgbImage = ImageBuffer::from_fn(400, 100, |x, _| {
            if (100..300).contains(&x) {
                Rgb([0, 255, 0])
            } else {
                Rgb([255, 0, 0])
            }
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();

        let prepared = preprocess(&bytes).unwrap();
        assert_eq!(prepared.rgb.dimensions(), (INPUT_SIZE, INPUT_SIZE));
        let reddish = prepared
            .rgb
            .pixels()
            .filter(|p| p[0] > 32 || p[1] < 223)
            .count();
        assert_eq!(reddish, 0);
        assert_eq!(
            *prepared.rgb.get_pixel(INPUT_SIZE / 2, INPUT_SIZE / 2),
            Rgb([0, 255, 0])
        );
    }

    #[test]
    fn normalization_endpoints() {
        let mut rgb = RgbImage::new(2, 1);
        rgb.put_pixel(0, 0, Rgb([0, 0, 0]));
        rgb.put_pixel(1, 0, Rgb([255, 255, 255]));

        let tensor = normalize(&rgb);
        assert_eq!(tensor, vec![-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn grayscale_input_becomes_rgb() {
        let gray = image::GrayImage::from_pixel(50, 80, image::Luma([200]));
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(gray)
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();

        let prepared = preprocess(&bytes).unwrap();
        assert_eq!(prepared.tensor.len(), TENSOR_LEN);
        let expected = 200.0 / 127.5 - 1.0;
        assert!(prepared
            .tensor
            .iter()
            .all(|v| (v - expected).abs() < 2.0 / 127.5));
    }

    #[test]
    fn rejects_undecodable_input() {
        assert!(matches!(
            preprocess(b"definitely not an image"),
            Err(AppError::InvalidImage(_))
        ));
        assert!(matches!(preprocess(&[]), Err(AppError::InvalidImage(_))));
    }

    #[test]
    fn jpeg_reencode_round_trip() {
        let prepared = preprocess(&png_bytes(320, 240)).unwrap();
        let jpeg = encode_jpeg(&prepared.rgb, 75).unwrap();

        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (INPUT_SIZE, INPUT_SIZE));

        let again = encode_jpeg(&decoded.to_rgb8(), 75).unwrap();
        let decoded_again = image::load_from_memory(&again).unwrap().to_rgb8();
        let first = decoded.to_rgb8();
        let mean_diff = first
            .as_raw()
            .iter()
            .zip(decoded_again.as_raw())
            .map(|(a, b)| (*a as f64 - *b as f64).abs())
            .sum::<f64>()
            / first.as_raw().len() as f64;
        assert!(mean_diff < 4.0, "mean pixel drift {mean_diff}");
    }
}
