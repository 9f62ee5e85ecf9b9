/// Waste sorting categories the classifier is trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Klaaspakend,
    Taara,
    Paberpakend,
    Biojaatmed,
    Vanapaber,
    Plastpakend,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Klaaspakend,
        Category::Taara,
        Category::Paberpakend,
        Category::Biojaatmed,
        Category::Vanapaber,
        Category::Plastpakend,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Klaaspakend => "klaaspakend",
            Category::Taara => "taara",
            Category::Paberpakend => "paberpakend",
            Category::Biojaatmed => "biojaatmed",
            Category::Vanapaber => "vanapaber",
            Category::Plastpakend => "plastpakend",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.name() == name)
    }

    pub fn instructions(self) -> &'static str {
        match self {
            Category::Klaaspakend => "Loputa vajadusel kergelt, et ei määriks teisi pakendeid ja kotti. Eemadada korgid ja kaaned, sildid võivad jääda.",
            Category::Taara => "Viige pakend lähimasse taaraautomaati. Juhul, kui masin ei võta seda vastu, visake kohapealsesse prügikasti ära",
            Category::Paberpakend => "Voldi suured papist pakendid kokku või rebi tükkideks, nii võtavad nad vähem ruumi. Veendu, et materjal on puhas ja kuiv.",
            Category::Biojaatmed => "Biojäätmed pane konteinerisse lahtiselt, paberkotis või täielikult biolaguneva ja komposteeruva kotiga.",
            Category::Vanapaber => "Kogu paber ja kartong muudest jäätmetest eraldi ka siis, kui teie majal pole selleks konteinerit. Vanapaber pane konteinerisse lahtiselt.",
            Category::Plastpakend => "Kogu pakendi- ja toidujäätmed eraldi ja segaolmejäätmete hulk väheneb märgatavalt!",
        }
    }
}

pub const UNKNOWN_CLASS_TEXT: &str = "Unknown class";

/// Disposal guidance for a label name. Names outside the known
/// categories map to `Unknown` instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Known(Category),
    Unknown,
}

impl Instruction {
    pub fn lookup(name: &str) -> Self {
        match Category::from_name(name) {
            Some(category) => Instruction::Known(category),
            None => Instruction::Unknown,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Instruction::Known(category) => category.instructions(),
            Instruction::Unknown => UNKNOWN_CLASS_TEXT,
        }
    }
}
