use clap::ValueEnum;

/// Which emphasis parameter drives a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmphasisGroup {
    Low,
    Mid,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub id: &'static str,
    pub min_hz: f32,
    pub max_hz: f32,
    pub group: EmphasisGroup,
}

impl Band {
    pub const fn new(id: &'static str, min_hz: f32, max_hz: f32, group: EmphasisGroup) -> Self {
        Self {
            id,
            min_hz,
            max_hz,
            group,
        }
    }
}

const THREE_BANDS: [Band; 3] = [
    Band::new("low", 20.0, 250.0, EmphasisGroup::Low),
    Band::new("mid", 250.0, 4000.0, EmphasisGroup::Mid),
    Band::new("high", 4000.0, 16000.0, EmphasisGroup::High),
];

const FIVE_BANDS: [Band; 5] = [
    Band::new("sub", 20.0, 60.0, EmphasisGroup::Low),
    Band::new("bass", 60.0, 250.0, EmphasisGroup::Low),
    Band::new("mid", 250.0, 2000.0, EmphasisGroup::Mid),
    Band::new("presence", 2000.0, 6000.0, EmphasisGroup::High),
    Band::new("air", 6000.0, 16000.0, EmphasisGroup::High),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BandLayout {
    #[value(alias = "3")]
    Three,
    #[value(alias = "5")]
    Five,
}

impl BandLayout {
    pub fn bands(self) -> &'static [Band] {
        match self {
            Self::Three => &THREE_BANDS,
            Self::Five => &FIVE_BANDS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Three => "three",
            Self::Five => "five",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "three" | "3" => Some(Self::Three),
            "five" | "5" => Some(Self::Five),
            _ => None,
        }
    }

    pub fn index_of(self, id: &str) -> Option<usize> {
        self.bands()
            .iter()
            .position(|b| b.id.eq_ignore_ascii_case(id.trim()))
    }
}
