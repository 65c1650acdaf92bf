//! Word-list sentiment scoring.
//!
//! The score is the number of positive entries found in
//! the lowercased text minus the number of negative entries. Entries are plain
//! substrings, so overlapping entries each count (`"no funciona"` matches both
//! `"funciona"` and `"no funciona"` and nets zero).

/// Maps message text to an integer sentiment score.
pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> i32;
}

const POSITIVE: &[&str] = &[
    "gracias",
    "excelente",
    "bueno",
    "buena",
    "genial",
    "perfecto",
    "perfecta",
    "feliz",
    "encanta",
    "rápido",
    "rapido",
    "satisfecho",
    "satisfecha",
    "amable",
    "increíble",
    "recomiendo",
    "resuelto",
    "funciona",
];

const NEGATIVE: &[&str] = &[
    "no sirve",
    "no funciona",
    "problema",
    "malo",
    "mala",
    "pésimo",
    "pesimo",
    "terrible",
    "horrible",
    "lento",
    "demora",
    "queja",
    "reclamo",
    "molesto",
    "cancelar",
    "fallo",
    "nunca",
];

#[derive(Debug, Clone)]
pub struct LexiconScorer {
    positive: Vec<String>,
    negative: Vec<String>,
}

impl LexiconScorer {
    pub fn new<I, S>(positive: I, negative: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalize = |words: I| {
            words
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect::<Vec<String>>()
        };
        Self {
            positive: normalize(positive),
            negative: normalize(negative),
        }
    }

    /// Spanish customer-support lexicon.
    pub fn spanish() -> Self {
        Self::new(POSITIVE.iter().copied(), NEGATIVE.iter().copied())
    }
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::spanish()
    }
}

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> i32 {
        if text.is_empty() {
            return 0;
        }
        let lowered = text.to_lowercase();
        let hits = |words: &[String]| {
            words
                .iter()
                .filter(|w| lowered.contains(w.as_str()))
                .count() as i32
        };
        hits(&self.positive) - hits(&self.negative)
    }
}
