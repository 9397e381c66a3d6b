use std::collections::HashSet;

use crate::models::Sentiment;

/// A classification with the classifier's confidence in [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScore {
    pub sentiment: Sentiment,
    pub score: f64,
}

/// Classifies a piece of news text.
///
/// Constructed explicitly at startup and injected into the intelligence
/// provider; there is no lazily-initialized process-wide model.
pub trait SentimentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> SentimentScore;
}

/// Keyword-lexicon classifier over financial news headlines.
pub struct LexiconClassifier {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
}

const POSITIVE_WORDS: &[&str] = &[
    "gain", "gains", "surge", "surges", "rally", "rallies", "beat", "beats", "upgrade",
    "upgraded", "growth", "profit", "profits", "record", "strong", "bullish", "soars",
    "jumps", "outperform", "momentum", "confidence", "dividend", "expands", "wins",
];

const NEGATIVE_WORDS: &[&str] = &[
    "loss", "losses", "fall", "falls", "drop", "drops", "miss", "misses", "downgrade",
    "downgraded", "weak", "bearish", "plunge", "plunges", "decline", "declines",
    "lawsuit", "recall", "cuts", "slump", "warning", "fraud", "probe", "layoffs",
    "volatility", "correction",
];

impl LexiconClassifier {
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
        }
    }
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentClassifier for LexiconClassifier {
    fn classify(&self, text: &str) -> SentimentScore {
        let lower = text.to_lowercase();
        let mut positive_hits = 0i32;
        let mut negative_hits = 0i32;

        for word in lower.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            if self.positive.contains(word) {
                positive_hits += 1;
            } else if self.negative.contains(word) {
                negative_hits += 1;
            }
        }

        let net = positive_hits - negative_hits;
        let sentiment = match net {
            n if n > 0 => Sentiment::Positive,
            n if n < 0 => Sentiment::Negative,
            _ => Sentiment::Neutral,
        };

        // Confidence grows with signal strength but never reads as certain.
        let score = if positive_hits + negative_hits == 0 {
            0.5
        } else {
            (0.5 + 0.1 * f64::from(net.abs())).min(0.95)
        };

        SentimentScore { sentiment, score }
    }
}
