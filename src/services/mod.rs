pub mod sentiment;

pub use sentiment::{LexiconClassifier, SentimentClassifier, SentimentScore};
