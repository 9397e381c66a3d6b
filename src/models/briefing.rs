use serde::{Deserialize, Serialize};

/// Sentiment classification for a news item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positive"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Negative => write!(f, "negative"),
        }
    }
}

/// A single classified news article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BriefingArticle {
    pub title: String,
    pub url: String,
    pub source: String,
    pub sentiment: Sentiment,
    /// Classifier confidence in [0.0, 1.0].
    pub score: f64,
}

/// Aggregate sentiment counts across a briefing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefingSummary {
    pub total: i32,
    pub positive: i32,
    pub negative: i32,
    pub neutral: i32,
}

/// News/sentiment briefing produced by the intelligence stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Briefing {
    pub articles: Vec<BriefingArticle>,
    pub summary: BriefingSummary,
}

impl Briefing {
    /// Build a briefing, deriving the aggregate counts from the articles.
    pub fn from_articles(articles: Vec<BriefingArticle>) -> Self {
        let mut summary = BriefingSummary {
            total: articles.len() as i32,
            ..Default::default()
        };
        for article in &articles {
            match article.sentiment {
                Sentiment::Positive => summary.positive += 1,
                Sentiment::Negative => summary.negative += 1,
                Sentiment::Neutral => summary.neutral += 1,
            }
        }
        Self { articles, summary }
    }

    pub fn empty() -> Self {
        Self {
            articles: Vec::new(),
            summary: BriefingSummary::default(),
        }
    }
}
