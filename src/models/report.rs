use serde::{Deserialize, Serialize};

/// Narrative analyst report produced by the analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub text: String,
}

/// Final investment thesis produced by the advisor stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thesis {
    pub text: String,
}
