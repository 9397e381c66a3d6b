use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Briefing, Forecast, Fundamentals, Report, Thesis};

/// Lifecycle status of an analysis job.
///
/// Serialized in SCREAMING_SNAKE_CASE so existing polling clients keep
/// working. `Success` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    DataFetching,
    IntelligenceGathering,
    Predicting,
    Analyzing,
    Summarizing,
    Success,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// Any non-terminal status may move to `Failed`. The two fan-out states
    /// are both accepted as predecessors of `Analyzing`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == JobStatus::Failed {
            return true;
        }
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::DataFetching)
                | (JobStatus::DataFetching, JobStatus::IntelligenceGathering)
                | (JobStatus::DataFetching, JobStatus::Predicting)
                | (JobStatus::IntelligenceGathering, JobStatus::Predicting)
                | (JobStatus::IntelligenceGathering, JobStatus::Analyzing)
                | (JobStatus::Predicting, JobStatus::Analyzing)
                | (JobStatus::Analyzing, JobStatus::Summarizing)
                | (JobStatus::Summarizing, JobStatus::Success)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::DataFetching => "DATA_FETCHING",
            JobStatus::IntelligenceGathering => "INTELLIGENCE_GATHERING",
            JobStatus::Predicting => "PREDICTING",
            JobStatus::Analyzing => "ANALYZING",
            JobStatus::Summarizing => "SUMMARIZING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Incrementally-built result document. Each stage owns exactly one field;
/// fields are only ever added or overwritten by a retry of the same stage,
/// never removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fundamentals: Option<Fundamentals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intelligence_briefing: Option<Briefing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction_analysis: Option<Forecast>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_analysis: Option<Report>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisor_summary: Option<Thesis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    /// Apply a single-field patch. Writing `error` when a message is already
    /// present appends rather than overwrites, so neither of two failing
    /// branches loses its message.
    pub fn apply(&mut self, patch: ResultPatch) {
        match patch {
            ResultPatch::Fundamentals(v) => self.fundamentals = Some(v),
            ResultPatch::IntelligenceBriefing(v) => self.intelligence_briefing = Some(v),
            ResultPatch::PredictionAnalysis(v) => self.prediction_analysis = Some(v),
            ResultPatch::LlmAnalysis(v) => self.llm_analysis = Some(v),
            ResultPatch::AdvisorSummary(v) => self.advisor_summary = Some(v),
            ResultPatch::Error(msg) => match self.error.take() {
                Some(prev) if prev != msg => self.error = Some(format!("{}; {}", prev, msg)),
                _ => self.error = Some(msg),
            },
        }
    }

    /// Names of the populated fields, for logging.
    pub fn populated_keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.fundamentals.is_some() {
            keys.push("fundamentals");
        }
        if self.intelligence_briefing.is_some() {
            keys.push("intelligence_briefing");
        }
        if self.prediction_analysis.is_some() {
            keys.push("prediction_analysis");
        }
        if self.llm_analysis.is_some() {
            keys.push("llm_analysis");
        }
        if self.advisor_summary.is_some() {
            keys.push("advisor_summary");
        }
        if self.error.is_some() {
            keys.push("error");
        }
        keys
    }
}

/// Single-field write into [`AnalysisResult`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPatch {
    Fundamentals(Fundamentals),
    IntelligenceBriefing(Briefing),
    PredictionAnalysis(Forecast),
    LlmAnalysis(Report),
    AdvisorSummary(Thesis),
    Error(String),
}

/// One of the two parallel branches dispatched after the data stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinBranch {
    Intelligence,
    Prediction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchOutcome {
    Succeeded,
    Failed,
}

/// Join record for the intelligence/prediction fan-out, persisted with the
/// job so that marking a branch and advancing the status commit atomically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinState {
    pub intelligence: Option<BranchOutcome>,
    pub prediction: Option<BranchOutcome>,
}

impl JoinState {
    pub fn record(&mut self, branch: JoinBranch, outcome: BranchOutcome) {
        match branch {
            JoinBranch::Intelligence => self.intelligence = Some(outcome),
            JoinBranch::Prediction => self.prediction = Some(outcome),
        }
    }

    pub fn reported(&self, branch: JoinBranch) -> Option<BranchOutcome> {
        match branch {
            JoinBranch::Intelligence => self.intelligence,
            JoinBranch::Prediction => self.prediction,
        }
    }

    pub fn both_reported(&self) -> bool {
        self.intelligence.is_some() && self.prediction.is_some()
    }

    pub fn all_succeeded(&self) -> bool {
        self.intelligence == Some(BranchOutcome::Succeeded)
            && self.prediction == Some(BranchOutcome::Succeeded)
    }
}

/// The durable job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub ticker: String,
    pub status: JobStatus,
    pub result: AnalysisResult,
    #[serde(skip)]
    pub join: JoinState,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub version: i64,
}

impl JobRecord {
    pub fn new(ticker: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticker,
            status: JobStatus::Pending,
            result: AnalysisResult::default(),
            join: JoinState::default(),
            created_at: Utc::now(),
            version: 0,
        }
    }
}

/// Mutation handed to the store's conditional update: at most one result
/// patch, an optional join mark, and an optional status advance. The store
/// applies the advance only when it is legal from the record's current
/// status, which keeps redelivered stages from regressing the machine.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub patch: Option<ResultPatch>,
    pub join_mark: Option<(JoinBranch, BranchOutcome)>,
    pub advance: Option<JobStatus>,
}

impl JobUpdate {
    pub fn patch(patch: ResultPatch) -> Self {
        Self {
            patch: Some(patch),
            ..Default::default()
        }
    }

    pub fn with_join_mark(mut self, branch: JoinBranch, outcome: BranchOutcome) -> Self {
        self.join_mark = Some((branch, outcome));
        self
    }

    pub fn with_advance(mut self, status: JobStatus) -> Self {
        self.advance = Some(status);
        self
    }

    /// Apply this update in place. Returns whether anything changed.
    pub fn apply_to(&self, record: &mut JobRecord) -> bool {
        let mut changed = false;
        if let Some(patch) = &self.patch {
            record.result.apply(patch.clone());
            changed = true;
        }
        if let Some((branch, outcome)) = self.join_mark {
            record.join.record(branch, outcome);
            changed = true;
        }
        if let Some(next) = self.advance {
            if record.status.can_transition_to(next) {
                record.status = next;
                changed = true;
            } else if record.status != next {
                tracing::debug!(
                    job_id = %record.id,
                    from = %record.status,
                    to = %next,
                    "skipping inapplicable status advance"
                );
            }
        }
        changed
    }
}
