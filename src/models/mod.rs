mod briefing;
mod forecast;
mod fundamentals;
mod job;
mod report;

pub use briefing::{Briefing, BriefingArticle, BriefingSummary, Sentiment};
pub use forecast::{Forecast, ForecastPoint, TrendDirection};
pub use fundamentals::Fundamentals;
pub use job::{
    AnalysisResult, BranchOutcome, JobRecord, JobStatus, JobUpdate, JoinBranch, JoinState,
    ResultPatch,
};
pub use report::{Report, Thesis};
