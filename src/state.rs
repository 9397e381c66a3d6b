use std::sync::Arc;

use crate::pipeline::PipelineController;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PipelineController>,
}
