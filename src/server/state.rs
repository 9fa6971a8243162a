use crate::pipeline::EstimationPipeline;

/// Shared by every request; nothing in here is mutated after startup.
pub struct AppState {
    pub pipeline: EstimationPipeline,
    pub offline: bool,
}
