pub mod creator;
pub mod orchestrator;

pub use creator::JobCreator;
pub use orchestrator::{
    AutoJobOrchestrator, AutoJobOutcome, AutoJobRequest, REASON_ERROR, REASON_RETURNED_NULL,
};
