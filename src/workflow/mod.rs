pub mod orchestrator;
pub mod record;
pub mod types;

pub use orchestrator::Orchestrator;
pub use record::AttemptRecord;
pub use types::{RemediationOutcome, RemediationReport, RemediationState};
