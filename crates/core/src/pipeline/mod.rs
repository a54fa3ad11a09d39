//! Per-registration stage runner.
//!
//! One registration runs through a fixed sequence of stages: stale output
//! cleanup, job planning, report invocation, convergence, organization into
//! the per-patient folder, merge, best-effort delivery, and the final flag
//! update. A failure in any stage before delivery leaves the registration
//! eligible so a later batch retries it.

mod config;
mod error;
mod outputs;
mod processor;
mod types;

pub use config::PipelineConfig;
pub use error::{PipelineError, Stage};
pub use outputs::{cleanup_stale_outputs, folder_name, move_into_folder};
pub use processor::{PipelineDeps, RegistrationProcessor};
pub use types::{DeliveryStatus, JobPlan, RegistrationOutcome};
