//! Output convergence detection for the shared report directory.
//!
//! The report engine gives no completion signal, so completion is inferred:
//! the directory has converged once it holds at least the expected number of
//! fresh `*.pdf` files and their aggregate size is non-zero and unchanged
//! between two consecutive samples. Files modified before the `since`
//! timestamp are ignored so leftovers from an earlier run are never counted.

mod config;
mod traits;
mod waiter;

pub use config::ConvergenceConfig;
pub use traits::OutputWaiter;
pub use waiter::{sample_outputs, ConvergenceWaiter, OutputSample};
