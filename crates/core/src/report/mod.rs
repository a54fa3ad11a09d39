//! Report module for driving the external report-rendering engine.
//!
//! This module provides the `ReportInvoker` trait and an implementation that
//! spawns the engine once per report job with an explicit argument vector.
//!
//! # Exit codes
//!
//! The wrapped engine reports a successful export with exit code `3`. The set
//! of exit codes treated as success is configurable and defaults to `[0, 3]`.
//!
//! # Example
//!
//! ```ignore
//! use courier_core::report::{ExternalReportInvoker, ReportConfig, ReportInvoker, ReportJob};
//!
//! let invoker = ExternalReportInvoker::new(config);
//! let job = ReportJob::new(template_path, "R1", "CBC", "courier");
//! let output = invoker.invoke(&job).await?;
//! println!("Rendered in {} ms", output.duration_ms);
//! ```

mod command;
mod config;
mod error;
mod invoker;
mod traits;
mod types;

pub use command::ReportCommand;
pub use config::{ReportConfig, ReportCredentials};
pub use error::InvocationError;
pub use invoker::ExternalReportInvoker;
pub use traits::ReportInvoker;
pub use types::{InvocationOutput, ReportJob, PARAM_CODE, PARAM_OPERATOR, PARAM_REG_KEY};
