//! Testing utilities and mock implementations.
//!
//! Every trait seam of the pipeline has a mock here. Mocks are cheap to
//! clone and clones share state, so a test keeps one handle for assertions
//! while the pipeline owns another. A shared [`CallJournal`] records calls
//! across mocks for ordering assertions.
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_core::testing::PipelineHarness;
//!
//! let harness = PipelineHarness::new(output_dir);
//! harness.source.add_registration("R1", &["CBC"], &[]);
//! harness.source.set_phone("R1", "01012345678");
//!
//! let outcome = harness.processor(running).process("R1").await?;
//! assert!(harness.journal.position("invoke") < harness.journal.position("wait"));
//! ```

mod harness;
mod journal;
mod mock_delivery;
mod mock_invoker;
mod mock_merger;
mod mock_source;
mod mock_transitioner;
mod mock_waiter;

pub use harness::PipelineHarness;
pub use journal::CallJournal;
pub use mock_delivery::{MockDeliveryClient, RecordedDelivery};
pub use mock_invoker::MockReportInvoker;
pub use mock_merger::{MockMerger, MOCK_ARTIFACT_NAME};
pub use mock_source::MockRegistrationSource;
pub use mock_transitioner::MockStateTransitioner;
pub use mock_waiter::{MockOutputWaiter, RecordedWait};
