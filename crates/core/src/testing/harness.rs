//! Fully mocked pipeline wiring.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::pipeline::{PipelineConfig, PipelineDeps, RegistrationProcessor};

use super::journal::CallJournal;
use super::mock_delivery::MockDeliveryClient;
use super::mock_invoker::MockReportInvoker;
use super::mock_merger::MockMerger;
use super::mock_source::MockRegistrationSource;
use super::mock_transitioner::MockStateTransitioner;
use super::mock_waiter::MockOutputWaiter;

/// Every pipeline seam backed by a mock that records into one journal.
///
/// The invoker writes its outputs into `output_dir`, and the transitioner
/// is linked to the source, so the whole flow runs against real files.
#[derive(Debug, Clone)]
pub struct PipelineHarness {
    pub journal: CallJournal,
    pub source: MockRegistrationSource,
    pub invoker: MockReportInvoker,
    pub waiter: MockOutputWaiter,
    pub merger: MockMerger,
    pub delivery: MockDeliveryClient,
    pub transitioner: MockStateTransitioner,
    pub config: PipelineConfig,
    pub delivery_enabled: bool,
}

impl PipelineHarness {
    /// Creates a harness writing into `output_dir`.
    pub fn new(output_dir: &Path) -> Self {
        let journal = CallJournal::new();
        let source = MockRegistrationSource::with_journal(journal.clone());
        let mut config = PipelineConfig::new(output_dir, output_dir.join("templates"));
        config.convergence_timeout = Duration::from_secs(2);
        config.persist_timeout = Duration::from_secs(2);

        Self {
            invoker: MockReportInvoker::new()
                .with_output_dir(output_dir)
                .with_journal(journal.clone()),
            waiter: MockOutputWaiter::new().with_journal(journal.clone()),
            merger: MockMerger::new().with_journal(journal.clone()),
            delivery: MockDeliveryClient::new().with_journal(journal.clone()),
            transitioner: MockStateTransitioner::new()
                .with_journal(journal.clone())
                .linked_to(source.clone()),
            source,
            journal,
            config,
            delivery_enabled: true,
        }
    }

    /// Disables the delivery stage.
    pub fn without_delivery(mut self) -> Self {
        self.delivery_enabled = false;
        self
    }

    /// Trait-object dependencies sharing state with the harness mocks.
    pub fn deps(&self) -> PipelineDeps {
        PipelineDeps {
            source: Arc::new(self.source.clone()),
            invoker: Arc::new(self.invoker.clone()),
            waiter: Arc::new(self.waiter.clone()),
            merger: Arc::new(self.merger.clone()),
            delivery: self
                .delivery_enabled
                .then(|| Arc::new(self.delivery.clone()) as Arc<dyn crate::delivery::DeliveryClient>),
            transitioner: Arc::new(self.transitioner.clone()),
        }
    }

    /// A processor over the mocks that is running until `running` is cleared.
    pub fn processor(&self, running: Arc<AtomicBool>) -> RegistrationProcessor {
        RegistrationProcessor::new(self.config.clone(), self.deps(), running)
    }
}
