//! Registration processor implementation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, info_span, warn, Instrument};

use crate::convergence::OutputWaiter;
use crate::delivery::{normalize_phone, DeliveryClient};
use crate::merger::ArtifactMerger;
use crate::registration::{
    query_source, PersistenceError, RegistrationSource, StateTransitioner,
};
use crate::report::{ReportInvoker, ReportJob};

use super::config::PipelineConfig;
use super::error::{PipelineError, Stage};
use super::outputs::{cleanup_stale_outputs, folder_name, move_into_folder};
use super::types::{DeliveryStatus, JobPlan, RegistrationOutcome};

/// Allowance for filesystems whose modification times lag the system clock.
const MTIME_TOLERANCE: Duration = Duration::from_secs(2);

/// External collaborators of the pipeline.
#[derive(Clone)]
pub struct PipelineDeps {
    pub source: Arc<dyn RegistrationSource>,
    pub invoker: Arc<dyn ReportInvoker>,
    pub waiter: Arc<dyn OutputWaiter>,
    pub merger: Arc<dyn ArtifactMerger>,
    /// `None` when delivery is disabled.
    pub delivery: Option<Arc<dyn DeliveryClient>>,
    pub transitioner: Arc<dyn StateTransitioner>,
}

/// Runs one registration through every stage.
pub struct RegistrationProcessor {
    config: PipelineConfig,
    deps: PipelineDeps,
    running: Arc<AtomicBool>,
}

impl RegistrationProcessor {
    /// Creates a processor. `running` is cleared on shutdown and checked
    /// between stages.
    pub fn new(config: PipelineConfig, deps: PipelineDeps, running: Arc<AtomicBool>) -> Self {
        Self {
            config,
            deps,
            running,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn deps(&self) -> &PipelineDeps {
        &self.deps
    }

    fn ensure_running(&self, next: Stage) -> Result<(), PipelineError> {
        if self.running.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PipelineError::Interrupted(next))
        }
    }

    /// Processes one registration to completion or to its first failing stage.
    pub async fn process(&self, reg_key: &str) -> Result<RegistrationOutcome, PipelineError> {
        let span = info_span!("registration", reg_key = %reg_key);
        self.run_stages(reg_key).instrument(span).await
    }

    async fn run_stages(&self, reg_key: &str) -> Result<RegistrationOutcome, PipelineError> {
        let output_dir = self.config.output_dir().to_path_buf();
        let folder = output_dir.join(folder_name(reg_key));

        // Cleanup
        for dir in [&output_dir, &folder] {
            let removed = cleanup_stale_outputs(dir)
                .await
                .map_err(|source| PipelineError::Cleanup {
                    path: dir.clone(),
                    source,
                })?;
            if removed > 0 {
                info!(dir = %dir.display(), removed, "Removed stale outputs");
            }
        }
        let since = SystemTime::now()
            .checked_sub(MTIME_TOLERANCE)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        // Plan
        self.ensure_running(Stage::Plan)?;
        let plan = self.plan_jobs(reg_key).await?;
        if plan.is_empty() {
            return Err(PipelineError::NothingToGenerate);
        }
        let expected = plan.expected_outputs();
        debug!(expected, skipped = plan.skipped_codes.len(), "Planned report jobs");

        // Invoke
        self.ensure_running(Stage::Invoke)?;
        for job in &plan.jobs {
            self.deps
                .invoker
                .invoke(job)
                .await
                .map_err(|source| PipelineError::Invocation {
                    code: job.item_code.clone(),
                    source,
                })?;
        }

        // Converge
        self.ensure_running(Stage::Converge)?;
        let files = self
            .deps
            .waiter
            .wait_for(&output_dir, expected, self.config.convergence_timeout, since)
            .await;
        if files.is_empty() {
            return Err(PipelineError::ConvergenceTimeout {
                expected,
                timeout_secs: self.config.convergence_timeout.as_secs(),
            });
        }

        // Organize
        self.ensure_running(Stage::Organize)?;
        move_into_folder(&output_dir, &files, &folder)
            .await
            .map_err(|source| PipelineError::Organize {
                path: folder.clone(),
                source,
            })?;

        // Merge
        self.ensure_running(Stage::Merge)?;
        let artifact = self.deps.merger.merge(&folder).await?;

        // Deliver
        self.ensure_running(Stage::Deliver)?;
        let delivery = self.deliver(reg_key, &artifact).await;

        // Once delivery has been attempted the flag update always runs
        let marked = self.mark_processed(reg_key).await?;

        info!(
            reports = files.len(),
            artifact = %artifact.display(),
            delivery = ?delivery,
            marked,
            "Registration processed"
        );

        Ok(RegistrationOutcome {
            reg_key: reg_key.to_string(),
            reports_generated: files.len(),
            artifact,
            delivery,
            marked,
        })
    }

    /// Plans every report job before the first invocation.
    ///
    /// Group codes come first, then mega codes resolved through their profile.
    pub async fn plan_jobs(&self, reg_key: &str) -> Result<JobPlan, PipelineError> {
        let key = reg_key.to_string();
        let (group_codes, mega) = query_source(&self.deps.source, move |source| {
            let group_codes = source.group_codes(&key)?;
            let mut mega = Vec::new();
            for code in source.mega_codes(&key)? {
                let template = source.resolve_mega_template(&code)?;
                mega.push((code, template));
            }
            Ok((group_codes, mega))
        })
        .await?;

        let mut plan = JobPlan::default();
        for code in group_codes {
            plan.jobs.push(self.job(reg_key, self.config.template_path(&code), code));
        }
        for (code, template) in mega {
            match template {
                Some(template) => {
                    plan.jobs
                        .push(self.job(reg_key, self.config.template_path(&template), code));
                }
                None => {
                    warn!(code = %code, "Mega code has no template profile, skipping");
                    plan.skipped_codes.push(code);
                }
            }
        }
        Ok(plan)
    }

    fn job(&self, reg_key: &str, template: PathBuf, code: String) -> ReportJob {
        ReportJob::new(template, reg_key, code, self.config.operator.as_str())
    }

    /// Best-effort delivery. Never fails the registration.
    async fn deliver(&self, reg_key: &str, artifact: &std::path::Path) -> DeliveryStatus {
        let Some(client) = &self.deps.delivery else {
            debug!("Delivery disabled");
            return DeliveryStatus::Skipped("delivery disabled".to_string());
        };

        let key = reg_key.to_string();
        let raw_phone = match query_source(&self.deps.source, move |source| {
            source.contact_phone(&key)
        })
        .await
        {
            Ok(Some(phone)) => phone,
            Ok(None) => {
                warn!("No contact phone, delivery skipped");
                return DeliveryStatus::Skipped("no contact phone".to_string());
            }
            Err(e) => {
                warn!(error = %e, "Contact phone lookup failed, delivery skipped");
                return DeliveryStatus::Skipped(format!("phone lookup failed: {}", e));
            }
        };

        let Some(phone) = normalize_phone(&raw_phone, &self.config.default_country_code) else {
            warn!(raw_phone = %raw_phone, "Invalid contact phone, delivery skipped");
            return DeliveryStatus::Skipped(format!("invalid phone: {}", raw_phone));
        };

        match client.deliver(&phone, artifact).await {
            Ok(message_id) => DeliveryStatus::Sent(message_id),
            Err(e) => {
                warn!(
                    step = %e.step,
                    error = %e.message,
                    "Delivery failed, registration still marked processed"
                );
                DeliveryStatus::Failed(e.to_string())
            }
        }
    }

    /// Final flag update under the overall persistence timeout.
    async fn mark_processed(&self, reg_key: &str) -> Result<bool, PipelineError> {
        let timeout = self.config.persist_timeout;
        match tokio::time::timeout(timeout, self.deps.transitioner.mark_processed(reg_key)).await {
            Ok(Ok(rows)) => Ok(rows > 0),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(PersistenceError::Timeout {
                timeout_secs: timeout.as_secs(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryStep;
    use crate::testing::{PipelineHarness, MOCK_ARTIFACT_NAME};
    use tempfile::TempDir;

    fn running() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(true))
    }

    fn harness(dir: &TempDir) -> PipelineHarness {
        let harness = PipelineHarness::new(dir.path());
        harness.source.add_registration("R1", &["CBC", "LFT"], &["M1"]);
        harness.source.set_profile("M1", "LIPID");
        harness.source.set_phone("R1", "0101 234 5678");
        harness
    }

    #[tokio::test]
    async fn test_full_run_in_stage_order() {
        let dir = TempDir::new().unwrap();
        let harness = harness(&dir);

        let outcome = harness.processor(running()).process("R1").await.unwrap();

        assert_eq!(outcome.reports_generated, 3);
        assert!(outcome.marked);
        assert_eq!(
            outcome.delivery,
            DeliveryStatus::Sent(crate::delivery::MessageId("mock-msg-1".to_string()))
        );
        assert_eq!(
            harness.journal.entries(),
            vec![
                "invoke:CBC",
                "invoke:LFT",
                "invoke:M1",
                "wait:3",
                "merge",
                "deliver:+201012345678",
                "mark:R1",
            ]
        );

        let folder = dir.path().join("R1");
        assert_eq!(outcome.artifact, folder.join(MOCK_ARTIFACT_NAME));
        assert_eq!(
            std::fs::read_to_string(&outcome.artifact).unwrap(),
            "%PDF-1.4 R1 CBC%PDF-1.4 R1 LFT%PDF-1.4 R1 M1"
        );
        assert!(!harness.source.is_eligible("R1"));
    }

    #[tokio::test]
    async fn test_jobs_resolve_templates_and_parameters() {
        let dir = TempDir::new().unwrap();
        let harness = harness(&dir);

        harness.processor(running()).process("R1").await.unwrap();

        let jobs = harness.invoker.recorded_jobs().await;
        let templates = dir.path().join("templates");
        assert_eq!(jobs[0].template_path, templates.join("CBC.rpt"));
        assert_eq!(jobs[2].template_path, templates.join("LIPID.rpt"));
        assert_eq!(jobs[2].item_code, "M1");
        assert_eq!(jobs[2].parameters["regkey"], "R1");
        assert_eq!(jobs[2].parameters["user"], "courier");
    }

    #[tokio::test]
    async fn test_mega_code_without_profile_is_not_expected() {
        let dir = TempDir::new().unwrap();
        let harness = PipelineHarness::new(dir.path());
        harness.source.add_registration("R2", &["CBC"], &["UNKNOWN"]);
        harness.source.set_phone("R2", "01012345678");

        let processor = harness.processor(running());
        let plan = processor.plan_jobs("R2").await.unwrap();
        assert_eq!(plan.expected_outputs(), 1);
        assert_eq!(plan.skipped_codes, vec!["UNKNOWN"]);

        processor.process("R2").await.unwrap();
        assert_eq!(harness.waiter.recorded_waits().await[0].expected, 1);
    }

    #[tokio::test]
    async fn test_nothing_to_generate_leaves_registration_eligible() {
        let dir = TempDir::new().unwrap();
        let harness = PipelineHarness::new(dir.path());
        harness.source.add_registration("R3", &[], &["UNKNOWN"]);

        let err = harness.processor(running()).process("R3").await.unwrap_err();
        assert!(matches!(err, PipelineError::NothingToGenerate));
        assert_eq!(harness.invoker.invocation_count().await, 0);
        assert!(harness.source.is_eligible("R3"));
    }

    #[tokio::test]
    async fn test_invocation_failure_aborts_before_waiting() {
        let dir = TempDir::new().unwrap();
        let harness = harness(&dir);
        harness.invoker.fail_code("LFT").await;

        let err = harness.processor(running()).process("R1").await.unwrap_err();
        match &err {
            PipelineError::Invocation { code, .. } => assert_eq!(code, "LFT"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.stage(), Stage::Invoke);
        assert_eq!(harness.journal.entries(), vec!["invoke:CBC", "invoke:LFT"]);
        assert!(harness.source.is_eligible("R1"));
    }

    #[tokio::test]
    async fn test_missing_output_is_convergence_timeout() {
        let dir = TempDir::new().unwrap();
        let harness = harness(&dir);
        harness.invoker.silence_code("M1").await;

        let err = harness.processor(running()).process("R1").await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ConvergenceTimeout { expected: 3, .. }
        ));
        assert!(!harness.journal.contains("merge"));
        assert!(!harness.journal.contains("mark"));
    }

    #[tokio::test]
    async fn test_merge_failure_keeps_registration_eligible() {
        let dir = TempDir::new().unwrap();
        let harness = harness(&dir);
        harness.merger.set_fail(true).await;

        let err = harness.processor(running()).process("R1").await.unwrap_err();
        assert_eq!(err.stage(), Stage::Merge);
        assert!(!harness.journal.contains("deliver"));
        assert!(harness.source.is_eligible("R1"));
    }

    #[tokio::test]
    async fn test_delivery_failure_still_marks_processed() {
        let dir = TempDir::new().unwrap();
        let harness = harness(&dir);
        harness
            .delivery
            .set_failing_step(Some(DeliveryStep::Upload))
            .await;

        let outcome = harness.processor(running()).process("R1").await.unwrap();
        assert!(outcome.delivery.is_failed());
        assert!(outcome.marked);
        assert_eq!(harness.transitioner.recorded_calls().await, vec!["R1"]);
    }

    #[tokio::test]
    async fn test_delivery_disabled_is_skipped() {
        let dir = TempDir::new().unwrap();
        let harness = harness(&dir).without_delivery();

        let outcome = harness.processor(running()).process("R1").await.unwrap();
        assert!(matches!(outcome.delivery, DeliveryStatus::Skipped(_)));
        assert_eq!(harness.delivery.delivery_count().await, 0);
        assert!(outcome.marked);
    }

    #[tokio::test]
    async fn test_invalid_phone_skips_delivery() {
        let dir = TempDir::new().unwrap();
        let harness = harness(&dir);
        harness.source.set_phone("R1", "unknown");

        let outcome = harness.processor(running()).process("R1").await.unwrap();
        assert!(matches!(outcome.delivery, DeliveryStatus::Skipped(_)));
        assert_eq!(harness.delivery.delivery_count().await, 0);
        assert!(outcome.marked);
    }

    #[tokio::test]
    async fn test_persist_timeout_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let mut harness = harness(&dir);
        harness.config.persist_timeout = Duration::from_millis(100);
        harness
            .transitioner
            .set_delay(Some(Duration::from_secs(5)))
            .await;

        let err = harness.processor(running()).process("R1").await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Persistence(PersistenceError::Timeout { .. })
        ));
        assert!(err.risks_duplicate_delivery());
        assert!(harness.source.is_eligible("R1"));
    }

    #[tokio::test]
    async fn test_already_processed_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let harness = harness(&dir);
        let processor = harness.processor(running());

        assert!(processor.process("R1").await.unwrap().marked);
        assert!(!processor.process("R1").await.unwrap().marked);
    }

    #[tokio::test]
    async fn test_stale_outputs_are_removed_first() {
        let dir = TempDir::new().unwrap();
        let harness = harness(&dir);
        std::fs::write(dir.path().join("leftover.pdf"), b"%PDF old").unwrap();
        std::fs::create_dir(dir.path().join("R1")).unwrap();
        std::fs::write(dir.path().join("R1").join("old_merge.pdf"), b"%PDF old").unwrap();

        let outcome = harness.processor(running()).process("R1").await.unwrap();
        assert_eq!(outcome.reports_generated, 3);
        assert!(!dir.path().join("leftover.pdf").exists());
        assert!(!std::fs::read_to_string(&outcome.artifact)
            .unwrap()
            .contains("old"));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_before_next_stage() {
        let dir = TempDir::new().unwrap();
        let harness = harness(&dir);

        let err = harness
            .processor(Arc::new(AtomicBool::new(false)))
            .process("R1")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Interrupted(Stage::Plan)));
        assert!(harness.journal.entries().is_empty());
    }
}
