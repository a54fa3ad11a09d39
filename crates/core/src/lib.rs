pub mod config;
pub mod convergence;
pub mod delivery;
pub mod lock;
pub mod merger;
pub mod pipeline;
pub mod registration;
pub mod report;
pub mod scheduler;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LoggingConfig,
    SanitizedConfig,
};
pub use convergence::{ConvergenceConfig, ConvergenceWaiter, OutputWaiter};
pub use delivery::{
    normalize_phone, BirdDeliveryClient, DeliveryClient, DeliveryConfig, DeliveryError,
    DeliveryStep, MessageId,
};
pub use lock::{LockConfig, LockError, ProcessLock};
pub use merger::{ArtifactMerger, ExternalPdfMerger, MergeError, MergerConfig};
pub use pipeline::{
    DeliveryStatus, PipelineConfig, PipelineDeps, PipelineError, RegistrationOutcome,
    RegistrationProcessor, Stage,
};
pub use registration::{
    Database, DatabaseConfig, PersistenceError, RegistrationError, RegistrationSource,
    SqliteRegistrationSource, SqliteStateTransitioner, StateTransitioner,
};
pub use report::{ExternalReportInvoker, InvocationError, ReportConfig, ReportInvoker, ReportJob};
pub use scheduler::{
    BatchReport, BatchScheduler, RunOutcome, SchedulerConfig, SchedulerError, SchedulerState,
    ShutdownHandle,
};
