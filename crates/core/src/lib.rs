mod config;
mod conflict;
mod exif_reader;
mod file_ops;
mod metadata;
mod processor;
mod report;
mod rule;
mod rule_engine;
mod sanitize;
mod template;
mod worker;

pub use config::{
    app_paths, load_config, load_config_from, save_config, save_config_to, AppConfig, AppPaths,
};
pub use conflict::{suggest_rename, ConflictDecision, ConflictHandler, Resolution};
pub use file_ops::{copy_file, move_file, FileOpError, Transfer};
pub use metadata::{extract_metadata, FieldValue, FileMetadata, IMAGE_EXTENSIONS};
pub use processor::{
    collect_files, FileProcessor, Phase, Plan, PlanError, PlannedOperation, ProcessResult,
    ProcessStatus, Progress, RunError,
};
pub use report::RunSummary;
pub use rule::{
    Condition, ConditionOperator, ConditionValue, OperationKind, Rule, RuleError,
    DEFAULT_PRIORITY,
};
pub use rule_engine::{evaluate_condition, RuleEngine};
pub use template::{render_destination, unknown_placeholders};
pub use worker::{spawn_discovery, spawn_execution, ConflictRequest, RunHandle, WorkerEvent};
