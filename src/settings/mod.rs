pub mod run_config;

pub use run_config::{ReanalysisSourceKind, RunConfig, ENV_PREFIX};
