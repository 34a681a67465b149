//! Run configuration via `sable.toml`
//!
//! Every field is optional in the file. Command-line flags override values
//! read from it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::contract::ArithmeticMode;
use crate::error::SableError;

/// Config file looked up in the working directory when no path is given
pub const CONFIG_FILE_NAME: &str = "sable.toml";

/// Filter used when neither the config nor `RUST_LOG` sets one
pub const DEFAULT_LOG_FILTER: &str = "warn,sable=info";

/// Queue used for fork bodies without an explicit `via`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    /// One thread per work item
    Parallel,
    /// Run on first await, on the awaiting thread
    Lazy,
    /// Bounded worker pool
    #[default]
    Default,
}

/// Run configuration loaded from `sable.toml`.
///
/// # Example
///
/// ```toml
/// checked = true
/// queue = "default"     # "parallel", "lazy" or "default"
/// pool_threads = 0      # 0 = host parallelism
/// monitor_calls = false
/// log_filter = "warn,sable=debug"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Arithmetic mode outside checked/unchecked blocks
    #[serde(default = "default_checked")]
    pub checked: bool,
    #[serde(default)]
    pub queue: QueueKind,
    /// Worker threads for the default queue
    #[serde(default)]
    pub pool_threads: usize,
    /// Attach a tracing call-stack monitor
    #[serde(default)]
    pub monitor_calls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

fn default_checked() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            checked: default_checked(),
            queue: QueueKind::default(),
            pool_threads: 0,
            monitor_calls: false,
            log_filter: None,
        }
    }
}

impl RunConfig {
    pub fn mode(&self) -> ArithmeticMode {
        ArithmeticMode::from_checked(self.checked)
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    pub fn from_toml(text: &str) -> Result<Self, SableError> {
        toml::from_str(text).map_err(|e| SableError::Config(e.to_string()))
    }

    /// Read and parse a config file
    pub fn from_file(path: &Path) -> Result<Self, SableError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SableError::Config(format!("cannot read '{}': {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| SableError::Config(format!("cannot parse '{}': {e}", path.display())))
    }

    /// `path` if given, else `sable.toml` when it exists, else defaults
    pub fn discover(path: Option<&Path>) -> Result<Self, SableError> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(CONFIG_FILE_NAME).exists() => {
                Self::from_file(Path::new(CONFIG_FILE_NAME))
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::from_toml("").unwrap();
        assert_eq!(config, RunConfig::default());
        assert!(config.checked);
        assert_eq!(config.queue, QueueKind::Default);
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_parse_all_fields() {
        let config = RunConfig::from_toml(
            r#"
checked = false
queue = "lazy"
pool_threads = 3
monitor_calls = true
log_filter = "sable=trace"
"#,
        )
        .unwrap();
        assert_eq!(config.mode(), ArithmeticMode::Unchecked);
        assert_eq!(config.queue, QueueKind::Lazy);
        assert_eq!(config.pool_threads, 3);
        assert!(config.monitor_calls);
        assert_eq!(config.log_filter(), "sable=trace");
    }

    #[test]
    fn test_rejects_unknown_queue_and_fields() {
        assert!(matches!(
            RunConfig::from_toml("queue = \"fifo\""),
            Err(SableError::Config(_))
        ));
        assert!(RunConfig::from_toml("threads = 2").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = RunConfig::from_file(Path::new("/nonexistent/sable.toml")).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
