//! Logging configuration shared by all revenant crates.
//!
//! Console and file output are both supported; the level defaults to `info`
//! and can be overridden through `RUST_LOG`.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Global file logger handle
static FILE_LOGGER: Mutex<Option<File>> = Mutex::new(None);

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Enable console logging
    #[serde(default = "default_true")]
    pub console_enabled: bool,

    /// Enable file logging
    #[serde(default)]
    pub file_enabled: bool,

    /// Log file path
    #[serde(default = "default_log_path")]
    pub file_path: String,

    /// Include timestamps
    #[serde(default = "default_true")]
    pub timestamps: bool,

    /// Include module target
    #[serde(default = "default_true")]
    pub show_target: bool,

    /// Use ANSI colors
    #[serde(default = "default_true")]
    pub ansi_colors: bool,

    /// Log level as string
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "revenant.log".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_enabled: false,
            file_path: "revenant.log".to_string(),
            timestamps: true,
            show_target: true,
            ansi_colors: true,
            level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Create a debug configuration with verbose output
    pub fn debug() -> Self {
        Self {
            level: "debug".to_string(),
            ..Default::default()
        }
    }

    /// Create config with file logging enabled
    pub fn with_file(mut self, path: &str) -> Self {
        self.file_enabled = true;
        self.file_path = path.to_string();
        self
    }

    /// Set log level
    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    /// Parse level string to tracing Level
    pub fn get_level(&self) -> Level {
        match self.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" | "warning" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// Initialize logging with the given configuration
///
/// Can be called multiple times but only the first call installs the
/// global subscriber.
pub fn init_logging(config: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.file_enabled && !config.file_path.is_empty() {
        if let Ok(file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.file_path)
        {
            if let Ok(mut guard) = FILE_LOGGER.lock() {
                *guard = Some(file);
            }
        }
    }

    if config.file_enabled {
        let console_layer = config.console_enabled.then(|| {
            fmt::layer()
                .with_ansi(config.ansi_colors)
                .with_target(config.show_target)
                .with_writer(std::io::stderr)
        });

        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_target(config.show_target)
            .with_writer(move || -> Box<dyn Write + Send> {
                if let Ok(guard) = FILE_LOGGER.lock() {
                    if let Some(ref file) = *guard {
                        if let Ok(f) = file.try_clone() {
                            return Box::new(f);
                        }
                    }
                }
                Box::new(std::io::sink())
            });

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer);

        let _ = tracing::subscriber::set_global_default(subscriber);
    } else {
        let builder = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_ansi(config.ansi_colors)
            .with_target(config.show_target);

        let result = if config.timestamps {
            builder.with_writer(std::io::stderr).try_init()
        } else {
            builder
                .without_time()
                .with_writer(std::io::stderr)
                .try_init()
        };

        let _ = result;
    }
}
