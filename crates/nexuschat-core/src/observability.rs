use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_FILE: &str = "nexuschat.logs.jsonl";
const DEFAULT_LEVEL: &str = "info";

/// Logging setup resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    pub enabled: bool,
    /// Explicit filter directive; `RUST_LOG` then `info` apply when unset.
    pub level: Option<String>,
    /// JSON-lines destination. Console output on stderr when unset.
    pub json_path: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            level: None,
            json_path: None,
        }
    }
}

impl LogSettings {
    /// Reads `NEXUSCHAT_OBSERVABILITY_ENABLED`, `NEXUSCHAT_LOG_LEVEL` and
    /// `NEXUSCHAT_JSON_LOG_PATH`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            // Unrecognized values leave logging on.
            enabled: set("NEXUSCHAT_OBSERVABILITY_ENABLED")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(true),
            level: set("NEXUSCHAT_LOG_LEVEL"),
            json_path: set("NEXUSCHAT_JSON_LOG_PATH").map(PathBuf::from),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        self.level
            .as_deref()
            .and_then(|level| EnvFilter::try_new(level).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_LEVEL))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Splits a log path into the directory and file name the appender wants.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (dir, file)
}

/// Initializes the process-wide subscriber once, from [`LogSettings::from_env`].
///
/// Later calls are no-ops, as is running under a subscriber installed by
/// someone else. Stdout is never written to.
pub fn init_observability() {
    INIT.get_or_init(|| install(&LogSettings::from_env()));
}

fn install(settings: &LogSettings) {
    if !settings.enabled {
        return;
    }

    let json_layer = settings.json_path.as_deref().map(|path| {
        let (dir, file) = split_log_path(path);
        let _ = std::fs::create_dir_all(&dir);
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(tracing_appender::rolling::never(dir, file))
    });
    let console_layer = json_layer.is_none().then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let _ = tracing_subscriber::registry()
        .with(settings.env_filter())
        .with(json_layer)
        .with(console_layer)
        .try_init();
}
