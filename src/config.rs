use std::path::PathBuf;
use std::time::Duration;

/// WAL file name inside the data dir.
pub const WAL_FILE_NAME: &str = "timeoff.wal";

/// Process configuration, read from `TIMEOFF_*` environment variables.
/// Unparseable values fall back to the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    /// Compact once this many appends have accumulated. 0 disables.
    pub compact_threshold: u64,
    pub compact_interval: Duration,
    pub holidays_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            compact_threshold: 1000,
            compact_interval: Duration::from_secs(30),
            holidays_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            data_dir: lookup("TIMEOFF_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            metrics_port: lookup("TIMEOFF_METRICS_PORT").and_then(|v| v.trim().parse().ok()),
            compact_threshold: parsed("TIMEOFF_COMPACT_THRESHOLD").unwrap_or(defaults.compact_threshold),
            compact_interval: parsed("TIMEOFF_COMPACT_INTERVAL_SECS")
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.compact_interval),
            holidays_file: lookup("TIMEOFF_HOLIDAYS_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(WAL_FILE_NAME)
    }
}
