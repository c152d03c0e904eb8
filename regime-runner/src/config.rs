use dotenv::dotenv;
use std::path::PathBuf;

/// Log output format of the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Process configuration read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub registry_path: PathBuf,
    pub state_dir: PathBuf,
    pub market_data_dir: PathBuf,
    pub journal_dir: PathBuf,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv().ok();

        let state_dir = PathBuf::from(std::env::var("STATE_DIR").unwrap_or_else(|_| "state".to_string()));
        let log_format = match std::env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "pretty".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            "pretty" | "" => LogFormat::Pretty,
            other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
        };

        Ok(Config {
            registry_path: PathBuf::from(
                std::env::var("REGISTRY_PATH").unwrap_or_else(|_| "config/strategies.json".to_string()),
            ),
            market_data_dir: PathBuf::from(std::env::var("MARKET_DATA_DIR").unwrap_or_else(|_| "data".to_string())),
            journal_dir: std::env::var("JOURNAL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| state_dir.clone()),
            state_dir,
            log_format,
        })
    }
}
