//! Command line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;
use story_api::ApiConfig;

/// Directory name used under the platform data directory.
const APP_DIR_NAME: &str = "story-wizard";

#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    /// Overrides `STORY_API_URL` when set.
    pub api_url: Option<String>,
    /// Overrides `STORY_API_TIMEOUT_SECS` when set.
    pub timeout: Option<Duration>,
    /// Where the draft and recent stories are kept.
    pub data_dir: PathBuf,
    pub show_help: bool,
}

impl CliConfig {
    /// Resolve the backend connection settings, letting flags win over the
    /// environment.
    pub fn api_config(&self) -> Result<ApiConfig, story_api::Error> {
        let mut config = ApiConfig::from_env()?;
        if let Some(url) = &self.api_url {
            config = ApiConfig {
                base_url: ApiConfig::new(url.as_str()).base_url,
                ..config
            };
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        Ok(config)
    }
}

/// `STORY_DATA_DIR`, else the platform data directory, else `./story-data`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("STORY_DATA_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("story-data"))
}

/// Parse configuration from command line arguments.
pub fn parse_config_from_args(args: &[String]) -> CliConfig {
    let mut config = CliConfig {
        api_url: None,
        timeout: None,
        data_dir: default_data_dir(),
        show_help: false,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--api-url" => {
                if let Some(url) = args.get(i + 1) {
                    config.api_url = Some(url.clone());
                    i += 1;
                }
            }
            "--data-dir" => {
                if let Some(dir) = args.get(i + 1) {
                    config.data_dir = PathBuf::from(dir);
                    i += 1;
                }
            }
            "--timeout" => {
                if let Some(secs) = args.get(i + 1) {
                    config.timeout = secs.parse().ok().map(Duration::from_secs);
                    i += 1;
                }
            }
            "-h" | "--help" => config.show_help = true,
            _ => {}
        }
        i += 1;
    }

    config
}
