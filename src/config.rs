use std::env;
use std::path::PathBuf;

/// Runtime configuration, sourced from the environment with local-dev
/// defaults
///
/// | Variable          | Default                 |
/// |-------------------|-------------------------|
/// | `BIND_ADDR`       | `127.0.0.1:3000`        |
/// | `DATA_DIR`        | `uploads`               |
/// | `ALLOWED_ORIGIN`  | `*`                     |
/// | `DELETE_PASS`     | `change-this-password`  |
/// | `PUBLIC_BASE_URL` | derived from the request Host header |
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub allowed_origin: String,
    pub delete_pass: String,
    pub public_base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string()),
            data_dir: env::var("DATA_DIR")
                .unwrap_or_else(|_| "uploads".to_string())
                .into(),
            allowed_origin: env::var("ALLOWED_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            delete_pass: env::var("DELETE_PASS")
                .unwrap_or_else(|_| "change-this-password".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .ok()
                .map(|url| url.trim_end_matches('/').to_string()),
        }
    }
}
