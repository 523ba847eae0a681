//! Relay Configuration
//!
//! Layered configuration: built-in defaults, then an optional TOML
//! file, then environment variable overrides. The pipeline stages
//! (URL extraction, history policy, post-verification) are independent
//! toggles on one code path, not separate server variants.
//!
//! # Environment Variables
//!
//! - `RELAY_CONFIG`: path to a TOML config file
//! - `RELAY_BIND`: listen address (default `0.0.0.0:8000`)
//! - `RELAY_MODEL`: default generation model (default `llama3.2`)
//! - `RELAY_EXTRACT_URLS`: fetch and embed pages linked in prompts
//! - `RELAY_HISTORY`: `full` or `summarized`
//! - `RELAY_SUMMARY_TURNS`: turns kept by the summarized policy
//! - `RELAY_VERIFY`: run the post-response factuality check
//! - `RELAY_VERIFIER_MODEL`: verifier model (default `bespoke-minicheck`)
//! - `RELAY_EMBED_MODEL`: embedding model (default `mxbai-embed-large`)
//! - `RELAY_PUBLIC_DIR`: static asset directory (default `public`)

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// How conversation history is presented to the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryPolicy {
    /// Send the raw history with every request.
    Full,
    /// Send a bounded summary of prior turns as a system turn, plus
    /// the fresh user turn. Trades context fidelity for prompt size.
    Summarized {
        /// Number of trailing turns the summary draws from.
        max_turns: usize,
    },
}

/// Relay server configuration.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Model used when the client omits one.
    pub default_model: String,
    /// Whether to extract and fetch URLs embedded in prompts.
    pub extract_urls: bool,
    /// History policy for outgoing generation requests.
    pub history: HistoryPolicy,
    /// Whether to run the advisory factuality check after responses.
    pub verify_responses: bool,
    /// Model used by the factuality check.
    pub verifier_model: String,
    /// Model used to embed prompt/context chunks.
    pub embed_model: String,
    /// Directory holding the landing page and static assets.
    pub public_dir: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            default_model: "llama3.2".to_string(),
            extract_urls: false,
            history: HistoryPolicy::Full,
            verify_responses: false,
            verifier_model: "bespoke-minicheck".to_string(),
            embed_model: "mxbai-embed-large".to_string(),
            public_dir: PathBuf::from("public"),
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The config file is not valid TOML.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

/// On-disk TOML shape; every field optional so files can be sparse.
#[derive(Debug, Default, Deserialize)]
pub struct RelayConfigFile {
    /// Listen address.
    pub bind_addr: Option<String>,
    /// Default generation model.
    pub default_model: Option<String>,
    /// URL extraction toggle.
    pub extract_urls: Option<bool>,
    /// History policy name, `full` or `summarized`.
    pub history: Option<String>,
    /// Turns kept by the summarized policy.
    pub summary_turns: Option<usize>,
    /// Post-response verification toggle.
    pub verify_responses: Option<bool>,
    /// Verifier model.
    pub verifier_model: Option<String>,
    /// Embedding model.
    pub embed_model: Option<String>,
    /// Static asset directory.
    pub public_dir: Option<String>,
}

/// Default config file location under the XDG config dir.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ollama-relay").join("relay.toml"))
}

/// Parse a TOML config file.
pub fn load_config_file(path: &Path) -> Result<RelayConfigFile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

const DEFAULT_SUMMARY_TURNS: usize = 6;

fn history_policy(name: &str, max_turns: usize) -> HistoryPolicy {
    match name.to_ascii_lowercase().as_str() {
        "summarized" | "summary" => HistoryPolicy::Summarized { max_turns },
        "full" => HistoryPolicy::Full,
        other => {
            tracing::warn!(policy = other, "unknown history policy, using full");
            HistoryPolicy::Full
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

impl RelayConfig {
    /// Load configuration: defaults, then the config file (if any),
    /// then environment overrides.
    ///
    /// A missing file is fine; an unreadable or unparseable one is
    /// logged and skipped rather than aborting startup.
    #[must_use]
    pub fn load() -> Self {
        let mut config = Self::default();

        let file_path = std::env::var("RELAY_CONFIG")
            .ok()
            .map(PathBuf::from)
            .or_else(default_config_path);
        if let Some(path) = file_path {
            if path.exists() {
                match load_config_file(&path) {
                    Ok(file) => config.apply_file(&file),
                    Err(e) => tracing::warn!(error = %e, "ignoring config file"),
                }
            }
        }

        config.apply_env();
        config
    }

    /// Overlay values from a parsed config file.
    pub fn apply_file(&mut self, file: &RelayConfigFile) {
        if let Some(v) = &file.bind_addr {
            self.bind_addr = v.clone();
        }
        if let Some(v) = &file.default_model {
            self.default_model = v.clone();
        }
        if let Some(v) = file.extract_urls {
            self.extract_urls = v;
        }
        if let Some(name) = &file.history {
            let max_turns = file.summary_turns.unwrap_or(DEFAULT_SUMMARY_TURNS);
            self.history = history_policy(name, max_turns);
        }
        if let Some(v) = file.verify_responses {
            self.verify_responses = v;
        }
        if let Some(v) = &file.verifier_model {
            self.verifier_model = v.clone();
        }
        if let Some(v) = &file.embed_model {
            self.embed_model = v.clone();
        }
        if let Some(v) = &file.public_dir {
            self.public_dir = PathBuf::from(v);
        }
    }

    /// Overlay values from environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("RELAY_BIND") {
            self.bind_addr = v;
        }
        if let Ok(v) = std::env::var("RELAY_MODEL") {
            self.default_model = v;
        }
        if let Some(v) = env_flag("RELAY_EXTRACT_URLS") {
            self.extract_urls = v;
        }
        if let Ok(name) = std::env::var("RELAY_HISTORY") {
            let max_turns = std::env::var("RELAY_SUMMARY_TURNS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SUMMARY_TURNS);
            self.history = history_policy(&name, max_turns);
        }
        if let Some(v) = env_flag("RELAY_VERIFY") {
            self.verify_responses = v;
        }
        if let Ok(v) = std::env::var("RELAY_VERIFIER_MODEL") {
            self.verifier_model = v;
        }
        if let Ok(v) = std::env::var("RELAY_EMBED_MODEL") {
            self.embed_model = v;
        }
        if let Ok(v) = std::env::var("RELAY_PUBLIC_DIR") {
            self.public_dir = PathBuf::from(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.default_model, "llama3.2");
        assert_eq!(config.history, HistoryPolicy::Full);
        assert!(!config.extract_urls);
        assert!(!config.verify_responses);
    }

    #[test]
    fn test_file_overlay() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_model = "mistral"
extract_urls = true
history = "summarized"
summary_turns = 4
verify_responses = true
"#
        )
        .unwrap();

        let parsed = load_config_file(file.path()).unwrap();
        let mut config = RelayConfig::default();
        config.apply_file(&parsed);

        assert_eq!(config.default_model, "mistral");
        assert!(config.extract_urls);
        assert_eq!(config.history, HistoryPolicy::Summarized { max_turns: 4 });
        assert!(config.verify_responses);
        // Untouched fields keep their defaults.
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "default_model = [not toml").unwrap();
        assert!(matches!(
            load_config_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_unknown_history_policy_falls_back_to_full() {
        assert_eq!(history_policy("sideways", 4), HistoryPolicy::Full);
        assert_eq!(
            history_policy("SUMMARIZED", 4),
            HistoryPolicy::Summarized { max_turns: 4 }
        );
    }
}
