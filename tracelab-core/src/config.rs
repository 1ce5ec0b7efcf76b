use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::{CoreResult, TraceLabError};

pub const ENV_OLLAMA_MODEL: &str = "OLLAMA_MODEL";
pub const ENV_OLLAMA_BASE_URL: &str = "OLLAMA_BASE_URL";
pub const ENV_LANGFUSE_PUBLIC_KEY: &str = "LANGFUSE_PUBLIC_KEY";
pub const ENV_LANGFUSE_SECRET_KEY: &str = "LANGFUSE_SECRET_KEY";
pub const ENV_LANGFUSE_HOST: &str = "LANGFUSE_HOST";

pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:8b-instruct-q4_K_M";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_LANGFUSE_HOST: &str = "https://cloud.langfuse.com";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HttpCfg {
    /// TCP connect timeout in milliseconds (default 5000ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Total request timeout in milliseconds (default 120000ms; local models are slow)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Optional per-host idle connection pool cap (None = reqwest default)
    #[serde(default)]
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            pool_max_idle_per_host: None,
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_request_timeout_ms() -> u64 {
    120_000
}

/// Non-secret inference settings as they appear in a settings file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct InferenceFileCfg {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Non-secret tracing settings as they appear in a settings file.
/// Credentials are deliberately not accepted here.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct TracingFileCfg {
    pub host: Option<String>,
}

/// Optional settings file. Every section may be omitted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub inference: InferenceFileCfg,
    #[serde(default)]
    pub tracing: TracingFileCfg,
    #[serde(default)]
    pub http: HttpCfg,
}

impl FileConfig {
    /// Load a FileConfig from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(TraceLabError::from)?;
        let s = std::str::from_utf8(&bytes).map_err(|e| TraceLabError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                serde_json::from_str::<Self>(s).map_err(|e| TraceLabError::Other(e.into()))?
            }
            Some("toml") => {
                toml::from_str::<Self>(s).map_err(|e| TraceLabError::Other(e.into()))?
            }
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| TraceLabError::Other(e.into()))
                .or_else(|_| {
                    toml::from_str::<Self>(s).map_err(|e| TraceLabError::Other(e.into()))
                })?,
        };
        Ok(cfg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceCfg {
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct LangfuseCfg {
    pub public_key: SecretString,
    pub secret_key: SecretString,
    pub host: String,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub inference: InferenceCfg,
    pub langfuse: LangfuseCfg,
    pub http: HttpCfg,
}

impl Settings {
    /// Settings from the process environment and built-in defaults.
    pub fn from_env() -> CoreResult<Self> {
        Self::resolve(FileConfig::default(), |k| std::env::var(k).ok())
    }

    /// Settings from an optional settings file, overridden by the process environment.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let file = match path {
            Some(p) => FileConfig::from_path(p)?,
            None => FileConfig::default(),
        };
        Self::resolve(file, |k| std::env::var(k).ok())
    }

    /// Resolve settings with precedence lookup > file > defaults.
    ///
    /// Fails with `MissingConfig` naming every absent credential; empty values count as absent.
    pub fn resolve<F>(file: FileConfig, lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let public_key = get(ENV_LANGFUSE_PUBLIC_KEY);
        let secret_key = get(ENV_LANGFUSE_SECRET_KEY);
        let mut missing = Vec::new();
        if public_key.is_none() {
            missing.push(ENV_LANGFUSE_PUBLIC_KEY.to_string());
        }
        if secret_key.is_none() {
            missing.push(ENV_LANGFUSE_SECRET_KEY.to_string());
        }
        let (Some(public_key), Some(secret_key)) = (public_key, secret_key) else {
            return Err(TraceLabError::MissingConfig(missing));
        };

        let model = get(ENV_OLLAMA_MODEL)
            .or(file.inference.model)
            .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string());
        let base_url = get(ENV_OLLAMA_BASE_URL)
            .or(file.inference.base_url)
            .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string());
        let host = get(ENV_LANGFUSE_HOST)
            .or(file.tracing.host)
            .unwrap_or_else(|| DEFAULT_LANGFUSE_HOST.to_string());

        Ok(Self {
            inference: InferenceCfg {
                model: model.trim().to_string(),
                base_url: clean_url(&base_url, ENV_OLLAMA_BASE_URL)?,
            },
            langfuse: LangfuseCfg {
                public_key: SecretString::new(public_key.into()),
                secret_key: SecretString::new(secret_key.into()),
                host: clean_url(&host, ENV_LANGFUSE_HOST)?,
            },
            http: file.http,
        })
    }
}

fn clean_url(raw: &str, key: &str) -> CoreResult<String> {
    let url = raw.trim().trim_end_matches('/');
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(TraceLabError::Config(format!(
            "{key} must be an http(s) URL, got '{raw}'"
        )));
    }
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    fn creds() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_LANGFUSE_PUBLIC_KEY, "pk-lf-test"),
            (ENV_LANGFUSE_SECRET_KEY, "sk-lf-test"),
        ]
    }

    #[test]
    fn defaults_apply_when_only_credentials_set() {
        let s = Settings::resolve(FileConfig::default(), env_of(&creds())).unwrap();
        assert_eq!(s.inference.model, DEFAULT_OLLAMA_MODEL);
        assert_eq!(s.inference.base_url, DEFAULT_OLLAMA_BASE_URL);
        assert_eq!(s.langfuse.host, DEFAULT_LANGFUSE_HOST);
        assert_eq!(s.langfuse.public_key.expose_secret(), "pk-lf-test");
        assert_eq!(s.http.connect_timeout_ms, 5_000);
        assert_eq!(s.http.request_timeout_ms, 120_000);
    }

    #[test]
    fn missing_credentials_lists_both() {
        let err = Settings::resolve(FileConfig::default(), env_of(&[])).unwrap_err();
        match err {
            TraceLabError::MissingConfig(vars) => {
                assert_eq!(vars, vec![ENV_LANGFUSE_PUBLIC_KEY, ENV_LANGFUSE_SECRET_KEY]);
            }
            other => panic!("expected MissingConfig, got: {:?}", other),
        }
    }

    #[test]
    fn empty_secret_counts_as_missing() {
        let err = Settings::resolve(
            FileConfig::default(),
            env_of(&[(ENV_LANGFUSE_PUBLIC_KEY, "pk"), (ENV_LANGFUSE_SECRET_KEY, "  ")]),
        )
        .unwrap_err();
        match err {
            TraceLabError::MissingConfig(vars) => assert_eq!(vars, vec![ENV_LANGFUSE_SECRET_KEY]),
            other => panic!("expected MissingConfig, got: {:?}", other),
        }
    }

    #[test]
    fn env_beats_file_and_trailing_slash_is_stripped() {
        let file = FileConfig {
            inference: InferenceFileCfg {
                model: Some("from-file".into()),
                base_url: Some("http://file-host:11434/".into()),
            },
            tracing: TracingFileCfg {
                host: Some("http://langfuse.local/".into()),
            },
            http: HttpCfg::default(),
        };
        let mut env = creds();
        env.push((ENV_OLLAMA_MODEL, "from-env"));
        let s = Settings::resolve(file, env_of(&env)).unwrap();
        assert_eq!(s.inference.model, "from-env");
        assert_eq!(s.inference.base_url, "http://file-host:11434");
        assert_eq!(s.langfuse.host, "http://langfuse.local");
    }

    #[test]
    fn non_http_url_is_config_error() {
        let mut env = creds();
        env.push((ENV_OLLAMA_BASE_URL, "localhost:11434"));
        let err = Settings::resolve(FileConfig::default(), env_of(&env)).unwrap_err();
        assert!(matches!(err, TraceLabError::Config(_)));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let s = Settings::resolve(FileConfig::default(), env_of(&creds())).unwrap();
        let dbg = format!("{:?}", s);
        assert!(!dbg.contains("sk-lf-test"));
    }

    #[test]
    fn load_from_toml() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("tracelab.toml");
        let toml = r#"
[inference]
model = "llama3.2"
base_url = "http://gpu-box:11434"

[tracing]
host = "http://localhost:3000"

[http]
request_timeout_ms = 30000
"#;
        fs::write(&file, toml).unwrap();
        let cfg = FileConfig::from_path(&file).unwrap();
        assert_eq!(cfg.inference.model.as_deref(), Some("llama3.2"));
        assert_eq!(cfg.tracing.host.as_deref(), Some("http://localhost:3000"));
        assert_eq!(cfg.http.connect_timeout_ms, 5_000);
        assert_eq!(cfg.http.request_timeout_ms, 30_000);
    }

    #[test]
    fn load_from_json_with_missing_sections() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("tracelab.json");
        fs::write(&file, r#"{"inference":{"model":"mistral"}}"#).unwrap();
        let cfg = FileConfig::from_path(&file).unwrap();
        assert_eq!(cfg.inference.model.as_deref(), Some("mistral"));
        assert_eq!(cfg.inference.base_url, None);
        assert_eq!(cfg.http, HttpCfg::default());
    }

    #[test]
    fn unknown_extension_falls_back_to_toml() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("tracelab.conf");
        fs::write(&file, "[tracing]\nhost = \"http://lf:3000\"\n").unwrap();
        let cfg = FileConfig::from_path(&file).unwrap();
        assert_eq!(cfg.tracing.host.as_deref(), Some("http://lf:3000"));
    }

    #[test]
    fn missing_file_returns_io_error() {
        let missing = std::path::PathBuf::from("/definitely/not/here/tracelab-missing.toml");
        let err = FileConfig::from_path(&missing).unwrap_err();
        match err {
            TraceLabError::Io(_) => {}
            other => panic!("expected Io error, got: {:?}", other),
        }
    }

    #[test]
    fn bad_json_returns_other_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.json");
        fs::write(&file, r#"{ "inference": { "model": 123 }"#).unwrap();
        let err = FileConfig::from_path(&file).unwrap_err();
        match err {
            TraceLabError::Other(_) => {}
            other => panic!("expected Other(json parse) error, got: {:?}", other),
        }
    }
}
