//! Loader for service configuration with YAML + environment overlays.
//!
//! Sources are merged in the order they are attached; `QUILL_`-prefixed
//! environment variables are applied last and therefore win. Nested keys use
//! `__` as separator, e.g. `QUILL_SERVER__PORT=8080` or
//! `QUILL_CORS__ALLOWED_ORIGINS=https://a.example,https://b.example`.
//! String values may reference `${VAR}` placeholders, expanded after merging.
//!
//! An empty configuration is valid: every section falls back to defaults.
//!
//! ```yaml
//! server:
//!   host: 0.0.0.0
//!   port: 5000
//!   debug: false
//! fetcher:
//!   timeout_secs: 15
//!   retries: 0
//!   user_agent: "${QUILL_UA}"
//! logging:
//!   format: json
//! cors:
//!   allowed_origins: ["*"]
//! ```
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "QUILL";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct QuillConfig {
    pub server: ServerConfig,
    pub fetcher: FetcherConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Raises the default log filter to `debug`.
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            debug: false,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Knobs for the outbound page fetch.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub retries: usize,
    pub user_agent: Option<String>,
    pub max_body_bytes: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            connect_timeout_secs: 5,
            retries: 0,
            user_agent: None,
            max_body_bytes: 5 * 1024 * 1024,
        }
    }
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatKind {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormatKind,
    pub dir: Option<String>,
    pub stderr: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormatKind::Text,
            dir: None,
            stderr: true,
            filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn effective_filter(&self, debug: bool) -> String {
        match &self.filter {
            Some(filter) if !filter.trim().is_empty() => filter.clone(),
            _ if debug => "debug".into(),
            _ => "info".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Empty, or containing `"*"`, means any origin.
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o.trim() == "*")
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

fn validate(cfg: &QuillConfig) -> Result<(), ConfigError> {
    if cfg.server.port == 0 {
        return Err(ConfigError::Message("server.port must be non-zero".into()));
    }
    if cfg.fetcher.timeout_secs == 0 {
        return Err(ConfigError::Message(
            "fetcher.timeout_secs must be greater than zero".into(),
        ));
    }
    if cfg.fetcher.max_body_bytes == 0 {
        return Err(ConfigError::Message(
            "fetcher.max_body_bytes must be greater than zero".into(),
        ));
    }
    Ok(())
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct QuillConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for QuillConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl QuillConfigLoader {
    /// Start from defaults; `QUILL_` env overrides are applied at [`Self::load`].
    ///
    /// ```
    /// use quill_config::QuillConfigLoader;
    ///
    /// let config = QuillConfigLoader::new()
    ///     .with_yaml_str("server:\n  port: 8088")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.server.port, 8088);
    /// assert_eq!(config.server.host, "127.0.0.1");
    /// assert!(config.cors.allows_any_origin());
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Like [`Self::with_file`], but a missing file is silently skipped.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self.builder.add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// ```
    /// use quill_config::QuillConfigLoader;
    ///
    /// unsafe { std::env::set_var("QUILL_DOC_UA", "quill-doc/1.0"); }
    ///
    /// let config = QuillConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// fetcher:
    ///   user_agent: "${QUILL_DOC_UA}"
    ///   timeout_secs: 30
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.fetcher.user_agent.as_deref(), Some("quill-doc/1.0"));
    /// assert_eq!(config.fetcher.timeout_secs, 30);
    ///
    /// unsafe { std::env::remove_var("QUILL_DOC_UA"); }
    /// ```
    pub fn load(self) -> Result<QuillConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins"),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: QuillConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        validate(&typed)?;

        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    fn expands_in_array_and_object() {
        temp_env::with_vars([("CITY", Some("Winston")), ("STATE", Some("NC"))], || {
            let mut v = json!(["hello-$CITY", { "loc": "${CITY}-${STATE}" }, 42, true, null]);
            expand_env_in_value(&mut v);
            assert_eq!(
                v,
                json!(["hello-Winston", { "loc": "Winston-NC" }, 42, true, null])
            );
        });
    }

    #[test]
    fn stops_on_cycles() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${QUILL_DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${QUILL_DOES_NOT_EXIST}"));
    }

    #[test]
    fn debug_raises_default_filter() {
        let logging = LoggingConfig::default();
        assert_eq!(logging.effective_filter(false), "info");
        assert_eq!(logging.effective_filter(true), "debug");

        let explicit = LoggingConfig {
            filter: Some("quill_web=trace".into()),
            ..LoggingConfig::default()
        };
        assert_eq!(explicit.effective_filter(true), "quill_web=trace");
    }

    #[test]
    fn cors_wildcard_detection() {
        assert!(CorsConfig::default().allows_any_origin());
        let star = CorsConfig {
            allowed_origins: vec!["https://a.example".into(), "*".into()],
        };
        assert!(star.allows_any_origin());
        let listed = CorsConfig {
            allowed_origins: vec!["https://a.example".into()],
        };
        assert!(!listed.allows_any_origin());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut cfg = QuillConfig::default();
        cfg.server.port = 0;
        assert!(validate(&cfg).is_err());
        assert!(validate(&QuillConfig::default()).is_ok());
    }
}
