use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hooktail_core::target::DeploymentTarget;
use serde::Deserialize;

/// Errors that prevent the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse yaml configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Log file appended to next to stdout unless configured otherwise.
pub const DEFAULT_LOG_FILE: &str = "hooktail.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Certificate and private key for serving HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Server configuration, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bind address (default: `0.0.0.0`).
    pub host: IpAddr,
    pub port: u16,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound for a single git or hook command; `None` waits forever.
    pub command_timeout: Option<Duration>,
    /// Extra log destination next to stdout (default: `hooktail.log`).
    pub log_file: Option<PathBuf>,
    pub log_format: LogFormat,
    pub tls: Option<TlsPaths>,
    /// Deployment targets in configuration order.
    pub targets: Vec<DeploymentTarget>,
}

/// On-disk YAML layout.
#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    /// Default secret for targets that do not set their own.
    #[serde(default)]
    secret: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    #[serde(default = "default_command_timeout_secs")]
    command_timeout_secs: u64,
    /// Set to an empty string to log to stdout only.
    #[serde(default = "default_log_file")]
    log_file: Option<PathBuf>,
    #[serde(default)]
    log_format: LogFormat,
    #[serde(default)]
    tlsconfig: Option<FileTlsConfig>,
    #[serde(default)]
    deployments: Vec<DeploymentEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct FileTlsConfig {
    #[serde(default)]
    public_key_path: Option<PathBuf>,
    #[serde(default)]
    private_key_path: Option<PathBuf>,
}

/// A list item is either a bare target or `{ deployment: <target> }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DeploymentEntry {
    Wrapped { deployment: DeploymentTarget },
    Flat(DeploymentTarget),
}

impl DeploymentEntry {
    fn into_target(self) -> DeploymentTarget {
        match self {
            Self::Wrapped { deployment } => deployment,
            Self::Flat(target) => target,
        }
    }
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_LOG_FILE))
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_command_timeout_secs() -> u64 {
    900
}

impl Settings {
    /// Read the YAML file at `path`, then apply `HOST` / `PORT` overrides
    /// from the environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml, |key| std::env::var(key).ok())
    }

    /// Build settings from YAML text. `env` supplies override values.
    ///
    /// | Env Var | Overrides |
    /// |---------|-----------|
    /// | `HOST`  | `host`    |
    /// | `PORT`  | `port`    |
    pub fn from_yaml(yaml: &str, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let file: FileConfig = serde_yaml::from_str(yaml)?;

        let host = env("HOST")
            .or(file.host)
            .map(|h| {
                h.trim()
                    .parse::<IpAddr>()
                    .map_err(|e| ConfigError::Invalid(format!("host {h:?}: {e}")))
            })
            .transpose()?
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let port = match env("PORT") {
            Some(p) => Some(
                p.trim()
                    .parse::<u16>()
                    .map_err(|e| ConfigError::Invalid(format!("PORT {p:?}: {e}")))?,
            ),
            None => file.port,
        };
        let port = match port {
            Some(0) => return Err(ConfigError::Invalid("port must be between 1 and 65535".into())),
            Some(port) => port,
            None => return Err(ConfigError::Invalid("port is required".into())),
        };

        let tls = match file.tlsconfig.unwrap_or_default() {
            FileTlsConfig {
                public_key_path: Some(cert),
                private_key_path: Some(key),
            } if !cert.as_os_str().is_empty() && !key.as_os_str().is_empty() => {
                Some(TlsPaths { cert, key })
            }
            FileTlsConfig {
                public_key_path,
                private_key_path,
            } => {
                let is_set = |p: &Option<PathBuf>| p.as_ref().is_some_and(|p| !p.as_os_str().is_empty());
                if is_set(&public_key_path) || is_set(&private_key_path) {
                    return Err(ConfigError::Invalid(
                        "tlsconfig needs both public_key_path and private_key_path".into(),
                    ));
                }
                None
            }
        };

        let default_secret = file.secret.filter(|s| !s.is_empty());
        let targets = file
            .deployments
            .into_iter()
            .map(|entry| {
                let mut target = entry.into_target();
                if target.secret().is_none() {
                    target.secret.clone_from(&default_secret);
                }
                target
            })
            .collect();

        Ok(Self {
            host,
            port,
            request_timeout_secs: file.request_timeout_secs,
            command_timeout: (file.command_timeout_secs > 0)
                .then(|| Duration::from_secs(file.command_timeout_secs)),
            log_file: file.log_file.filter(|p| !p.as_os_str().is_empty()),
            log_format: file.log_format,
            tls,
            targets,
        })
    }

    /// Log the loaded targets, warning about any that can never deploy.
    ///
    /// Call after logging is initialised.
    pub fn log_summary(&self) {
        tracing::info!(
            host = %self.host,
            port = self.port,
            tls = self.tls.is_some(),
            targets = self.targets.len(),
            "Loaded server configuration",
        );
        for target in &self.targets {
            match target.check_required_fields() {
                Ok(()) => tracing::info!(
                    repository = %target.repository,
                    branch = %target.branch,
                    path = %target.path,
                    user = %target.user,
                    signed = target.secret().is_some(),
                    "Deployment target configured",
                ),
                Err(e) => tracing::warn!(
                    repository = %target.repository,
                    error = %e,
                    "Deployment target is incomplete and will fail validation",
                ),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    const FULL: &str = r#"
port: 8080
secret: global
command_timeout_secs: 60
log_file: hooktail.log
log_format: json
tlsconfig:
  public_key_path: /etc/hooktail/cert.pem
  private_key_path: /etc/hooktail/key.pem
deployments:
  - user: deploy
    repository: git@github.com:acme/site.git
    branch: main
    path: /srv/site
    before_script: /srv/hooks/before.sh
  - deployment:
      user: deploy
      repository: git@github.com:acme/api.git
      branch: production
      path: /srv/api
      secret: api-only
"#;

    #[test]
    fn parses_full_configuration() {
        let settings = Settings::from_yaml(FULL, no_env).expect("valid config");
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(settings.command_timeout, Some(Duration::from_secs(60)));
        assert_eq!(settings.request_timeout_secs, 30);
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.log_file, Some(PathBuf::from("hooktail.log")));
        assert_eq!(
            settings.tls,
            Some(TlsPaths {
                cert: "/etc/hooktail/cert.pem".into(),
                key: "/etc/hooktail/key.pem".into(),
            })
        );

        assert_eq!(settings.targets.len(), 2);
        assert_eq!(settings.targets[0].repository, "git@github.com:acme/site.git");
        assert_eq!(settings.targets[0].before_script(), Some("/srv/hooks/before.sh"));
        assert_eq!(settings.targets[1].branch, "production");
    }

    #[test]
    fn global_secret_fills_in_missing_target_secrets() {
        let settings = Settings::from_yaml(FULL, no_env).expect("valid config");
        assert_eq!(settings.targets[0].secret(), Some("global"));
        assert_eq!(settings.targets[1].secret(), Some("api-only"));
    }

    #[test]
    fn minimal_configuration_uses_defaults() {
        let settings = Settings::from_yaml("port: 9000\n", no_env).expect("valid config");
        assert_eq!(settings.command_timeout, Some(Duration::from_secs(900)));
        assert_eq!(settings.log_file, Some(PathBuf::from(DEFAULT_LOG_FILE)));
        assert_eq!(settings.log_format, LogFormat::Text);
        assert!(settings.tls.is_none());
        assert!(settings.targets.is_empty());
    }

    #[test]
    fn empty_log_file_disables_the_file_sink() {
        let settings = Settings::from_yaml("port: 9000\nlog_file: \"\"\n", no_env).expect("valid config");
        assert_eq!(settings.log_file, None);
    }

    #[test]
    fn zero_command_timeout_disables_the_bound() {
        let settings =
            Settings::from_yaml("port: 9000\ncommand_timeout_secs: 0\n", no_env).expect("valid config");
        assert_eq!(settings.command_timeout, None);
    }

    #[test]
    fn empty_tls_paths_mean_plain_http() {
        let yaml = "port: 9000\ntlsconfig:\n  public_key_path: \"\"\n  private_key_path: \"\"\n";
        let settings = Settings::from_yaml(yaml, no_env).expect("valid config");
        assert!(settings.tls.is_none());
    }

    #[test]
    fn half_configured_tls_is_rejected() {
        let yaml = "port: 9000\ntlsconfig:\n  public_key_path: /etc/cert.pem\n";
        assert_matches!(Settings::from_yaml(yaml, no_env), Err(ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_or_zero_port_is_rejected() {
        assert_matches!(Settings::from_yaml("deployments: []\n", no_env), Err(ConfigError::Invalid(_)));
        assert_matches!(Settings::from_yaml("port: 0\n", no_env), Err(ConfigError::Invalid(_)));
        assert_matches!(Settings::from_yaml("port: 70000\n", no_env), Err(ConfigError::Parse(_)));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        assert_matches!(Settings::from_yaml("port: [\n", no_env), Err(ConfigError::Parse(_)));
    }

    #[test]
    fn environment_overrides_host_and_port() {
        let env = |key: &str| match key {
            "HOST" => Some("127.0.0.1".to_string()),
            "PORT" => Some("4000".to_string()),
            _ => None,
        };
        let settings = Settings::from_yaml("port: 9000\n", env).expect("valid config");
        assert_eq!(settings.port, 4000);
        assert_eq!(settings.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn invalid_port_override_is_rejected() {
        let env = |key: &str| (key == "PORT").then(|| "eighty".to_string());
        assert_matches!(Settings::from_yaml("port: 9000\n", env), Err(ConfigError::Invalid(_)));
    }

    #[test]
    fn incomplete_targets_are_kept_for_validation() {
        let yaml = "port: 9000\ndeployments:\n  - repository: git@github.com:acme/site.git\n";
        let settings = Settings::from_yaml(yaml, no_env).expect("valid config");
        assert_eq!(settings.targets.len(), 1);
        assert!(settings.targets[0].check_required_fields().is_err());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        assert_matches!(
            Settings::load(Path::new("/nonexistent/hooktail/config.yml")),
            Err(ConfigError::Read { .. })
        );
    }
}
