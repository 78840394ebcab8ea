use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

// ── Server ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_body_bytes() -> usize {
    parley_gateway::server::DEFAULT_MAX_BODY_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind
            .trim()
            .parse()
            .with_context(|| format!("Invalid server.bind address '{}'", self.bind))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

// ── Agent ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentBackend {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub backend: AgentBackend,
    #[serde(default)]
    pub remote: RemoteAgentConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RemoteAgentConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for RemoteAgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAgentConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &mask_secret(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_timeout_secs() -> u64 {
    parley_core::remote::DEFAULT_TIMEOUT_SECS
}

impl Default for RemoteAgentConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RemoteAgentConfig {
    pub fn endpoint_url(&self) -> Result<url::Url> {
        if self.endpoint.trim().is_empty() {
            bail!("agent.remote.endpoint is required when agent.backend = \"remote\"");
        }
        url::Url::parse(self.endpoint.trim())
            .with_context(|| format!("Invalid agent.remote.endpoint '{}'", self.endpoint))
    }
}

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

// ── Loading ─────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".parley")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

impl ParleyConfig {
    /// Load from `custom_path`, or from `~/.parley/config.toml`. A missing
    /// default file means built-in defaults; a missing custom file is an error.
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_file(path),
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::load_file(&path)
                } else {
                    info!(
                        "No config at {}, using built-in defaults",
                        path.display()
                    );
                    Ok(Self::default())
                }
            }
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        // Refuse group/world-readable files, they may hold the agent api key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    bail!(
                        "Config file {:?} has overly permissive permissions ({:o}). \
                         It may contain secrets. Fix with: chmod 600 {:?}",
                        path,
                        mode & 0o777,
                        path
                    );
                }
            }
        }

        let content = std::fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `parley init` first.",
                path.display()
            )
        })?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::from_toml_str_with(content, |name| std::env::var(name).ok())
    }

    /// Parse first, then expand `${VAR}` inside the string fields that accept
    /// it, so variable values never pass through the TOML parser.
    fn from_toml_str_with(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;

        let remote = &mut config.agent.remote;
        if !remote.api_key.is_empty() && !remote.api_key.contains("${") {
            warn!(
                "Agent API key is hardcoded in config file. For security, use environment variables: api_key = \"${{PARLEY_AGENT_API_KEY}}\""
            );
        }
        remote.api_key = expand_env_vars(&remote.api_key, &lookup);
        remote.endpoint = expand_env_vars(&remote.endpoint, &lookup);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.server.socket_addr()?;
        if self.server.max_body_bytes == 0 {
            bail!("server.max_body_bytes must be greater than zero");
        }
        if self.agent.backend == AgentBackend::Remote {
            self.agent.remote.endpoint_url()?;
            if self.agent.remote.timeout_secs == 0 {
                bail!("agent.remote.timeout_secs must be greater than zero");
            }
        }
        Ok(())
    }
}

/// Environment variables that may be expanded in config files.
const ALLOWED_ENV_VARS: &[&str] = &[
    "PARLEY_AGENT_API_KEY",
    "PARLEY_AGENT_ENDPOINT",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        if let Some(start) = result[pos..].find("${") {
            let abs_start = pos + start;
            if let Some(end) = result[abs_start..].find('}') {
                let var_name = result[abs_start + 2..abs_start + end].to_string();

                let value = if ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
                    lookup(&var_name).unwrap_or_default()
                } else {
                    warn!(
                        "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                        var_name
                    );
                    pos = abs_start + end + 1;
                    continue;
                };

                let value_len = value.len();
                result = format!(
                    "{}{}{}",
                    &result[..abs_start],
                    value,
                    &result[abs_start + end + 1..]
                );
                pos = abs_start + value_len;
            } else {
                break;
            }
        } else {
            break;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_config_file_parses() {
        let cfg =
            ParleyConfig::from_toml_str_with(include_str!("../../../config/default.toml"), no_env)
                .unwrap();
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.agent.backend, AgentBackend::Local);
        assert_eq!(cfg.agent.remote.timeout_secs, 30);
        assert_eq!(cfg.agent.remote.api_key, "");
    }

    #[test]
    fn test_api_key_with_toml_metacharacters() {
        let key = "ab\"cd\\ef\nextra = 1";
        let lookup = |name: &str| (name == "PARLEY_AGENT_API_KEY").then(|| key.to_string());
        let cfg =
            ParleyConfig::from_toml_str_with(include_str!("../../../config/default.toml"), lookup)
                .unwrap();
        assert_eq!(cfg.agent.remote.api_key, key);
        assert_eq!(cfg.agent.backend, AgentBackend::Local);
    }

    #[test]
    fn test_endpoint_expanded_from_env() {
        let lookup = |name: &str| {
            (name == "PARLEY_AGENT_ENDPOINT").then(|| "http://agent.local/respond".to_string())
        };
        let cfg = ParleyConfig::from_toml_str_with(
            "[agent]\nbackend = \"remote\"\n[agent.remote]\nendpoint = \"${PARLEY_AGENT_ENDPOINT}\"\n",
            lookup,
        )
        .unwrap();
        assert_eq!(cfg.agent.remote.endpoint, "http://agent.local/respond");
    }

    #[test]
    fn test_ipv6_bind() {
        let cfg = ParleyConfig::from_toml_str_with("[server]\nbind = \"::1\"\n", no_env).unwrap();
        assert_eq!(cfg.server.socket_addr().unwrap().to_string(), "[::1]:5000");

        let cfg = ParleyConfig::from_toml_str_with("[server]\nbind = \"::\"\nport = 8080\n", no_env)
            .unwrap();
        assert_eq!(cfg.server.socket_addr().unwrap().to_string(), "[::]:8080");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = ParleyConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.server.max_body_bytes, 1_048_576);
        assert_eq!(cfg.agent.backend, AgentBackend::Local);
    }

    #[test]
    fn test_remote_backend_requires_endpoint() {
        let err = ParleyConfig::from_toml_str("[agent]\nbackend = \"remote\"\n").unwrap_err();
        assert!(err.to_string().contains("agent.remote.endpoint"));

        let cfg = ParleyConfig::from_toml_str(
            "[agent]\nbackend = \"remote\"\n[agent.remote]\nendpoint = \"http://agent.local/respond\"\n",
        )
        .unwrap();
        assert_eq!(
            cfg.agent.remote.endpoint_url().unwrap().as_str(),
            "http://agent.local/respond"
        );
    }

    #[test]
    fn test_invalid_bind_rejected() {
        assert!(ParleyConfig::from_toml_str("[server]\nbind = \"not an ip\"\n").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let cfg = ParleyConfig::default();
        assert_eq!(cfg.server.socket_addr().unwrap().to_string(), "127.0.0.1:5000");
    }

    #[test]
    fn test_expand_env_vars_skips_unlisted() {
        let lookup = |_: &str| Some("leaked".to_string());
        assert_eq!(expand_env_vars("${SECRET_THING}", &lookup), "${SECRET_THING}");
    }

    #[test]
    fn test_expand_env_vars_allowlisted() {
        let lookup = |name: &str| (name == "HOME").then(|| "/home/parley".to_string());
        assert_eq!(expand_env_vars("${HOME}/x/${USER}", &lookup), "/home/parley/x/");
    }

    #[test]
    fn test_debug_masks_api_key() {
        let remote = RemoteAgentConfig {
            endpoint: "http://agent.local".to_string(),
            api_key: "pk-1234567890abcdef".to_string(),
            timeout_secs: 5,
        };
        let debug = format!("{:?}", remote);
        assert!(!debug.contains("1234567890"));
        assert!(debug.contains("pk-...cdef"));
    }

    #[test]
    fn test_load_missing_custom_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(ParleyConfig::load(&Some(path)).is_err());
    }

    #[test]
    fn test_load_custom_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 8088").unwrap();
        let cfg = ParleyConfig::load(&Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.server.port, 8088);
    }

    #[cfg(unix)]
    #[test]
    fn test_load_rejects_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();
        let err = ParleyConfig::load(&Some(file.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("permissive"));
    }
}
