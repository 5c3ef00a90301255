use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PitcrewConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub vcs: VcsConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub eval: EvalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default = "default_command")]
    pub default_command: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            default_command: default_command(),
        }
    }
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_command() -> String {
    "start_build".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct VcsConfig {
    /// "memory" for the built-in fixture repository, "github" for a remote
    #[serde(default = "default_vcs_provider")]
    pub provider: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub token: String,
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            provider: default_vcs_provider(),
            owner: String::new(),
            repo: String::new(),
            token: String::new(),
        }
    }
}

impl std::fmt::Debug for VcsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VcsConfig")
            .field("provider", &self.provider)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &mask_secret(&self.token))
            .finish()
    }
}

fn default_vcs_provider() -> String {
    "memory".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_artifacts_root")]
    pub root: String,
    /// Base URL embedded in issued download/upload links
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            root: default_artifacts_root(),
            base_url: default_base_url(),
        }
    }
}

fn default_artifacts_root() -> String {
    "~/.pitcrew/artifacts".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
        }
    }
}

fn default_queue_capacity() -> usize {
    64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Run the bundled simulated worker instead of expecting an external one
    #[serde(default = "default_true")]
    pub simulate: bool,
    #[serde(default = "default_build_delay_ms")]
    pub build_delay_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            simulate: true,
            build_delay_ms: default_build_delay_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_build_delay_ms() -> u64 {
    500
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default)]
    pub auth_token: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_gateway_host(),
            port: default_gateway_port(),
            auth_token: String::new(),
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("auth_token", &mask_secret(&self.auth_token))
            .finish()
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.pitcrew/builds.db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default = "default_eval_path")]
    pub path: String,
    #[serde(default = "default_response_threshold")]
    pub response_threshold: f64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            path: default_eval_path(),
            response_threshold: default_response_threshold(),
        }
    }
}

fn default_eval_path() -> String {
    "evals".to_string()
}

fn default_response_threshold() -> f64 {
    0.2
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

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pitcrew")
}

impl PitcrewConfig {
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = custom_path
            .clone()
            .unwrap_or_else(|| config_dir().join("config.toml"));

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `pitcrew init` first.",
                path.display()
            )
        })?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        Ok(config)
    }

    /// Load the config, falling back to defaults when the file is absent
    pub fn load_or_default(custom_path: &Option<PathBuf>) -> Self {
        match Self::load(custom_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default configuration: {:#}", e);
                Self::default()
            }
        }
    }
}

// Utility: expand a leading ~ and ${VAR} patterns in configured paths
pub fn shellexpand(s: &str) -> PathBuf {
    PathBuf::from(shellexpand_str(s))
}

pub fn shellexpand_str(s: &str) -> String {
    let mut result = s.to_string();
    if result.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            result = format!("{}{}", home.display(), &result[1..]);
        }
    }
    let mut pos = 0;
    while pos < result.len() {
        if let Some(start) = result[pos..].find("${") {
            let abs_start = pos + start;
            if let Some(end) = result[abs_start..].find('}') {
                let var_name = &result[abs_start + 2..abs_start + end];
                let value = std::env::var(var_name).unwrap_or_default();
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

    #[test]
    fn test_default_config() {
        let config = PitcrewConfig::default();
        assert_eq!(config.agent.default_branch, "main");
        assert_eq!(config.agent.default_command, "start_build");
        assert_eq!(config.vcs.provider, "memory");
        assert!(config.worker.simulate);
        assert!(!config.gateway.enabled);
        assert_eq!(config.queue.capacity, 64);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_src = r#"
            [agent]
            default_branch = "develop"

            [gateway]
            enabled = true
            port = 9000
        "#;
        let config: PitcrewConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.agent.default_branch, "develop");
        assert_eq!(config.agent.default_command, "start_build");
        assert!(config.gateway.enabled);
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.host, "127.0.0.1");
    }

    #[test]
    fn test_secrets_are_masked_in_debug() {
        let config = VcsConfig {
            provider: "github".to_string(),
            owner: "owner".to_string(),
            repo: "game".to_string(),
            token: "ghp_12345678901234567890".to_string(),
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("ghp_12345678901234567890"));
        assert!(debug.contains("..."));
    }

    #[test]
    fn test_mask_secret_short_and_empty() {
        assert_eq!(mask_secret(""), "(empty)");
        assert_eq!(mask_secret("abc"), "***");
    }

    #[test]
    fn test_shellexpand_env_var() {
        unsafe { std::env::set_var("PITCREW_TEST_VAR", "expanded") };
        assert_eq!(shellexpand_str("x-${PITCREW_TEST_VAR}-y"), "x-expanded-y");
    }

    #[test]
    fn test_config_roundtrip() {
        let config = PitcrewConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let back: PitcrewConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(back.agent.default_branch, config.agent.default_branch);
    }
}
