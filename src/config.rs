//! Provider configuration for axiom.
//!
//! Providers are the AI coding-agent CLIs axiom can dispatch to. The
//! configuration lives in `.axiom/providers.yaml`; when the file is absent,
//! built-in profiles for the four supported CLIs (codex, claude, gemini,
//! copilot) are used, so `axiom run` works without any setup.
//!
//! # File format
//!
//! ```yaml
//! providers:
//!   codex:
//!     name: "Codex CLI"
//!     command: "codex exec --json --dangerously-bypass-approvals-and-sandbox"
//!     timeout_seconds: 600
//!     default: true
//!
//! defaults:
//!   timeout_seconds: 600
//!   max_restarts: 3
//! ```
//!
//! Command templates are split with shell rules and support `{task_id}` and
//! `{prompt}` placeholders; when `{prompt}` is absent the prompt is appended
//! as the final argument.

use crate::error::{AxiomError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Default subprocess timeout in seconds (10 minutes).
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 600;

/// Default restart ceiling per task.
pub const DEFAULT_MAX_RESTARTS: u32 = 3;

/// Configuration for all providers, loaded from `providers.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Provider profiles keyed by identifier.
    pub providers: BTreeMap<String, ProviderProfile>,

    /// Dispatch-wide default settings.
    pub defaults: DispatchDefaults,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Profile for a single provider CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Human-readable name.
    #[serde(default)]
    pub name: String,

    /// Command template. Split with shell rules; `{task_id}` and `{prompt}`
    /// placeholders are substituted per token.
    pub command: String,

    /// Timeout override in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Extra environment variables for the subprocess.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub environment: HashMap<String, String>,

    /// Whether the CLI emits JSON-lines events on stdout.
    #[serde(default = "default_true")]
    pub json_output: bool,

    /// Advertised context window, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u64>,

    /// Whether this is the default provider.
    #[serde(default)]
    pub default: bool,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for ProviderProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            command: String::new(),
            timeout_seconds: None,
            environment: HashMap::new(),
            json_output: true,
            context_window: None,
            default: false,
            extra: BTreeMap::new(),
        }
    }
}

/// Dispatch-wide defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchDefaults {
    /// Default subprocess timeout in seconds.
    pub timeout_seconds: u64,

    /// Restart ceiling per task.
    pub max_restarts: u32,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for DispatchDefaults {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_restarts: DEFAULT_MAX_RESTARTS,
            extra: BTreeMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl ProviderProfile {
    /// Effective timeout for this provider.
    pub fn effective_timeout(&self, defaults: &DispatchDefaults) -> u64 {
        self.timeout_seconds.unwrap_or(defaults.timeout_seconds)
    }
}

impl ProvidersConfig {
    /// Built-in profiles for the four supported CLIs.
    pub fn builtin() -> Self {
        let mut providers = BTreeMap::new();

        providers.insert(
            "codex".to_string(),
            ProviderProfile {
                name: "Codex CLI".to_string(),
                command: "codex exec --json --dangerously-bypass-approvals-and-sandbox"
                    .to_string(),
                context_window: Some(400_000),
                default: true,
                ..Default::default()
            },
        );
        providers.insert(
            "claude".to_string(),
            ProviderProfile {
                name: "Claude Code".to_string(),
                command: "claude -p --output-format stream-json --dangerously-skip-permissions"
                    .to_string(),
                context_window: Some(200_000),
                ..Default::default()
            },
        );
        providers.insert(
            "gemini".to_string(),
            ProviderProfile {
                name: "Gemini CLI".to_string(),
                command: "gemini --output-format json --approval-mode yolo".to_string(),
                context_window: Some(1_000_000),
                ..Default::default()
            },
        );
        providers.insert(
            "copilot".to_string(),
            ProviderProfile {
                name: "Copilot CLI".to_string(),
                command: "copilot -p --allow-all-tools".to_string(),
                context_window: Some(128_000),
                ..Default::default()
            },
        );

        Self {
            providers,
            defaults: DispatchDefaults::default(),
            extra: BTreeMap::new(),
        }
    }

    /// Load provider config from a YAML file, falling back to the built-in
    /// profiles when the file does not exist.
    pub fn load_or_builtin<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::builtin());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AxiomError::UserError(format!(
                "failed to read providers config '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate provider config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ProvidersConfig = serde_yaml::from_str(yaml)
            .map_err(|e| AxiomError::UserError(format!("failed to parse providers.yaml: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize config to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            AxiomError::UserError(format!("failed to serialize providers config: {}", e))
        })
    }

    /// Validate the configuration.
    ///
    /// Rules: non-empty commands, non-zero timeouts, at most one default
    /// provider.
    pub fn validate(&self) -> Result<()> {
        if self.defaults.timeout_seconds == 0 {
            return Err(AxiomError::UserError(
                "providers.yaml validation failed: defaults.timeout_seconds must be greater than 0"
                    .to_string(),
            ));
        }

        let default_count = self.providers.values().filter(|p| p.default).count();
        if default_count > 1 {
            return Err(AxiomError::UserError(
                "providers.yaml validation failed: at most one provider can be marked as default"
                    .to_string(),
            ));
        }

        for (id, provider) in &self.providers {
            if provider.command.is_empty() {
                return Err(AxiomError::UserError(format!(
                    "providers.yaml validation failed: provider '{}' has empty command",
                    id
                )));
            }
            if let Some(timeout) = provider.timeout_seconds
                && timeout == 0
            {
                return Err(AxiomError::UserError(format!(
                    "providers.yaml validation failed: provider '{}' has timeout_seconds of 0",
                    id
                )));
            }
        }

        Ok(())
    }

    /// Select the active provider: an explicit name, else the profile marked
    /// `default`, else `codex`.
    pub fn select(&self, name: Option<&str>) -> Result<(&str, &ProviderProfile)> {
        if let Some(name) = name {
            return self
                .providers
                .get_key_value(name)
                .map(|(id, p)| (id.as_str(), p))
                .ok_or_else(|| {
                    AxiomError::UserError(format!(
                        "unknown provider '{}'. Available: {}",
                        name,
                        self.providers
                            .keys()
                            .map(String::as_str)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                });
        }

        if let Some((id, p)) = self.providers.iter().find(|(_, p)| p.default) {
            return Ok((id.as_str(), p));
        }

        self.providers
            .get_key_value("codex")
            .map(|(id, p)| (id.as_str(), p))
            .ok_or_else(|| {
                AxiomError::UserError(
                    "no provider selected and no default configured".to_string(),
                )
            })
    }
}
