//! Engine configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::assessment::{DEFAULT_DECAY_FACTOR, DEFAULT_PROPAGATION_DEPTH};
use crate::diffusion::DEFAULT_ALPHA;

/// Tuning for propagation and diffusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Self-weight of a node in a diffusion pass.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Per-hop decay of propagated influence.
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64,
    /// How many hops an assessment propagates.
    #[serde(default = "default_propagation_depth")]
    pub propagation_depth: u32,
    /// Run one diffusion pass after every assessment. Off by default.
    #[serde(default)]
    pub diffuse_after_assessment: bool,
}

fn default_alpha() -> f64 {
    DEFAULT_ALPHA
}
fn default_decay_factor() -> f64 {
    DEFAULT_DECAY_FACTOR
}
fn default_propagation_depth() -> u32 {
    DEFAULT_PROPAGATION_DEPTH
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            decay_factor: default_decay_factor(),
            propagation_depth: default_propagation_depth(),
            diffuse_after_assessment: false,
        }
    }
}

impl EngineConfig {
    /// Reject values the math has no sensible meaning for.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.alpha),
            "alpha must be between 0.0 and 1.0, got {}",
            self.alpha
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.decay_factor),
            "decay_factor must be between 0.0 and 1.0, got {}",
            self.decay_factor
        );
        Ok(())
    }

    /// Apply `CONCEPTFLOW_*` environment overrides.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("CONCEPTFLOW_ALPHA") {
            self.alpha = v
                .trim()
                .parse()
                .with_context(|| format!("invalid CONCEPTFLOW_ALPHA: '{v}'"))?;
        }
        if let Ok(v) = std::env::var("CONCEPTFLOW_DECAY_FACTOR") {
            self.decay_factor = v
                .trim()
                .parse()
                .with_context(|| format!("invalid CONCEPTFLOW_DECAY_FACTOR: '{v}'"))?;
        }
        if let Ok(v) = std::env::var("CONCEPTFLOW_PROPAGATION_DEPTH") {
            self.propagation_depth = v
                .trim()
                .parse()
                .with_context(|| format!("invalid CONCEPTFLOW_PROPAGATION_DEPTH: '{v}'"))?;
        }
        Ok(())
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `conceptflow.toml` in the current directory
/// 2. `~/.config/conceptflow/config.toml`
///
/// Environment variable overrides: `CONCEPTFLOW_ALPHA`,
/// `CONCEPTFLOW_DECAY_FACTOR`, `CONCEPTFLOW_PROPAGATION_DEPTH`.
pub fn load_config() -> Result<EngineConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<EngineConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("conceptflow.toml");
        if local.exists() {
            Some(local)
        } else {
            config_dir()
                .map(|dir| dir.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Parse a TOML config string without touching the environment.
pub fn parse_config_str(content: &str) -> Result<EngineConfig> {
    Ok(toml::from_str::<EngineConfig>(content)?)
}

fn config_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("conceptflow"))
}
