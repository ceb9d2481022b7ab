// ABOUTME: Configuration types and parsing for rollout.yml.
// ABOUTME: Handles file discovery, orchestrator limits and declarative pipeline templates.

mod orchestrator;
mod template;

pub use orchestrator::OrchestratorConfig;
pub use template::{StepConfig, TemplateConfig};

use crate::error::{Error, Result};
use crate::pipeline::TemplateRegistry;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const CONFIG_FILENAME: &str = "rollout.yml";
pub const CONFIG_FILENAME_ALT: &str = "rollout.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".rollout/config.yml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub templates: BTreeMap<String, TemplateConfig>,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the first config file found in `dir`.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Like `discover`, but an absent file yields the defaults.
    pub fn discover_or_default(dir: &Path) -> Result<Self> {
        match Self::discover(dir) {
            Err(Error::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Built-in templates plus the configured ones; configured names win.
    pub fn registry(&self) -> Result<TemplateRegistry> {
        let mut registry = TemplateRegistry::with_builtin();
        for (name, template) in &self.templates {
            let template = template
                .clone()
                .into_template()
                .map_err(|e| Error::InvalidConfig(format!("template {name}: {e}")))?;
            registry.register(name.clone(), template);
        }
        Ok(registry)
    }
}

/// Write a starter configuration file into `dir`.
pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, TEMPLATE_YAML)?;
    Ok(())
}

const TEMPLATE_YAML: &str = r#"orchestrator:
  max_concurrent_executions: 10
  history_limit: 50
  retry_backoff: 5s

templates:
  quick:
    description: Deploy and verify without risk assessment
    strategy: rolling
    environment: staging
    steps:
      - name: deploy
        phase: deployment
        action: { kind: deploy_service, desired_count: 1 }
        rollback: { kind: scale_service, count: 0 }
        timeout: 5m
        retries: 1
      - name: verify
        phase: validation
        action: { kind: verify_service }
        retries: 2
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starter_template_parses() {
        let config = Config::from_yaml(TEMPLATE_YAML).unwrap();
        assert_eq!(config.orchestrator, OrchestratorConfig::default());
        let registry = config.registry().unwrap();
        assert!(registry.contains("quick"));
        assert!(registry.contains("standard"));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.orchestrator.max_concurrent_executions, 10);
        assert!(config.templates.is_empty());
    }
}
