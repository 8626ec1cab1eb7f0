//! YAML configuration for a bridge: policy files to load, record classes
//! to register, and whether `debug(...)` prompts the operator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::{Engine, LocalEngine};
use crate::error::PolarError;
use crate::host::{ClassRegistry, Record};
use crate::polar::{ContinueDebugger, Polar, StdinDebugger};


/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Policy files, queued in order. Relative paths are resolved against
    /// the config file's directory by [`load`].
    #[serde(default)]
    pub policies: Vec<PathBuf>,

    /// Record classes to register.
    #[serde(default)]
    pub classes: Vec<ClassDef>,

    /// Prompt on stdin for `debug(...)`; otherwise every prompt continues.
    #[serde(default)]
    pub debug: bool,
}


/// A class whose instances are [`Record`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,

    /// Ancestors after the class itself, most specific first.
    #[serde(default)]
    pub parents: Vec<String>,

    /// Fields every instance literal must provide.
    #[serde(default)]
    pub fields: Vec<String>,
}

impl BridgeConfig {
    /// Register every declared class into `classes`.
    pub fn register_classes(&self, classes: &ClassRegistry) {
        for def in &self.classes {
            let parents: Vec<&str> = def.parents.iter().map(String::as_str).collect();
            let fields: Vec<&str> = def.fields.iter().map(String::as_str).collect();
            let class = Record::class(&def.name, &parents, &fields);
            classes.register(&def.name, Arc::new(class), None);
        }
    }

    /// Set up `polar` as configured: classes registered, policies queued,
    /// debug hook chosen.
    pub fn apply<E: Engine>(&self, polar: &mut Polar<E>) -> Result<(), PolarError> {
        self.register_classes(polar.classes());
        for path in &self.policies {
            polar.load_file(path)?;
        }
        if self.debug {
            polar.set_debug_hook(Box::new(StdinDebugger));
        } else {
            polar.set_debug_hook(Box::new(ContinueDebugger));
        }
        Ok(())
    }
}

impl Polar<LocalEngine> {
    /// A bridge over a fresh in-process engine, configured by `config`.
    pub fn from_config(config: &BridgeConfig, classes: Arc<ClassRegistry>) -> Result<Self, PolarError> {
        let mut polar = Polar::new(classes);
        config.apply(&mut polar)?;
        Ok(polar)
    }
}


/// Load a config from a YAML file. Relative policy paths become relative to
/// the file's directory.
pub fn load(path: &Path) -> Result<BridgeConfig, PolarError> {
    let content = std::fs::read_to_string(path).map_err(|source| PolarError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = parse(&content)?;
    if let Some(dir) = path.parent() {
        for policy in &mut config.policies {
            if policy.is_relative() {
                *policy = dir.join(&*policy);
            }
        }
    }
    Ok(config)
}


/// Parse a config from a YAML string.
pub fn parse(content: &str) -> Result<BridgeConfig, PolarError> {
    Ok(serde_yaml::from_str(content)?)
}
