use crate::{Error, Result};
use kite_metadata::{LegacyTypes, SUPPORTED_VERSIONS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

/// Client settings, usually loaded from YAML:
///
/// ```yaml
/// url: "http://localhost:9933"
/// metadata_versions: [13, 14]
/// mortality_period: ~ # immortal transactions
/// tip: 0
/// dry_run: true
/// legacy_types:
///   Address: "AccountId"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Node endpoint.
    pub url: String,
    /// Metadata versions the client may negotiate.
    pub metadata_versions: Vec<u32>,
    /// Blocks a transaction stays valid. `None` creates immortal transactions.
    pub mortality_period: Option<u64>,
    pub tip: u64,
    /// Dry-run transactions before submitting them, if the node supports it.
    pub dry_run: bool,
    /// Type aliases for V12/V13 metadata, extending the built-in ones.
    pub legacy_types: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            url: "http://localhost:9933".to_string(),
            metadata_versions: SUPPORTED_VERSIONS.to_vec(),
            mortality_period: Some(64),
            tip: 0,
            dry_run: true,
            legacy_types: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: ClientConfig =
            serde_yaml::from_str(yaml).map_err(|err| Error::Config(err.to_string()))?;

        config.validate()?;
        Ok(config)
    }
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let read = |path: &Path| -> std::io::Result<String> {
            let mut file = File::open(path)?;
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            Ok(contents)
        };

        let contents =
            read(path).map_err(|err| Error::Config(format!("{}: {}", path.display(), err)))?;

        Self::from_yaml_str(&contents)
    }
    fn validate(&self) -> Result<()> {
        if self.metadata_versions.is_empty() {
            return Err(Error::Config("no metadata versions configured".to_string()));
        }

        if let Some(version) = self
            .metadata_versions
            .iter()
            .find(|version| !SUPPORTED_VERSIONS.contains(version))
        {
            return Err(Error::Config(format!(
                "metadata V{} is not supported",
                version
            )));
        }

        if self.mortality_period == Some(0) {
            return Err(Error::Config("mortality period must be positive".to_string()));
        }

        Ok(())
    }
    /// The built-in legacy types extended by the configured aliases.
    pub fn legacy_types(&self) -> LegacyTypes {
        let mut legacy = LegacyTypes::default();
        for (name, definition) in &self.legacy_types {
            legacy.insert(name.as_str(), definition.as_str());
        }
        legacy
    }
}
