//! User-supplied input complements

use std::path::{Path, PathBuf};

use super::{extract_service_params, merge, PluginInput};
use crate::common::{Error, Result};

/// The override sources named on the command line
#[derive(Debug, Clone, Default)]
pub struct InputSources {
    /// JSON file complementing the input
    pub file: Option<PathBuf>,
    /// Inline JSON object complementing the input
    pub string: Option<String>,
    /// WaTTS config to extract plugin parameters from
    pub config: Option<PathBuf>,
    /// Service id whose parameters are extracted from `config`
    pub config_id: Option<String>,
}

/// Read a whole file as text, reporting failures as user errors
pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))
}

/// Read a JSON object document from a file
pub fn read_json_object(path: &Path) -> Result<PluginInput> {
    let text = read_text(path)?;
    PluginInput::from_json_str(&text, &path.display().to_string())
}

impl InputSources {
    /// Load every configured source, lowest precedence first
    pub fn overrides(&self) -> Result<Vec<PluginInput>> {
        let mut layers = Vec::new();

        if let Some(config) = &self.config {
            let service_id = self.config_id.as_deref().ok_or_else(|| {
                Error::MissingInput("a config identifier is needed for the config override".into())
            })?;
            let text = read_text(config)?;
            layers.push(extract_service_params(
                &text,
                service_id,
                &config.display().to_string(),
            )?);
        }

        if let Some(file) = &self.file {
            layers.push(read_json_object(file)?);
        }

        if let Some(string) = &self.string {
            layers.push(PluginInput::from_json_str(string, "input string")?);
        }

        Ok(layers)
    }

    /// The default document with every source merged over it
    pub fn specify(&self) -> Result<PluginInput> {
        Ok(merge(PluginInput::default(), self.overrides()?))
    }
}
