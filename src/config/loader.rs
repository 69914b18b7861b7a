//! Configuration loading and management

use crate::constants::{CONFIG_FILENAMES, DEFAULT_FORMATTER_COMMAND};
use crate::error::{Error, Result};
use log::debug;
use serde::Deserialize;
use std::path::Path;

/// External program applied to Go source before it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatterKind {
    #[default]
    Gofmt,
    None,
}

/// Settings read from the template root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Generated file names get the fixture suffix, and only suffixed files are read.
    #[serde(default)]
    pub fixture_mode: bool,
    #[serde(default)]
    pub formatter: FormatterKind,
    #[serde(default = "get_default_formatter_command")]
    pub formatter_command: String,
    /// Extra glob patterns, relative to the template root, skipped at compile time.
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fixture_mode: false,
            formatter: FormatterKind::default(),
            formatter_command: get_default_formatter_command(),
            ignore: Vec::new(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.formatter == FormatterKind::Gofmt && self.formatter_command.trim().is_empty() {
            return Err(Error::ConfigValidation(
                "formatter_command must not be empty when formatter is gofmt".into(),
            ));
        }
        if let Some(pattern) = self.ignore.iter().find(|p| p.trim().is_empty()) {
            return Err(Error::ConfigValidation(format!(
                "ignore patterns must not be empty, got '{pattern}'"
            )));
        }
        Ok(())
    }

    /// Reads the first config file found in `template_root`. A template
    /// without one uses the defaults.
    pub fn load_config<P: AsRef<Path>>(template_root: P) -> Result<Self> {
        let template_root = template_root.as_ref();

        for config_file_name in CONFIG_FILENAMES.iter() {
            let config_file_path = template_root.join(config_file_name);

            if config_file_path.exists() {
                let content = std::fs::read_to_string(&config_file_path)
                    .map_err(|e| Error::fs("read config", &config_file_path, e))?;
                let config: Config = if config_file_name.ends_with(".json") {
                    serde_json::from_str(&content)?
                } else {
                    serde_yaml::from_str(&content)?
                };
                config.validate()?;
                debug!("Loaded config from {}", config_file_path.display());
                return Ok(config);
            }
        }

        debug!("No config file found in {}, using defaults.", template_root.display());
        Ok(Config::default())
    }
}

fn get_default_formatter_command() -> String {
    DEFAULT_FORMATTER_COMMAND.to_string()
}
