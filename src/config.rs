use std::path::PathBuf;

use anyhow::Result;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

use crate::db::DEFAULT_DB_PATH;
use crate::parser::ExtractSettings;

/// Run settings: defaults, then `textbook.toml`, then `TEXTBOOK_*` env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: PathBuf,
    pub dictionary_path: Option<PathBuf>,
    pub json_dir: Option<PathBuf>,
    pub window_before: usize,
    pub window_after: usize,
    pub caps_heading_max_len: usize,
    pub max_heading_len: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let extract = ExtractSettings::default();
        Settings {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            dictionary_path: None,
            json_dir: None,
            window_before: extract.window_before,
            window_after: extract.window_after,
            caps_heading_max_len: extract.caps_heading_max_len,
            max_heading_len: extract.max_heading_len,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let builder = Config::builder()
            .add_source(File::with_name("textbook").required(false))
            .add_source(Environment::with_prefix("TEXTBOOK").try_parsing(true));
        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn extract(&self) -> ExtractSettings {
        ExtractSettings {
            window_before: self.window_before,
            window_after: self.window_after,
            caps_heading_max_len: self.caps_heading_max_len,
            max_heading_len: self.max_heading_len,
        }
    }
}
