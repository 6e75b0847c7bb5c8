use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::frame::FrameParsing;

pub const DEFAULT_CHAT_ENDPOINT: &str = "http://localhost:5000/api/chat";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub settings: Settings,
    pub project: ProjectConfig,
}

/// Backend connection info forwarded with every chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub model: Option<String>,
    pub chat_endpoint: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: None,
            model: None,
            chat_endpoint: DEFAULT_CHAT_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub selected_inside_codeblock: bool,
    pub codeblock_with_language_id: bool,
    pub keep_conversation: bool,
    /// Seconds without stream data before a request is abandoned.
    pub timeout_length: u64,
    pub indent_on_inserting: bool,
    pub frame_parsing: FrameParsing,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            selected_inside_codeblock: true,
            codeblock_with_language_id: false,
            keep_conversation: true,
            timeout_length: 60,
            indent_on_inserting: true,
            frame_parsing: FrameParsing::default(),
        }
    }
}

/// Partial settings update; unset fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub selected_inside_codeblock: Option<bool>,
    pub codeblock_with_language_id: Option<bool>,
    pub keep_conversation: Option<bool>,
    pub timeout_length: Option<u64>,
    pub indent_on_inserting: Option<bool>,
    pub frame_parsing: Option<FrameParsing>,
}

impl Settings {
    pub fn merge(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.selected_inside_codeblock {
            self.selected_inside_codeblock = v;
        }
        if let Some(v) = patch.codeblock_with_language_id {
            self.codeblock_with_language_id = v;
        }
        if let Some(v) = patch.keep_conversation {
            self.keep_conversation = v;
        }
        if let Some(v) = patch.timeout_length {
            self.timeout_length = v;
        }
        if let Some(v) = patch.indent_on_inserting {
            self.indent_on_inserting = v;
        }
        if let Some(v) = patch.frame_parsing {
            self.frame_parsing = v;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Identifier of the repository the student works in; `REPO_ID` overrides it.
    pub repo_id: Option<String>,
    /// YAML catalog of projects keyed by repo id. The built-in catalog is used when unset.
    pub catalog_path: Option<PathBuf>,
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tutor")
            .join("config.yaml")
    }

    /// Loads `path` (or the default location), falling back to defaults when the
    /// file is missing or unreadable, then applies environment overrides.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::get_config_path);

        let mut config = if config_path.exists() {
            match Self::load_from_file(&config_path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable config {}: {}", config_path.display(), e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(repo_id) = std::env::var("REPO_ID") {
            if !repo_id.is_empty() {
                self.project.repo_id = Some(repo_id);
            }
        }
        if let Ok(key) = std::env::var("TUTOR_API_KEY") {
            if !key.is_empty() {
                self.api.api_key = Some(key);
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to_file(Self::get_config_path())
    }
}
