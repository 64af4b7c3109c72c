use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "folio.config.json";

/// Editor configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// Site prefix of every reference, e.g. `example.com`
    pub site: String,

    /// Attribute carrying a component's reference on its root element
    pub reference_attribute: String,

    /// Attribute carrying the field path on editable nodes
    pub editable_attribute: String,

    /// Attribute marking placeholder nodes inserted by the editor
    pub placeholder_attribute: String,

    /// Class added to the selected component
    pub selected_class: String,

    /// Attribute set on the document element while a form is open
    pub editing_attribute: String,

    /// Keyword of the comment pairs delimiting non-visual component lists,
    /// `<!-- {marker}-start field -->` and `<!-- {marker}-end field -->`
    pub list_marker: String,

    pub log_filter: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            site: "localhost".to_string(),
            reference_attribute: "data-uri".to_string(),
            editable_attribute: "data-editable".to_string(),
            placeholder_attribute: "data-placeholder".to_string(),
            selected_class: "selected".to_string(),
            editing_attribute: "data-editing".to_string(),
            list_marker: "list".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl EditorConfig {
    /// Load config from a directory
    pub fn load(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: EditorConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            // Return default config if none exists
            Ok(EditorConfig::default())
        }
    }

    pub fn start_marker(&self, field: &str) -> String {
        format!("{}-start {}", self.list_marker, field)
    }

    pub fn end_marker(&self, field: &str) -> String {
        format!("{}-end {}", self.list_marker, field)
    }
}
