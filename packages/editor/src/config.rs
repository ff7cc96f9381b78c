use manuscript_track_changes::DiffOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "manuscript-editor.config.json";

/// Numbering scheme of the manuscript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManuscriptMeta {
    #[serde(default = "default_figure_label")]
    pub figure_element_label: String,

    #[serde(default = "default_table_label")]
    pub table_element_label: String,

    #[serde(default = "default_equation_label")]
    pub equation_element_label: String,

    #[serde(default = "default_listing_label")]
    pub listing_element_label: String,

    #[serde(default = "default_section_label")]
    pub section_label: String,
}

fn default_figure_label() -> String {
    "Figure".to_string()
}

fn default_table_label() -> String {
    "Table".to_string()
}

fn default_equation_label() -> String {
    "Equation".to_string()
}

fn default_listing_label() -> String {
    "Listing".to_string()
}

fn default_section_label() -> String {
    "Section".to_string()
}

impl Default for ManuscriptMeta {
    fn default() -> Self {
        Self {
            figure_element_label: default_figure_label(),
            table_element_label: default_table_label(),
            equation_element_label: default_equation_label(),
            listing_element_label: default_listing_label(),
            section_label: default_section_label(),
        }
    }
}

/// Editor configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    #[serde(default)]
    pub manuscript: ManuscriptMeta,

    /// How long a focused footnote marker stays highlighted
    #[serde(default = "default_highlight_duration_ms")]
    pub highlight_duration_ms: u64,

    /// Debounce window of the statistics worker
    #[serde(default = "default_statistics_debounce_ms")]
    pub statistics_debounce_ms: u64,

    #[serde(default = "default_text_diff_min_length")]
    pub text_diff_min_length: usize,

    #[serde(default = "default_detect_moves")]
    pub detect_moves: bool,

    /// Upper bound on post-effect rounds after one dispatch
    #[serde(default = "default_max_post_effect_rounds")]
    pub max_post_effect_rounds: usize,
}

fn default_highlight_duration_ms() -> u64 {
    3000
}

fn default_statistics_debounce_ms() -> u64 {
    250
}

fn default_text_diff_min_length() -> usize {
    1
}

fn default_detect_moves() -> bool {
    true
}

fn default_max_post_effect_rounds() -> usize {
    8
}

impl EditorConfig {
    /// Load config from a directory, falling back to defaults when absent
    pub fn load(cwd: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_path = cwd.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Ok(Self::from_json(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            text_diff_min_length: self.text_diff_min_length,
            detect_moves: self.detect_moves,
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            manuscript: ManuscriptMeta::default(),
            highlight_duration_ms: default_highlight_duration_ms(),
            statistics_debounce_ms: default_statistics_debounce_ms(),
            text_diff_min_length: default_text_diff_min_length(),
            detect_moves: default_detect_moves(),
            max_post_effect_rounds: default_max_post_effect_rounds(),
        }
    }
}
