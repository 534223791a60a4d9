//! Transformer configuration

use crate::transformers::{HIDDEN_CONTENT, LIBRARY_CONTENT, SEQUENCE_ICONS};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformersConfig {
    /// Ranked registration order. Later transformers see earlier ones'
    /// mutations during the transform phase.
    pub order: Vec<String>,
    pub library_content: LibraryContentConfig,
    pub sequence_icons: SequenceIconsConfig,
}

impl Default for TransformersConfig {
    fn default() -> Self {
        TransformersConfig {
            order: vec![
                HIDDEN_CONTENT.to_string(),
                LIBRARY_CONTENT.to_string(),
                SEQUENCE_ICONS.to_string(),
            ],
            library_content: LibraryContentConfig::default(),
            sequence_icons: SequenceIconsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryContentConfig {
    /// Children shown per container when the block has no `max_count`.
    /// Zero shows every child.
    pub default_max_count: u32,
}

impl Default for LibraryContentConfig {
    fn default() -> Self {
        LibraryContentConfig { default_max_count: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceIconsConfig {
    /// Icon classes from lowest to highest rank.
    pub class_priority: Vec<String>,
}

impl Default for SequenceIconsConfig {
    fn default() -> Self {
        SequenceIconsConfig {
            class_priority: vec!["video".to_string(), "problem".to_string()],
        }
    }
}
