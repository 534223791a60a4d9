//! Built-in transformer implementations

pub mod hidden_content;
pub mod library_content;
pub mod sequence_icons;

pub use hidden_content::{FIELD_STAFF_ONLY, HIDDEN_CONTENT, HiddenContentTransformer};
pub use library_content::{FIELD_MAX_COUNT, LIBRARY_CONTENT, LibraryContentTransformer};
pub use sequence_icons::{FIELD_ICON_CLASS, ICON_OTHER, SEQUENCE_ICONS, SequenceIconsTransformer};

use crate::config::TransformersConfig;
use crate::registry::RegistryError;
use crate::transformer::BlockTransformer;
use crate::user_state::UserStateStore;
use std::sync::Arc;

/// Factory function to create built-in transformers by name
pub fn create_transformer(
    name: &str,
    config: &TransformersConfig,
    user_state: Arc<dyn UserStateStore>,
) -> Result<Arc<dyn BlockTransformer>, RegistryError> {
    match name {
        HIDDEN_CONTENT => Ok(Arc::new(HiddenContentTransformer::new())),
        LIBRARY_CONTENT => Ok(Arc::new(LibraryContentTransformer::new(
            user_state,
            config.library_content.default_max_count,
        ))),
        SEQUENCE_ICONS => Ok(Arc::new(SequenceIconsTransformer::new(
            config.sequence_icons.class_priority.clone(),
        ))),
        _ => Err(RegistryError::Unknown(name.to_string())),
    }
}
