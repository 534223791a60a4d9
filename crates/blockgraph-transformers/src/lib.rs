//! Per-user personalization of block structures
//!
//! This crate provides the two-phase transformer capability, the ordered
//! registry of transformers, the pipeline that runs them against a cached
//! base structure, and the built-in transformers.

pub mod config;
pub mod context;
pub mod pipeline;
pub mod registry;
pub mod transformer;
pub mod transformers;
pub mod user_state;


pub use config::{LibraryContentConfig, SequenceIconsConfig, TransformersConfig};
pub use context::{TransformerContext, UserContext};
pub use pipeline::{PipelineError, TransformPipeline};
pub use registry::{RegistryError, TransformerRegistry};
pub use transformer::{BlockTransformer, CollectionError};
pub use transformers::{
    FIELD_ICON_CLASS, FIELD_MAX_COUNT, FIELD_STAFF_ONLY, HIDDEN_CONTENT, HiddenContentTransformer, ICON_OTHER,
    LIBRARY_CONTENT, LibraryContentTransformer, SEQUENCE_ICONS, SequenceIconsTransformer, create_transformer,
};
pub use user_state::{MemoryUserState, NoUserState, SelectionRecord, UserStateError, UserStateStore};
