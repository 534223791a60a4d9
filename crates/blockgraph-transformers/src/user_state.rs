//! Recorded per-user selections, owned by an external user-state service

use blockgraph_core::{BlockKey, ParseBlockKeyError, UserId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UserStateError {
    #[error("invalid user state: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidKey(#[from] ParseBlockKeyError),

    #[error("user state backend error: {0}")]
    Backend(String),
}

/// The children a user was previously shown, per selection container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionRecord {
    selections: BTreeMap<BlockKey, Vec<BlockKey>>,
}

/// State blob the user-state service keeps for one container:
/// `{"selected": [["vertical", "vertical2"], ...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ContainerState {
    #[serde(default)]
    selected: Vec<(String, String)>,
}

impl ContainerState {
    fn into_children(self) -> Vec<BlockKey> {
        self.selected
            .into_iter()
            .map(|(block_type, block_id)| BlockKey::new(block_type, block_id))
            .collect()
    }
}

impl SelectionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selection(mut self, container: BlockKey, children: Vec<BlockKey>) -> Self {
        self.selections.insert(container, children);
        self
    }

    pub fn get(&self, container: &BlockKey) -> Option<&[BlockKey]> {
        self.selections.get(container).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn containers(&self) -> impl Iterator<Item = &BlockKey> {
        self.selections.keys()
    }

    /// Parse one container's stored state blob and add it to the record.
    pub fn add_container_state(
        &mut self,
        container: BlockKey,
        state_json: &str,
    ) -> Result<(), UserStateError> {
        let state: ContainerState = serde_json::from_str(state_json)?;
        self.selections.insert(container, state.into_children());
        Ok(())
    }

    /// Parse a whole-course export: `{"<type>@<id>": {"selected": [...]}, ...}`.
    pub fn from_json_str(json: &str) -> Result<Self, UserStateError> {
        let raw: BTreeMap<String, ContainerState> = serde_json::from_str(json)?;
        let mut record = SelectionRecord::new();
        for (container, state) in raw {
            let container: BlockKey = container.parse()?;
            record.selections.insert(container, state.into_children());
        }
        Ok(record)
    }
}

/// Read side of the user-state service.
pub trait UserStateStore: Send + Sync {
    /// The user's recorded selections in a course. An empty record means the
    /// user has no selections yet.
    fn selections(&self, user: &UserId, course_id: &str) -> Result<SelectionRecord, UserStateError>;
}

/// User-state service with nothing recorded for anybody.
pub struct NoUserState;

impl UserStateStore for NoUserState {
    fn selections(&self, _user: &UserId, _course_id: &str) -> Result<SelectionRecord, UserStateError> {
        Ok(SelectionRecord::new())
    }
}

/// In-process user state. Thread-safe for concurrent access.
#[derive(Default)]
pub struct MemoryUserState {
    records: DashMap<(UserId, String), SelectionRecord>,
}

impl MemoryUserState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the record of `user` in `course_id`.
    pub fn record(&self, user: UserId, course_id: impl Into<String>, record: SelectionRecord) {
        self.records.insert((user, course_id.into()), record);
    }
}

impl UserStateStore for MemoryUserState {
    fn selections(&self, user: &UserId, course_id: &str) -> Result<SelectionRecord, UserStateError> {
        Ok(self
            .records
            .get(&(user.clone(), course_id.to_string()))
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }
}
