//! Per-request state handed to transformers

use blockgraph_core::UserId;
use std::any::Any;
use std::collections::HashMap;

/// Who is asking, and for which course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: UserId,
    pub course_id: String,
    pub is_staff: bool,
}

impl UserContext {
    pub fn new(user_id: UserId, course_id: impl Into<String>) -> Self {
        UserContext {
            user_id,
            course_id: course_id.into(),
            is_staff: false,
        }
    }

    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }
}

/// Scratch space for one pipeline run. Each transformer stores what its
/// collect phase gathered under its own name and reads it back during
/// transform. Never shared between requests.
pub struct TransformerContext {
    user: UserContext,
    data: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for TransformerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformerContext")
            .field("user", &self.user)
            .field("entries", &self.data.len())
            .finish()
    }
}

impl TransformerContext {
    pub fn new(user: UserContext) -> Self {
        TransformerContext {
            user,
            data: HashMap::new(),
        }
    }

    pub fn user(&self) -> &UserContext {
        &self.user
    }

    /// Store collected data for `transformer`, replacing any previous value.
    pub fn insert<T: Any + Send + Sync>(&mut self, transformer: &str, value: T) {
        self.data.insert(transformer.to_string(), Box::new(value));
    }

    /// Collected data for `transformer`, if present and of type `T`.
    pub fn get<T: Any>(&self, transformer: &str) -> Option<&T> {
        self.data.get(transformer)?.downcast_ref::<T>()
    }
}
