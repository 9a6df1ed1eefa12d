//! Remote entity identity
//!
//! An entity is addressed by a slash-separated hierarchical path, unique
//! within a session, and optionally by a numeric host id. The host id is
//! set when the replica pre-exists in the local scene; when valid it takes
//! precedence over path lookup.

use serde::{Deserialize, Serialize};

use crate::constants::INVALID_ID;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub id: i32,
    pub path: String,
}

impl Identifier {
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            id: INVALID_ID,
            path: path.into(),
        }
    }

    pub fn with_id(path: impl Into<String>, id: i32) -> Self {
        Self {
            id,
            path: path.into(),
        }
    }

    /// True when the numeric handle refers to a host-owned object.
    pub fn has_id(&self) -> bool {
        self.id != INVALID_ID
    }

    /// Leaf segment of the hierarchical path ("/a/b/c" -> "c").
    pub fn leaf(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("")
    }

    /// Parent path ("/a/b/c" -> "/a/b"), or None at the root level.
    pub fn parent_path(&self) -> Option<&str> {
        let idx = self.path.rfind('/')?;
        if idx == 0 {
            None
        } else {
            Some(&self.path[..idx])
        }
    }
}

impl Default for Identifier {
    fn default() -> Self {
        Self {
            id: INVALID_ID,
            path: String::new(),
        }
    }
}
