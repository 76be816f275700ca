//! Typed ID wrappers.
//!
//! Library items are identified by a [`MediaId`] owned by the storage
//! collaborator; provider-local identifiers stay plain strings because each
//! catalog uses its own format (numeric, `tt`-prefixed, slugs).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a library media item (movie or show).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(Uuid);

impl MediaId {
    /// Generate a new random media ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MediaId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MediaId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<MediaId> for Uuid {
    fn from(id: MediaId) -> Self {
        id.0
    }
}

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
