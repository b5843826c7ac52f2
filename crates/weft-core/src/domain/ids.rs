//! Job identifiers.
//!
//! JobId は ULID ベース。StatusStore 側が採番し、weft はそれを不透明な
//! トークンとして扱うだけ（生成後は不変）。

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of one unit of work tracked by a status store.
///
/// Display は `job-<ULID>` 形式。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId {
    ulid: Ulid,
}

impl JobId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self { ulid }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl From<Ulid> for JobId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.ulid)
    }
}
