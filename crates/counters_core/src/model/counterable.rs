//! Polymorphic counter ownership.
//!
//! Any application record can carry its own counters by naming its kind
//! (`OWNER_TYPE`) and a stable numeric id. The pair is stored as a
//! discriminator column plus owner id on every attachment row.

use super::counter::Counter;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Application record that can own counter attachments.
///
/// `OWNER_TYPE` must be unique per record kind and must never change once
/// attachments have been written, since it is persisted verbatim.
pub trait Counterable {
    const OWNER_TYPE: &'static str;

    fn owner_id(&self) -> i64;

    fn owner_ref(&self) -> OwnerRef {
        OwnerRef::new(Self::OWNER_TYPE, self.owner_id())
    }
}

/// Type-erased owner identity as stored in `counterables`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OwnerRef {
    pub owner_type: &'static str,
    pub owner_id: i64,
}

impl OwnerRef {
    pub const fn new(owner_type: &'static str, owner_id: i64) -> Self {
        Self {
            owner_type,
            owner_id,
        }
    }
}

impl Display for OwnerRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.owner_type, self.owner_id)
    }
}

/// One counter as seen through one owner's attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedCounter {
    /// Registry row at the time the attachment was loaded.
    pub counter: Counter,
    /// The owner's own running total for this counter.
    pub value: i64,
    /// Unix epoch milliseconds.
    pub attached_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl AttachedCounter {
    pub fn key(&self) -> &str {
        self.counter.key.as_str()
    }
}
