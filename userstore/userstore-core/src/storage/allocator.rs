//! IdAllocator - Per-Backend Identifier Watermark
//!
//! TigerStyle: One counter per adapter instance, one mutex around it.
//!
//! The watermark is the highest id issued so far. It is recovered from the
//! medium when an adapter is built and only moves forward afterwards. At
//! `u32::MAX` the counter wraps to zero; this is a known limitation and is
//! logged rather than corrected.

use parking_lot::Mutex;

use super::user::UserId;
use crate::constants::ID_WATERMARK_BASELINE;

/// Issues unique, increasing ids for one backend instance.
#[derive(Debug)]
pub struct IdAllocator {
    watermark: Mutex<UserId>,
}

impl IdAllocator {
    /// Start from a watermark recovered from the medium.
    #[must_use]
    pub fn new(watermark: UserId) -> Self {
        Self {
            watermark: Mutex::new(watermark),
        }
    }

    /// Start from an empty medium.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(ID_WATERMARK_BASELINE)
    }

    /// Start from the largest of `ids`, or the baseline if there are none.
    #[must_use]
    pub fn recover(ids: impl IntoIterator<Item = UserId>) -> Self {
        Self::new(ids.into_iter().max().unwrap_or(ID_WATERMARK_BASELINE))
    }

    /// Advance the watermark and return the new value.
    pub fn next_id(&self) -> UserId {
        let mut watermark = self.watermark.lock();
        let (next, wrapped) = watermark.overflowing_add(1);
        if wrapped {
            tracing::warn!("id watermark wrapped past u32::MAX");
        }
        *watermark = next;
        next
    }

    /// The highest id issued so far.
    #[must_use]
    pub fn watermark(&self) -> UserId {
        *self.watermark.lock()
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::empty()
    }
}

/// Parse a medium-native key as a user id.
///
/// Returns `None` (and logs) for keys that are not a decimal `u32`; recovery
/// and listing skip such entries instead of failing.
#[cfg_attr(not(any(feature = "redis", feature = "elastic")), allow(dead_code))]
pub(crate) fn parse_id(raw: &str) -> Option<UserId> {
    match raw.parse::<UserId>() {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(key = raw, error = %e, "skipping entry with non-numeric id");
            None
        }
    }
}
