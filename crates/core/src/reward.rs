//! Koach point awards.
//!
//! One point per page read. Minutes, plan membership and history do not
//! affect the award, so a session's points never change after it is logged.

/// Points awarded for each page read.
pub const KOACH_PER_PAGE: u32 = 1;

/// Points earned by a single session.
#[must_use]
pub fn koach_for(pages_read: u32) -> u32 {
    pages_read.saturating_mul(KOACH_PER_PAGE)
}
