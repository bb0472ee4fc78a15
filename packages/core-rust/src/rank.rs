//! Priority and rank conventions.
//!
//! The domain convention is "smaller declared priority wins"; the registry's
//! native ordering is "larger effective rank wins". [`effective_rank`] is the
//! single inversion between the two, used by both contract-binding order and
//! job execution order. Keeping one function for both call sites is what makes
//! the two orderings provably consistent.

use std::cmp::Reverse;

/// Declared priority used when a service or job carries no explicit priority.
///
/// Inverts to the lowest effective rank, so unprioritized registrations sort
/// after every explicitly prioritized one.
pub const NEUTRAL_PRIORITY: i32 = i32::MAX;

/// Inverts a declared priority ("smaller wins") into an effective rank
/// ("larger wins").
///
/// Widened to `i64` so negative declared priorities cannot overflow.
#[must_use]
pub fn effective_rank(declared: i32) -> i64 {
    i64::from(i32::MAX) - i64::from(declared)
}

/// Total-order sort key for prioritized registrations: effective rank
/// descending, then name ascending for deterministic tie-breaking.
#[must_use]
pub fn precedence_key(priority: i32, name: &str) -> (Reverse<i64>, &str) {
    (Reverse(effective_rank(priority)), name)
}
