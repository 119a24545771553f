//! Daily review selection.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::store::{EntryFilter, VocabularyStore};
use crate::{EngineError, VocabularyEntry};

pub const DEFAULT_REVIEW_LIMIT: usize = 20;
pub const REVIEW_INTERVAL_HOURS: i64 = 24;

/// An entry is due when it has never been practiced, or when its last
/// practice is older than the 24-hour review interval.
pub fn is_due(entry: &VocabularyEntry, now: DateTime<Utc>) -> bool {
    match entry.last_practiced_at {
        None => true,
        Some(last) => last < now - Duration::hours(REVIEW_INTERVAL_HOURS),
    }
}

/// Review ordering: weakest strength first, then oldest practice first,
/// with never-practiced entries ahead of long-overdue ones.
pub fn review_order(a: &VocabularyEntry, b: &VocabularyEntry) -> Ordering {
    (a.strength.rank(), a.last_practiced_at).cmp(&(b.strength.rank(), b.last_practiced_at))
}

/// Pick the words due for review, at most `limit` of them.
///
/// The selection is recomputed from current store state on every call;
/// nothing is cached between invocations.
pub fn select_due<S: VocabularyStore + ?Sized>(
    store: &S,
    owner: Uuid,
    now: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<VocabularyEntry>, EngineError> {
    let mut due: Vec<VocabularyEntry> = store
        .entries(owner, &EntryFilter::all())?
        .into_iter()
        .filter(|entry| is_due(entry, now))
        .collect();
    due.sort_by(review_order);
    due.truncate(limit);
    Ok(due)
}
