//! Recording practice outcomes and study sessions.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::store::VocabularyStore;
use crate::{EngineError, NewSession, PracticeEvent, StudySession, VocabularyEntry, apply_outcome};

pub const DEFAULT_SESSION_HISTORY: usize = 50;

/// Record one answer attempt against a vocabulary entry and return the
/// updated entry.
///
/// Appends an immutable [`PracticeEvent`] and, in the same committed step,
/// advances the strength state machine, increments `times_practiced` and
/// stamps `last_practiced_at`. The store serializes concurrent calls per
/// entry, so the counter increments by exactly one per call and the
/// threshold check always sees the pre-increment count. Fails with
/// `NotFound` when the entry is missing or owned by someone else; the
/// engine performs no retry on `Conflict`.
pub fn record_practice<S: VocabularyStore + ?Sized>(
    store: &S,
    owner: Uuid,
    entry_id: Uuid,
    correct: bool,
    time_taken_seconds: Option<u32>,
    now: DateTime<Utc>,
) -> Result<VocabularyEntry, EngineError> {
    let event = PracticeEvent {
        id: Uuid::new_v4(),
        vocabulary_id: entry_id,
        owner,
        correct,
        time_taken_seconds,
        occurred_at: now,
    };

    let updated = store.commit_practice(owner, entry_id, event, &mut |entry| {
        entry.strength = apply_outcome(entry.strength, correct, entry.times_practiced);
        entry.times_practiced += 1;
        entry.last_practiced_at = Some(now);
        entry.updated_at = now;
    })?;

    log::debug!(
        "practice recorded: entry={} correct={} strength={}",
        updated.id,
        correct,
        updated.strength
    );
    Ok(updated)
}

/// Validate and append one completed study session.
pub fn record_session<S: VocabularyStore + ?Sized>(
    store: &S,
    owner: Uuid,
    input: NewSession,
    now: DateTime<Utc>,
) -> Result<StudySession, EngineError> {
    let session = input.into_session(owner, now)?;
    store.insert_session(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::{NewEntry, SessionType, Strength};

    fn seed(store: &MemoryStore, owner: Uuid) -> VocabularyEntry {
        let entry = NewEntry {
            word: "gato".into(),
            translation: "cat".into(),
            language: "spanish".into(),
            ..Default::default()
        }
        .into_entry(owner, Utc::now())
        .unwrap();
        store.insert_entry(entry).unwrap()
    }

    #[test]
    fn practice_updates_counter_timestamp_and_strength_together() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let entry = seed(&store, owner);
        let now = Utc::now();

        let updated = record_practice(&store, owner, entry.id, true, Some(4), now).unwrap();
        assert_eq!(updated.times_practiced, 1);
        assert_eq!(updated.strength, Strength::Learning);
        assert_eq!(updated.last_practiced_at, Some(now));

        let events = store.events_for(owner, entry.id).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].correct);
        assert_eq!(events[0].time_taken_seconds, Some(4));
    }

    #[test]
    fn repeated_correct_answers_climb_through_every_state() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let entry = seed(&store, owner);

        let mut latest = entry;
        for _ in 0..10 {
            latest = record_practice(&store, owner, latest.id, true, None, Utc::now()).unwrap();
        }
        // new -> learning (1st), learning -> known (4th, prior count 3),
        // known -> mastered (8th, prior count 7).
        assert_eq!(latest.times_practiced, 10);
        assert_eq!(latest.strength, Strength::Mastered);

        let demoted = record_practice(&store, owner, latest.id, false, None, Utc::now()).unwrap();
        assert_eq!(demoted.strength, Strength::Known);
        assert_eq!(demoted.times_practiced, 11);
    }

    #[test]
    fn practicing_a_foreign_entry_is_not_found() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let entry = seed(&store, owner);

        let intruder = Uuid::new_v4();
        assert!(matches!(
            record_practice(&store, intruder, entry.id, true, None, Utc::now()),
            Err(EngineError::NotFound)
        ));
        // Nothing was recorded for the real owner either.
        assert!(store.events_for(owner, entry.id).unwrap().is_empty());
    }

    #[test]
    fn sessions_are_validated_then_stored_latest_first() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let base = Utc::now();

        for (i, session_type) in [SessionType::Chat, SessionType::Practice]
            .into_iter()
            .enumerate()
        {
            record_session(
                &store,
                owner,
                NewSession {
                    session_type,
                    duration_minutes: Some(10),
                    words_practiced: Some(5),
                    accuracy_score: Some(0.8),
                },
                base + chrono::Duration::minutes(i as i64),
            )
            .unwrap();
        }

        let sessions = store.sessions(owner, DEFAULT_SESSION_HISTORY).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_type, SessionType::Practice);

        let invalid = NewSession {
            session_type: SessionType::Flashcards,
            duration_minutes: Some(9999),
            words_practiced: None,
            accuracy_score: None,
        };
        assert!(record_session(&store, owner, invalid, Utc::now()).is_err());
    }
}
