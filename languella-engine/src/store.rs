//! Storage abstraction for per-owner vocabulary collections.
//!
//! Durable state lives in an external relational store; this trait is the
//! engine's view of it. The one non-obvious requirement is
//! [`VocabularyStore::commit_practice`]: the event insert and the entry
//! mutation must commit together, and the mutation closure must run while
//! the entry is exclusively held, so that concurrent practice calls on the
//! same entry serialize instead of losing updates.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{EngineError, EntryPatch, PracticeEvent, Strength, StudySession, VocabularyEntry};

pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const MAX_LIST_LIMIT: usize = 100;

/// Filters for listing a user's vocabulary, newest first.
#[derive(Clone, Debug)]
pub struct EntryFilter {
    pub language: Option<String>,
    pub strength: Option<Strength>,
    pub tag: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for EntryFilter {
    fn default() -> Self {
        EntryFilter {
            language: None,
            strength: None,
            tag: None,
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

impl EntryFilter {
    /// Every entry the owner has, in one page.
    pub fn all() -> Self {
        EntryFilter {
            limit: usize::MAX,
            ..EntryFilter::default()
        }
    }

    fn matches(&self, entry: &VocabularyEntry) -> bool {
        if let Some(language) = &self.language {
            if &entry.language != language {
                return false;
            }
        }
        if let Some(strength) = self.strength {
            if entry.strength != strength {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !entry.tags.contains(tag) {
                return false;
            }
        }
        true
    }
}

/// Per-owner partitioned storage for entries, practice events and study
/// sessions. Every method scopes by owner; an entry belonging to another
/// user is indistinguishable from a missing one (`NotFound`).
pub trait VocabularyStore {
    /// Insert a new entry. A duplicate `(owner, language, word)` is an
    /// `InvalidArgument`.
    fn insert_entry(&self, entry: VocabularyEntry) -> Result<VocabularyEntry, EngineError>;

    fn entry(&self, owner: Uuid, id: Uuid) -> Result<VocabularyEntry, EngineError>;

    fn entries(&self, owner: Uuid, filter: &EntryFilter) -> Result<Vec<VocabularyEntry>, EngineError>;

    fn patch_entry(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &EntryPatch,
        now: DateTime<Utc>,
    ) -> Result<VocabularyEntry, EngineError>;

    /// Hard-delete an entry and cascade to its practice events.
    fn delete_entry(&self, owner: Uuid, id: Uuid) -> Result<(), EngineError>;

    /// Atomically insert `event` and apply `mutate` to the referenced
    /// entry. `mutate` runs while the entry is exclusively held; either
    /// both the event and the mutation commit, or neither does.
    fn commit_practice(
        &self,
        owner: Uuid,
        id: Uuid,
        event: PracticeEvent,
        mutate: &mut dyn FnMut(&mut VocabularyEntry),
    ) -> Result<VocabularyEntry, EngineError>;

    fn events_for(&self, owner: Uuid, id: Uuid) -> Result<Vec<PracticeEvent>, EngineError>;

    fn insert_session(&self, session: StudySession) -> Result<StudySession, EngineError>;

    /// Latest sessions first.
    fn sessions(&self, owner: Uuid, limit: usize) -> Result<Vec<StudySession>, EngineError>;

    /// Sorted distinct tags across the owner's vocabulary.
    fn tag_index(&self, owner: Uuid) -> Result<Vec<String>, EngineError>;
}

#[derive(Default)]
struct Shelves {
    entries: HashMap<Uuid, VocabularyEntry>,
    events: Vec<PracticeEvent>,
    sessions: Vec<StudySession>,
}

/// In-memory store. One mutex guards all shelves, so `commit_practice`
/// trivially satisfies the exclusive-hold requirement: the lock spans the
/// whole read-compute-write sequence.
#[derive(Default)]
pub struct MemoryStore {
    shelves: Mutex<Shelves>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shelves> {
        self.shelves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VocabularyStore for MemoryStore {
    fn insert_entry(&self, entry: VocabularyEntry) -> Result<VocabularyEntry, EngineError> {
        let mut shelves = self.lock();
        let duplicate = shelves.entries.values().any(|existing| {
            existing.owner == entry.owner
                && existing.language == entry.language
                && existing.word == entry.word
        });
        if duplicate {
            return Err(EngineError::invalid(
                "word already exists in your vocabulary",
            ));
        }
        shelves.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    fn entry(&self, owner: Uuid, id: Uuid) -> Result<VocabularyEntry, EngineError> {
        let shelves = self.lock();
        shelves
            .entries
            .get(&id)
            .filter(|entry| entry.owner == owner)
            .cloned()
            .ok_or(EngineError::NotFound)
    }

    fn entries(&self, owner: Uuid, filter: &EntryFilter) -> Result<Vec<VocabularyEntry>, EngineError> {
        let shelves = self.lock();
        let mut matched: Vec<VocabularyEntry> = shelves
            .entries
            .values()
            .filter(|entry| entry.owner == owner && filter.matches(entry))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect())
    }

    fn patch_entry(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &EntryPatch,
        now: DateTime<Utc>,
    ) -> Result<VocabularyEntry, EngineError> {
        let mut shelves = self.lock();
        let entry = shelves
            .entries
            .get_mut(&id)
            .filter(|entry| entry.owner == owner)
            .ok_or(EngineError::NotFound)?;
        patch.apply(entry, now);
        Ok(entry.clone())
    }

    fn delete_entry(&self, owner: Uuid, id: Uuid) -> Result<(), EngineError> {
        let mut shelves = self.lock();
        match shelves.entries.get(&id) {
            Some(entry) if entry.owner == owner => {}
            _ => return Err(EngineError::NotFound),
        }
        shelves.entries.remove(&id);
        shelves.events.retain(|event| event.vocabulary_id != id);
        Ok(())
    }

    fn commit_practice(
        &self,
        owner: Uuid,
        id: Uuid,
        event: PracticeEvent,
        mutate: &mut dyn FnMut(&mut VocabularyEntry),
    ) -> Result<VocabularyEntry, EngineError> {
        let mut shelves = self.lock();
        if !shelves
            .entries
            .get(&id)
            .is_some_and(|entry| entry.owner == owner)
        {
            return Err(EngineError::NotFound);
        }
        shelves.events.push(event);
        let entry = shelves
            .entries
            .get_mut(&id)
            .ok_or(EngineError::NotFound)?;
        mutate(entry);
        Ok(entry.clone())
    }

    fn events_for(&self, owner: Uuid, id: Uuid) -> Result<Vec<PracticeEvent>, EngineError> {
        let shelves = self.lock();
        Ok(shelves
            .events
            .iter()
            .filter(|event| event.owner == owner && event.vocabulary_id == id)
            .cloned()
            .collect())
    }

    fn insert_session(&self, session: StudySession) -> Result<StudySession, EngineError> {
        let mut shelves = self.lock();
        shelves.sessions.push(session.clone());
        Ok(session)
    }

    fn sessions(&self, owner: Uuid, limit: usize) -> Result<Vec<StudySession>, EngineError> {
        let shelves = self.lock();
        let mut matched: Vec<StudySession> = shelves
            .sessions
            .iter()
            .filter(|session| session.owner == owner)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        matched.truncate(limit);
        Ok(matched)
    }

    fn tag_index(&self, owner: Uuid) -> Result<Vec<String>, EngineError> {
        let shelves = self.lock();
        let mut tags: Vec<String> = shelves
            .entries
            .values()
            .filter(|entry| entry.owner == owner)
            .flat_map(|entry| entry.tags.iter().cloned())
            .collect();
        tags.sort();
        tags.dedup();
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewEntry;

    fn seed(store: &MemoryStore, owner: Uuid, word: &str, language: &str) -> VocabularyEntry {
        let entry = NewEntry {
            word: word.into(),
            translation: format!("{word} translated"),
            language: language.into(),
            tags: vec!["seeded".into()],
            ..Default::default()
        }
        .into_entry(owner, Utc::now())
        .unwrap();
        store.insert_entry(entry).unwrap()
    }

    #[test]
    fn duplicate_words_are_rejected_per_language() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        seed(&store, owner, "perro", "spanish");
        let duplicate = NewEntry {
            word: "Perro".into(),
            translation: "dog".into(),
            language: "Spanish".into(),
            ..Default::default()
        }
        .into_entry(owner, Utc::now())
        .unwrap();
        assert!(matches!(
            store.insert_entry(duplicate),
            Err(EngineError::InvalidArgument(_))
        ));

        // Same word in a different language is fine.
        seed(&store, owner, "perro", "portuguese");
    }

    #[test]
    fn entries_are_partitioned_by_owner() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let entry = seed(&store, alice, "gato", "spanish");
        seed(&store, bob, "chat", "french");

        assert!(matches!(
            store.entry(bob, entry.id),
            Err(EngineError::NotFound)
        ));
        assert_eq!(store.entries(alice, &EntryFilter::all()).unwrap().len(), 1);
        assert!(matches!(
            store.delete_entry(bob, entry.id),
            Err(EngineError::NotFound)
        ));
    }

    #[test]
    fn filters_narrow_by_language_strength_and_tag() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        seed(&store, owner, "gato", "spanish");
        seed(&store, owner, "chat", "french");

        let filter = EntryFilter {
            language: Some("french".into()),
            ..EntryFilter::default()
        };
        let found = store.entries(owner, &filter).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].word, "chat");

        let filter = EntryFilter {
            strength: Some(Strength::Mastered),
            ..EntryFilter::default()
        };
        assert!(store.entries(owner, &filter).unwrap().is_empty());

        let filter = EntryFilter {
            tag: Some("seeded".into()),
            ..EntryFilter::default()
        };
        assert_eq!(store.entries(owner, &filter).unwrap().len(), 2);
    }

    #[test]
    fn deleting_an_entry_cascades_to_its_events_only() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let doomed = seed(&store, alice, "gato", "spanish");
        let kept = seed(&store, alice, "perro", "spanish");
        let bobs = seed(&store, bob, "chat", "french");

        for entry in [&doomed, &kept] {
            crate::practice::record_practice(&store, alice, entry.id, true, None, Utc::now())
                .unwrap();
        }
        crate::practice::record_practice(&store, bob, bobs.id, true, None, Utc::now()).unwrap();

        store.delete_entry(alice, doomed.id).unwrap();

        assert!(store.events_for(alice, doomed.id).unwrap().is_empty());
        assert_eq!(store.events_for(alice, kept.id).unwrap().len(), 1);
        assert_eq!(store.events_for(bob, bobs.id).unwrap().len(), 1);
        assert_eq!(store.entries(bob, &EntryFilter::all()).unwrap().len(), 1);
    }

    #[test]
    fn tag_index_is_sorted_and_distinct() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        seed(&store, owner, "gato", "spanish");
        seed(&store, owner, "perro", "spanish");
        assert_eq!(store.tag_index(owner).unwrap(), vec!["seeded".to_string()]);
    }
}
