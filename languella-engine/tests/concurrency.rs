//! Lost-update tests: concurrent practice calls on one entry must each
//! land exactly once.

use chrono::Utc;
use languella_engine::practice::record_practice;
use languella_engine::store::{MemoryStore, VocabularyStore};
use languella_engine::{NewEntry, Strength};
use uuid::Uuid;

fn seeded_entry(store: &MemoryStore, owner: Uuid) -> languella_engine::VocabularyEntry {
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
fn fifty_concurrent_correct_answers_count_exactly_fifty() {
    const CALLERS: usize = 50;

    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let entry = seeded_entry(&store, owner);

    std::thread::scope(|scope| {
        for _ in 0..CALLERS {
            scope.spawn(|| {
                record_practice(&store, owner, entry.id, true, None, Utc::now()).unwrap();
            });
        }
    });

    let final_entry = store.entry(owner, entry.id).unwrap();
    assert_eq!(final_entry.times_practiced, CALLERS as u32);
    assert_eq!(store.events_for(owner, entry.id).unwrap().len(), CALLERS);
    // Fifty correct answers from `new` always end at mastered.
    assert_eq!(final_entry.strength, Strength::Mastered);
    assert!(final_entry.last_practiced_at.is_some());
}

#[test]
fn mixed_outcomes_under_concurrency_stay_within_the_state_machine() {
    const CALLERS: usize = 40;

    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let entry = seeded_entry(&store, owner);

    let store_ref = &store;
    let entry_id = entry.id;
    std::thread::scope(|scope| {
        for i in 0..CALLERS {
            let correct = i % 3 != 0;
            scope.spawn(move || {
                record_practice(store_ref, owner, entry_id, correct, Some(2), Utc::now()).unwrap();
            });
        }
    });

    let final_entry = store.entry(owner, entry.id).unwrap();
    assert_eq!(final_entry.times_practiced, CALLERS as u32);
    assert!(matches!(
        final_entry.strength,
        Strength::New | Strength::Learning | Strength::Known | Strength::Mastered
    ));
}
