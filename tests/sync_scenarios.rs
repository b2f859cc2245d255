/// Roll log convergence scenarios
///
/// Exercises the store, merge and reducer through the public API only.
use rand::seq::SliceRandom;
use rand::Rng;
use rollsync::event::{merge_events, Event, EventId, GameSource, LocalClock, Share, Source};
use rollsync::store::{Action, EventStore};
use rollsync::stream::BackoffSchedule;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

fn local_roll(id: EventId, title: &str, dice: Vec<u8>) -> Event {
    Event::Roll {
        id,
        edit: None,
        source: Source::Local,
        title: title.to_string(),
        dice,
        glitchy: 0,
    }
}

fn game_roll(id: EventId, title: &str) -> Event {
    Event::Roll {
        id,
        edit: None,
        source: Source::Game(GameSource {
            id: "p2".to_string(),
            name: "Bo".to_string(),
            share: Share::InGame,
        }),
        title: title.to_string(),
        dice: vec![4, 5],
        glitchy: 0,
    }
}

/// Random descending log with unique ids, a mix of local and game events
fn random_log(rng: &mut impl Rng, max_len: usize) -> Vec<Event> {
    let len = rng.gen_range(0..=max_len);
    let ids: BTreeSet<EventId> = (0..len).map(|_| rng.gen_range(1..200)).collect();
    ids.into_iter()
        .rev()
        .map(|id| {
            if rng.gen_bool(0.5) {
                local_roll(id, "local", vec![1])
            } else {
                game_roll(id, "game")
            }
        })
        .collect()
}

fn ids(events: &[Event]) -> Vec<EventId> {
    events.iter().map(Event::id).collect()
}

fn store() -> EventStore {
    EventStore::new(Arc::new(LocalClock::with_time_source(|| 1_000)))
}

#[test]
fn test_end_to_end_local_copy_replaced_by_incoming() {
    let store = store();
    store.dispatch(Action::NewEvent {
        event: local_roll(100, "original", vec![6, 6, 1]),
    });
    store.dispatch(Action::MergeEvents {
        events: vec![
            local_roll(100, "edited", vec![6, 6, 1]),
            local_roll(90, "older", vec![2]),
        ],
    });

    let state = store.snapshot();
    assert_eq!(ids(&state.events), vec![100, 90]);
    assert_eq!(state.events[0].title(), Some("edited"));
}

#[test]
fn test_merge_is_idempotent() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let log = random_log(&mut rng, 30);
        assert_eq!(merge_events(log.clone(), log.clone()), log);
    }
}

#[test]
fn test_merge_preserves_order_and_counts_shared_ids() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let a = random_log(&mut rng, 20);
        let b = random_log(&mut rng, 20);
        let merged = merge_events(a.clone(), b.clone());

        let merged_ids = ids(&merged);
        assert!(merged_ids.windows(2).all(|pair| pair[0] > pair[1]));

        let a_ids: BTreeSet<_> = ids(&a).into_iter().collect();
        let b_ids: BTreeSet<_> = ids(&b).into_iter().collect();
        let shared = a_ids.intersection(&b_ids).count();
        assert_eq!(merged.len(), a.len() + b.len() - shared);

        // The incoming copy wins every shared id
        for event in &merged {
            if b_ids.contains(&event.id()) {
                assert!(b.contains(event));
            }
        }
    }
}

#[test]
fn test_merge_tie_break_prefers_incoming() {
    let merged = merge_events(vec![game_roll(5, "x")], vec![game_roll(5, "y")]);
    assert_eq!(merged, vec![game_roll(5, "y")]);
}

#[test]
fn test_clear_events_keeps_local_subsequence() {
    let mut rng = rand::thread_rng();
    for _ in 0..50 {
        let store = store();
        let mut log = random_log(&mut rng, 25);
        let expected: Vec<Event> = log.iter().filter(|e| e.is_local()).cloned().collect();

        // Delivery order does not matter
        log.shuffle(&mut rng);
        for event in log {
            store.dispatch(Action::NewEvent { event });
        }
        store.dispatch(Action::ClearEvents);

        assert_eq!(store.snapshot().events, expected);
    }
}

#[test]
fn test_reroll_transform() {
    let store = store();
    store.dispatch(Action::NewEvent {
        event: local_roll(1, "shoot", vec![1, 1, 6]),
    });
    store.dispatch(Action::Reroll {
        id: 1,
        edit: 2,
        reroll: vec![6, 6],
    });

    match &store.snapshot().events[0] {
        Event::RerollFailures {
            id,
            roll_id,
            rounds,
            ..
        } => {
            assert_eq!((*id, *roll_id), (1, 1));
            assert_eq!(rounds, &vec![vec![6, 6], vec![1, 1, 6]]);
        }
        other => panic!("expected rerollFailures, got {:?}", other),
    }
}

#[test]
fn test_backoff_schedule() {
    let schedule = BackoffSchedule::default();
    let expected = [2, 2, 4, 4, 8, 8, 16, 16];
    for (retries, secs) in expected.iter().enumerate() {
        assert_eq!(schedule.delay(retries as u32), Duration::from_secs(*secs));
    }
    for retries in 8..20 {
        assert_eq!(schedule.delay(retries), Duration::from_secs(32));
    }
}

#[test]
fn test_local_ids_stay_unique_within_one_millisecond() {
    let store = store();
    for _ in 0..5 {
        store.dispatch(Action::NewEvent {
            event: local_roll(0, "fast", vec![3]),
        });
    }
    assert_eq!(
        ids(&store.snapshot().events),
        vec![1_004, 1_003, 1_002, 1_001, 1_000]
    );
}
