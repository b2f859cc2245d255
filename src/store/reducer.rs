/// Event reducer - the only code that changes the roll log
///
/// `reduce` never fails. An action whose target is missing or of the wrong
/// kind is an invariant violation: it is logged and the state is returned
/// unchanged.
use crate::event::{is_descending, merge_events, sort_batch, Event, EventId, LocalClock, Source};
use crate::store::{Action, State};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Keys a diff may never overwrite; share changes go through `ModifyShare`
const PROTECTED_KEYS: [&str; 3] = ["id", "ty", "source"];

/// Apply one action to the state
pub fn reduce(mut state: State, action: Action, clock: &LocalClock) -> State {
    match action {
        Action::SetHistoryFetch { state: fetch } => {
            state.history_fetch = fetch;
        }
        Action::NewEvent { mut event } => {
            if event.id() == 0 {
                event.set_id(clock.next_id());
            } else if event.is_local() {
                clock.observe(event.id());
            }
            let events = std::mem::take(&mut state.events);
            state.events = merge_events(events, vec![event]);
        }
        Action::MergeEvents { events: batch } => {
            let batch = if is_descending(&batch) {
                batch
            } else {
                warn!("mergeEvents batch of {} was not newest-first; sorting", batch.len());
                sort_batch(batch)
            };
            let events = std::mem::take(&mut state.events);
            state.events = merge_events(events, batch);
        }
        Action::ClearEvents => {
            state.events.retain(Event::is_local);
        }
        Action::DeleteEvent { id } => {
            match position(&state.events, id) {
                Some(index) => {
                    state.events.remove(index);
                }
                None => debug!("deleteEvent: event {} is not in the log", id),
            }
            if state.editing.as_ref().map(Event::id) == Some(id) {
                state.editing = None;
            }
        }
        Action::ModifyEvent { id, edit, diff } => {
            modify_event(&mut state.events, id, edit, diff);
        }
        Action::ModifyShare { id, share } => match find_mut(&mut state.events, id) {
            Some(event) => match event.source_mut() {
                Source::Game(source) => source.share = share,
                Source::Local => invariant_violation(format!(
                    "modifyShare: event {} is local and has no share setting",
                    id
                )),
            },
            None => invariant_violation(format!("modifyShare: unknown event {}", id)),
        },
        Action::SeizeInitiative { id, edit } => match find_mut(&mut state.events, id) {
            Some(Event::Initiative {
                seized,
                edit: last_edit,
                ..
            }) => {
                *seized = true;
                *last_edit = Some(edit);
            }
            Some(other) => invariant_violation(format!(
                "seizeInitiative: event {} is a {}, not an initiative roll",
                id,
                other.kind()
            )),
            None => invariant_violation(format!("seizeInitiative: unknown event {}", id)),
        },
        Action::Reroll { id, edit, reroll } => match find_mut(&mut state.events, id) {
            Some(target) => match reroll_failures(target, edit, reroll) {
                Some(rerolled) => *target = rerolled,
                None => invariant_violation(format!(
                    "reroll: event {} is a {}, only plain rolls can be rerolled",
                    id,
                    target.kind()
                )),
            },
            None => invariant_violation(format!("reroll: unknown event {}", id)),
        },
        Action::SelectEdit { event } => {
            if event.is_dice_event() {
                state.editing = Some(event);
            } else {
                invariant_violation(format!("selectEdit: event {} cannot be edited", event.id()));
            }
        }
        Action::ClearEdit => {
            state.editing = None;
        }
        Action::ResetSession => {
            state = State::default();
        }
    }

    state
}

/// Index of `id` in a newest-first log
fn position(events: &[Event], id: EventId) -> Option<usize> {
    events.binary_search_by(|event| id.cmp(&event.id())).ok()
}

fn find_mut(events: &mut [Event], id: EventId) -> Option<&mut Event> {
    let index = position(events, id)?;
    events.get_mut(index)
}

/// Build the `RerollFailures` that replaces a rerolled `Roll`
fn reroll_failures(target: &Event, edit: EventId, reroll: Vec<u8>) -> Option<Event> {
    match target {
        Event::Roll {
            id,
            source,
            title,
            dice,
            glitchy,
            ..
        } => Some(Event::RerollFailures {
            id: *id,
            edit: Some(edit),
            source: source.clone(),
            roll_id: *id,
            title: title.clone(),
            rounds: vec![reroll, dice.clone()],
            glitchy: *glitchy,
        }),
        _ => None,
    }
}

fn modify_event(events: &mut [Event], id: EventId, edit: EventId, diff: Map<String, Value>) {
    let Some(target) = find_mut(events, id) else {
        invariant_violation(format!("modifyEvent: unknown event {}", id));
        return;
    };
    if !target.is_dice_event() {
        invariant_violation(format!("modifyEvent: event {} cannot be edited", id));
        return;
    }

    let mut fields = match serde_json::to_value(&*target) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) | Err(_) => {
            invariant_violation(format!("modifyEvent: event {} did not encode as an object", id));
            return;
        }
    };
    for (key, value) in diff {
        if PROTECTED_KEYS.contains(&key.as_str()) {
            warn!("modifyEvent: ignoring attempt to change `{}` of event {}", key, id);
            continue;
        }
        fields.insert(key, value);
    }

    match serde_json::from_value::<Event>(Value::Object(fields)) {
        Ok(modified) if modified.is_local() != target.is_local() => invariant_violation(format!(
            "modifyEvent: diff for event {} would move it between local and game",
            id
        )),
        Ok(mut modified) => {
            modified.set_edit(edit);
            *target = modified;
        }
        Err(e) => invariant_violation(format!("modifyEvent: diff for event {} rejected: {}", id, e)),
    }
}

/// Warn while developing, stay quiet in release builds
fn invariant_violation(message: String) {
    if cfg!(debug_assertions) {
        warn!("{}", message);
    } else {
        debug!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::fixtures::{game_roll, initiative, roll};
    use crate::event::Share;
    use crate::store::HistoryFetch;
    use serde_json::json;

    fn clock() -> LocalClock {
        LocalClock::with_time_source(|| 500)
    }

    fn state_with(events: Vec<Event>) -> State {
        State {
            events,
            ..State::default()
        }
    }

    fn apply(state: State, action: Action) -> State {
        reduce(state, action, &clock())
    }

    fn diff(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("diff must be an object"),
        }
    }

    #[test]
    fn test_new_event_assigns_missing_id() {
        let state = apply(State::default(), Action::NewEvent { event: roll(0, "fresh") });
        assert_eq!(state.events.len(), 1);
        assert_eq!(state.events[0].id(), 500);
    }

    #[test]
    fn test_new_event_keeps_descending_order() {
        let state = state_with(vec![roll(30, "c"), roll(10, "a")]);
        let state = apply(state, Action::NewEvent { event: roll(20, "b") });
        let ids: Vec<_> = state.events.iter().map(Event::id).collect();
        assert_eq!(ids, vec![30, 20, 10]);
    }

    #[test]
    fn test_merge_events_sorts_unordered_batch() {
        let state = state_with(vec![roll(5, "a")]);
        let state = apply(
            state,
            Action::MergeEvents {
                events: vec![game_roll(2, "x"), game_roll(9, "y")],
            },
        );
        let ids: Vec<_> = state.events.iter().map(Event::id).collect();
        assert_eq!(ids, vec![9, 5, 2]);
    }

    #[test]
    fn test_clear_events_keeps_local_subsequence() {
        let state = state_with(vec![
            game_roll(9, "g1"),
            roll(8, "l1"),
            game_roll(7, "g2"),
            roll(3, "l2"),
        ]);
        let state = apply(state, Action::ClearEvents);
        let ids: Vec<_> = state.events.iter().map(Event::id).collect();
        assert_eq!(ids, vec![8, 3]);
        assert!(state.events.iter().all(Event::is_local));
    }

    #[test]
    fn test_delete_missing_event_is_noop() {
        let state = state_with(vec![roll(5, "a")]);
        let before = state.clone();
        let state = apply(state, Action::DeleteEvent { id: 99 });
        assert_eq!(state, before);
    }

    #[test]
    fn test_delete_clears_matching_edit_selection() {
        let mut state = state_with(vec![roll(5, "a"), roll(4, "b")]);
        state.editing = Some(roll(5, "a"));
        let state = apply(state, Action::DeleteEvent { id: 5 });
        assert_eq!(state.events.len(), 1);
        assert!(state.editing.is_none());
    }

    #[test]
    fn test_modify_event_shallow_merges_and_stamps_edit() {
        let state = state_with(vec![game_roll(5, "before")]);
        let state = apply(
            state,
            Action::ModifyEvent {
                id: 5,
                edit: 77,
                diff: diff(json!({"title": "after", "glitchy": 2})),
            },
        );
        match &state.events[0] {
            Event::Roll { title, glitchy, edit, dice, .. } => {
                assert_eq!(title, "after");
                assert_eq!(*glitchy, 2);
                assert_eq!(*edit, Some(77));
                assert_eq!(dice, &vec![5, 2, 1]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_modify_event_cannot_change_identity() {
        let state = state_with(vec![game_roll(5, "a")]);
        let state = apply(
            state,
            Action::ModifyEvent {
                id: 5,
                edit: 6,
                diff: diff(json!({"id": 1, "ty": "initiative"})),
            },
        );
        assert_eq!(state.events[0].id(), 5);
        assert_eq!(state.events[0].kind(), "roll");
    }

    #[test]
    fn test_modify_event_cannot_relabel_source() {
        let state = state_with(vec![game_roll(20, "g"), roll(10, "l")]);
        let state = apply(
            state,
            Action::ModifyEvent {
                id: 20,
                edit: 21,
                diff: diff(json!({"source": "local", "title": "renamed"})),
            },
        );
        let state = apply(
            state,
            Action::ModifyEvent {
                id: 10,
                edit: 22,
                diff: diff(json!({"source": {"id": "p9", "name": "Mallory"}})),
            },
        );
        assert!(!state.events[0].is_local());
        assert_eq!(state.events[0].title(), Some("renamed"));
        assert!(state.events[1].is_local());

        let state = apply(state, Action::ClearEvents);
        let ids: Vec<_> = state.events.iter().map(Event::id).collect();
        assert_eq!(ids, vec![10]);
    }

    #[test]
    fn test_modify_event_rejects_invalid_diff() {
        let state = state_with(vec![game_roll(5, "a")]);
        let before = state.clone();
        let state = apply(
            state,
            Action::ModifyEvent {
                id: 5,
                edit: 6,
                diff: diff(json!({"dice": "not dice"})),
            },
        );
        assert_eq!(state, before);
    }

    #[test]
    fn test_modify_player_join_is_rejected() {
        let join = Event::PlayerJoin {
            id: 5,
            source: crate::event::fixtures::game_source("p1"),
        };
        let state = state_with(vec![join.clone()]);
        let state = apply(
            state,
            Action::ModifyEvent {
                id: 5,
                edit: 6,
                diff: diff(json!({"title": "x"})),
            },
        );
        assert_eq!(state.events, vec![join]);
    }

    #[test]
    fn test_modify_share_only_for_game_events() {
        let state = state_with(vec![game_roll(5, "g"), roll(4, "l")]);
        let state = apply(state, Action::ModifyShare { id: 5, share: Share::Private });
        let state = apply(state, Action::ModifyShare { id: 4, share: Share::Private });
        match state.events[0].source() {
            Source::Game(source) => assert_eq!(source.share, Share::Private),
            Source::Local => panic!("expected game source"),
        }
        assert_eq!(state.events[1].source(), &Source::Local);
    }

    #[test]
    fn test_seize_initiative() {
        let state = state_with(vec![initiative(5), game_roll(4, "r")]);
        let state = apply(state, Action::SeizeInitiative { id: 5, edit: 50 });
        let state = apply(state, Action::SeizeInitiative { id: 4, edit: 51 });
        match &state.events[0] {
            Event::Initiative { seized, edit, .. } => {
                assert!(*seized);
                assert_eq!(*edit, Some(50));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(state.events[1].edit(), None);
    }

    #[test]
    fn test_reroll_transforms_roll() {
        let original = Event::Roll {
            id: 1,
            edit: None,
            source: Source::Local,
            title: "shoot".to_string(),
            dice: vec![1, 1, 6],
            glitchy: 1,
        };
        let state = state_with(vec![original]);
        let state = apply(
            state,
            Action::Reroll {
                id: 1,
                edit: 2,
                reroll: vec![6, 6],
            },
        );
        assert_eq!(
            state.events[0],
            Event::RerollFailures {
                id: 1,
                edit: Some(2),
                source: Source::Local,
                roll_id: 1,
                title: "shoot".to_string(),
                rounds: vec![vec![6, 6], vec![1, 1, 6]],
                glitchy: 1,
            }
        );
    }

    #[test]
    fn test_reroll_of_initiative_is_rejected() {
        let state = state_with(vec![initiative(5)]);
        let before = state.clone();
        let state = apply(
            state,
            Action::Reroll {
                id: 5,
                edit: 6,
                reroll: vec![6],
            },
        );
        assert_eq!(state, before);
    }

    #[test]
    fn test_select_and_clear_edit() {
        let state = apply(State::default(), Action::SelectEdit { event: roll(3, "x") });
        assert_eq!(state.editing.as_ref().map(Event::id), Some(3));
        let state = apply(state, Action::ClearEdit);
        assert!(state.editing.is_none());
    }

    #[test]
    fn test_reset_session_returns_initial_state() {
        let mut state = state_with(vec![roll(3, "x")]);
        state.history_fetch = HistoryFetch::Finished;
        let state = apply(state, Action::ResetSession);
        assert_eq!(state, State::default());
    }
}
