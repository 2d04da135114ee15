/// Sequencer integration tests — stage table behaviour loaded from a fixture.

use stage_narrator::core::scheduler::{InstanceId, TimerToken};
use stage_narrator::core::sequencer::{Directive, Sequencer};
use stage_narrator::schema::event::StageEvent;
use stage_narrator::schema::stage::StageDefinition;
use std::rc::Rc;

fn fixture() -> Rc<StageDefinition> {
    let path = std::path::Path::new("tests/fixtures/confirm_stage.ron");
    Rc::new(StageDefinition::load_from_ron(path).unwrap())
}

fn started() -> Sequencer {
    let mut s = Sequencer::new(InstanceId(1), fixture());
    s.activate();
    s
}

fn spoiler_token(out: &[Directive]) -> TimerToken {
    out.iter()
        .find_map(|d| match d {
            Directive::StartTimer { token, .. } => Some(*token),
            _ => None,
        })
        .unwrap()
}

fn played(out: &[Directive]) -> Vec<String> {
    out.iter()
        .filter_map(|d| match d {
            Directive::Play(name) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn confirm_scenario() {
    let mut s = started();

    // Confirm during the opening is ignored
    assert!(s.handle(&StageEvent::action("confirm")).is_empty());
    assert_eq!(s.state(), "Opening");

    s.handle(&StageEvent::DialogueFinished);
    assert_eq!(s.state(), "Waiting");

    let out = s.handle(&StageEvent::action("confirm"));
    assert_eq!(s.state(), "Success");
    assert_eq!(out.last(), Some(&Directive::Complete));
    assert!(s.is_detached());
}

#[test]
fn activation_resets_after_any_outcome() {
    let mut s = started();
    s.handle(&StageEvent::DialogueFinished);
    s.handle(&StageEvent::action("cancel"));
    s.handle(&StageEvent::action("cancel"));
    s.handle(&StageEvent::action("confirm"));
    assert_eq!(s.state(), "Success");

    let out = s.activate();
    assert_eq!(s.state(), "Opening");
    assert_eq!(s.counter("wrong"), 0);
    assert!(s.armed_timer().is_none());
    assert_eq!(played(&out), vec!["opening"]);

    // Mid-run reset with a timer armed
    let token = spoiler_token(&s.handle(&StageEvent::DialogueFinished));
    let out = s.activate();
    assert_eq!(out[0], Directive::CancelTimer(token));
    assert_eq!(s.state(), "Opening");
}

#[test]
fn unmatched_events_change_nothing() {
    let def = fixture();
    let events = vec![
        StageEvent::DialogueFinished,
        StageEvent::TimerExpired("spoiler".to_string()),
        StageEvent::TimerExpired("other".to_string()),
        StageEvent::action("confirm"),
        StageEvent::action("jump"),
        StageEvent::signal("bomb_hit"),
    ];

    // Drive into each non-terminal state and throw every unmatched event at it
    let setups: Vec<Vec<StageEvent>> = vec![
        vec![],
        vec![StageEvent::DialogueFinished],
        vec![
            StageEvent::DialogueFinished,
            StageEvent::TimerExpired("spoiler".to_string()),
        ],
    ];

    for setup in setups {
        for event in &events {
            let mut s = started();
            for e in &setup {
                if let StageEvent::TimerExpired(_) = e {
                    // reach Hint through the armed token
                    let token = TimerToken {
                        instance: InstanceId(1),
                        seq: 0,
                    };
                    s.timer_fired(token);
                } else {
                    s.handle(e);
                }
            }
            let state = s.state().to_string();
            let wrong = s.counter("wrong");
            let armed = s.armed_timer().map(str::to_string);

            if def
                .find_transition(&state, event, |name| s.counter(name))
                .is_some()
            {
                continue;
            }
            assert!(s.handle(event).is_empty(), "{} in {}", event, state);
            assert_eq!(s.state(), state);
            assert_eq!(s.counter("wrong"), wrong);
            assert_eq!(s.armed_timer().map(str::to_string), armed);
        }
    }
}

#[test]
fn action_beats_spoiler() {
    let mut s = started();
    let token = spoiler_token(&s.handle(&StageEvent::DialogueFinished));

    let out = s.handle(&StageEvent::action("confirm"));
    assert!(out.contains(&Directive::CancelTimer(token)));
    assert!(played(&out).is_empty());

    // The cancelled fire arrives late and is dropped
    assert!(s.timer_fired(token).is_empty());
    assert_eq!(s.state(), "Success");
}

#[test]
fn spoiler_beats_action_then_converges() {
    let mut s = started();
    let token = spoiler_token(&s.handle(&StageEvent::DialogueFinished));

    let out = s.timer_fired(token);
    assert_eq!(played(&out), vec!["hint"]);
    assert_eq!(s.state(), "Hint");
    // A second delivery of the same token does nothing
    assert!(s.timer_fired(token).is_empty());

    let out = s.handle(&StageEvent::action("confirm"));
    assert_eq!(out, vec![Directive::Complete]);
    assert_eq!(s.state(), "Success");
}

#[test]
fn wrong_presses_escalate_without_state_change() {
    let mut s = started();
    s.handle(&StageEvent::DialogueFinished);

    let mut scripts = Vec::new();
    let mut last = 0;
    for _ in 0..5 {
        scripts.extend(played(&s.handle(&StageEvent::action("cancel"))));
        assert!(s.counter("wrong") > last);
        last = s.counter("wrong");
        assert_eq!(s.state(), "Waiting");
    }
    assert_eq!(
        scripts,
        vec!["wrong_1", "wrong_2", "wrong_3", "wrong_many", "wrong_many"]
    );
    // Staying in Waiting keeps the spoiler armed
    assert_eq!(s.armed_timer(), Some("spoiler"));
}
