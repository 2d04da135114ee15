/// Stage sequencer — one running instance of a table-driven stage.
///
/// The sequencer owns the state, counters, and armed timer of a single
/// activation. It never touches collaborators directly; every reaction is
/// returned as a list of resolved [`Directive`]s for the runtime to carry out.

use rustc_hash::FxHashMap;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::scheduler::{InstanceId, TimerToken};
use crate::schema::event::StageEvent;
use crate::schema::stage::{Effect, StageDefinition};

/// A side effect with every name already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Play(String),
    StartTimer { token: TimerToken, delay: Duration },
    CancelTimer(TimerToken),
    Show(String),
    Hide(String),
    SetInput { surface: String, enabled: bool },
    Command(String),
    Restart,
    /// The terminal state was reached.
    Complete,
}

#[derive(Debug, Clone)]
struct ArmedTimer {
    name: String,
    token: TimerToken,
}

#[derive(Debug, Clone)]
pub struct Sequencer {
    instance: InstanceId,
    definition: Rc<StageDefinition>,
    state: String,
    counters: FxHashMap<String, u32>,
    armed: Option<ArmedTimer>,
    next_seq: u64,
    detached: bool,
}

impl Sequencer {
    pub fn new(instance: InstanceId, definition: Rc<StageDefinition>) -> Self {
        let state = definition.initial.clone();
        Self {
            instance,
            definition,
            state,
            counters: FxHashMap::default(),
            armed: None,
            next_seq: 0,
            detached: true,
        }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn definition(&self) -> &StageDefinition {
        &self.definition
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn counter(&self, name: &str) -> u32 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Name of the timer currently armed, if any.
    pub fn armed_timer(&self) -> Option<&str> {
        self.armed.as_ref().map(|a| a.name.as_str())
    }

    /// True once the stage completed or was deactivated.
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Reset to the initial state and run the entry effects.
    pub fn activate(&mut self) -> Vec<Directive> {
        let mut out = Vec::new();
        self.disarm(&mut out);
        self.counters = self
            .definition
            .counters
            .iter()
            .map(|c| (c.name.clone(), 0))
            .collect();
        self.state = self.definition.initial.clone();
        self.detached = false;

        debug!(stage = %self.definition.id, instance = %self.instance, state = %self.state, "stage_reset");

        let definition = Rc::clone(&self.definition);
        for effect in &definition.on_enter {
            self.apply(effect, &mut out);
        }
        self.check_terminal(&mut out);
        out
    }

    /// Cancel the armed timer and stop reacting to events.
    pub fn deactivate(&mut self) -> Vec<Directive> {
        let mut out = Vec::new();
        self.disarm(&mut out);
        self.detached = true;
        out
    }

    /// React to one event. Events with no matching row are ignored.
    pub fn handle(&mut self, event: &StageEvent) -> Vec<Directive> {
        let mut out = Vec::new();
        if self.detached {
            debug!(stage = %self.definition.id, event = %event, "event_after_detach");
            return out;
        }

        let definition = Rc::clone(&self.definition);
        let counters = &self.counters;
        let transition = match definition.find_transition(&self.state, event, |name| {
            counters.get(name).copied().unwrap_or(0)
        }) {
            Some(t) => t,
            None => {
                debug!(stage = %definition.id, state = %self.state, event = %event, "event_ignored");
                return out;
            }
        };

        if let Some(ref next) = transition.to {
            if *next != self.state {
                debug!(stage = %definition.id, from = %self.state, to = %next, event = %event, "transition");
                self.disarm(&mut out);
                self.state = next.clone();
            }
        }

        for effect in &transition.effects {
            self.apply(effect, &mut out);
        }
        self.check_terminal(&mut out);
        out
    }

    /// A scheduler fire. Only the currently armed token counts; anything
    /// else was cancelled and is dropped.
    pub fn timer_fired(&mut self, token: TimerToken) -> Vec<Directive> {
        match self.armed.take() {
            Some(armed) if armed.token == token => {
                self.handle(&StageEvent::TimerExpired(armed.name))
            }
            other => {
                self.armed = other;
                debug!(stage = %self.definition.id, seq = token.seq, "stale_timer_dropped");
                Vec::new()
            }
        }
    }

    fn apply(&mut self, effect: &Effect, out: &mut Vec<Directive>) {
        match effect {
            Effect::Play(script) => out.push(Directive::Play(script.clone())),
            Effect::PlayNth {
                counter,
                scripts,
                fallback,
            } => {
                let count = self.counter(counter) as usize;
                let script = count
                    .checked_sub(1)
                    .and_then(|i| scripts.get(i))
                    .unwrap_or(fallback);
                out.push(Directive::Play(script.clone()));
            }
            Effect::Show(element) => out.push(Directive::Show(element.clone())),
            Effect::Hide(element) => out.push(Directive::Hide(element.clone())),
            Effect::EnableInput(surface) => out.push(Directive::SetInput {
                surface: surface.clone(),
                enabled: true,
            }),
            Effect::DisableInput(surface) => out.push(Directive::SetInput {
                surface: surface.clone(),
                enabled: false,
            }),
            Effect::StartTimer(name) => {
                let delay = match self.definition.timer_delay(name) {
                    Some(d) => d,
                    None => {
                        warn!(stage = %self.definition.id, timer = %name, "unknown_timer");
                        return;
                    }
                };
                self.disarm(out);
                let token = TimerToken {
                    instance: self.instance,
                    seq: self.next_seq,
                };
                self.next_seq += 1;
                self.armed = Some(ArmedTimer {
                    name: name.clone(),
                    token,
                });
                out.push(Directive::StartTimer { token, delay });
            }
            Effect::CancelTimer => self.disarm(out),
            Effect::Increment(name) => {
                let max = self.definition.counter_max(name).unwrap_or(u32::MAX);
                let value = self.counters.entry(name.clone()).or_insert(0);
                *value = value.saturating_add(1).min(max);
            }
            Effect::Command(name) => out.push(Directive::Command(name.clone())),
            Effect::Restart => out.push(Directive::Restart),
        }
    }

    fn disarm(&mut self, out: &mut Vec<Directive>) {
        if let Some(armed) = self.armed.take() {
            out.push(Directive::CancelTimer(armed.token));
        }
    }

    fn check_terminal(&mut self, out: &mut Vec<Directive>) {
        if !self.detached && self.definition.is_terminal(&self.state) {
            self.disarm(out);
            self.detached = true;
            out.push(Directive::Complete);
        }
    }
}
