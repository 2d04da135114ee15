/// Stage definitions — the per-stage transition tables, loaded from RON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::dialogue::{seconds, DialogueScript};
use super::event::StageEvent;

/// Matches any state in a transition's `from` list.
pub const ANY_STATE: &str = "*";

#[derive(Debug, Error)]
pub enum StageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("stage '{0}' declares no states")]
    NoStates(String),
    #[error("stage '{stage}': unknown state '{state}'")]
    UnknownState { stage: String, state: String },
    #[error("stage '{stage}': unknown script '{script}'")]
    UnknownScript { stage: String, script: String },
    #[error("stage '{stage}': unknown timer '{timer}'")]
    UnknownTimer { stage: String, timer: String },
    #[error("stage '{stage}': unknown counter '{counter}'")]
    UnknownCounter { stage: String, counter: String },
}

/// Player-selected difficulty for stages that ship two variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    #[default]
    Easy,
    Hard,
}

impl Difficulty {
    /// Suffix used to look up a difficulty-specific stage id (`"minesweeper.hard"`).
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Hard => "hard",
        }
    }
}

/// Which events a transition listens for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPattern {
    DialogueFinished,
    Timer(String),
    Action(String),
    Signal(String),
}

impl EventPattern {
    pub fn matches(&self, event: &StageEvent) -> bool {
        match (self, event) {
            (Self::DialogueFinished, StageEvent::DialogueFinished) => true,
            (Self::Timer(a), StageEvent::TimerExpired(b)) => a == b,
            (Self::Action(a), StageEvent::PlayerAction(b)) => a == b,
            (Self::Signal(a), StageEvent::ExternalSignal(b)) => a == b,
            _ => false,
        }
    }
}

/// Counter threshold gating a transition. Guards read counters as they
/// stand before the transition's own effects run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Guard {
    #[default]
    Always,
    CountEquals(String, u32),
    CountAtLeast(String, u32),
    CountBelow(String, u32),
}

impl Guard {
    pub fn holds(&self, count_of: impl Fn(&str) -> u32) -> bool {
        match self {
            Self::Always => true,
            Self::CountEquals(c, n) => count_of(c) == *n,
            Self::CountAtLeast(c, n) => count_of(c) >= *n,
            Self::CountBelow(c, n) => count_of(c) < *n,
        }
    }

    fn counter(&self) -> Option<&str> {
        match self {
            Self::Always => None,
            Self::CountEquals(c, _) | Self::CountAtLeast(c, _) | Self::CountBelow(c, _) => {
                Some(c)
            }
        }
    }
}

/// A side effect attached to a transition or to stage entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Play a named script on the narrator.
    Play(String),
    /// Play `scripts[count - 1]` for the counter's current value, or
    /// `fallback` once the count runs past the list (or is still zero).
    PlayNth {
        counter: String,
        scripts: Vec<String>,
        fallback: String,
    },
    Show(String),
    Hide(String),
    EnableInput(String),
    DisableInput(String),
    /// Arm a named timer, replacing whatever timer was armed.
    StartTimer(String),
    CancelTimer,
    Increment(String),
    /// Hand a named command to the host (e.g. "new_board", "shake_doll").
    Command(String),
    /// Ask the stage manager to rerun this stage from scratch.
    Restart,
}

/// One row of a stage's transition table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// States this row applies in; `"*"` matches any state.
    pub from: Vec<String>,
    pub on: EventPattern,
    #[serde(default)]
    pub guard: Guard,
    /// `None` keeps the current state.
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl Transition {
    pub fn applies_in(&self, state: &str) -> bool {
        self.from.iter().any(|s| s == state || s == ANY_STATE)
    }
}

/// A counter the stage keeps per activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSpec {
    pub name: String,
    #[serde(default = "default_counter_max")]
    pub max: u32,
}

fn default_counter_max() -> u32 {
    u32::MAX
}

/// A complete stage: its states, dialogue, timers, counters, and table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub id: String,
    /// Presentation element shown while the stage is active.
    pub panel: String,
    pub states: Vec<String>,
    pub initial: String,
    /// Entering this state completes the stage.
    #[serde(default)]
    pub terminal: Option<String>,
    #[serde(default)]
    pub counters: Vec<CounterSpec>,
    /// Timer name to delay in seconds.
    #[serde(default)]
    pub timers: HashMap<String, f32>,
    #[serde(default)]
    pub scripts: HashMap<String, DialogueScript>,
    /// Effects applied on every activation, after the reset.
    #[serde(default)]
    pub on_enter: Vec<Effect>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

impl StageDefinition {
    /// Load and validate a stage definition from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<StageDefinition, StageError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse and validate a stage definition from a RON string.
    pub fn parse_ron(input: &str) -> Result<StageDefinition, StageError> {
        let def: StageDefinition = ron::from_str(input)?;
        def.validate()?;
        Ok(def)
    }

    pub fn has_state(&self, state: &str) -> bool {
        self.states.iter().any(|s| s == state)
    }

    pub fn is_terminal(&self, state: &str) -> bool {
        self.terminal.as_deref() == Some(state)
    }

    pub fn timer_delay(&self, name: &str) -> Option<Duration> {
        self.timers.get(name).map(|secs| seconds(*secs))
    }

    pub fn counter_max(&self, name: &str) -> Option<u32> {
        self.counters.iter().find(|c| c.name == name).map(|c| c.max)
    }

    /// The first row matching `(state, event)` whose guard holds.
    pub fn find_transition(
        &self,
        state: &str,
        event: &StageEvent,
        count_of: impl Fn(&str) -> u32,
    ) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|t| t.applies_in(state) && t.on.matches(event) && t.guard.holds(&count_of))
    }

    /// Check every name the table refers to.
    pub fn validate(&self) -> Result<(), StageError> {
        if self.states.is_empty() {
            return Err(StageError::NoStates(self.id.clone()));
        }
        self.check_state(&self.initial)?;
        if let Some(ref terminal) = self.terminal {
            self.check_state(terminal)?;
        }

        for effect in &self.on_enter {
            self.check_effect(effect)?;
        }

        for t in &self.transitions {
            for from in &t.from {
                if from != ANY_STATE {
                    self.check_state(from)?;
                }
            }
            if let Some(ref to) = t.to {
                self.check_state(to)?;
            }
            if let EventPattern::Timer(ref name) = t.on {
                self.check_timer(name)?;
            }
            if let Some(counter) = t.guard.counter() {
                self.check_counter(counter)?;
            }
            for effect in &t.effects {
                self.check_effect(effect)?;
            }
        }

        Ok(())
    }

    fn check_state(&self, state: &str) -> Result<(), StageError> {
        if self.has_state(state) {
            Ok(())
        } else {
            Err(StageError::UnknownState {
                stage: self.id.clone(),
                state: state.to_string(),
            })
        }
    }

    fn check_script(&self, script: &str) -> Result<(), StageError> {
        if self.scripts.contains_key(script) {
            Ok(())
        } else {
            Err(StageError::UnknownScript {
                stage: self.id.clone(),
                script: script.to_string(),
            })
        }
    }

    fn check_timer(&self, timer: &str) -> Result<(), StageError> {
        if self.timers.contains_key(timer) {
            Ok(())
        } else {
            Err(StageError::UnknownTimer {
                stage: self.id.clone(),
                timer: timer.to_string(),
            })
        }
    }

    fn check_counter(&self, counter: &str) -> Result<(), StageError> {
        if self.counter_max(counter).is_some() {
            Ok(())
        } else {
            Err(StageError::UnknownCounter {
                stage: self.id.clone(),
                counter: counter.to_string(),
            })
        }
    }

    fn check_effect(&self, effect: &Effect) -> Result<(), StageError> {
        match effect {
            Effect::Play(script) => self.check_script(script),
            Effect::PlayNth {
                counter,
                scripts,
                fallback,
            } => {
                self.check_counter(counter)?;
                for script in scripts {
                    self.check_script(script)?;
                }
                self.check_script(fallback)
            }
            Effect::StartTimer(timer) => self.check_timer(timer),
            Effect::Increment(counter) => self.check_counter(counter),
            Effect::Show(_)
            | Effect::Hide(_)
            | Effect::EnableInput(_)
            | Effect::DisableInput(_)
            | Effect::CancelTimer
            | Effect::Command(_)
            | Effect::Restart => Ok(()),
        }
    }
}
