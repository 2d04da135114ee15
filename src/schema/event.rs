use serde::{Deserialize, Serialize};
use std::fmt;

/// Something a stage can react to.
///
/// Events for one stage instance are delivered one at a time, in arrival
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageEvent {
    /// The narrator finished the script this stage asked for.
    DialogueFinished,
    /// A named timer armed by the stage ran out.
    TimerExpired(String),
    /// An already-decoded player action ("grab", "confirm", "click", ...).
    PlayerAction(String),
    /// A signal from a gameplay collaborator ("doll_dropped", "bomb_hit", ...).
    ExternalSignal(String),
}

impl StageEvent {
    pub fn action(kind: impl Into<String>) -> Self {
        Self::PlayerAction(kind.into())
    }

    pub fn signal(kind: impl Into<String>) -> Self {
        Self::ExternalSignal(kind.into())
    }
}

impl fmt::Display for StageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DialogueFinished => write!(f, "dialogue_finished"),
            Self::TimerExpired(name) => write!(f, "timer:{}", name),
            Self::PlayerAction(kind) => write!(f, "action:{}", kind),
            Self::ExternalSignal(kind) => write!(f, "signal:{}", kind),
        }
    }
}

/// Semantic events from the physical-interaction collaborator.
///
/// Physics and pointer handling stay outside the crate; only these
/// discrete facts cross the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interaction {
    ObjectEnteredRegion { object: String, region: String },
    DragStarted { object: String },
    DragUpdated { object: String },
    DragEnded { object: String },
}

impl Interaction {
    /// The signal name a stage table matches against.
    pub fn signal_name(&self) -> String {
        match self {
            Self::ObjectEnteredRegion { object, region } => {
                format!("{}_entered_{}", object, region)
            }
            Self::DragStarted { object } => format!("drag_started:{}", object),
            Self::DragUpdated { object } => format!("drag_updated:{}", object),
            Self::DragEnded { object } => format!("drag_ended:{}", object),
        }
    }
}

impl From<Interaction> for StageEvent {
    fn from(interaction: Interaction) -> Self {
        StageEvent::ExternalSignal(interaction.signal_name())
    }
}
