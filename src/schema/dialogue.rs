use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A narrator audio clip attached to a dialogue line.
///
/// The engine never decodes audio; `length` is the authored clip length in
/// seconds and only feeds line timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    pub id: String,
    pub length: f32,
}

/// Timing knobs for narrator playback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DialogueTiming {
    /// Seconds a line stays up when it has neither audio nor an override.
    pub default_delay: f32,
    /// Seconds of silence appended after an audio clip finishes.
    pub post_clip_gap: f32,
}

impl Default for DialogueTiming {
    fn default() -> Self {
        Self {
            default_delay: 2.0,
            post_clip_gap: 0.25,
        }
    }
}

/// One narrator line. Immutable once authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub text: String,
    #[serde(default)]
    pub audio: Option<AudioClip>,
    /// Overrides every other timing source when set.
    #[serde(default)]
    pub duration: Option<f32>,
}

impl DialogueLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            audio: None,
            duration: None,
        }
    }

    /// How long this line stays on screen.
    ///
    /// Override duration wins, then clip length plus the post-clip gap,
    /// then the default delay.
    pub fn display_time(&self, timing: &DialogueTiming) -> Duration {
        let secs = match (self.duration, &self.audio) {
            (Some(d), _) => d,
            (None, Some(clip)) => clip.length + timing.post_clip_gap,
            (None, None) => timing.default_delay,
        };
        seconds(secs)
    }
}

/// An ordered narrator script, always played from its first line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialogueScript {
    pub lines: Vec<DialogueLine>,
}

impl DialogueScript {
    pub fn new(lines: Vec<DialogueLine>) -> Self {
        Self { lines }
    }

    /// Build a script of plain text lines using default timing.
    pub fn from_text(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| DialogueLine::new(*l)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Total playback time of the script.
    pub fn total_time(&self, timing: &DialogueTiming) -> Duration {
        self.lines.iter().map(|l| l.display_time(timing)).sum()
    }
}

/// Convert authored seconds to a `Duration`, clamping negative or
/// non-finite values to zero.
pub fn seconds(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs).unwrap_or(Duration::ZERO)
}
