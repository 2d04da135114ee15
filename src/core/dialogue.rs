/// Dialogue player — the narrator. Plays one script at a time, line by
/// line, and reports when a script runs to completion.

use rustc_hash::FxHashSet;
use std::time::Duration;
use tracing::debug;

use crate::core::scheduler::InstanceId;
use crate::core::surface::{AudioOutput, Presentation};
use crate::schema::dialogue::{DialogueLine, DialogueScript, DialogueTiming};

/// Emitted once when a script plays through its last line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogueFinished {
    /// The stage instance that started the script.
    pub owner: InstanceId,
}

#[derive(Debug, Clone)]
struct Playback {
    owner: InstanceId,
    script: DialogueScript,
    index: usize,
    remaining: Duration,
}

/// The narrator. One per process, handed to the runtime by the
/// composition root.
#[derive(Debug, Clone, Default)]
pub struct DialoguePlayer {
    timing: DialogueTiming,
    playback: Option<Playback>,
    listeners: FxHashSet<InstanceId>,
}

impl DialoguePlayer {
    pub fn new(timing: DialogueTiming) -> Self {
        Self {
            timing,
            playback: None,
            listeners: FxHashSet::default(),
        }
    }

    pub fn timing(&self) -> &DialogueTiming {
        &self.timing
    }

    /// Register a completion listener. Registering twice is harmless.
    pub fn subscribe(&mut self, listener: InstanceId) {
        self.listeners.remove(&listener);
        self.listeners.insert(listener);
    }

    pub fn unsubscribe(&mut self, listener: InstanceId) -> bool {
        self.listeners.remove(&listener)
    }

    pub fn is_subscribed(&self, listener: InstanceId) -> bool {
        self.listeners.contains(&listener)
    }

    /// Start `script` for `owner`, silently aborting whatever was playing.
    ///
    /// An empty script is a no-op: nothing is aborted and no completion
    /// will follow. Returns whether playback started.
    pub fn play(
        &mut self,
        owner: InstanceId,
        script: &DialogueScript,
        display: &mut dyn Presentation,
        audio: &mut dyn AudioOutput,
    ) -> bool {
        if script.is_empty() {
            debug!(owner = %owner, "empty_script_skipped");
            return false;
        }

        if let Some(aborted) = self.playback.take() {
            debug!(owner = %aborted.owner, line = aborted.index, "dialogue_aborted");
        }

        let first = &script.lines[0];
        let remaining = first.display_time(&self.timing);
        present(first, display, audio);
        self.playback = Some(Playback {
            owner,
            script: script.clone(),
            index: 0,
            remaining,
        });
        true
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_some()
    }

    /// The instance whose script is currently playing.
    pub fn owner(&self) -> Option<InstanceId> {
        self.playback.as_ref().map(|p| p.owner)
    }

    pub fn current_line(&self) -> Option<&DialogueLine> {
        self.playback.as_ref().and_then(|p| p.script.lines.get(p.index))
    }

    /// Time left on the line currently shown.
    pub fn until_boundary(&self) -> Option<Duration> {
        self.playback.as_ref().map(|p| p.remaining)
    }

    /// Abort playback without a completion if `owner` started it.
    pub fn stop_if_owned(&mut self, owner: InstanceId, display: &mut dyn Presentation) -> bool {
        if self.owner() == Some(owner) {
            self.playback = None;
            display.clear_line();
            true
        } else {
            false
        }
    }

    /// Move playback forward by `dt`, showing each line as its turn comes.
    pub fn advance(
        &mut self,
        dt: Duration,
        display: &mut dyn Presentation,
        audio: &mut dyn AudioOutput,
    ) -> Option<DialogueFinished> {
        let timing = self.timing;
        let playback = self.playback.as_mut()?;
        let mut budget = dt;

        while playback.remaining <= budget {
            budget -= playback.remaining;
            playback.index += 1;
            match playback.script.lines.get(playback.index) {
                Some(line) => {
                    playback.remaining = line.display_time(&timing);
                    present(line, display, audio);
                }
                None => {
                    let owner = playback.owner;
                    self.playback = None;
                    display.clear_line();
                    debug!(owner = %owner, "dialogue_finished");
                    return Some(DialogueFinished { owner });
                }
            }
        }

        playback.remaining -= budget;
        None
    }
}

fn present(line: &DialogueLine, display: &mut dyn Presentation, audio: &mut dyn AudioOutput) {
    display.show_line(&line.text);
    if let Some(ref clip) = line.audio {
        audio.play_clip(clip);
    }
}
