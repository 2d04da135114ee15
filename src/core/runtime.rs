/// The stage runtime: composition root and single-threaded event loop.
///
/// Wires the stage manager, narrator, scheduler, and active sequencer to
/// the host's presentation, audio, and progress collaborators. Every event,
/// whether a player action, a timer fire, or a narrator completion, goes
/// through one FIFO queue and is handled to completion before the next.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::dialogue::DialoguePlayer;
use crate::core::manager::{
    LevelDefinition, ManagerError, ManagerStep, MemoryProgressStore, Progress, ProgressStore,
    StageManager,
};
use crate::core::scheduler::{InstanceId, Scheduler, TimerToken};
use crate::core::sequencer::{Directive, Sequencer};
use crate::core::surface::{AudioOutput, NullSurface, Presentation};
use crate::schema::dialogue::DialogueTiming;
use crate::schema::event::{Interaction, StageEvent};
use crate::schema::stage::{Difficulty, StageDefinition, StageError};

/// Upper bound on clock subdivisions inside one `advance` call.
const MAX_STEPS_PER_ADVANCE: usize = 10_000;
/// Upper bound on back-to-back stage switches from one event.
const MAX_SWITCHES: usize = 64;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("stage error: {0}")]
    Stage(#[from] StageError),
    #[error("level error: {0}")]
    Manager(#[from] ManagerError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("level '{level}' refers to unknown stage '{stage}'")]
    UnknownStage { level: String, stage: String },
    #[error("no levels configured")]
    NoLevels,
}

/// What happened during a runtime call, for the host to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    StageActivated {
        stage: String,
        instance: InstanceId,
        progress: Progress,
    },
    StageCompleted {
        stage: String,
    },
    LevelAdvanced {
        level: u32,
    },
    GameFinished,
    /// No usable progress was stored. Sent by `start` before any stage
    /// activates.
    FirstLaunch,
    /// A stage asked the host to do something ("new_board", "shake_doll").
    Command {
        stage: String,
        name: String,
    },
}

#[derive(Debug, Clone)]
enum Queued {
    Stage(StageEvent),
    Timer(TimerToken),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Switch {
    Advance,
    Restart,
}

pub struct StageRuntime {
    stages: HashMap<String, Rc<StageDefinition>>,
    manager: StageManager,
    narrator: Option<DialoguePlayer>,
    scheduler: Scheduler,
    active: Option<Sequencer>,
    queue: VecDeque<(InstanceId, Queued)>,
    pending_switch: Option<Switch>,
    next_instance: u64,
    difficulty: Difficulty,
    /// Stage shown ahead of level 1 on a first launch.
    opening: Option<String>,
    in_opening: bool,
    first_launch: bool,
    presentation: Box<dyn Presentation>,
    audio: Box<dyn AudioOutput>,
    store: Box<dyn ProgressStore>,
}

/// Builder for constructing a `StageRuntime`.
pub struct StageRuntimeBuilder {
    stages_dir: Option<String>,
    levels_path: Option<String>,
    /// Directly provided stages (for testing without files).
    stages: Vec<StageDefinition>,
    /// Directly provided levels (for testing without files).
    levels: Option<Vec<LevelDefinition>>,
    timing: DialogueTiming,
    narrator: Option<DialoguePlayer>,
    with_narrator: bool,
    difficulty: Difficulty,
    opening: Option<String>,
    presentation: Option<Box<dyn Presentation>>,
    audio: Option<Box<dyn AudioOutput>>,
    store: Option<Box<dyn ProgressStore>>,
}

impl StageRuntime {
    pub fn builder() -> StageRuntimeBuilder {
        StageRuntimeBuilder {
            stages_dir: None,
            levels_path: None,
            stages: Vec::new(),
            levels: None,
            timing: DialogueTiming::default(),
            narrator: None,
            with_narrator: true,
            difficulty: Difficulty::default(),
            opening: None,
            presentation: None,
            audio: None,
            store: None,
        }
    }

    /// Read stored progress and activate the stage it points at.
    ///
    /// With nothing stored this is a first launch: `FirstLaunch` is
    /// reported and the opening stage, if one is configured, runs before
    /// level 1. A game saved as finished reports `GameFinished` and
    /// activates nothing.
    pub fn start(&mut self) -> Vec<Notice> {
        let stored = match self.store.load() {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "progress_load_failed");
                None
            }
        };
        self.first_launch = stored.map_or(true, |p| p.level == 0 && p.stage == 0);
        self.in_opening = false;
        self.pending_switch = None;

        let mut notices = Vec::new();
        let progress = self.manager.resume(stored);
        if self.manager.is_finished() {
            self.deactivate_active();
            info!(level = progress.level, "game_already_finished");
            notices.push(Notice::GameFinished);
            return notices;
        }
        info!(
            level = progress.level,
            stage = progress.stage,
            first_launch = self.first_launch,
            "runtime_started"
        );
        self.save_progress();

        if self.first_launch {
            notices.push(Notice::FirstLaunch);
        }
        match self.opening.clone().filter(|_| self.first_launch) {
            Some(opening) => {
                self.in_opening = true;
                self.activate(&opening, &mut notices);
            }
            None => {
                let stage_id = self.manager.current_stage_id().to_string();
                self.activate(&stage_id, &mut notices);
            }
        }
        self.settle(&mut notices);
        notices
    }

    /// Deliver a player action or external signal to the active stage.
    pub fn send(&mut self, event: StageEvent) -> Vec<Notice> {
        let mut notices = Vec::new();
        match self.active.as_ref() {
            Some(seq) => {
                self.queue.push_back((seq.instance(), Queued::Stage(event)));
                self.drain(&mut notices);
            }
            None => debug!(event = %event, "no_active_stage"),
        }
        notices
    }

    /// Deliver a physical-interaction fact as a stage signal.
    pub fn interact(&mut self, interaction: Interaction) -> Vec<Notice> {
        self.send(interaction.into())
    }

    /// Move the clock forward by `dt`.
    ///
    /// The step is cut at every line boundary and timer due time so that
    /// narrator completions and timer fires are handled in the order they
    /// happen.
    pub fn advance(&mut self, dt: Duration) -> Vec<Notice> {
        let mut notices = Vec::new();
        let mut remaining = dt;

        for _ in 0..MAX_STEPS_PER_ADVANCE {
            let mut step = remaining;
            if let Some(d) = self.narrator.as_ref().and_then(|n| n.until_boundary()) {
                step = step.min(d);
            }
            if let Some(d) = self.scheduler.until_next() {
                step = step.min(d);
            }

            if let Some(narrator) = self.narrator.as_mut() {
                let finished =
                    narrator.advance(step, self.presentation.as_mut(), self.audio.as_mut());
                if let Some(done) = finished {
                    // listeners are one-shot; the next Play re-subscribes
                    if narrator.unsubscribe(done.owner) {
                        self.queue
                            .push_back((done.owner, Queued::Stage(StageEvent::DialogueFinished)));
                    } else {
                        debug!(owner = %done.owner, "dialogue_finished_unheard");
                    }
                }
            }
            for token in self.scheduler.advance(step) {
                self.queue.push_back((token.instance, Queued::Timer(token)));
            }
            remaining -= step;
            self.drain(&mut notices);

            if remaining.is_zero() && !self.due_now() {
                return notices;
            }
        }

        warn!(dt_ms = dt.as_millis() as u64, "advance_step_limit_reached");
        notices
    }

    /// Rerun the current stage from a fresh activation.
    pub fn restart(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        if self.manager.is_finished() {
            debug!("restart_after_game_finished");
            return notices;
        }
        self.pending_switch = Some(Switch::Restart);
        self.settle(&mut notices);
        notices
    }

    /// Hand the runtime a narrator. Stages that stalled waiting for one stay
    /// where they are until their next Play.
    pub fn attach_narrator(&mut self, narrator: DialoguePlayer) {
        self.narrator = Some(narrator);
    }

    pub fn detach_narrator(&mut self) -> Option<DialoguePlayer> {
        self.narrator.take()
    }

    pub fn narrator(&self) -> Option<&DialoguePlayer> {
        self.narrator.as_ref()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Takes effect on the next stage activation.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn progress(&self) -> Progress {
        self.manager.progress()
    }

    pub fn is_finished(&self) -> bool {
        self.manager.is_finished()
    }

    /// Whether the last `start` found no stored progress.
    pub fn is_first_launch(&self) -> bool {
        self.first_launch
    }

    /// Whether the opening stage is the one running.
    pub fn in_opening(&self) -> bool {
        self.in_opening
    }

    /// Id of the active stage definition.
    pub fn active_stage(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.definition().id.as_str())
    }

    pub fn active_instance(&self) -> Option<InstanceId> {
        self.active.as_ref().map(|s| s.instance())
    }

    pub fn state(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.state())
    }

    pub fn counter(&self, name: &str) -> u32 {
        self.active.as_ref().map(|s| s.counter(name)).unwrap_or(0)
    }

    pub fn stage_definition(&self, id: &str) -> Option<&StageDefinition> {
        self.stages.get(id).map(|d| d.as_ref())
    }

    /// Prefer the difficulty-specific variant (`id.hard`) over the plain id.
    fn resolve_stage(&self, id: &str) -> Option<Rc<StageDefinition>> {
        let specific = format!("{}.{}", id, self.difficulty.suffix());
        self.stages
            .get(&specific)
            .or_else(|| self.stages.get(id))
            .cloned()
    }

    fn due_now(&self) -> bool {
        let narrator_due = self
            .narrator
            .as_ref()
            .and_then(|n| n.until_boundary())
            .map_or(false, |d| d.is_zero());
        let timer_due = self.scheduler.until_next().map_or(false, |d| d.is_zero());
        narrator_due || timer_due
    }

    fn drain(&mut self, notices: &mut Vec<Notice>) {
        while let Some((instance, item)) = self.queue.pop_front() {
            let directives = match self.active.as_mut() {
                Some(seq) if seq.instance() == instance => match item {
                    Queued::Stage(event) => seq.handle(&event),
                    Queued::Timer(token) => seq.timer_fired(token),
                },
                _ => {
                    debug!(instance = %instance, "stale_delivery_dropped");
                    continue;
                }
            };
            self.apply(instance, directives, notices);
            self.settle(notices);
        }
    }

    fn apply(&mut self, instance: InstanceId, directives: Vec<Directive>, notices: &mut Vec<Notice>) {
        for directive in directives {
            match directive {
                Directive::Play(script) => self.play(instance, &script),
                Directive::StartTimer { token, delay } => self.scheduler.schedule(delay, token),
                Directive::CancelTimer(token) => {
                    self.scheduler.cancel(token);
                }
                Directive::Show(element) => self.presentation.show(&element),
                Directive::Hide(element) => self.presentation.hide(&element),
                Directive::SetInput { surface, enabled } => {
                    self.presentation.set_input_enabled(&surface, enabled)
                }
                Directive::Command(name) => notices.push(Notice::Command {
                    stage: self.active_stage().unwrap_or_default().to_string(),
                    name,
                }),
                Directive::Restart => self.pending_switch = Some(Switch::Restart),
                Directive::Complete => {
                    let stage = self.active_stage().unwrap_or_default().to_string();
                    info!(stage = %stage, "stage_completed");
                    notices.push(Notice::StageCompleted { stage });
                    self.pending_switch = Some(Switch::Advance);
                }
            }
        }
    }

    fn play(&mut self, instance: InstanceId, name: &str) {
        let script = match self
            .active
            .as_ref()
            .and_then(|s| s.definition().scripts.get(name))
        {
            Some(script) => script,
            None => {
                warn!(script = %name, "script_missing");
                return;
            }
        };
        let narrator = match self.narrator.as_mut() {
            Some(n) => n,
            None => {
                warn!(script = %name, "narrator_missing");
                return;
            }
        };
        narrator.unsubscribe(instance);
        narrator.subscribe(instance);
        narrator.play(instance, script, self.presentation.as_mut(), self.audio.as_mut());
    }

    /// Carry out the stage switch requested while applying directives.
    fn settle(&mut self, notices: &mut Vec<Notice>) {
        for _ in 0..MAX_SWITCHES {
            let switch = match self.pending_switch.take() {
                Some(s) => s,
                None => return,
            };
            let step = match switch {
                // Leaving the opening lands on the stored position
                Switch::Advance if self.in_opening => {
                    self.in_opening = false;
                    self.manager.current()
                }
                Switch::Restart if self.in_opening => {
                    if let Some(opening) = self.opening.clone() {
                        self.activate(&opening, notices);
                    }
                    continue;
                }
                Switch::Advance => {
                    let step = self.manager.advance();
                    self.save_progress();
                    step
                }
                Switch::Restart => self.manager.restart(),
            };
            match step {
                ManagerStep::Activate {
                    stage_id,
                    new_level,
                } => {
                    if new_level {
                        notices.push(Notice::LevelAdvanced {
                            level: self.manager.progress().level,
                        });
                    }
                    self.activate(&stage_id, notices);
                }
                ManagerStep::Finished => {
                    self.deactivate_active();
                    notices.push(Notice::GameFinished);
                }
            }
        }
        warn!("stage_switch_limit_reached");
        self.pending_switch = None;
    }

    fn activate(&mut self, stage_id: &str, notices: &mut Vec<Notice>) {
        let definition = match self.resolve_stage(stage_id) {
            Some(d) => d,
            None => {
                warn!(stage = %stage_id, "stage_missing");
                return;
            }
        };
        self.deactivate_active();

        let instance = InstanceId(self.next_instance);
        self.next_instance += 1;
        self.presentation.show(&definition.panel);

        let stage = definition.id.clone();
        let mut sequencer = Sequencer::new(instance, definition);
        let directives = sequencer.activate();
        self.active = Some(sequencer);

        info!(stage = %stage, instance = %instance, "stage_activated");
        notices.push(Notice::StageActivated {
            stage,
            instance,
            progress: self.manager.progress(),
        });
        self.apply(instance, directives, notices);
    }

    /// Tear down the active stage: cancel its timers and narration, drop
    /// its queued events, and hide its panel.
    fn deactivate_active(&mut self) {
        let mut sequencer = match self.active.take() {
            Some(s) => s,
            None => return,
        };
        let instance = sequencer.instance();
        for directive in sequencer.deactivate() {
            if let Directive::CancelTimer(token) = directive {
                self.scheduler.cancel(token);
            }
        }
        self.scheduler.cancel_instance(instance);
        if let Some(narrator) = self.narrator.as_mut() {
            narrator.unsubscribe(instance);
            narrator.stop_if_owned(instance, self.presentation.as_mut());
        }
        self.queue.retain(|(i, _)| *i != instance);
        self.presentation.hide(&sequencer.definition().panel);
        info!(stage = %sequencer.definition().id, instance = %instance, "stage_deactivated");
    }

    fn save_progress(&mut self) {
        let progress = self.manager.saved_progress();
        if let Err(e) = self.store.save(&progress) {
            warn!(error = %e, "progress_save_failed");
        }
    }
}

impl StageRuntimeBuilder {
    pub fn stages_dir(mut self, path: &str) -> Self {
        self.stages_dir = Some(path.to_string());
        self
    }

    pub fn levels_path(mut self, path: &str) -> Self {
        self.levels_path = Some(path.to_string());
        self
    }

    /// Provide a stage directly; overrides a file stage with the same id.
    pub fn with_stage(mut self, stage: StageDefinition) -> Self {
        self.stages.push(stage);
        self
    }

    /// Provide levels directly (for testing without files).
    pub fn with_levels(mut self, levels: Vec<LevelDefinition>) -> Self {
        self.levels = Some(levels);
        self
    }

    pub fn timing(mut self, timing: DialogueTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Use a preconfigured narrator instead of one built from `timing`.
    pub fn narrator(mut self, narrator: DialoguePlayer) -> Self {
        self.narrator = Some(narrator);
        self.with_narrator = true;
        self
    }

    /// Start with no narrator attached. Stages stall at their first Play
    /// until one is attached.
    pub fn without_narrator(mut self) -> Self {
        self.with_narrator = false;
        self
    }

    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Stage to run ahead of level 1 when nothing is stored yet.
    pub fn opening_stage(mut self, id: &str) -> Self {
        self.opening = Some(id.to_string());
        self
    }

    pub fn presentation(mut self, presentation: impl Presentation + 'static) -> Self {
        self.presentation = Some(Box::new(presentation));
        self
    }

    pub fn audio(mut self, audio: impl AudioOutput + 'static) -> Self {
        self.audio = Some(Box::new(audio));
        self
    }

    pub fn progress_store(mut self, store: impl ProgressStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn build(self) -> Result<StageRuntime, RuntimeError> {
        let mut stages: HashMap<String, Rc<StageDefinition>> = HashMap::new();

        // Load stage files first so direct stages override them
        if let Some(ref dir) = self.stages_dir {
            if Path::new(dir).exists() {
                load_ron_files_from_dir(dir, |path| {
                    let stage = StageDefinition::load_from_ron(path)?;
                    debug!(stage = %stage.id, path = %path.display(), "stage_loaded");
                    stages.insert(stage.id.clone(), Rc::new(stage));
                    Ok(())
                })?;
            } else {
                warn!(dir = %dir, "stages_dir_missing");
            }
        }

        for stage in self.stages {
            stage.validate()?;
            stages.insert(stage.id.clone(), Rc::new(stage));
        }

        let levels = match (self.levels, self.levels_path) {
            (Some(levels), _) => levels,
            (None, Some(path)) => LevelDefinition::load_list_from_ron(Path::new(&path))?,
            (None, None) => return Err(RuntimeError::NoLevels),
        };

        let known = |id: &str| {
            stages.contains_key(id)
                || stages.contains_key(&format!("{}.{}", id, Difficulty::Easy.suffix()))
                || stages.contains_key(&format!("{}.{}", id, Difficulty::Hard.suffix()))
        };
        for level in &levels {
            for stage in &level.stages {
                if !known(stage) {
                    return Err(RuntimeError::UnknownStage {
                        level: level.name.clone(),
                        stage: stage.clone(),
                    });
                }
            }
        }
        if let Some(ref opening) = self.opening {
            if !known(opening) {
                return Err(RuntimeError::UnknownStage {
                    level: "opening".to_string(),
                    stage: opening.clone(),
                });
            }
        }

        let manager = StageManager::new(levels)?;
        let timing = self.timing;
        let narrator = if self.with_narrator {
            Some(self.narrator.unwrap_or_else(|| DialoguePlayer::new(timing)))
        } else {
            None
        };

        Ok(StageRuntime {
            stages,
            manager,
            narrator,
            scheduler: Scheduler::new(),
            active: None,
            queue: VecDeque::new(),
            pending_switch: None,
            next_instance: 1,
            difficulty: self.difficulty,
            opening: self.opening,
            in_opening: false,
            first_launch: false,
            presentation: self.presentation.unwrap_or_else(|| Box::new(NullSurface)),
            audio: self.audio.unwrap_or_else(|| Box::new(NullSurface)),
            store: self
                .store
                .unwrap_or_else(|| Box::new(MemoryProgressStore::new())),
        })
    }
}

/// Load all .ron files from a directory in name order, calling `loader` for each.
fn load_ron_files_from_dir<F>(dir: &str, mut loader: F) -> Result<(), RuntimeError>
where
    F: FnMut(&Path) -> Result<(), RuntimeError>,
{
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            paths.push(path);
        }
    }
    paths.sort();
    for path in paths {
        loader(&path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::surface::{Recorder, SurfaceCommand};

    const CONFIRM: &str = r#"StageDefinition(
        id: "confirm",
        panel: "confirm_panel",
        states: ["Opening", "Waiting", "Success"],
        initial: "Opening",
        terminal: Some("Success"),
        scripts: { "opening": [(text: "Press it.", duration: Some(1.0))] },
        on_enter: [Play("opening")],
        transitions: [
            (from: ["Opening"], on: DialogueFinished, to: Some("Waiting"), effects: [EnableInput("button")]),
            (from: ["Waiting"], on: Action("confirm"), to: Some("Success")),
        ],
    )"#;

    const SECOND: &str = r#"StageDefinition(
        id: "second",
        panel: "second_panel",
        states: ["Idle", "Done"],
        initial: "Idle",
        terminal: Some("Done"),
        transitions: [(from: ["Idle"], on: Signal("finish"), to: Some("Done"))],
    )"#;

    fn levels() -> Vec<LevelDefinition> {
        vec![
            LevelDefinition {
                name: "one".to_string(),
                stages: vec!["confirm".to_string()],
            },
            LevelDefinition {
                name: "two".to_string(),
                stages: vec!["second".to_string()],
            },
        ]
    }

    fn runtime(recorder: &Recorder) -> StageRuntime {
        StageRuntime::builder()
            .with_stage(StageDefinition::parse_ron(CONFIRM).unwrap())
            .with_stage(StageDefinition::parse_ron(SECOND).unwrap())
            .with_levels(levels())
            .presentation(recorder.clone())
            .audio(recorder.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn start_activates_first_stage() {
        let rec = Recorder::new();
        let mut rt = runtime(&rec);
        let notices = rt.start();
        assert_eq!(notices[0], Notice::FirstLaunch);
        assert!(matches!(&notices[1], Notice::StageActivated { stage, .. } if stage == "confirm"));
        assert_eq!(rt.state(), Some("Opening"));
        assert!(rec.is_shown("confirm_panel"));
        assert_eq!(rec.lines(), vec!["Press it."]);
    }

    #[test]
    fn confirm_scenario_end_to_end() {
        let rec = Recorder::new();
        let mut rt = runtime(&rec);
        rt.start();

        assert!(rt.send(StageEvent::action("confirm")).is_empty());
        assert_eq!(rt.state(), Some("Opening"));

        rt.advance(Duration::from_secs(1));
        assert_eq!(rt.state(), Some("Waiting"));
        assert!(rec.commands().contains(&SurfaceCommand::Input {
            surface: "button".to_string(),
            enabled: true,
        }));

        let notices = rt.send(StageEvent::action("confirm"));
        assert_eq!(
            notices[0],
            Notice::StageCompleted {
                stage: "confirm".to_string()
            }
        );
        assert_eq!(notices[1], Notice::LevelAdvanced { level: 2 });
        assert_eq!(rt.active_stage(), Some("second"));
        assert!(!rec.is_shown("confirm_panel"));
        assert!(rec.is_shown("second_panel"));
    }

    #[test]
    fn finishing_last_stage_finishes_game() {
        let rec = Recorder::new();
        let mut rt = runtime(&rec);
        rt.start();
        rt.advance(Duration::from_secs(1));
        rt.send(StageEvent::action("confirm"));
        let notices = rt.send(StageEvent::signal("finish"));
        assert!(notices.contains(&Notice::GameFinished));
        assert!(rt.is_finished());
        assert_eq!(rt.active_stage(), None);
        assert!(rt.send(StageEvent::signal("finish")).is_empty());
    }

    #[test]
    fn restart_after_game_finished_is_quiet() {
        let rec = Recorder::new();
        let mut rt = runtime(&rec);
        rt.start();
        rt.advance(Duration::from_secs(1));
        rt.send(StageEvent::action("confirm"));
        assert!(rt.send(StageEvent::signal("finish")).contains(&Notice::GameFinished));
        assert!(rt.restart().is_empty());
        assert_eq!(rt.active_stage(), None);
    }

    #[test]
    fn stored_progress_is_not_a_first_launch() {
        let mut rt = StageRuntime::builder()
            .with_stage(StageDefinition::parse_ron(CONFIRM).unwrap())
            .with_stage(StageDefinition::parse_ron(SECOND).unwrap())
            .with_levels(levels())
            .opening_stage("confirm")
            .progress_store(MemoryProgressStore::with_progress(Progress { level: 2, stage: 1 }))
            .build()
            .unwrap();
        let notices = rt.start();
        assert!(!notices.contains(&Notice::FirstLaunch));
        assert!(!rt.is_first_launch());
        assert!(!rt.in_opening());
        assert_eq!(rt.active_stage(), Some("second"));
    }

    #[test]
    fn unknown_opening_stage_rejected() {
        let result = StageRuntime::builder()
            .with_stage(StageDefinition::parse_ron(CONFIRM).unwrap())
            .with_stage(StageDefinition::parse_ron(SECOND).unwrap())
            .with_levels(levels())
            .opening_stage("intro")
            .build();
        assert!(matches!(result, Err(RuntimeError::UnknownStage { ref stage, .. }) if stage == "intro"));
    }

    #[test]
    fn missing_narrator_stalls_until_attached() {
        let mut rt = StageRuntime::builder()
            .with_stage(StageDefinition::parse_ron(CONFIRM).unwrap())
            .with_stage(StageDefinition::parse_ron(SECOND).unwrap())
            .with_levels(levels())
            .without_narrator()
            .build()
            .unwrap();
        rt.start();
        rt.advance(Duration::from_secs(10));
        assert_eq!(rt.state(), Some("Opening"));

        rt.attach_narrator(DialoguePlayer::new(DialogueTiming::default()));
        rt.restart();
        rt.advance(Duration::from_secs(1));
        assert_eq!(rt.state(), Some("Waiting"));
    }

    #[test]
    fn restart_creates_fresh_instance() {
        let rec = Recorder::new();
        let mut rt = runtime(&rec);
        rt.start();
        let first = rt.active_instance().unwrap();
        rt.advance(Duration::from_secs(1));
        let notices = rt.restart();
        assert!(matches!(&notices[0], Notice::StageActivated { .. }));
        assert_ne!(rt.active_instance().unwrap(), first);
        assert_eq!(rt.state(), Some("Opening"));
    }

    #[test]
    fn unknown_stage_in_levels_rejected() {
        let result = StageRuntime::builder()
            .with_stage(StageDefinition::parse_ron(CONFIRM).unwrap())
            .with_levels(levels())
            .build();
        assert!(matches!(result, Err(RuntimeError::UnknownStage { ref stage, .. }) if stage == "second"));
    }

    #[test]
    fn missing_levels_rejected() {
        let result = StageRuntime::builder()
            .with_stage(StageDefinition::parse_ron(CONFIRM).unwrap())
            .build();
        assert!(matches!(result, Err(RuntimeError::NoLevels)));
    }

    #[test]
    fn difficulty_variant_preferred() {
        let hard = CONFIRM
            .replace(r#"id: "confirm""#, r#"id: "confirm.hard""#)
            .replace("Press it.", "Press it. If you dare.");
        let mut rt = StageRuntime::builder()
            .with_stage(StageDefinition::parse_ron(CONFIRM).unwrap())
            .with_stage(StageDefinition::parse_ron(&hard).unwrap())
            .with_stage(StageDefinition::parse_ron(SECOND).unwrap())
            .with_levels(levels())
            .difficulty(Difficulty::Hard)
            .build()
            .unwrap();
        rt.start();
        assert_eq!(rt.active_stage(), Some("confirm.hard"));
    }
}
