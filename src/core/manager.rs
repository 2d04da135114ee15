/// Stage manager — level/stage progression and its persistence surface.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("no levels defined")]
    NoLevels,
    #[error("level '{0}' has no stages")]
    EmptyLevel(String),
}

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

/// The only persisted state: where the player is. Both indices are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub level: u32,
    pub stage: u32,
}

impl Default for Progress {
    fn default() -> Self {
        Self { level: 1, stage: 1 }
    }
}

/// An ordered run of stages. Finishing the last one moves to the next level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDefinition {
    pub name: String,
    pub stages: Vec<String>,
}

impl LevelDefinition {
    /// Load the ordered level list from a RON file.
    pub fn load_list_from_ron(path: &Path) -> Result<Vec<LevelDefinition>, ManagerError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&contents)?)
    }
}

/// Where progress is read at start and written after every advance.
pub trait ProgressStore {
    fn load(&mut self) -> Result<Option<Progress>, ProgressError>;
    fn save(&mut self, progress: &Progress) -> Result<(), ProgressError>;
}

/// Keeps progress in memory only.
#[derive(Debug, Clone, Default)]
pub struct MemoryProgressStore {
    saved: Option<Progress>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(progress: Progress) -> Self {
        Self {
            saved: Some(progress),
        }
    }

    pub fn saved(&self) -> Option<Progress> {
        self.saved
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load(&mut self) -> Result<Option<Progress>, ProgressError> {
        Ok(self.saved)
    }

    fn save(&mut self, progress: &Progress) -> Result<(), ProgressError> {
        self.saved = Some(*progress);
        Ok(())
    }
}

/// Keeps progress in a small RON file. A missing file means a first launch.
#[derive(Debug, Clone)]
pub struct RonProgressStore {
    path: PathBuf,
}

impl RonProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressStore for RonProgressStore {
    fn load(&mut self) -> Result<Option<Progress>, ProgressError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(Some(ron::from_str(&contents)?))
    }

    fn save(&mut self, progress: &Progress) -> Result<(), ProgressError> {
        let contents = ron::to_string(progress)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

/// What the runtime should do after a manager call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerStep {
    Activate { stage_id: String, new_level: bool },
    /// Past the last stage of the last level.
    Finished,
}

/// Tracks the current level and stage.
#[derive(Debug, Clone)]
pub struct StageManager {
    levels: Vec<LevelDefinition>,
    progress: Progress,
    finished: bool,
}

impl StageManager {
    pub fn new(levels: Vec<LevelDefinition>) -> Result<Self, ManagerError> {
        if levels.is_empty() {
            return Err(ManagerError::NoLevels);
        }
        if let Some(empty) = levels.iter().find(|l| l.stages.is_empty()) {
            return Err(ManagerError::EmptyLevel(empty.name.clone()));
        }
        Ok(Self {
            levels,
            progress: Progress::default(),
            finished: false,
        })
    }

    /// Start from stored progress. Zero indices mean "never played" and
    /// become 1; anything past the end is clamped.
    ///
    /// A stored stage one past the end of the last level marks a finished
    /// game; see `saved_progress`.
    pub fn resume(&mut self, stored: Option<Progress>) -> Progress {
        let stored = stored.unwrap_or_default();
        let level_count = self.levels.len() as u32;
        let last_stages = self.levels.last().map_or(0, |l| l.stages.len() as u32);
        if stored.level == level_count && stored.stage > last_stages {
            self.progress = Progress {
                level: level_count,
                stage: last_stages,
            };
            self.finished = true;
            return self.progress;
        }
        let level = stored.level.clamp(1, level_count);
        if level != stored.level.max(1) {
            warn!(stored = stored.level, clamped = level, "stored_level_out_of_range");
        }
        let stage_count = self.levels[(level - 1) as usize].stages.len() as u32;
        let stage = stored.stage.clamp(1, stage_count);
        if stage != stored.stage.max(1) {
            warn!(stored = stored.stage, clamped = stage, "stored_stage_out_of_range");
        }
        self.progress = Progress { level, stage };
        self.finished = false;
        self.progress
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// What to persist. Once the game is finished this points one stage
    /// past the end so the next `resume` knows not to replay it.
    pub fn saved_progress(&self) -> Progress {
        if self.finished {
            Progress {
                level: self.progress.level,
                stage: self.progress.stage + 1,
            }
        } else {
            self.progress
        }
    }

    pub fn levels(&self) -> &[LevelDefinition] {
        &self.levels
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn current_level(&self) -> &LevelDefinition {
        &self.levels[(self.progress.level - 1) as usize]
    }

    pub fn total_stages(&self) -> u32 {
        self.current_level().stages.len() as u32
    }

    pub fn current_stage_id(&self) -> &str {
        &self.current_level().stages[(self.progress.stage - 1) as usize]
    }

    /// Move to the next stage, rolling over into the next level after the
    /// last stage.
    pub fn advance(&mut self) -> ManagerStep {
        if self.finished {
            return ManagerStep::Finished;
        }

        if self.progress.stage < self.total_stages() {
            self.progress.stage += 1;
            return self.activate_current(false);
        }

        if (self.progress.level as usize) < self.levels.len() {
            self.progress.level += 1;
            self.progress.stage = 1;
            info!(level = self.progress.level, name = %self.current_level().name, "level_advanced");
            return self.activate_current(true);
        }

        info!("game_finished");
        self.finished = true;
        ManagerStep::Finished
    }

    /// Rerun the current stage from scratch.
    pub fn restart(&self) -> ManagerStep {
        self.current()
    }

    /// The stage at the current position, without moving.
    pub fn current(&self) -> ManagerStep {
        if self.finished {
            return ManagerStep::Finished;
        }
        self.activate_current(false)
    }

    fn activate_current(&self, new_level: bool) -> ManagerStep {
        ManagerStep::Activate {
            stage_id: self.current_stage_id().to_string(),
            new_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels() -> Vec<LevelDefinition> {
        vec![
            LevelDefinition {
                name: "arcade".to_string(),
                stages: vec!["claw".to_string(), "dont_press".to_string()],
            },
            LevelDefinition {
                name: "puzzles".to_string(),
                stages: vec!["minesweeper".to_string()],
            },
        ]
    }

    fn activate(id: &str, new_level: bool) -> ManagerStep {
        ManagerStep::Activate {
            stage_id: id.to_string(),
            new_level,
        }
    }

    #[test]
    fn fresh_start_is_level_one_stage_one() {
        let mut m = StageManager::new(levels()).unwrap();
        assert_eq!(m.resume(None), Progress { level: 1, stage: 1 });
        assert_eq!(m.resume(Some(Progress { level: 0, stage: 0 })), Progress::default());
        assert_eq!(m.current_stage_id(), "claw");
    }

    #[test]
    fn advance_walks_stages_then_levels() {
        let mut m = StageManager::new(levels()).unwrap();
        m.resume(None);
        assert_eq!(m.advance(), activate("dont_press", false));
        assert_eq!(m.advance(), activate("minesweeper", true));
        assert_eq!(m.progress(), Progress { level: 2, stage: 1 });
        assert_eq!(m.advance(), ManagerStep::Finished);
        assert!(m.is_finished());
        assert_eq!(m.advance(), ManagerStep::Finished);
        assert_eq!(m.restart(), ManagerStep::Finished);
    }

    #[test]
    fn restart_keeps_position() {
        let mut m = StageManager::new(levels()).unwrap();
        m.resume(Some(Progress { level: 1, stage: 2 }));
        assert_eq!(m.restart(), activate("dont_press", false));
        assert_eq!(m.progress(), Progress { level: 1, stage: 2 });
    }

    #[test]
    fn out_of_range_progress_is_clamped() {
        let mut m = StageManager::new(levels()).unwrap();
        let p = m.resume(Some(Progress { level: 9, stage: 9 }));
        assert_eq!(p, Progress { level: 2, stage: 1 });
    }

    #[test]
    fn finished_game_is_saved_past_the_end() {
        let mut m = StageManager::new(levels()).unwrap();
        m.resume(Some(Progress { level: 2, stage: 1 }));
        assert_eq!(m.saved_progress(), Progress { level: 2, stage: 1 });
        assert_eq!(m.advance(), ManagerStep::Finished);
        let saved = m.saved_progress();
        assert_eq!(saved, Progress { level: 2, stage: 2 });
        assert_eq!(m.progress(), Progress { level: 2, stage: 1 });

        let mut reopened = StageManager::new(levels()).unwrap();
        assert_eq!(reopened.resume(Some(saved)), Progress { level: 2, stage: 1 });
        assert!(reopened.is_finished());
        assert_eq!(reopened.current(), ManagerStep::Finished);
    }

    #[test]
    fn empty_configuration_rejected() {
        assert!(matches!(StageManager::new(Vec::new()), Err(ManagerError::NoLevels)));
        let bad = vec![LevelDefinition {
            name: "hollow".to_string(),
            stages: Vec::new(),
        }];
        assert!(matches!(StageManager::new(bad), Err(ManagerError::EmptyLevel(_))));
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryProgressStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save(&Progress { level: 2, stage: 1 }).unwrap();
        assert_eq!(store.load().unwrap(), Some(Progress { level: 2, stage: 1 }));
    }

    #[test]
    fn ron_store_missing_file_is_first_launch() {
        let path = std::env::temp_dir().join("stage_narrator_missing_progress.ron");
        let _ = std::fs::remove_file(&path);
        let mut store = RonProgressStore::new(&path);
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn ron_store_persists() {
        let path = std::env::temp_dir().join(format!(
            "stage_narrator_progress_{}.ron",
            std::process::id()
        ));
        let mut store = RonProgressStore::new(&path);
        store.save(&Progress { level: 1, stage: 2 }).unwrap();
        let mut reopened = RonProgressStore::new(&path);
        assert_eq!(reopened.load().unwrap(), Some(Progress { level: 1, stage: 2 }));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn levels_parse_from_ron() {
        let levels: Vec<LevelDefinition> = ron::from_str(
            r#"[
                (name: "arcade", stages: ["claw", "dont_press"]),
                (name: "puzzles", stages: ["minesweeper", "wordle"]),
            ]"#,
        )
        .unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[1].stages[1], "wordle");
    }
}
