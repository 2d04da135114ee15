/// Wordle — a five-letter guessing board with a difficulty-dependent row budget.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::schema::event::StageEvent;
use crate::schema::stage::Difficulty;

pub const WORD_LEN: usize = 5;
pub const MAX_ROWS: usize = 6;

#[derive(Debug, Error)]
pub enum WordleError {
    #[error("secret word must be 5 ASCII letters, got '{0}'")]
    BadSecret(String),
    #[error("row budget must be between 1 and 6, got {0}")]
    BadRows(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LetterScore {
    Correct,
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ignored,
    TooShort,
    Scored(Vec<LetterScore>),
    Solved,
    OutOfRows,
}

impl SubmitOutcome {
    pub fn signal(&self) -> Option<StageEvent> {
        match self {
            Self::Solved => Some(StageEvent::signal("word_solved")),
            Self::OutOfRows => Some(StageEvent::signal("word_failed")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordleVariant {
    pub word: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordleConfig {
    pub easy: WordleVariant,
    pub hard: WordleVariant,
}

impl Default for WordleConfig {
    fn default() -> Self {
        Self {
            easy: WordleVariant {
                word: "APPLE".to_string(),
                rows: 6,
            },
            hard: WordleVariant {
                word: "GRAPE".to_string(),
                rows: 4,
            },
        }
    }
}

impl WordleConfig {
    pub fn load_from_ron(path: &Path) -> Result<WordleConfig, WordleError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&contents)?)
    }

    pub fn variant(&self, difficulty: Difficulty) -> &WordleVariant {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Hard => &self.hard,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Wordle {
    secret: Vec<char>,
    rows_allowed: usize,
    rows: Vec<(String, Vec<LetterScore>)>,
    typing: String,
    solved: bool,
}

impl Wordle {
    pub fn new(secret: &str, rows_allowed: usize) -> Result<Self, WordleError> {
        if secret.len() != WORD_LEN || !secret.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(WordleError::BadSecret(secret.to_string()));
        }
        if rows_allowed == 0 || rows_allowed > MAX_ROWS {
            return Err(WordleError::BadRows(rows_allowed));
        }
        Ok(Self {
            secret: secret.to_ascii_uppercase().chars().collect(),
            rows_allowed,
            rows: Vec::new(),
            typing: String::new(),
            solved: false,
        })
    }

    pub fn from_config(config: &WordleConfig, difficulty: Difficulty) -> Result<Self, WordleError> {
        let variant = config.variant(difficulty);
        Self::new(&variant.word, variant.rows)
    }

    pub fn rows_allowed(&self) -> usize {
        self.rows_allowed
    }

    pub fn rows_used(&self) -> usize {
        self.rows.len()
    }

    pub fn typing(&self) -> &str {
        &self.typing
    }

    pub fn history(&self) -> &[(String, Vec<LetterScore>)] {
        &self.rows
    }

    pub fn is_finished(&self) -> bool {
        self.solved || self.rows.len() >= self.rows_allowed
    }

    /// Non-letters and a full row are ignored.
    pub fn type_letter(&mut self, c: char) -> bool {
        if self.is_finished() || !c.is_ascii_alphabetic() || self.typing.len() >= WORD_LEN {
            return false;
        }
        self.typing.push(c.to_ascii_uppercase());
        true
    }

    pub fn backspace(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        self.typing.pop().is_some()
    }

    pub fn submit(&mut self) -> SubmitOutcome {
        if self.is_finished() {
            return SubmitOutcome::Ignored;
        }
        if self.typing.len() < WORD_LEN {
            return SubmitOutcome::TooShort;
        }

        let guess = std::mem::take(&mut self.typing);
        let scores = self.score(&guess);
        let solved = scores.iter().all(|s| *s == LetterScore::Correct);
        self.rows.push((guess, scores.clone()));

        if solved {
            self.solved = true;
            SubmitOutcome::Solved
        } else if self.rows.len() >= self.rows_allowed {
            SubmitOutcome::OutOfRows
        } else {
            SubmitOutcome::Scored(scores)
        }
    }

    /// React to a host command from the stage table. `new_word` clears the
    /// board and keeps the secret.
    pub fn command(&mut self, name: &str) -> bool {
        match name {
            "new_word" => {
                self.rows.clear();
                self.typing.clear();
                self.solved = false;
                true
            }
            _ => false,
        }
    }

    /// Exact position is `Correct`; a letter anywhere else in the secret is
    /// `Present`, without tracking how often it occurs.
    fn score(&self, guess: &str) -> Vec<LetterScore> {
        guess
            .chars()
            .enumerate()
            .map(|(i, c)| {
                if self.secret.get(i) == Some(&c) {
                    LetterScore::Correct
                } else if self.secret.contains(&c) {
                    LetterScore::Present
                } else {
                    LetterScore::Absent
                }
            })
            .collect()
    }
}
