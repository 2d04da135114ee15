/// Minesweeper board logic — mine placement, adjacency, flood-fill reveal,
/// and the session wrapper a stage drives through commands and signals.
///
/// Two variants exist. The numbered variant places mines at random, shows
/// adjacency counts, flood-fills zero cells, and treats placing a flag as an
/// instant loss. The pattern variant loads a fixed named layout and shows no
/// numbers at all.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::schema::event::StageEvent;
use crate::schema::stage::Difficulty;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("grid must be at least 1x1, got {0}x{1}")]
    ZeroSized(usize, usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    /// Random mines, adjacency numbers, flood fill, flag = loss.
    Numbered,
    /// Fixed layout, no numbers, no flood fill.
    Pattern,
}

/// A named hand-authored mine layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinePattern {
    pub name: String,
    pub mines: Vec<(i32, i32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Out of range, already revealed, flagged, or the round is over.
    Ignored,
    /// Safe; this many cells were newly revealed.
    Revealed(usize),
    Mine,
    /// Safe, and the last safe cell. Reported once per board.
    Won,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagOutcome {
    Ignored,
    Flagged,
    /// Flagging is forbidden on the numbered board.
    InstantLoss,
}

impl RevealOutcome {
    /// The stage signal this outcome raises, if any.
    pub fn signal(&self) -> Option<StageEvent> {
        match self {
            Self::Mine => Some(StageEvent::signal("bomb_hit")),
            Self::Won => Some(StageEvent::signal("board_cleared")),
            Self::Ignored | Self::Revealed(_) => None,
        }
    }
}

impl FlagOutcome {
    pub fn signal(&self) -> Option<StageEvent> {
        match self {
            Self::InstantLoss => Some(StageEvent::signal("flag_placed")),
            Self::Ignored | Self::Flagged => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Board {
    width: usize,
    height: usize,
    variant: Variant,
    mines: Vec<bool>,
    adjacency: Vec<u8>,
    revealed: Vec<bool>,
    flagged: Vec<bool>,
    mine_count: usize,
    safe_revealed: usize,
    over: bool,
}

impl Board {
    fn empty(width: usize, height: usize, variant: Variant) -> Result<Self, BoardError> {
        if width == 0 || height == 0 {
            return Err(BoardError::ZeroSized(width, height));
        }
        let cells = width * height;
        Ok(Self {
            width,
            height,
            variant,
            mines: vec![false; cells],
            adjacency: vec![0; cells],
            revealed: vec![false; cells],
            flagged: vec![false; cells],
            mine_count: 0,
            safe_revealed: 0,
            over: false,
        })
    }

    /// Numbered board with `mines` placed uniformly at random: pick a cell,
    /// keep it if free, repeat until the budget is met.
    pub fn random(
        width: usize,
        height: usize,
        mines: usize,
        rng: &mut impl Rng,
    ) -> Result<Self, BoardError> {
        let mut board = Self::empty(width, height, Variant::Numbered)?;
        let cells = width * height;
        let target = if mines > cells {
            warn!(mines, cells, "mine_budget_clamped");
            cells
        } else {
            mines
        };

        let mut placed = 0;
        while placed < target {
            let i = rng.gen_range(0..cells);
            if !board.mines[i] {
                board.mines[i] = true;
                placed += 1;
            }
        }
        board.mine_count = placed;
        board.compute_adjacency();
        Ok(board)
    }

    /// Pattern board; positions outside the grid are skipped.
    pub fn from_pattern(
        width: usize,
        height: usize,
        pattern: &MinePattern,
    ) -> Result<Self, BoardError> {
        let mut board = Self::empty(width, height, Variant::Pattern)?;
        for &(x, y) in &pattern.mines {
            match board.index(x, y) {
                Some(i) => board.mines[i] = true,
                None => debug!(pattern = %pattern.name, x, y, "pattern_mine_out_of_range"),
            }
        }
        board.mine_count = board.mines.iter().filter(|m| **m).count();
        Ok(board)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn mine_count(&self) -> usize {
        self.mine_count
    }

    pub fn safe_cells(&self) -> usize {
        self.width * self.height - self.mine_count
    }

    pub fn safe_revealed(&self) -> usize {
        self.safe_revealed
    }

    /// True after a loss or a win; further input is ignored.
    pub fn is_over(&self) -> bool {
        self.over
    }

    pub fn is_won(&self) -> bool {
        self.over && self.safe_revealed == self.safe_cells()
    }

    pub fn is_mine(&self, x: i32, y: i32) -> bool {
        self.index(x, y).map(|i| self.mines[i]).unwrap_or(false)
    }

    pub fn is_revealed(&self, x: i32, y: i32) -> bool {
        self.index(x, y).map(|i| self.revealed[i]).unwrap_or(false)
    }

    pub fn is_flagged(&self, x: i32, y: i32) -> bool {
        self.index(x, y).map(|i| self.flagged[i]).unwrap_or(false)
    }

    /// Adjacency hint for a cell. Always `None` on the pattern board.
    pub fn hint(&self, x: i32, y: i32) -> Option<u8> {
        match self.variant {
            Variant::Numbered => self.index(x, y).map(|i| self.adjacency[i]),
            Variant::Pattern => None,
        }
    }

    pub fn reveal(&mut self, x: i32, y: i32) -> RevealOutcome {
        let i = match self.index(x, y) {
            Some(i) => i,
            None => return RevealOutcome::Ignored,
        };
        if self.over || self.revealed[i] || self.flagged[i] {
            return RevealOutcome::Ignored;
        }

        if self.mines[i] {
            self.revealed[i] = true;
            self.over = true;
            return RevealOutcome::Mine;
        }

        let opened = match self.variant {
            Variant::Numbered => self.flood_fill(x, y),
            Variant::Pattern => {
                self.revealed[i] = true;
                1
            }
        };
        self.safe_revealed += opened;

        if self.safe_revealed == self.safe_cells() {
            self.over = true;
            RevealOutcome::Won
        } else {
            RevealOutcome::Revealed(opened)
        }
    }

    /// Place a flag. Flags cannot be removed, and a flagged cell cannot be
    /// revealed.
    pub fn flag(&mut self, x: i32, y: i32) -> FlagOutcome {
        let i = match self.index(x, y) {
            Some(i) => i,
            None => return FlagOutcome::Ignored,
        };
        if self.over || self.revealed[i] || self.flagged[i] {
            return FlagOutcome::Ignored;
        }
        self.flagged[i] = true;
        match self.variant {
            Variant::Numbered => {
                self.over = true;
                FlagOutcome::InstantLoss
            }
            Variant::Pattern => FlagOutcome::Flagged,
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    fn neighbours(&self, x: i32, y: i32) -> impl Iterator<Item = (i32, i32)> + '_ {
        (-1..=1)
            .flat_map(move |dy| (-1..=1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .map(move |(dx, dy)| (x + dx, y + dy))
            .filter(move |&(nx, ny)| self.index(nx, ny).is_some())
    }

    fn compute_adjacency(&mut self) {
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let count = self
                    .neighbours(x, y)
                    .filter(|&(nx, ny)| self.is_mine(nx, ny))
                    .count() as u8;
                if let Some(i) = self.index(x, y) {
                    self.adjacency[i] = count;
                }
            }
        }
    }

    /// Reveal from a safe cell outward through zero-adjacency cells.
    /// Returns how many cells were newly revealed.
    fn flood_fill(&mut self, x: i32, y: i32) -> usize {
        let mut opened = 0;
        let mut stack = vec![(x, y)];
        while let Some((cx, cy)) = stack.pop() {
            let i = match self.index(cx, cy) {
                Some(i) => i,
                None => continue,
            };
            if self.revealed[i] || self.flagged[i] || self.mines[i] {
                continue;
            }
            self.revealed[i] = true;
            opened += 1;
            if self.adjacency[i] == 0 {
                let next: Vec<(i32, i32)> = self.neighbours(cx, cy).collect();
                stack.extend(next);
            }
        }
        opened
    }
}

/// Grid size, mine budgets, and the hard patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinesweeperConfig {
    pub width: usize,
    pub height: usize,
    pub easy_mines: usize,
    #[serde(default)]
    pub patterns: Vec<MinePattern>,
}

impl Default for MinesweeperConfig {
    fn default() -> Self {
        Self {
            width: 8,
            height: 8,
            easy_mines: 10,
            patterns: Vec::new(),
        }
    }
}

impl MinesweeperConfig {
    pub fn load_from_ron(path: &Path) -> Result<MinesweeperConfig, BoardError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&contents)?)
    }
}

/// One minesweeper stage's worth of boards.
///
/// The hard pattern is chosen once and reused on every retry, so a player
/// who dies can learn the layout.
#[derive(Debug, Clone)]
pub struct MinesweeperSession {
    config: MinesweeperConfig,
    difficulty: Difficulty,
    rng: StdRng,
    pattern: Option<usize>,
    board: Option<Board>,
}

impl MinesweeperSession {
    pub fn new(config: MinesweeperConfig, difficulty: Difficulty, seed: u64) -> Self {
        Self {
            config,
            difficulty,
            rng: StdRng::seed_from_u64(seed),
            pattern: None,
            board: None,
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    /// Name of the hard pattern in use, once one has been picked.
    pub fn pattern_name(&self) -> Option<&str> {
        self.pattern
            .and_then(|i| self.config.patterns.get(i))
            .map(|p| p.name.as_str())
    }

    /// Deal a fresh board for the current difficulty.
    ///
    /// Invalid configuration leaves the session without a board, and clicks
    /// are ignored until a valid one is dealt.
    pub fn new_board(&mut self) -> Result<&Board, BoardError> {
        self.board = None;
        let board = match self.difficulty {
            Difficulty::Easy => Board::random(
                self.config.width,
                self.config.height,
                self.config.easy_mines,
                &mut self.rng,
            )?,
            Difficulty::Hard => {
                if self.pattern.is_none() && !self.config.patterns.is_empty() {
                    let indices: Vec<usize> = (0..self.config.patterns.len()).collect();
                    self.pattern = indices.choose(&mut self.rng).copied();
                }
                match self.pattern.and_then(|i| self.config.patterns.get(i)) {
                    Some(pattern) => {
                        Board::from_pattern(self.config.width, self.config.height, pattern)?
                    }
                    None => {
                        warn!("hard_mode_without_pattern");
                        let empty = MinePattern {
                            name: "empty".to_string(),
                            mines: Vec::new(),
                        };
                        Board::from_pattern(self.config.width, self.config.height, &empty)?
                    }
                }
            }
        };
        Ok(self.board.insert(board))
    }

    /// React to a host command from the stage table.
    pub fn command(&mut self, name: &str) -> bool {
        match name {
            "new_board" => match self.new_board() {
                Ok(_) => true,
                Err(e) => {
                    warn!(error = %e, "board_not_created");
                    false
                }
            },
            _ => false,
        }
    }

    pub fn click(&mut self, x: i32, y: i32) -> Option<StageEvent> {
        self.board.as_mut().and_then(|b| b.reveal(x, y).signal())
    }

    pub fn place_flag(&mut self, x: i32, y: i32) -> Option<StageEvent> {
        self.board.as_mut().and_then(|b| b.flag(x, y).signal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(mines: &[(i32, i32)]) -> MinePattern {
        MinePattern {
            name: "test".to_string(),
            mines: mines.to_vec(),
        }
    }

    #[test]
    fn random_places_exact_budget() {
        let mut rng = StdRng::seed_from_u64(1);
        let b = Board::random(8, 8, 10, &mut rng).unwrap();
        assert_eq!(b.mine_count(), 10);
        assert_eq!(b.safe_cells(), 54);
    }

    #[test]
    fn budget_clamped_to_cells() {
        let mut rng = StdRng::seed_from_u64(2);
        let b = Board::random(2, 2, 9, &mut rng).unwrap();
        assert_eq!(b.mine_count(), 4);
        assert_eq!(b.safe_cells(), 0);
    }

    #[test]
    fn zero_sized_grid_rejected() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            Board::random(0, 8, 1, &mut rng),
            Err(BoardError::ZeroSized(0, 8))
        ));
        assert!(Board::from_pattern(3, 0, &pattern(&[])).is_err());
    }

    #[test]
    fn pattern_skips_out_of_range() {
        let b = Board::from_pattern(3, 3, &pattern(&[(0, 0), (5, 5), (-1, 2), (2, 2)])).unwrap();
        assert_eq!(b.mine_count(), 2);
        assert!(b.is_mine(0, 0));
        assert!(b.is_mine(2, 2));
        assert_eq!(b.hint(1, 1), None);
    }

    #[test]
    fn adjacency_counts() {
        let mut b = Board::empty(3, 3, Variant::Numbered).unwrap();
        b.mines[0] = true; // (0,0)
        b.mines[8] = true; // (2,2)
        b.mine_count = 2;
        b.compute_adjacency();
        assert_eq!(b.hint(1, 1), Some(2));
        assert_eq!(b.hint(1, 0), Some(1));
        assert_eq!(b.hint(2, 0), Some(0));
    }

    #[test]
    fn pattern_reveal_has_no_flood() {
        let mut b = Board::from_pattern(3, 3, &pattern(&[(2, 2)])).unwrap();
        assert_eq!(b.reveal(0, 0), RevealOutcome::Revealed(1));
        assert!(!b.is_revealed(1, 1));
    }

    #[test]
    fn flag_loses_on_numbered_board_only() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut numbered = Board::random(4, 4, 2, &mut rng).unwrap();
        assert_eq!(numbered.flag(0, 0), FlagOutcome::InstantLoss);
        assert!(numbered.is_over());
        assert_eq!(numbered.reveal(1, 1), RevealOutcome::Ignored);

        let mut patterned = Board::from_pattern(3, 3, &pattern(&[(1, 1)])).unwrap();
        assert_eq!(patterned.flag(1, 1), FlagOutcome::Flagged);
        assert_eq!(patterned.flag(1, 1), FlagOutcome::Ignored);
        assert_eq!(patterned.reveal(1, 1), RevealOutcome::Ignored);
        assert!(!patterned.is_over());
    }

    #[test]
    fn mine_ends_round() {
        let mut b = Board::from_pattern(2, 2, &pattern(&[(0, 0)])).unwrap();
        assert_eq!(b.reveal(0, 0), RevealOutcome::Mine);
        assert_eq!(RevealOutcome::Mine.signal(), Some(StageEvent::signal("bomb_hit")));
        assert_eq!(b.reveal(1, 1), RevealOutcome::Ignored);
        assert!(!b.is_won());
    }

    #[test]
    fn pattern_win_reported_once() {
        let mut b = Board::from_pattern(2, 1, &pattern(&[(0, 0)])).unwrap();
        assert_eq!(b.reveal(1, 0), RevealOutcome::Won);
        assert!(b.is_won());
        assert_eq!(b.reveal(1, 0), RevealOutcome::Ignored);
    }

    #[test]
    fn out_of_range_input_ignored() {
        let mut b = Board::from_pattern(2, 2, &pattern(&[])).unwrap();
        assert_eq!(b.reveal(-1, 0), RevealOutcome::Ignored);
        assert_eq!(b.reveal(0, 2), RevealOutcome::Ignored);
        assert_eq!(b.flag(5, 5), FlagOutcome::Ignored);
    }

    #[test]
    fn hard_session_keeps_pattern_across_retries() {
        let config = MinesweeperConfig {
            width: 4,
            height: 4,
            easy_mines: 3,
            patterns: vec![pattern(&[(0, 0)]), pattern(&[(3, 3)]), pattern(&[(1, 2)])],
        };
        let mut session = MinesweeperSession::new(config, Difficulty::Hard, 99);
        assert!(session.command("new_board"));
        let first: Vec<bool> = (0..16)
            .map(|i| session.board().unwrap().is_mine(i % 4, i / 4))
            .collect();
        for _ in 0..5 {
            session.command("new_board");
            let again: Vec<bool> = (0..16)
                .map(|i| session.board().unwrap().is_mine(i % 4, i / 4))
                .collect();
            assert_eq!(first, again);
        }
        assert_eq!(session.board().unwrap().variant(), Variant::Pattern);
    }

    #[test]
    fn session_without_board_ignores_clicks() {
        let mut session = MinesweeperSession::new(MinesweeperConfig::default(), Difficulty::Easy, 5);
        assert!(session.click(0, 0).is_none());
        assert!(session.place_flag(0, 0).is_none());
        assert!(!session.command("shake_doll"));
    }

    #[test]
    fn easy_session_flag_signals_loss() {
        let mut session = MinesweeperSession::new(MinesweeperConfig::default(), Difficulty::Easy, 6);
        session.command("new_board");
        assert_eq!(session.place_flag(3, 3), Some(StageEvent::signal("flag_placed")));
    }

    #[test]
    fn config_parses_from_ron() {
        let config: MinesweeperConfig = ron::from_str(
            r#"(
                width: 8,
                height: 8,
                easy_mines: 10,
                patterns: [(name: "corners", mines: [(0, 0), (7, 7)])],
            )"#,
        )
        .unwrap();
        assert_eq!(config.patterns[0].mines.len(), 2);
    }
}
