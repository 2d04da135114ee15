/// Minesweeper demo — the host answers the stage's `new_board` commands and
/// turns clicks into stage signals.
///
/// Run with: cargo run --example minesweeper [-- hard]

use stage_narrator::core::manager::{LevelDefinition, MemoryProgressStore};
use stage_narrator::core::minesweeper::{Board, MinesweeperConfig, MinesweeperSession};
use stage_narrator::core::runtime::{Notice, StageRuntime};
use stage_narrator::core::surface::{Recorder, SurfaceCommand};
use stage_narrator::schema::stage::Difficulty;
use std::time::Duration;

fn main() {
    let difficulty = match std::env::args().nth(1).as_deref() {
        Some("hard") => Difficulty::Hard,
        _ => Difficulty::Easy,
    };

    let config =
        MinesweeperConfig::load_from_ron(std::path::Path::new("stage_data/minesweeper.ron"))
            .expect("Failed to load minesweeper config");
    let mut session = MinesweeperSession::new(config, difficulty, 2026);

    let recorder = Recorder::new();
    let mut runtime = StageRuntime::builder()
        .stages_dir("stage_data/stages")
        .with_levels(vec![LevelDefinition {
            name: "puzzles".to_string(),
            stages: vec!["minesweeper".to_string()],
        }])
        .presentation(recorder.clone())
        .progress_store(MemoryProgressStore::new())
        .difficulty(difficulty)
        .build()
        .expect("Failed to build runtime");

    println!("=== Minesweeper ({:?}) ===\n", difficulty);
    host(&mut session, &recorder, &runtime.start());
    host(&mut session, &recorder, &runtime.advance(Duration::from_secs(4)));

    // First round: walk into a mine on purpose
    if let Some((x, y)) = find_cell(&session, true) {
        println!("\n> click ({}, {})", x, y);
        if let Some(signal) = session.click(x, y) {
            host(&mut session, &recorder, &runtime.send(signal));
        }
    }
    host(&mut session, &recorder, &runtime.advance(Duration::from_secs(6)));

    // Second round: clear every safe cell
    println!("\n> clearing the board");
    while let Some((x, y)) = find_cell(&session, false) {
        if let Some(signal) = session.click(x, y) {
            host(&mut session, &recorder, &runtime.send(signal));
            break;
        }
    }
    host(&mut session, &recorder, &runtime.advance(Duration::from_secs(3)));

    if let Some(board) = session.board() {
        print_board(board);
    }
}

/// First unrevealed cell that is (or is not) a mine.
fn find_cell(session: &MinesweeperSession, mine: bool) -> Option<(i32, i32)> {
    let board = session.board()?;
    if board.is_over() {
        return None;
    }
    (0..board.height() as i32)
        .flat_map(|y| (0..board.width() as i32).map(move |x| (x, y)))
        .find(|&(x, y)| board.is_mine(x, y) == mine && !board.is_revealed(x, y))
}

fn host(session: &mut MinesweeperSession, recorder: &Recorder, notices: &[Notice]) {
    for command in recorder.drain() {
        if let SurfaceCommand::Line(text) = command {
            println!("  NARRATOR: {}", text);
        }
    }
    for notice in notices {
        println!("  {:?}", notice);
        if let Notice::Command { name, .. } = notice {
            session.command(name);
        }
    }
}

fn print_board(board: &Board) {
    for y in 0..board.height() as i32 {
        let row: String = (0..board.width() as i32)
            .map(|x| match (board.is_revealed(x, y), board.is_mine(x, y), board.hint(x, y)) {
                (true, true, _) => '*',
                (true, false, Some(n)) if n > 0 => char::from(b'0' + n),
                (true, false, _) => '.',
                (false, _, _) => '#',
            })
            .collect();
        println!("  {}", row);
    }
}
