pub mod dialogue;
pub mod manager;
pub mod minesweeper;
pub mod runtime;
pub mod scheduler;
pub mod sequencer;
pub mod surface;
pub mod wordle;
