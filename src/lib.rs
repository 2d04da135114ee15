//! Stage Narrator — dialogue-gated stage sequencing for narrative minigames.
//!
//! Each stage is a table-driven state machine that reacts to narrator
//! dialogue completion, timers, and gameplay events. A stage manager walks
//! the player through levels of stages, and a single-threaded runtime
//! dispatches every event in arrival order.

pub mod core;
pub mod schema;
