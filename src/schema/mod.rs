pub mod dialogue;
pub mod event;
pub mod stage;
