//! Command implementations and terminal rendering.

pub mod details;
pub mod returns;
pub mod setup;
pub mod ui;
pub mod update;
