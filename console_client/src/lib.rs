//! Terminal front ends for the live console: a line client for remote
//! consoles and a `ratatui` dashboard that works against a remote or an
//! in-process console.

pub mod connection;
pub mod logs;
pub mod monitor;
pub mod ui;
