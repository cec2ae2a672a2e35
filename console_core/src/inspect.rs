use std::fmt;

use serde::{Deserialize, Serialize};

/// Snapshot accessor the console needs from the inspected target.
pub trait Inspect {
    /// Human readable via `Display` (`stats`), machine readable via serde
    /// (`stats-json`).
    type Stats: Serialize + fmt::Display;

    fn stats(&self) -> Self::Stats;
}

/// One line of `stats-json` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport<S> {
    pub ticks: u64,
    pub stats: S,
}
