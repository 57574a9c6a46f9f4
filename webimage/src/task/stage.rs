//! Pipeline stages of a load task.

use std::fmt;

/// Where a load task currently is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stage {
    /// Waiting on the cache lookup.
    #[default]
    Lookup,
    /// Running the editor on the decode/edit executor.
    Editing,
    /// Waiting on the fetch port.
    Fetching,
    /// Decoding fetched bytes.
    Decoding,
    /// Completion has been scheduled.
    Done,
    /// Cancelled by the caller; completion will never run.
    Cancelled,
}

impl Stage {
    /// Returns true once no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lookup => "lookup",
            Self::Editing => "editing",
            Self::Fetching => "fetching",
            Self::Decoding => "decoding",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Marker returned by the stage guard once a task has been cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cancelled;
