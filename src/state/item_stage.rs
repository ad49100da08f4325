/// Stage definitions for tracking an item through the pipeline
///
/// Stages are not stored as a column; they are derived from which stage
/// timestamps an item carries.
use std::fmt;

/// The furthest stage an item has completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemStage {
    /// Item has been admitted and waits to be fetched
    Discovered,

    /// Raw payload is stored and waits to be processed
    Fetched,

    /// Formatted text is stored and waits to be published
    Processed,

    /// Formatted text has been posted downstream (terminal)
    Published,
}

impl ItemStage {
    /// Derives the stage from the presence of each stage timestamp
    ///
    /// Returns `None` when the timestamps skip a stage, which the queue
    /// operations never produce.
    pub fn from_markers(fetched: bool, processed: bool, published: bool) -> Option<Self> {
        match (fetched, processed, published) {
            (false, false, false) => Some(Self::Discovered),
            (true, false, false) => Some(Self::Fetched),
            (true, true, false) => Some(Self::Processed),
            (true, true, true) => Some(Self::Published),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Fetched => "fetched",
            Self::Processed => "processed",
            Self::Published => "published",
        }
    }
}

impl fmt::Display for ItemStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
