use std::fmt;

use crate::types::BlockId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The chain reached `height` with block `id`.
    Block { height: u64, id: BlockId },
    /// Blocks above this height were replaced.
    Rollback(u64),
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Block { height, id } => write!(f, "Block {}: {}", height, id),
            Event::Rollback(height) => write!(f, "Rollback: {}", height),
        }
    }
}
