//! Load generations.
//!
//! Each load takes a `Ticket`; invalidating the generation (identity change,
//! sign-out, unmount) makes every outstanding ticket stale. Results are only
//! written while their ticket is current.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Generation {
    current: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
pub struct Ticket {
    current: Arc<AtomicU64>,
    issued: u64,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation. Earlier tickets become stale.
    pub fn begin(&self) -> Ticket {
        let issued = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket {
            current: Arc::clone(&self.current),
            issued,
        }
    }

    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }
}

impl Ticket {
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.issued
    }

    pub fn id(&self) -> u64 {
        self.issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generation_supersedes_old_ticket() {
        let generation = Generation::new();
        let first = generation.begin();
        assert!(first.is_current());

        let second = generation.begin();
        assert!(!first.is_current());
        assert!(second.is_current());
    }

    #[test]
    fn test_invalidate_revokes_current_ticket() {
        let generation = Generation::new();
        let ticket = generation.begin();
        generation.invalidate();
        assert!(!ticket.is_current());
    }
}
