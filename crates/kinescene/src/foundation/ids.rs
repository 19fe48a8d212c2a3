//! Scene-scoped identifier generation
//!
//! Actors and articulation links share one id space per scene; renderer
//! proxies draw from a second, independent one. Id `0` is never issued so it
//! can stand for "no entity" in segmentation output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scene-unique identifier of an actor or articulation link
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u32);

impl ActorId {
    /// Raw numeric value (also used as the segmentation id of the actor's proxies)
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// Scene-unique identifier of a renderer proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RenderId(pub u32);

/// Monotonic id source
#[derive(Debug, Clone)]
pub struct IdGenerator {
    next: u32,
}

impl IdGenerator {
    /// Create a generator whose first id is 1
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Issue the next id
    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.wrapping_add(1).max(1);
        id
    }

    /// Peek at the id the next call will return
    pub fn peek(&self) -> u32 {
        self.next
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut gen = IdGenerator::new();
        assert_eq!(gen.next_id(), 1);
        assert_eq!(gen.next_id(), 2);
        assert_eq!(gen.peek(), 3);
    }

    #[test]
    fn test_zero_is_skipped_on_wrap() {
        let mut gen = IdGenerator { next: u32::MAX };
        assert_eq!(gen.next_id(), u32::MAX);
        assert_eq!(gen.next_id(), 1);
    }
}
