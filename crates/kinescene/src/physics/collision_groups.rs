//! Collision group words used as simulation filter data
//!
//! Three 32-bit words travel with every shape:
//! - word 0: groups the shape belongs to
//! - word 1: groups the shape collides with
//! - word 2: "ignore" groups; shapes sharing any bit here never collide
//!
//! [`CollisionGroups::set`] takes raw words. [`CollisionGroups::add`] takes
//! small group numbers `1..=32`, where group `n` is bit `n - 1` and group `0`
//! sets no bit.

use serde::{Deserialize, Serialize};

/// Filter words attached to a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollisionGroups {
    /// Membership word
    pub w0: u32,
    /// Collides-with word
    pub w1: u32,
    /// Ignore word
    pub w2: u32,
}

impl Default for CollisionGroups {
    /// Member of group 1, collides with group 1, ignores nothing
    fn default() -> Self {
        Self { w0: 1, w1: 1, w2: 0 }
    }
}

impl CollisionGroups {
    /// No bits set in any word
    pub const NONE: Self = Self { w0: 0, w1: 0, w2: 0 };

    /// Bit for a group number, zero for group 0 or groups beyond 32
    pub fn bit(group: u32) -> u32 {
        if group == 0 || group > 32 {
            0
        } else {
            1 << (group - 1)
        }
    }

    /// Replace all three words with raw values
    pub fn set(&mut self, w0: u32, w1: u32, w2: u32) {
        self.w0 = w0;
        self.w1 = w1;
        self.w2 = w2;
    }

    /// OR the bit of each nonzero group number into its word
    pub fn add(&mut self, g0: u32, g1: u32, g2: u32) {
        if g0 > 32 || g1 > 32 || g2 > 32 {
            log::warn!("Collision group numbers above 32 are ignored ({g0}, {g1}, {g2})");
        }
        self.w0 |= Self::bit(g0);
        self.w1 |= Self::bit(g1);
        self.w2 |= Self::bit(g2);
    }

    /// Restore the default configuration
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Check if two shapes should collide given their filter words
    ///
    /// A's membership must intersect B's collides-with word and vice versa,
    /// and the two must not share an ignore group.
    ///
    /// # Example
    /// ```
    /// use kinescene::physics::CollisionGroups;
    ///
    /// let robot = CollisionGroups { w0: 0b01, w1: 0b10, w2: 0 };
    /// let table = CollisionGroups { w0: 0b10, w1: 0b01, w2: 0 };
    /// assert!(CollisionGroups::should_collide(&robot, &table));
    /// ```
    pub fn should_collide(a: &Self, b: &Self) -> bool {
        if a.w2 & b.w2 != 0 {
            return false;
        }
        (a.w0 & b.w1) != 0 && (b.w0 & a.w1) != 0
    }

    /// Helper to create a word from several group numbers
    pub fn mask(groups: &[u32]) -> u32 {
        groups.iter().fold(0, |acc, &group| acc | Self::bit(group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_words() {
        let groups = CollisionGroups::default();
        assert_eq!((groups.w0, groups.w1, groups.w2), (1, 1, 0));
    }

    #[test]
    fn test_add_ors_group_bits() {
        let mut groups = CollisionGroups::NONE;
        groups.add(1, 3, 0);
        groups.add(2, 0, 32);
        assert_eq!(groups.w0, 0b11);
        assert_eq!(groups.w1, 0b100);
        assert_eq!(groups.w2, 1 << 31);
    }

    #[test]
    fn test_group_zero_sets_nothing() {
        let mut groups = CollisionGroups::NONE;
        groups.add(0, 0, 0);
        assert_eq!(groups, CollisionGroups::NONE);
    }

    #[test]
    fn test_reset_restores_default() {
        let mut groups = CollisionGroups::NONE;
        groups.add(5, 6, 7);
        groups.reset();
        assert_eq!(groups, CollisionGroups::default());
    }

    #[test]
    fn test_should_collide_mutual() {
        let a = CollisionGroups::default();
        let b = CollisionGroups::default();
        assert!(CollisionGroups::should_collide(&a, &b));
    }

    #[test]
    fn test_should_not_collide_one_way() {
        let a = CollisionGroups { w0: 0b01, w1: 0b10, w2: 0 };
        let b = CollisionGroups { w0: 0b10, w1: 0b10, w2: 0 };
        assert!(!CollisionGroups::should_collide(&a, &b));
    }

    #[test]
    fn test_shared_ignore_group_blocks_collision() {
        let a = CollisionGroups { w0: 1, w1: 1, w2: CollisionGroups::bit(4) };
        let b = CollisionGroups { w0: 1, w1: 1, w2: CollisionGroups::mask(&[4, 5]) };
        assert!(!CollisionGroups::should_collide(&a, &b));
    }
}
