//! Contact pair bookkeeping
//!
//! The backend reports, per touching shape pair, a start, any number of
//! persists and an end. [`ContactTracker`] keeps exactly one record per pair
//! that is currently touching. Out-of-sequence notifications are logged and
//! absorbed so a misbehaving backend never takes the scene down.

use crate::foundation::ids::ActorId;
use crate::foundation::math::Vec3;
use crate::physics::ShapeHandle;
use std::collections::{BTreeMap, HashSet};

/// Transition carried by a contact notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactTransition {
    /// The pair started touching this step
    Starting,
    /// The pair was touching before and still is
    Persisting,
    /// The pair stopped touching this step
    Ending,
}

/// Trigger transition reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTransition {
    /// The other shape entered the trigger volume
    Enter,
    /// The other shape left the trigger volume
    Leave,
}

/// Raw trigger notification produced by the physics backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    /// Shape flagged as a trigger
    pub trigger_shape: ShapeHandle,
    /// Shape entering or leaving it
    pub other_shape: ShapeHandle,
    /// Enter or leave
    pub transition: TriggerTransition,
}

/// One contact point of a touching pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// World-space position
    pub position: Vec3,
    /// World-space normal pointing from the second shape to the first
    pub normal: Vec3,
    /// Impulse applied at this point during the step
    pub impulse: Vec3,
    /// Penetration (negative) or gap (positive) along the normal
    pub separation: f32,
}

/// Raw notification produced by the physics backend
#[derive(Debug, Clone, PartialEq)]
pub struct ContactEvent {
    /// The two shapes involved, in backend order
    pub shapes: [ShapeHandle; 2],
    /// Transition kind
    pub transition: ContactTransition,
    /// Contact geometry summary
    pub points: Vec<ContactPoint>,
}

/// Contact record stored by the tracker and handed to listeners
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    /// Actors owning `shapes[0]` and `shapes[1]`
    pub actors: [ActorId; 2],
    /// The two shapes, in backend order
    pub shapes: [ShapeHandle; 2],
    /// Transition that produced this record
    pub transition: ContactTransition,
    /// Contact geometry summary
    pub points: Vec<ContactPoint>,
}

impl Contact {
    /// Whether the pair started touching with this record
    pub fn starts(&self) -> bool {
        self.transition == ContactTransition::Starting
    }

    /// Whether the record updates an ongoing contact
    pub fn persists(&self) -> bool {
        self.transition == ContactTransition::Persisting
    }

    /// Whether the record closes a contact
    pub fn ends(&self) -> bool {
        self.transition == ContactTransition::Ending
    }

    /// Sum of point impulses
    pub fn total_impulse(&self) -> Vec3 {
        self.points.iter().fold(Vec3::zeros(), |acc, p| acc + p.impulse)
    }
}

/// Unordered shape pair, smaller handle first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey(ShapeHandle, ShapeHandle);

impl PairKey {
    /// Create a key; `(a, b)` and `(b, a)` produce the same key
    pub fn new(a: ShapeHandle, b: ShapeHandle) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    /// Whether either side is `shape`
    pub fn involves(&self, shape: ShapeHandle) -> bool {
        self.0 == shape || self.1 == shape
    }
}

/// Shape-pair keyed contact state machine
#[derive(Debug, Default)]
pub struct ContactTracker {
    contacts: BTreeMap<PairKey, Contact>,
    inconsistencies: usize,
}

impl ContactTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one notification
    ///
    /// - start: inserts; an existing record is overwritten with an error log
    /// - persist: replaces; a missing record is logged and then inserted
    /// - end: erases; a missing record is logged and ignored
    pub fn update(&mut self, contact: Contact) {
        let key = PairKey::new(contact.shapes[0], contact.shapes[1]);
        match contact.transition {
            ContactTransition::Starting => {
                if self.contacts.contains_key(&key) {
                    log::error!(
                        "Error adding contact pair {:?}/{:?}: it already exists",
                        contact.shapes[0],
                        contact.shapes[1]
                    );
                    self.inconsistencies += 1;
                }
                self.contacts.insert(key, contact);
            }
            ContactTransition::Persisting => {
                if !self.contacts.contains_key(&key) {
                    log::error!(
                        "Error updating contact pair {:?}/{:?}: it has not started",
                        contact.shapes[0],
                        contact.shapes[1]
                    );
                    self.inconsistencies += 1;
                }
                self.contacts.insert(key, contact);
            }
            ContactTransition::Ending => {
                if self.contacts.remove(&key).is_none() {
                    log::error!(
                        "Error ending contact pair {:?}/{:?}: it has not started",
                        contact.shapes[0],
                        contact.shapes[1]
                    );
                    self.inconsistencies += 1;
                }
            }
        }
    }

    /// Snapshot of every currently touching pair, ordered by pair key.
    ///
    /// The borrow keeps the tracker from being updated while the snapshot lives.
    pub fn contacts(&self) -> Vec<&Contact> {
        self.contacts.values().collect()
    }

    /// Record of a pair, in either order
    pub fn get(&self, a: ShapeHandle, b: ShapeHandle) -> Option<&Contact> {
        self.contacts.get(&PairKey::new(a, b))
    }

    /// Whether a pair is currently touching
    pub fn contains(&self, a: ShapeHandle, b: ShapeHandle) -> bool {
        self.contacts.contains_key(&PairKey::new(a, b))
    }

    /// Drop every record involving one of `shapes`. Returns how many were dropped.
    pub fn forget_shapes(&mut self, shapes: &HashSet<ShapeHandle>) -> usize {
        let before = self.contacts.len();
        self.contacts
            .retain(|key, _| !shapes.contains(&key.0) && !shapes.contains(&key.1));
        before - self.contacts.len()
    }

    /// Number of touching pairs
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Whether no pair is touching
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Number of out-of-sequence notifications absorbed so far
    pub fn inconsistency_count(&self) -> usize {
        self.inconsistencies
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.contacts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(a: u64, b: u64, transition: ContactTransition, separation: f32) -> Contact {
        Contact {
            actors: [ActorId(1), ActorId(2)],
            shapes: [ShapeHandle(a), ShapeHandle(b)],
            transition,
            points: vec![ContactPoint {
                position: Vec3::zeros(),
                normal: Vec3::z(),
                impulse: Vec3::new(0.0, 0.0, 1.0),
                separation,
            }],
        }
    }

    #[test]
    fn test_start_persist_end_lifecycle() {
        let mut tracker = ContactTracker::new();
        tracker.update(contact(1, 2, ContactTransition::Starting, 0.0));
        assert_eq!(tracker.len(), 1);

        tracker.update(contact(1, 2, ContactTransition::Persisting, -0.01));
        let stored = tracker.get(ShapeHandle(1), ShapeHandle(2)).unwrap();
        assert!(stored.persists());
        assert_eq!(stored.points[0].separation, -0.01);

        tracker.update(contact(1, 2, ContactTransition::Ending, 0.0));
        assert!(tracker.is_empty());
        assert_eq!(tracker.inconsistency_count(), 0);
    }

    #[test]
    fn test_pair_key_is_unordered() {
        let mut tracker = ContactTracker::new();
        tracker.update(contact(7, 3, ContactTransition::Starting, 0.0));
        assert!(tracker.contains(ShapeHandle(3), ShapeHandle(7)));
        tracker.update(contact(3, 7, ContactTransition::Ending, 0.0));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_duplicate_start_overwrites() {
        let mut tracker = ContactTracker::new();
        tracker.update(contact(1, 2, ContactTransition::Starting, 0.0));
        tracker.update(contact(1, 2, ContactTransition::Starting, -0.5));
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.inconsistency_count(), 1);
        let stored = tracker.get(ShapeHandle(1), ShapeHandle(2)).unwrap();
        assert_eq!(stored.points[0].separation, -0.5);
    }

    #[test]
    fn test_persist_without_start_is_recovered() {
        let mut tracker = ContactTracker::new();
        tracker.update(contact(1, 2, ContactTransition::Persisting, 0.0));
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.inconsistency_count(), 1);
    }

    #[test]
    fn test_end_without_start_is_ignored() {
        let mut tracker = ContactTracker::new();
        tracker.update(contact(1, 2, ContactTransition::Ending, 0.0));
        assert!(tracker.is_empty());
        assert_eq!(tracker.inconsistency_count(), 1);
    }

    #[test]
    fn test_forget_shapes() {
        let mut tracker = ContactTracker::new();
        tracker.update(contact(1, 2, ContactTransition::Starting, 0.0));
        tracker.update(contact(3, 4, ContactTransition::Starting, 0.0));
        let removed: HashSet<_> = [ShapeHandle(2)].into_iter().collect();
        assert_eq!(tracker.forget_shapes(&removed), 1);
        assert!(tracker.contains(ShapeHandle(3), ShapeHandle(4)));
        assert!(!tracker.contains(ShapeHandle(1), ShapeHandle(2)));
    }
}
