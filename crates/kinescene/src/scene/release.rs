//! Backend handles of entities that were built but never owned by a scene
//!
//! A built actor or articulation carries a [`ReleaseQueue`] until the scene
//! takes ownership of it. Dropping it before that (or a rejected `add_*`)
//! parks its handles here, and the scene releases them at its next cleanup
//! point, when no step is in flight.

use crate::physics::{BodyHandle, CacheHandle, MultibodyHandle};
use crate::render::RenderBodyHandle;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handles left behind by an unowned entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Orphan {
    Body {
        body: BodyHandle,
        proxies: Vec<RenderBodyHandle>,
    },
    Articulation {
        multibody: MultibodyHandle,
        cache: CacheHandle,
        proxies: Vec<RenderBodyHandle>,
    },
}

/// Shared queue of orphaned handles, drained by the owning scene
#[derive(Debug, Clone, Default)]
pub(crate) struct ReleaseQueue(Arc<Mutex<Vec<Orphan>>>);

impl ReleaseQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, orphan: Orphan) {
        self.lock().push(orphan);
    }

    pub(crate) fn drain(&self) -> Vec<Orphan> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Orphan>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_queue() {
        let queue = ReleaseQueue::new();
        let shared = queue.clone();
        shared.push(Orphan::Body {
            body: BodyHandle(7),
            proxies: Vec::new(),
        });

        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert!(matches!(drained[0], Orphan::Body { body: BodyHandle(7), .. }));
        assert!(shared.drain().is_empty());
    }
}
