//! Per-entity event registries
//!
//! - One registry per emitting instance (scene, actor, articulation)
//! - One subscriber list per [`EventKind`], so only interested handlers run
//! - Synchronous delivery: handlers run on the emitting thread, at the point of
//!   emission, in subscription order
//!
//! Handlers receive ids, never references into the scene. A handler that
//! outlives its subject must unsubscribe itself; the registry does not track
//! subject lifetimes.

use crate::foundation::ids::ActorId;
use crate::physics::contact::{Contact, TriggerTransition};
use crate::physics::ShapeHandle;
use crate::scene::ArticulationHandle;
use std::collections::HashMap;

/// Event type identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An actor or link is about to be destroyed
    ActorPreDestroy,
    /// An articulation is about to be destroyed
    ArticulationPreDestroy,
    /// An actor or link is about to be stepped
    ActorStep,
    /// An articulation is about to be stepped
    ArticulationStep,
    /// A scene step finished
    Step,
    /// An actor is part of a contact transition
    ActorContact,
    /// An actor is part of a trigger transition
    ActorTrigger,
}

/// Event payloads
#[derive(Debug, Clone)]
pub enum Event {
    /// Emitted before any teardown of the actor happens
    ActorPreDestroy {
        /// Actor being destroyed
        actor: ActorId,
    },
    /// Emitted before any teardown of the articulation happens
    ArticulationPreDestroy {
        /// Articulation being destroyed
        articulation: ArticulationHandle,
    },
    /// Emitted from the pre-step hook of a live actor
    ActorStep {
        /// Actor about to be stepped
        actor: ActorId,
        /// Timestep of the upcoming step
        timestep: f32,
    },
    /// Emitted from the pre-step hook of a live articulation
    ArticulationStep {
        /// Articulation about to be stepped
        articulation: ArticulationHandle,
        /// Timestep of the upcoming step
        timestep: f32,
    },
    /// Emitted once per completed scene step, after cleanup
    Step {
        /// Timestep of the step that just completed
        timestep: f32,
        /// Actors and articulations erased by this step's cleanup
        released: usize,
    },
    /// Emitted to each actor of a contact pair
    ActorContact {
        /// Receiving actor
        actor: ActorId,
        /// The other participant
        other: ActorId,
        /// Contact record as delivered by the backend
        contact: Contact,
    },
    /// Emitted to the trigger actor and the actor entering or leaving it
    ActorTrigger {
        /// Actor owning the trigger shape
        trigger_actor: ActorId,
        /// Actor owning the other shape
        other_actor: ActorId,
        /// Trigger shape
        trigger_shape: ShapeHandle,
        /// Enter or leave
        transition: TriggerTransition,
    },
}

impl Event {
    /// Kind tag used for subscriber lookup
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ActorPreDestroy { .. } => EventKind::ActorPreDestroy,
            Self::ArticulationPreDestroy { .. } => EventKind::ArticulationPreDestroy,
            Self::ActorStep { .. } => EventKind::ActorStep,
            Self::ArticulationStep { .. } => EventKind::ArticulationStep,
            Self::Step { .. } => EventKind::Step,
            Self::ActorContact { .. } => EventKind::ActorContact,
            Self::ActorTrigger { .. } => EventKind::ActorTrigger,
        }
    }
}

/// Event handler trait
pub trait EventHandler {
    /// Handle an event
    fn on_event(&mut self, event: &Event);
}

impl<F: FnMut(&Event)> EventHandler for F {
    fn on_event(&mut self, event: &Event) {
        self(event);
    }
}

/// Token returned by [`EventRegistry::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    handler: Box<dyn EventHandler>,
}

/// Per-instance publish/subscribe registry
pub struct EventRegistry {
    handlers: HashMap<EventKind, Vec<Subscriber>>,
    next_id: u64,
}

impl EventRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register a handler for a specific event kind
    pub fn subscribe(&mut self, kind: EventKind, handler: Box<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers
            .entry(kind)
            .or_default()
            .push(Subscriber { id, handler });
        id
    }

    /// Remove a handler. Returns false if the id is unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for subscribers in self.handlers.values_mut() {
            if let Some(pos) = subscribers.iter().position(|s| s.id == id) {
                subscribers.remove(pos);
                return true;
            }
        }
        false
    }

    /// Deliver an event to every handler registered for its kind
    pub fn emit(&mut self, event: &Event) {
        if let Some(subscribers) = self.handlers.get_mut(&event.kind()) {
            for subscriber in subscribers.iter_mut() {
                subscriber.handler.on_event(event);
            }
        }
    }

    /// Number of handlers registered for `kind`
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Drop every handler
    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut counts: Vec<_> = self
            .handlers
            .iter()
            .map(|(kind, subs)| (*kind, subs.len()))
            .collect();
        counts.sort_by_key(|(kind, _)| format!("{kind:?}"));
        f.debug_struct("EventRegistry").field("handlers", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_only_matching_kind_is_notified() {
        let mut registry = EventRegistry::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        registry.subscribe(
            EventKind::Step,
            Box::new(move |event: &Event| sink.borrow_mut().push(event.kind())),
        );

        registry.emit(&Event::ActorStep { actor: ActorId(1), timestep: 0.01 });
        registry.emit(&Event::Step { timestep: 0.01, released: 0 });

        assert_eq!(*seen.borrow(), vec![EventKind::Step]);
    }

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let mut registry = EventRegistry::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in 0..3 {
            let order = Rc::clone(&order);
            registry.subscribe(
                EventKind::Step,
                Box::new(move |_: &Event| order.borrow_mut().push(tag)),
            );
        }
        registry.emit(&Event::Step { timestep: 0.0, released: 0 });
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unsubscribe() {
        let mut registry = EventRegistry::new();
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        let id = registry.subscribe(
            EventKind::Step,
            Box::new(move |_: &Event| *c.borrow_mut() += 1),
        );

        registry.emit(&Event::Step { timestep: 0.0, released: 0 });
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.emit(&Event::Step { timestep: 0.0, released: 0 });

        assert_eq!(*count.borrow(), 1);
        assert_eq!(registry.subscriber_count(EventKind::Step), 0);
    }
}
