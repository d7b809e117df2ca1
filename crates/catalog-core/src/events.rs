//! Typed engine notifications.

use crate::progress::ProgressEvent;

#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    Progress(ProgressEvent),
    ContextLost,
    ContextRestored,
    CharacterClicked,
    /// The page scrolled past (or back above) one third of the viewport.
    ScrolledPastFold(bool),
}

impl EngineEvent {
    /// Stable name used when forwarding to page listeners.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::Progress(_) => "progress",
            EngineEvent::ContextLost => "context_lost",
            EngineEvent::ContextRestored => "context_restored",
            EngineEvent::CharacterClicked => "character_click",
            EngineEvent::ScrolledPastFold(_) => "scrolled",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&EngineEvent)>;

/// Publish/subscribe hub owned by the engine instance.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F: FnMut(&EngineEvent) + 'static>(&mut self, f: F) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.listeners.push((id, Box::new(f)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: &EngineEvent) {
        for (_, l) in self.listeners.iter_mut() {
            l(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
