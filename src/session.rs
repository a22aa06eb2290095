use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::data::{ItemService, SearchService};
use crate::navigation::{Direction, NavOutcome, Navigator};
use crate::scroll::{MountAction, ScrollKeeper};
use crate::store::{PostLookup, Store, StoreEvent, StoreOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Store(StoreEvent),
    Navigation(NavOutcome),
}

/// Everything one browsing session shares between the list and detail views.
pub struct BrowseSession {
    store: Store,
    navigator: Navigator,
    scroll: ScrollKeeper,
}

impl BrowseSession {
    pub fn new(
        search: Arc<dyn SearchService>,
        items: Arc<dyn ItemService>,
        options: StoreOptions,
    ) -> Self {
        debug!(query = %options.query, range = %options.time_range, "browse session created");
        Self {
            store: Store::new(search, items, options),
            navigator: Navigator::new(),
            scroll: ScrollKeeper::new(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn scroll(&self) -> &ScrollKeeper {
        &self.scroll
    }

    pub fn mount_list(&mut self) -> MountAction {
        let action = self.scroll.on_list_mount(&mut self.store);
        if action == MountAction::Fetch {
            self.store.refresh();
        }
        action
    }

    pub fn open_post(&mut self, id: &str, list_offset: u32) -> PostLookup {
        self.scroll.capture(list_offset);
        self.navigator.cancel();
        self.store.load_post(id)
    }

    /// Opens a post without a list behind it, such as one named on the command line.
    pub fn open_direct(&mut self, id: &str) -> PostLookup {
        self.navigator.cancel();
        self.store.load_post(id)
    }

    pub fn return_to_list(&mut self) -> MountAction {
        self.navigator.cancel();
        self.store.set_preserve_state(true);
        self.mount_list()
    }

    pub fn navigate(&mut self, current: &str, direction: Direction) -> NavOutcome {
        let outcome = self.navigator.navigate(&mut self.store, current, direction);
        if let NavOutcome::Resolved(id) = &outcome {
            self.store.load_post(id);
        }
        outcome
    }

    pub fn has_next(&self, current: &str) -> bool {
        self.navigator.has_next(&self.store, current)
    }

    pub fn has_prev(&self, current: &str) -> bool {
        self.navigator.has_prev(&self.store, current)
    }

    pub fn after_paint(&mut self) -> Option<u32> {
        self.scroll.after_paint(&mut self.store)
    }

    /// Fires due debounces and applies every response that has arrived.
    pub fn update(&mut self, now: Instant) -> Vec<SessionEvent> {
        self.store.tick(now);
        let events = self.store.poll();
        self.route(events)
    }

    pub fn wait(&mut self, timeout: Duration) -> Vec<SessionEvent> {
        let events = self.store.wait(timeout);
        self.route(events)
    }

    fn route(&mut self, events: Vec<StoreEvent>) -> Vec<SessionEvent> {
        let mut routed = Vec::with_capacity(events.len());
        for event in events {
            let outcome = self.navigator.on_event(&self.store, &event);
            routed.push(SessionEvent::Store(event));
            if let Some(outcome) = outcome {
                if let NavOutcome::Resolved(id) = &outcome {
                    self.store.load_post(id);
                }
                routed.push(SessionEvent::Navigation(outcome));
            }
        }
        routed
    }
}
