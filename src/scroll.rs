//! Single-slot list scroll preservation across list/detail round trips.

use crate::store::Store;

/// Name of the only persisted value.
pub const SCROLL_SLOT: &str = "list.scroll_offset";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountAction {
    Fetch,
    Reuse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Restore {
    Idle,
    Armed { offset: u32, painted: bool },
}

#[derive(Debug)]
pub struct ScrollKeeper {
    slot: Option<u32>,
    restore: Restore,
}

impl Default for ScrollKeeper {
    fn default() -> Self {
        Self {
            slot: None,
            restore: Restore::Idle,
        }
    }
}

impl ScrollKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&mut self, offset: u32) {
        tracing::trace!(slot = SCROLL_SLOT, offset, "scroll offset captured");
        self.slot = Some(offset);
    }

    pub fn saved(&self) -> Option<u32> {
        self.slot
    }

    pub fn is_restoring(&self) -> bool {
        matches!(self.restore, Restore::Armed { .. })
    }

    /// Decides whether a list mount reuses the collection or fetches afresh.
    pub fn on_list_mount(&mut self, store: &mut Store) -> MountAction {
        self.restore = Restore::Idle;
        if !store.preserve_state() {
            self.slot = None;
            return MountAction::Fetch;
        }
        if store.posts().is_empty() {
            store.consume_preserve_state();
            self.slot = None;
            return MountAction::Fetch;
        }
        match self.slot {
            Some(offset) => {
                self.restore = Restore::Armed {
                    offset,
                    painted: false,
                };
            }
            None => {
                store.consume_preserve_state();
            }
        }
        MountAction::Reuse
    }

    /// Call once per drawn frame. The armed offset is released on the frame after the first paint.
    pub fn after_paint(&mut self, store: &mut Store) -> Option<u32> {
        match self.restore {
            Restore::Idle => None,
            Restore::Armed {
                offset,
                painted: false,
            } => {
                self.restore = Restore::Armed {
                    offset,
                    painted: true,
                };
                None
            }
            Restore::Armed {
                offset,
                painted: true,
            } => {
                self.restore = Restore::Idle;
                self.slot = None;
                store.consume_preserve_state();
                Some(offset)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::data::{MockItemService, MockSearchService};
    use crate::store::tests::{posts, store_with, wait_until};
    use crate::store::StoreEvent;

    fn loaded_store() -> Store {
        let search = Arc::new(MockSearchService::new().with_page("", 0, posts(&["a", "b"]), 1));
        let mut store = store_with(search, Arc::new(MockItemService::new()));
        store.refresh();
        wait_until(&mut store, |event| matches!(event, StoreEvent::PageLoaded { .. }));
        store
    }

    #[test]
    fn offset_round_trips_after_one_paint() {
        let mut store = loaded_store();
        let mut keeper = ScrollKeeper::new();

        keeper.capture(1500);
        store.set_preserve_state(true);
        assert_eq!(keeper.on_list_mount(&mut store), MountAction::Reuse);
        assert!(keeper.is_restoring());
        assert_eq!(keeper.after_paint(&mut store), None);
        assert_eq!(keeper.after_paint(&mut store), Some(1500));

        assert_eq!(keeper.saved(), None);
        assert!(!store.preserve_state());
        assert_eq!(keeper.after_paint(&mut store), None);
    }

    #[test]
    fn only_the_latest_offset_is_kept() {
        let mut keeper = ScrollKeeper::new();
        keeper.capture(10);
        keeper.capture(42);
        assert_eq!(keeper.saved(), Some(42));
    }

    #[test]
    fn reuse_without_saved_offset_clears_flag_now() {
        let mut store = loaded_store();
        let mut keeper = ScrollKeeper::new();

        store.set_preserve_state(true);
        assert_eq!(keeper.on_list_mount(&mut store), MountAction::Reuse);
        assert!(!store.preserve_state());
        assert_eq!(keeper.after_paint(&mut store), None);
        assert_eq!(keeper.after_paint(&mut store), None);
    }

    #[test]
    fn empty_collection_fetches_and_forgets() {
        let mut store = store_with(
            Arc::new(MockSearchService::new()),
            Arc::new(MockItemService::new()),
        );
        let mut keeper = ScrollKeeper::new();

        keeper.capture(300);
        store.set_preserve_state(true);
        assert_eq!(keeper.on_list_mount(&mut store), MountAction::Fetch);
        assert!(!store.preserve_state());
        assert_eq!(keeper.saved(), None);
    }

    #[test]
    fn mount_without_flag_fetches() {
        let mut store = loaded_store();
        let mut keeper = ScrollKeeper::new();
        keeper.capture(5);
        assert_eq!(keeper.on_list_mount(&mut store), MountAction::Fetch);
        assert!(!keeper.is_restoring());
    }
}
