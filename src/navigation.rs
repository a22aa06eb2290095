//! Predecessor/successor resolution over the store's browsing order.

use crate::store::{FetchStart, RequestId, Store, StoreEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Next,
    Prev,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    Resolved(String),
    /// The next page is being fetched; the outcome arrives through [`Navigator::on_event`].
    Extending,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Extension {
    from: String,
    request: RequestId,
}

/// Holds the single extension lock taken when `next` crosses the loaded boundary.
#[derive(Debug, Default)]
pub struct Navigator {
    extending: Option<Extension>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn navigate(&mut self, store: &mut Store, current: &str, direction: Direction) -> NavOutcome {
        match direction {
            Direction::Next => self.next(store, current),
            Direction::Prev => self.prev(store, current),
        }
    }

    pub fn next(&mut self, store: &mut Store, current: &str) -> NavOutcome {
        let Some(index) = store.index_of(current) else {
            return NavOutcome::Exhausted;
        };
        if let Some(post) = store.posts().get(index + 1) {
            return NavOutcome::Resolved(post.id.clone());
        }
        if self.extending.is_some() {
            return NavOutcome::Extending;
        }
        if !store.has_more() {
            return NavOutcome::Exhausted;
        }

        let page = store.next_page();
        if let Some(in_flight) = store.in_flight() {
            // list scrolling already asked for the page we need
            if !in_flight.reset && in_flight.page == page {
                self.lock(current, in_flight.request);
                return NavOutcome::Extending;
            }
            return NavOutcome::Exhausted;
        }

        match store.fetch_page(page, false) {
            Ok(FetchStart::Started(request)) => {
                self.lock(current, request);
                NavOutcome::Extending
            }
            Ok(FetchStart::Busy) | Err(_) => NavOutcome::Exhausted,
        }
    }

    pub fn prev(&mut self, store: &Store, current: &str) -> NavOutcome {
        match store.index_of(current) {
            Some(index) if index > 0 => NavOutcome::Resolved(store.posts()[index - 1].id.clone()),
            _ => NavOutcome::Exhausted,
        }
    }

    fn lock(&mut self, from: &str, request: RequestId) {
        tracing::debug!(from, "navigation extending collection");
        self.extending = Some(Extension {
            from: from.to_string(),
            request,
        });
    }

    /// Settles a pending extension once the store reports on its request.
    pub fn on_event(&mut self, store: &Store, event: &StoreEvent) -> Option<NavOutcome> {
        let pending = self.extending.as_ref()?.request;
        match event {
            StoreEvent::PageLoaded { request, .. } if *request == pending => {
                let from = self.extending.take()?.from;
                let outcome = store
                    .index_of(&from)
                    .and_then(|index| store.posts().get(index + 1))
                    .map(|post| NavOutcome::Resolved(post.id.clone()))
                    .unwrap_or(NavOutcome::Exhausted);
                Some(outcome)
            }
            StoreEvent::PageFailed { request, .. } | StoreEvent::Superseded { request }
                if *request == pending =>
            {
                self.extending = None;
                Some(NavOutcome::Exhausted)
            }
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.extending = None;
    }

    pub fn is_extending(&self) -> bool {
        self.extending.is_some()
    }

    pub fn has_next(&self, store: &Store, current: &str) -> bool {
        let Some(index) = store.index_of(current) else {
            return false;
        };
        index + 1 < store.posts().len() || store.has_more()
    }

    pub fn has_prev(&self, store: &Store, current: &str) -> bool {
        matches!(store.index_of(current), Some(index) if index > 0)
    }
}
