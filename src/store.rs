//! The post collection, its comment cache and the fetch state machine.
//!
//! All mutation happens on the thread that owns the [`Store`]. Network calls run
//! on worker threads and come back as responses that [`Store::poll`] and
//! [`Store::wait`] apply. Every page request carries the query epoch it was
//! issued under, and a response that no longer matches the in-flight slot is
//! reported as [`StoreEvent::Superseded`] and dropped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::data::{ItemService, SearchService};
use crate::model::{Comment, Post, PostThread, SearchPage, TimeRange};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStart {
    Started(RequestId),
    Busy,
}

impl FetchStart {
    pub fn request(self) -> Option<RequestId> {
        match self {
            FetchStart::Started(request) => Some(request),
            FetchStart::Busy => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("page {requested} requested out of order (next page is {expected})")]
    PageOutOfOrder { requested: u32, expected: u32 },
}

/// The last page failure, kept until the next successful page or a dismissal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to load page {page}: {message}")]
pub struct FetchError {
    pub page: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    PageLoaded {
        request: RequestId,
        page: u32,
        added: usize,
        has_more: bool,
    },
    PageFailed {
        request: RequestId,
        page: u32,
    },
    Superseded {
        request: RequestId,
    },
    CommentsLoaded {
        posts: Vec<String>,
    },
    PostResolved {
        id: String,
        found: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentState<'a> {
    NotLoaded,
    Loaded(&'a [Comment]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostLookup {
    Loading,
    Found(Post),
    NotFound,
}

/// The page request currently owning the in-flight slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub request: RequestId,
    pub epoch: u64,
    pub page: u32,
    pub reset: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchState {
    Idle,
    Pending { due: Instant },
    InFlight(InFlight),
}

enum Response {
    Page {
        request: RequestId,
        epoch: u64,
        page: u32,
        reset: bool,
        result: Result<SearchPage>,
    },
    CommentBatch {
        epoch: u64,
        entries: Vec<(String, Result<Vec<Comment>>)>,
    },
    Post {
        id: String,
        epoch: u64,
        result: Result<PostThread>,
    },
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub debounce: Duration,
    pub query: String,
    pub time_range: TimeRange,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            query: String::new(),
            time_range: TimeRange::default(),
        }
    }
}

pub struct Store {
    search: Arc<dyn SearchService>,
    items: Arc<dyn ItemService>,
    debounce: Duration,
    query: String,
    time_range: TimeRange,
    posts: Vec<Post>,
    post_ids: HashSet<String>,
    comments: HashMap<String, Vec<Comment>>,
    comments_pending: HashSet<String>,
    lookups: HashMap<String, PostLookup>,
    last_page: Option<u32>,
    has_more: bool,
    error: Option<FetchError>,
    preserve_state: bool,
    state: FetchState,
    epoch: u64,
    applied_epoch: Option<u64>,
    next_request_id: u64,
    response_tx: Sender<Response>,
    response_rx: Receiver<Response>,
}

impl Store {
    pub fn new(
        search: Arc<dyn SearchService>,
        items: Arc<dyn ItemService>,
        options: StoreOptions,
    ) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            search,
            items,
            debounce: options.debounce,
            query: options.query,
            time_range: options.time_range,
            posts: Vec::new(),
            post_ids: HashSet::new(),
            comments: HashMap::new(),
            comments_pending: HashSet::new(),
            lookups: HashMap::new(),
            last_page: None,
            has_more: false,
            error: None,
            preserve_state: false,
            state: FetchState::Idle,
            epoch: 0,
            applied_epoch: None,
            next_request_id: 1,
            response_tx,
            response_rx,
        }
    }

    /// Requests one page of the current query.
    ///
    /// Returns [`FetchStart::Busy`] while another page is in flight, or while a
    /// debounced reset is pending and this is not itself a reset. Page 0 always
    /// replaces the collection; any other page must be exactly [`Store::next_page`].
    pub fn fetch_page(&mut self, page: u32, reset: bool) -> Result<FetchStart, StoreError> {
        let reset = reset || page == 0;
        match self.state {
            FetchState::InFlight(_) => return Ok(FetchStart::Busy),
            FetchState::Pending { .. } if !reset => return Ok(FetchStart::Busy),
            _ => {}
        }
        let expected = if reset { 0 } else { self.next_page() };
        if page != expected {
            return Err(StoreError::PageOutOfOrder {
                requested: page,
                expected,
            });
        }
        Ok(FetchStart::Started(self.start_fetch(page, reset)))
    }

    fn start_fetch(&mut self, page: u32, reset: bool) -> RequestId {
        let request = RequestId(self.next_request_id);
        self.next_request_id = self.next_request_id.wrapping_add(1);
        let epoch = self.epoch;
        self.state = FetchState::InFlight(InFlight {
            request,
            epoch,
            page,
            reset,
        });
        debug!(
            request = request.0,
            epoch,
            page,
            reset,
            query = %self.query,
            range = %self.time_range,
            "page fetch started"
        );

        let search = Arc::clone(&self.search);
        let query = self.query.clone();
        let range = self.time_range;
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = search.search(&query, range, page);
            let _ = tx.send(Response::Page {
                request,
                epoch,
                page,
                reset,
                result,
            });
        });
        request
    }

    pub fn set_query(&mut self, query: &str, now: Instant) -> bool {
        if self.query == query {
            return false;
        }
        self.query = query.to_string();
        self.invalidate(now);
        true
    }

    pub fn set_time_range(&mut self, range: TimeRange, now: Instant) -> bool {
        if self.time_range == range {
            return false;
        }
        self.time_range = range;
        self.invalidate(now);
        true
    }

    fn invalidate(&mut self, now: Instant) {
        self.epoch = self.epoch.wrapping_add(1);
        self.comments_pending.clear();
        self.lookups
            .retain(|_, lookup| !matches!(lookup, PostLookup::Loading));
        if let FetchState::InFlight(in_flight) = self.state {
            debug!(request = in_flight.request.0, "in-flight page abandoned by query change");
        }
        self.state = FetchState::Pending {
            due: now + self.debounce,
        };
    }

    /// Fires a debounced reset once its quantum has elapsed.
    pub fn tick(&mut self, now: Instant) -> Option<RequestId> {
        match self.state {
            FetchState::Pending { due } if now >= due => Some(self.start_fetch(0, true)),
            _ => None,
        }
    }

    pub fn refresh(&mut self) -> FetchStart {
        match self.state {
            FetchState::InFlight(_) => FetchStart::Busy,
            _ => FetchStart::Started(self.start_fetch(0, true)),
        }
    }

    pub fn load_more(&mut self) -> Option<RequestId> {
        if !self.has_more || self.state != FetchState::Idle {
            return None;
        }
        let page = self.next_page();
        self.fetch_page(page, false).ok().and_then(FetchStart::request)
    }

    pub fn comments_for(&self, id: &str) -> CommentState<'_> {
        match self.comments.get(id) {
            Some(list) => CommentState::Loaded(list),
            None => CommentState::NotLoaded,
        }
    }

    pub fn set_preserve_state(&mut self, preserve: bool) {
        self.preserve_state = preserve;
    }

    pub fn preserve_state(&self) -> bool {
        self.preserve_state
    }

    pub fn consume_preserve_state(&mut self) -> bool {
        std::mem::take(&mut self.preserve_state)
    }

    /// Resolves a post for a detail view that may not come from the collection.
    pub fn load_post(&mut self, id: &str) -> PostLookup {
        if let Some(post) = self.post(id) {
            return PostLookup::Found(post.clone());
        }
        if let Some(existing) = self.lookups.get(id) {
            return existing.clone();
        }

        self.lookups.insert(id.to_string(), PostLookup::Loading);
        let items = Arc::clone(&self.items);
        let tx = self.response_tx.clone();
        let epoch = self.epoch;
        let id = id.to_string();
        debug!(id = %id, "post lookup started");
        thread::spawn(move || {
            let result = items.load_post(&id);
            let _ = tx.send(Response::Post { id, epoch, result });
        });
        PostLookup::Loading
    }

    pub fn post_lookup(&self, id: &str) -> Option<&PostLookup> {
        self.lookups.get(id)
    }

    pub fn post(&self, id: &str) -> Option<&Post> {
        if !self.post_ids.contains(id) {
            return None;
        }
        self.posts.iter().find(|post| post.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        if !self.post_ids.contains(id) {
            return None;
        }
        self.posts.iter().position(|post| post.id == id)
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn is_loading(&self) -> bool {
        !matches!(self.state, FetchState::Idle)
    }

    pub fn in_flight(&self) -> Option<InFlight> {
        match self.state {
            FetchState::InFlight(in_flight) => Some(in_flight),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// The page a non-reset fetch must request next.
    pub fn next_page(&self) -> u32 {
        if self.applied_epoch != Some(self.epoch) {
            return 0;
        }
        self.last_page.map_or(0, |page| page + 1)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn comment_cache_len(&self) -> usize {
        self.comments.len()
    }

    /// Applies every response that has already arrived.
    pub fn poll(&mut self) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        while let Ok(response) = self.response_rx.try_recv() {
            events.extend(self.apply(response));
        }
        events
    }

    /// Blocks for at most `timeout` waiting for one response, then drains the rest.
    pub fn wait(&mut self, timeout: Duration) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        match self.response_rx.recv_timeout(timeout) {
            Ok(response) => events.extend(self.apply(response)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                return events
            }
        }
        events.extend(self.poll());
        events
    }

    fn apply(&mut self, response: Response) -> Option<StoreEvent> {
        match response {
            Response::Page {
                request,
                epoch,
                page,
                reset,
                result,
            } => Some(self.apply_page(request, epoch, page, reset, result)),
            Response::CommentBatch { epoch, entries } => self.apply_comments(epoch, entries),
            Response::Post { id, epoch, result } => self.apply_post(id, epoch, result),
        }
    }

    fn apply_page(
        &mut self,
        request: RequestId,
        epoch: u64,
        page: u32,
        reset: bool,
        result: Result<SearchPage>,
    ) -> StoreEvent {
        let current = match self.state {
            FetchState::InFlight(in_flight)
                if in_flight.request == request && in_flight.epoch == epoch =>
            {
                in_flight
            }
            _ => {
                debug!(request = request.0, epoch, page, "superseded page response dropped");
                return StoreEvent::Superseded { request };
            }
        };
        self.state = FetchState::Idle;

        let batch = match result {
            Ok(batch) => batch,
            Err(err) => {
                warn!(request = request.0, page, error = %format!("{err:#}"), "page fetch failed");
                self.error = Some(FetchError {
                    page,
                    message: format!("{err:#}"),
                });
                self.has_more = false;
                if self.applied_epoch != Some(epoch) {
                    // the collection on screen is still the previous query's
                    let missing: Vec<String> =
                        self.posts.iter().map(|post| post.id.clone()).collect();
                    self.request_comments(&missing);
                }
                return StoreEvent::PageFailed { request, page };
            }
        };

        if current.reset {
            if self.applied_epoch != Some(epoch) {
                self.comments.clear();
                self.comments_pending.clear();
            }
            self.posts.clear();
            self.post_ids.clear();
        }

        let mut added = Vec::new();
        for post in batch.posts {
            if self.post_ids.insert(post.id.clone()) {
                added.push(post.id.clone());
                self.posts.push(post);
            }
        }
        self.last_page = Some(page);
        self.applied_epoch = Some(epoch);
        self.has_more = page + 1 < batch.nb_pages;
        self.error = None;
        debug!(
            request = request.0,
            page,
            reset,
            added = added.len(),
            total = self.posts.len(),
            has_more = self.has_more,
            "page applied"
        );

        self.request_comments(&added);
        StoreEvent::PageLoaded {
            request,
            page,
            added: added.len(),
            has_more: self.has_more,
        }
    }

    fn request_comments(&mut self, ids: &[String]) {
        let wanted: Vec<String> = ids
            .iter()
            .filter(|id| !self.comments.contains_key(*id) && !self.comments_pending.contains(*id))
            .cloned()
            .collect();
        if wanted.is_empty() {
            return;
        }
        self.comments_pending.extend(wanted.iter().cloned());

        let items = Arc::clone(&self.items);
        let tx = self.response_tx.clone();
        let epoch = self.epoch;
        debug!(posts = wanted.len(), epoch, "comment batch started");
        thread::spawn(move || {
            let entries = thread::scope(|scope| {
                let handles: Vec<_> = wanted
                    .iter()
                    .map(|id| {
                        let items = &items;
                        scope.spawn(move || items.load_comments(id))
                    })
                    .collect();
                wanted
                    .iter()
                    .zip(handles)
                    .map(|(id, handle)| {
                        let result = handle
                            .join()
                            .unwrap_or_else(|_| Err(anyhow!("comment worker panicked")));
                        (id.clone(), result)
                    })
                    .collect::<Vec<_>>()
            });
            let _ = tx.send(Response::CommentBatch { epoch, entries });
        });
    }

    fn apply_comments(
        &mut self,
        epoch: u64,
        entries: Vec<(String, Result<Vec<Comment>>)>,
    ) -> Option<StoreEvent> {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "stale comment batch dropped");
            return None;
        }
        let mut posts = Vec::with_capacity(entries.len());
        for (id, result) in entries {
            self.comments_pending.remove(&id);
            let list = match result {
                Ok(list) => list,
                Err(err) => {
                    warn!(post = %id, error = %format!("{err:#}"), "comment fetch failed");
                    Vec::new()
                }
            };
            self.comments.entry(id.clone()).or_insert(list);
            posts.push(id);
        }
        Some(StoreEvent::CommentsLoaded { posts })
    }

    fn apply_post(
        &mut self,
        id: String,
        epoch: u64,
        result: Result<PostThread>,
    ) -> Option<StoreEvent> {
        if epoch != self.epoch || !matches!(self.lookups.get(&id), Some(PostLookup::Loading)) {
            debug!(id = %id, "stale post lookup dropped");
            return None;
        }
        match result {
            Ok(thread) => {
                self.comments
                    .entry(id.clone())
                    .or_insert(thread.comments);
                self.lookups.insert(id.clone(), PostLookup::Found(thread.post));
                Some(StoreEvent::PostResolved { id, found: true })
            }
            Err(err) => {
                warn!(id = %id, error = %format!("{err:#}"), "post lookup failed");
                self.lookups.insert(id.clone(), PostLookup::NotFound);
                Some(StoreEvent::PostResolved { id, found: false })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::{MockItemService, MockSearchService};
    use chrono::{TimeZone, Utc};

    const WAIT: Duration = Duration::from_secs(5);

    pub(crate) fn post(id: &str) -> Post {
        Post {
            id: id.into(),
            title: format!("Post {id}"),
            url: None,
            points: 1,
            author: "someone".into(),
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            num_comments: 0,
            text: None,
        }
    }

    pub(crate) fn posts(ids: &[&str]) -> Vec<Post> {
        ids.iter().map(|id| post(id)).collect()
    }

    fn comment(id: &str) -> Comment {
        Comment {
            id: id.into(),
            author: "c".into(),
            text: "hi".into(),
            created_at: Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
            points: 0,
            children: Vec::new(),
        }
    }

    pub(crate) fn store_with(search: Arc<MockSearchService>, items: Arc<MockItemService>) -> Store {
        Store::new(search, items, StoreOptions::default())
    }

    /// Waits until `accept` matches an event, returning everything seen.
    pub(crate) fn wait_until(
        store: &mut Store,
        accept: impl Fn(&StoreEvent) -> bool,
    ) -> Vec<StoreEvent> {
        let deadline = Instant::now() + WAIT;
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            let events = store.wait(Duration::from_millis(100));
            let done = events.iter().any(&accept);
            seen.extend(events);
            if done {
                return seen;
            }
        }
        panic!("timed out waiting for store event; saw {seen:?}");
    }

    fn is_page_event(event: &StoreEvent) -> bool {
        matches!(
            event,
            StoreEvent::PageLoaded { .. } | StoreEvent::PageFailed { .. }
        )
    }

    fn ids(store: &Store) -> Vec<&str> {
        store.posts().iter().map(|post| post.id.as_str()).collect()
    }

    #[test]
    fn appended_pages_keep_first_occurrence() {
        let search = Arc::new(
            MockSearchService::new()
                .with_page("", 0, posts(&["p1", "p2", "p3"]), 3)
                .with_page("", 1, posts(&["p3", "p4"]), 3),
        );
        let mut store = store_with(search, Arc::new(MockItemService::new()));

        store.refresh();
        wait_until(&mut store, is_page_event);
        assert!(store.load_more().is_some());
        let events = wait_until(&mut store, is_page_event);

        assert_eq!(ids(&store), ["p1", "p2", "p3", "p4"]);
        assert!(events.iter().any(|event| matches!(
            event,
            StoreEvent::PageLoaded { page: 1, added: 1, has_more: true, .. }
        )));
    }

    #[test]
    fn repeated_ids_within_a_page_are_merged_once() {
        let search = Arc::new(MockSearchService::new().with_page("", 0, posts(&["p1", "p1", "p2"]), 1));
        let mut store = store_with(search, Arc::new(MockItemService::new()));

        store.refresh();
        let events = wait_until(&mut store, is_page_event);

        assert_eq!(ids(&store), ["p1", "p2"]);
        assert!(events
            .iter()
            .any(|event| matches!(event, StoreEvent::PageLoaded { page: 0, added: 2, .. })));
    }

    #[test]
    fn pages_must_be_requested_in_order() {
        let search = Arc::new(MockSearchService::new().with_page("", 0, posts(&["a"]), 5));
        let mut store = store_with(search, Arc::new(MockItemService::new()));

        assert_eq!(
            store.fetch_page(1, false),
            Err(StoreError::PageOutOfOrder {
                requested: 1,
                expected: 0
            })
        );
        assert!(store.fetch_page(0, false).is_ok());
        wait_until(&mut store, is_page_event);

        assert_eq!(store.next_page(), 1);
        assert_eq!(
            store.fetch_page(2, false),
            Err(StoreError::PageOutOfOrder {
                requested: 2,
                expected: 1
            })
        );
        assert_eq!(
            store.fetch_page(3, true),
            Err(StoreError::PageOutOfOrder {
                requested: 3,
                expected: 0
            })
        );
    }

    #[test]
    fn last_page_clears_has_more() {
        let search = Arc::new(MockSearchService::new().with_page("", 0, posts(&["a", "b"]), 1));
        let mut store = store_with(search, Arc::new(MockItemService::new()));

        store.refresh();
        wait_until(&mut store, is_page_event);
        assert!(!store.has_more());
        assert_eq!(store.load_more(), None);
    }

    #[test]
    fn only_one_page_fetch_in_flight() {
        let search = Arc::new(MockSearchService::new().with_page("", 0, posts(&["a"]), 2));
        let gate = search.gate("");
        let mut store = store_with(search.clone(), Arc::new(MockItemService::new()));

        assert!(matches!(store.refresh(), FetchStart::Started(_)));
        assert_eq!(store.refresh(), FetchStart::Busy);
        assert_eq!(store.fetch_page(0, true), Ok(FetchStart::Busy));
        assert_eq!(store.load_more(), None);
        assert!(store.is_loading());

        gate.send(()).unwrap();
        wait_until(&mut store, is_page_event);
        assert_eq!(search.calls().len(), 1);
        assert!(!store.is_loading());
    }

    #[test]
    fn comment_batch_commits_every_entry() {
        let search = Arc::new(MockSearchService::new().with_page("", 0, posts(&["a", "b", "c"]), 1));
        let items = Arc::new(
            MockItemService::new()
                .with_comments("a", vec![comment("a1")])
                .with_failure("b")
                .with_comments("c", vec![comment("c1"), comment("c2")]),
        );
        let mut store = store_with(search, items.clone());

        store.refresh();
        wait_until(&mut store, |event| {
            matches!(event, StoreEvent::CommentsLoaded { .. })
        });

        assert_eq!(store.comment_cache_len(), 3);
        assert!(matches!(store.comments_for("a"), CommentState::Loaded(list) if list.len() == 1));
        assert_eq!(store.comments_for("b"), CommentState::Loaded(&[]));
        assert!(matches!(store.comments_for("c"), CommentState::Loaded(list) if list.len() == 2));
        assert_eq!(store.comments_for("zzz"), CommentState::NotLoaded);
        assert!(store.error().is_none());

        let mut calls = items.calls();
        calls.sort();
        assert_eq!(calls, ["a", "b", "c"]);
    }

    #[test]
    fn cached_comments_are_not_refetched_on_refresh() {
        let search = Arc::new(MockSearchService::new().with_page("", 0, posts(&["a"]), 1));
        let items = Arc::new(MockItemService::new().with_comments("a", vec![comment("a1")]));
        let mut store = store_with(search, items.clone());

        store.refresh();
        wait_until(&mut store, |event| matches!(event, StoreEvent::CommentsLoaded { .. }));
        store.refresh();
        wait_until(&mut store, is_page_event);

        assert_eq!(items.calls(), ["a"]);
        assert_eq!(store.comment_cache_len(), 1);
    }

    #[test]
    fn stale_query_response_is_superseded() {
        let search = Arc::new(
            MockSearchService::new()
                .with_page("foo", 0, posts(&["foo-1"]), 1)
                .with_page("bar", 0, posts(&["bar-1", "bar-2"]), 1),
        );
        let foo_gate = search.gate("foo");
        let mut store = store_with(search, Arc::new(MockItemService::new()));
        let start = Instant::now();

        store.set_query("foo", start);
        let foo_request = store.tick(start + DEFAULT_DEBOUNCE).unwrap();

        store.set_query("bar", start);
        assert_eq!(store.tick(start), None);
        store.tick(start + DEFAULT_DEBOUNCE).unwrap();
        wait_until(&mut store, is_page_event);
        assert_eq!(ids(&store), ["bar-1", "bar-2"]);

        foo_gate.send(()).unwrap();
        let events = wait_until(&mut store, |event| {
            matches!(event, StoreEvent::Superseded { .. })
        });
        assert!(events.contains(&StoreEvent::Superseded {
            request: foo_request
        }));
        assert_eq!(ids(&store), ["bar-1", "bar-2"]);
    }

    #[test]
    fn rapid_edits_coalesce_into_one_search() {
        let search = Arc::new(MockSearchService::new().with_page("rust", 0, posts(&["r"]), 1));
        let mut store = store_with(search.clone(), Arc::new(MockItemService::new()));
        let start = Instant::now();

        store.set_query("r", start);
        store.set_query("ru", start + Duration::from_millis(100));
        store.set_query("rus", start + Duration::from_millis(200));
        store.set_query("rust", start + Duration::from_millis(250));
        assert_eq!(store.tick(start + Duration::from_millis(400)), None);
        assert!(store.tick(start + Duration::from_millis(550)).is_some());
        assert_eq!(store.tick(start + Duration::from_millis(900)), None);
        wait_until(&mut store, is_page_event);

        let calls = search.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].query, "rust");
        assert_eq!(calls[0].page, 0);
        assert!(!store.set_query("rust", start));
    }

    #[test]
    fn time_range_change_drops_comment_cache() {
        let search = Arc::new(MockSearchService::new().with_page("", 0, posts(&["front"]), 1));
        let items = Arc::new(MockItemService::new());
        let mut store = store_with(search.clone(), items.clone());
        store.refresh();
        wait_until(&mut store, |event| matches!(event, StoreEvent::CommentsLoaded { .. }));
        assert_eq!(store.comment_cache_len(), 1);

        let now = Instant::now();
        assert!(store.set_time_range(TimeRange::Week, now));
        assert!(!store.set_time_range(TimeRange::Week, now));
        assert!(store.is_loading());
        assert_eq!(store.next_page(), 0);
        store.tick(now + DEFAULT_DEBOUNCE).unwrap();
        wait_until(&mut store, |event| matches!(event, StoreEvent::CommentsLoaded { .. }));

        assert_eq!(items.calls(), ["front", "front"]);
        assert_eq!(search.calls().last().map(|call| call.range), Some(TimeRange::Week));
    }

    #[test]
    fn failed_reset_refetches_comments_for_kept_collection() {
        let search = Arc::new(
            MockSearchService::new()
                .with_page("", 0, posts(&["a"]), 1)
                .with_failure("zzz", 0, "boom"),
        );
        let items = Arc::new(MockItemService::new().with_comments("a", vec![comment("a1")]));
        let gate = items.gate("a");
        let mut store = store_with(search, items.clone());

        store.refresh();
        wait_until(&mut store, is_page_event);
        assert_eq!(store.comments_for("a"), CommentState::NotLoaded);

        let now = Instant::now();
        store.set_query("zzz", now);
        store.tick(now + DEFAULT_DEBOUNCE).unwrap();
        let events = wait_until(&mut store, is_page_event);
        assert!(events
            .iter()
            .any(|event| matches!(event, StoreEvent::PageFailed { page: 0, .. })));
        assert_eq!(ids(&store), ["a"]);

        // one token for the batch dropped by the query change, one for its replacement
        gate.send(()).unwrap();
        gate.send(()).unwrap();
        wait_until(&mut store, |event| matches!(event, StoreEvent::CommentsLoaded { .. }));

        assert!(matches!(store.comments_for("a"), CommentState::Loaded(list) if list.len() == 1));
        assert_eq!(items.calls(), ["a", "a"]);
    }

    #[test]
    fn page_failure_keeps_collection() {
        let search = Arc::new(
            MockSearchService::new()
                .with_page("", 0, posts(&["a", "b"]), 3)
                .with_failure("", 1, "boom"),
        );
        let mut store = store_with(search, Arc::new(MockItemService::new()));

        store.refresh();
        wait_until(&mut store, is_page_event);
        store.load_more().unwrap();
        let events = wait_until(&mut store, is_page_event);

        assert!(events
            .iter()
            .any(|event| matches!(event, StoreEvent::PageFailed { page: 1, .. })));
        assert_eq!(ids(&store), ["a", "b"]);
        assert!(!store.has_more());
        let error = store.error().cloned().unwrap();
        assert_eq!(error.page, 1);
        assert!(error.message.contains("boom"));

        store.dismiss_error();
        assert!(store.error().is_none());
    }

    #[test]
    fn load_post_short_circuits_for_collection_posts() {
        let search = Arc::new(MockSearchService::new().with_page("", 0, posts(&["a"]), 1));
        let items = Arc::new(MockItemService::new());
        let mut store = store_with(search, items.clone());
        store.refresh();
        wait_until(&mut store, |event| matches!(event, StoreEvent::CommentsLoaded { .. }));

        assert_eq!(store.load_post("a"), PostLookup::Found(post("a")));
        assert_eq!(store.load_post("a"), PostLookup::Found(post("a")));
        assert_eq!(store.post_lookup("a"), None);
        assert_eq!(items.calls(), ["a"]);
    }

    #[test]
    fn load_post_fetches_and_caches_comments() {
        let thread = PostThread {
            post: post("77"),
            comments: vec![comment("77-1")],
        };
        let items = Arc::new(MockItemService::new().with_thread(thread));
        let mut store = store_with(Arc::new(MockSearchService::new()), items);

        assert_eq!(store.load_post("77"), PostLookup::Loading);
        assert_eq!(store.load_post("77"), PostLookup::Loading);
        let events = wait_until(&mut store, |event| matches!(event, StoreEvent::PostResolved { .. }));

        assert!(events.contains(&StoreEvent::PostResolved {
            id: "77".into(),
            found: true
        }));
        assert_eq!(store.post_lookup("77"), Some(&PostLookup::Found(post("77"))));
        assert!(matches!(store.comments_for("77"), CommentState::Loaded(list) if list.len() == 1));
    }

    #[test]
    fn failed_lookup_is_terminal() {
        let items = Arc::new(MockItemService::new().with_failure("9"));
        let mut store = store_with(Arc::new(MockSearchService::new()), items.clone());

        store.load_post("9");
        wait_until(&mut store, |event| matches!(event, StoreEvent::PostResolved { .. }));
        assert_eq!(store.post_lookup("9"), Some(&PostLookup::NotFound));
        assert_eq!(store.load_post("9"), PostLookup::NotFound);
        assert_eq!(items.calls(), ["9"]);
    }

    #[test]
    fn preserve_flag_is_single_use() {
        let mut store = store_with(
            Arc::new(MockSearchService::new()),
            Arc::new(MockItemService::new()),
        );
        assert!(!store.consume_preserve_state());
        store.set_preserve_state(true);
        assert!(store.preserve_state());
        assert!(store.consume_preserve_state());
        assert!(!store.consume_preserve_state());
    }
}
