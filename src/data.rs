use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::algolia;
use crate::model::{Comment, Post, PostThread, SearchPage, TimeRange};

pub trait SearchService: Send + Sync {
    fn search(&self, query: &str, range: TimeRange, page: u32) -> Result<SearchPage>;
}

pub trait ItemService: Send + Sync {
    fn load_post(&self, id: &str) -> Result<PostThread>;
    fn load_comments(&self, id: &str) -> Result<Vec<Comment>>;
}

pub struct AlgoliaSearchService {
    client: Arc<algolia::Client>,
}

impl AlgoliaSearchService {
    pub fn new(client: Arc<algolia::Client>) -> Self {
        Self { client }
    }
}

impl SearchService for AlgoliaSearchService {
    fn search(&self, query: &str, range: TimeRange, page: u32) -> Result<SearchPage> {
        self.client
            .search(query, range, page)
            .with_context(|| format!("search {range} page {page}"))
    }
}

pub struct AlgoliaItemService {
    client: Arc<algolia::Client>,
}

impl AlgoliaItemService {
    pub fn new(client: Arc<algolia::Client>) -> Self {
        Self { client }
    }
}

impl ItemService for AlgoliaItemService {
    fn load_post(&self, id: &str) -> Result<PostThread> {
        self.client.thread(id).context("fetch post")
    }

    fn load_comments(&self, id: &str) -> Result<Vec<Comment>> {
        let item = self.client.item(id).context("fetch comments")?;
        Ok(item
            .children
            .into_iter()
            .map(algolia::Item::into_comment)
            .collect())
    }
}

/// One recorded call against [`MockSearchService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCall {
    pub query: String,
    pub range: TimeRange,
    pub page: u32,
}

/// Scripted search backend. Unscripted pages come back empty with no further pages.
#[derive(Default)]
pub struct MockSearchService {
    pages: Mutex<HashMap<(String, u32), Result<SearchPage, String>>>,
    gates: Mutex<HashMap<String, Receiver<()>>>,
    calls: Mutex<Vec<SearchCall>>,
}

impl MockSearchService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, query: &str, page: u32, posts: Vec<Post>, nb_pages: u32) -> Self {
        self.pages
            .lock()
            .insert((query.to_string(), page), Ok(SearchPage { posts, nb_pages }));
        self
    }

    pub fn with_failure(self, query: &str, page: u32, message: &str) -> Self {
        self.pages
            .lock()
            .insert((query.to_string(), page), Err(message.to_string()));
        self
    }

    /// Holds every search for `query` until a token is sent on the returned channel.
    pub fn gate(&self, query: &str) -> Sender<()> {
        let (tx, rx) = unbounded();
        self.gates.lock().insert(query.to_string(), rx);
        tx
    }

    pub fn calls(&self) -> Vec<SearchCall> {
        self.calls.lock().clone()
    }
}

impl SearchService for MockSearchService {
    fn search(&self, query: &str, range: TimeRange, page: u32) -> Result<SearchPage> {
        self.calls.lock().push(SearchCall {
            query: query.to_string(),
            range,
            page,
        });

        let gate = self.gates.lock().get(query).cloned();
        if let Some(gate) = gate {
            gate.recv().map_err(|_| anyhow!("mock: gate for {query:?} closed"))?;
        }

        match self.pages.lock().get(&(query.to_string(), page)) {
            Some(Ok(result)) => Ok(result.clone()),
            Some(Err(message)) => Err(anyhow!("mock: {message}")),
            None => Ok(SearchPage::default()),
        }
    }
}

/// Scripted item backend. Posts without scripted comments have none.
#[derive(Default)]
pub struct MockItemService {
    threads: Mutex<HashMap<String, PostThread>>,
    comments: Mutex<HashMap<String, Vec<Comment>>>,
    failures: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, Receiver<()>>>,
    calls: Mutex<Vec<String>>,
}

impl MockItemService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comments(self, id: &str, comments: Vec<Comment>) -> Self {
        self.comments.lock().insert(id.to_string(), comments);
        self
    }

    pub fn with_thread(self, thread: PostThread) -> Self {
        self.threads.lock().insert(thread.post.id.clone(), thread);
        self
    }

    pub fn with_failure(self, id: &str) -> Self {
        self.failures.lock().insert(id.to_string());
        self
    }

    /// Holds every comment fetch for `id` until a token is sent on the returned channel.
    pub fn gate(&self, id: &str) -> Sender<()> {
        let (tx, rx) = unbounded();
        self.gates.lock().insert(id.to_string(), rx);
        tx
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl ItemService for MockItemService {
    fn load_post(&self, id: &str) -> Result<PostThread> {
        self.calls.lock().push(id.to_string());
        if self.failures.lock().contains(id) {
            bail!("mock: item {id} unavailable");
        }
        self.threads
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("mock: item {id} not found"))
    }

    fn load_comments(&self, id: &str) -> Result<Vec<Comment>> {
        self.calls.lock().push(id.to_string());
        let gate = self.gates.lock().get(id).cloned();
        if let Some(gate) = gate {
            gate.recv().map_err(|_| anyhow!("mock: gate for {id:?} closed"))?;
        }
        if self.failures.lock().contains(id) {
            bail!("mock: comments for {id} unavailable");
        }
        Ok(self.comments.lock().get(id).cloned().unwrap_or_default())
    }
}
