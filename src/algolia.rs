use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::model::{Comment, Post, PostThread, SearchPage, TimeRange};

pub const ALGOLIA_API_BASE: &str = "https://hn.algolia.com/api/v1/";
pub const PAGE_SIZE: u32 = 20;

const DAY_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("algolia client user agent required");
        }

        let mut base = config
            .base_url
            .unwrap_or_else(|| ALGOLIA_API_BASE.to_string());
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).with_context(|| format!("algolia: parse base url {base}"))?;

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()
                .context("algolia: build http client")?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn search(&self, query: &str, range: TimeRange, page: u32) -> Result<SearchPage> {
        let url = self.search_url(query, range, page, Utc::now().timestamp())?;
        let response: SearchResponse = self.get(url).context("algolia: search")?;
        Ok(response.into_page())
    }

    pub fn search_url(&self, query: &str, range: TimeRange, page: u32, now: i64) -> Result<Url> {
        let mut url = self.base_url.join("search")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", query);
            pairs.append_pair("tags", tags(range));
            if let Some(filter) = time_filter(range, now) {
                pairs.append_pair("numericFilters", &filter);
            }
            pairs.append_pair("page", &page.to_string());
            pairs.append_pair("hitsPerPage", &PAGE_SIZE.to_string());
        }
        Ok(url)
    }

    pub fn item(&self, id: &str) -> Result<Item> {
        let id = id.trim();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            bail!("algolia: invalid item id {id:?}");
        }
        let url = self.base_url.join(&format!("items/{id}"))?;
        self.get(url).with_context(|| format!("algolia: fetch item {id}"))
    }

    pub fn thread(&self, id: &str) -> Result<PostThread> {
        let item = self.item(id)?;
        item.into_thread()
            .ok_or_else(|| anyhow!("algolia: item {id} is not a story"))
    }

    fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return match status.as_u16() {
                404 => Err(anyhow!("algolia: not found")),
                429 => Err(anyhow!("algolia: rate limited: {}", body)),
                _ => Err(anyhow!("algolia: api error {}: {}", status, body)),
            };
        }
        Ok(resp.json()?)
    }
}

/// Front page results are curated by tag alone; every other range searches stories.
pub fn tags(range: TimeRange) -> &'static str {
    match range {
        TimeRange::FrontPage => "front_page",
        _ => "story",
    }
}

pub fn time_filter(range: TimeRange, now: i64) -> Option<String> {
    range
        .window_days()
        .map(|days| format!("created_at_i>={}", now - days * DAY_SECS))
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<Hit>,
    #[serde(default, rename = "nbPages")]
    pub nb_pages: u32,
}

impl SearchResponse {
    pub fn into_page(self) -> SearchPage {
        SearchPage {
            posts: self.hits.into_iter().map(Hit::into_post).collect(),
            nb_pages: self.nb_pages,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hit {
    #[serde(rename = "objectID")]
    pub object_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub points: Option<i64>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_at_i: Option<i64>,
    #[serde(default)]
    pub num_comments: Option<i64>,
    #[serde(default)]
    pub story_text: Option<String>,
}

impl Hit {
    pub fn into_post(self) -> Post {
        Post {
            id: self.object_id,
            title: self.title.unwrap_or_default(),
            url: self.url.filter(|u| !u.trim().is_empty()),
            points: non_negative(self.points),
            author: self.author.unwrap_or_default(),
            created_at: timestamp(self.created_at_i, self.created_at.as_deref()),
            num_comments: non_negative(self.num_comments),
            text: self.story_text.filter(|t| !t.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    pub id: i64,
    #[serde(default, rename = "type")]
    pub item_type: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub points: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_at_i: Option<i64>,
    #[serde(default, deserialize_with = "nullable_children")]
    pub children: Vec<Item>,
}

impl Item {
    pub fn is_story(&self) -> bool {
        matches!(
            self.item_type.as_deref(),
            Some("story") | Some("job") | Some("poll") | None
        )
    }

    /// Splits a story item into the post and its comment tree.
    pub fn into_thread(self) -> Option<PostThread> {
        if !self.is_story() {
            return None;
        }
        let comments: Vec<Comment> = self.children.into_iter().map(Item::into_comment).collect();
        let descendants = comments.iter().map(count_with_descendants).sum::<usize>();
        let post = Post {
            id: self.id.to_string(),
            title: self.title.unwrap_or_default(),
            url: self.url.filter(|u| !u.trim().is_empty()),
            points: non_negative(self.points),
            author: self.author.unwrap_or_default(),
            created_at: timestamp(self.created_at_i, self.created_at.as_deref()),
            num_comments: descendants as u64,
            text: self.text.filter(|t| !t.trim().is_empty()),
        };
        Some(PostThread { post, comments })
    }

    pub fn into_comment(self) -> Comment {
        Comment {
            id: self.id.to_string(),
            author: self.author.unwrap_or_default(),
            text: self.text.unwrap_or_default(),
            created_at: timestamp(self.created_at_i, self.created_at.as_deref()),
            points: non_negative(self.points),
            children: self.children.into_iter().map(Item::into_comment).collect(),
        }
    }
}

fn count_with_descendants(comment: &Comment) -> usize {
    1 + comment
        .children
        .iter()
        .map(count_with_descendants)
        .sum::<usize>()
}

fn nullable_children<'de, D>(deserializer: D) -> Result<Vec<Item>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<Vec<Option<Item>>> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default().into_iter().flatten().collect())
}

fn non_negative(value: Option<i64>) -> u64 {
    value.unwrap_or(0).max(0) as u64
}

fn timestamp(epoch: Option<i64>, iso: Option<&str>) -> DateTime<Utc> {
    if let Some(parsed) = epoch.and_then(|secs| Utc.timestamp_opt(secs, 0).single()) {
        return parsed;
    }
    iso.and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}
