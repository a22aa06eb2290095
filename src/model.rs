use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const HN_ITEM_URL: &str = "https://news.ycombinator.com/item";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub points: u64,
    #[serde(default)]
    pub author: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub text: Option<String>,
}

impl Post {
    pub fn hn_url(&self) -> String {
        format!("{}?id={}", HN_ITEM_URL, self.id)
    }

    /// External link when the post has one, the discussion page otherwise.
    pub fn link(&self) -> String {
        match self.url.as_deref() {
            Some(url) if !url.trim().is_empty() => url.to_string(),
            _ => self.hn_url(),
        }
    }

    pub fn domain(&self) -> Option<String> {
        let raw = self.url.as_deref()?;
        let parsed = url::Url::parse(raw).ok()?;
        let host = parsed.host_str()?;
        Some(host.trim_start_matches("www.").to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub points: u64,
    #[serde(default)]
    pub children: Vec<Comment>,
}

impl Comment {
    /// Deleted comments keep their slot in the tree because replies may survive them.
    pub fn is_deleted(&self) -> bool {
        self.author.trim().is_empty() && self.text.trim().is_empty()
    }
}

/// A post together with its full comment tree, as returned by an item lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostThread {
    pub post: Post,
    pub comments: Vec<Comment>,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchPage {
    pub posts: Vec<Post>,
    pub nb_pages: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    #[default]
    #[serde(alias = "front_page", alias = "front-page")]
    FrontPage,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeRange {
    const ALL: [TimeRange; 6] = [
        TimeRange::FrontPage,
        TimeRange::Day,
        TimeRange::Week,
        TimeRange::Month,
        TimeRange::Year,
        TimeRange::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::FrontPage => "frontpage",
            TimeRange::Day => "day",
            TimeRange::Week => "week",
            TimeRange::Month => "month",
            TimeRange::Year => "year",
            TimeRange::All => "all",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TimeRange::FrontPage => "Front Page",
            TimeRange::Day => "Past 24 Hours",
            TimeRange::Week => "Past Week",
            TimeRange::Month => "Past Month",
            TimeRange::Year => "Past Year",
            TimeRange::All => "All Time",
        }
    }

    /// Lookback window in days, `None` when the range is not time-bounded.
    pub fn window_days(&self) -> Option<i64> {
        match self {
            TimeRange::Day => Some(1),
            TimeRange::Week => Some(7),
            TimeRange::Month => Some(30),
            TimeRange::Year => Some(365),
            TimeRange::FrontPage | TimeRange::All => None,
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|r| *r == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown time range {0:?} (expected frontpage, day, week, month, year or all)")]
pub struct ParseTimeRangeError(pub String);

impl FromStr for TimeRange {
    type Err = ParseTimeRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "frontpage" | "front_page" | "front-page" => Ok(TimeRange::FrontPage),
            "day" => Ok(TimeRange::Day),
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            "year" => Ok(TimeRange::Year),
            "all" => Ok(TimeRange::All),
            other => Err(ParseTimeRangeError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(url: Option<&str>) -> Post {
        Post {
            id: "42".into(),
            title: "Example".into(),
            url: url.map(str::to_string),
            points: 10,
            author: "pg".into(),
            created_at: Utc.timestamp_opt(0, 0).unwrap(),
            num_comments: 0,
            text: None,
        }
    }

    #[test]
    fn link_falls_back_to_discussion() {
        assert_eq!(post(None).link(), "https://news.ycombinator.com/item?id=42");
        assert_eq!(post(Some("  ")).link(), "https://news.ycombinator.com/item?id=42");
        assert_eq!(
            post(Some("https://example.com/a")).link(),
            "https://example.com/a"
        );
    }

    #[test]
    fn domain_strips_www() {
        assert_eq!(
            post(Some("https://www.example.com/a")).domain().as_deref(),
            Some("example.com")
        );
        assert_eq!(post(None).domain(), None);
    }

    #[test]
    fn time_range_parses_and_cycles() {
        assert_eq!("Week".parse::<TimeRange>(), Ok(TimeRange::Week));
        assert_eq!("front_page".parse::<TimeRange>(), Ok(TimeRange::FrontPage));
        assert!("decade".parse::<TimeRange>().is_err());
        assert_eq!(TimeRange::All.next(), TimeRange::FrontPage);
        assert_eq!(TimeRange::FrontPage.next(), TimeRange::Day);
    }
}
