//! Reply counting and deterministic ordering for comment trees.
//!
//! Ordering is a pure function over one sibling list. Tree views call it once
//! per level through [`flatten`], so every level is sorted independently.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::Comment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommentSort {
    #[default]
    MostReplies,
    OldestFirst,
    NewestFirst,
}

impl CommentSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentSort::MostReplies => "most-replies",
            CommentSort::OldestFirst => "oldest-first",
            CommentSort::NewestFirst => "newest-first",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CommentSort::MostReplies => "Most Replies",
            CommentSort::OldestFirst => "Oldest First",
            CommentSort::NewestFirst => "Newest First",
        }
    }

    pub fn cycle(self) -> Self {
        match self {
            CommentSort::MostReplies => CommentSort::OldestFirst,
            CommentSort::OldestFirst => CommentSort::NewestFirst,
            CommentSort::NewestFirst => CommentSort::MostReplies,
        }
    }
}

impl fmt::Display for CommentSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown comment sort {0:?} (expected most-replies, oldest-first or newest-first)")]
pub struct ParseCommentSortError(pub String);

impl FromStr for CommentSort {
    type Err = ParseCommentSortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "most-replies" | "replies" => Ok(CommentSort::MostReplies),
            "oldest-first" | "oldest" => Ok(CommentSort::OldestFirst),
            "newest-first" | "newest" => Ok(CommentSort::NewestFirst),
            other => Err(ParseCommentSortError(other.to_string())),
        }
    }
}

/// Total number of descendants below `comment`, at every depth.
pub fn reply_count(comment: &Comment) -> usize {
    let mut total = 0;
    let mut stack: Vec<&Comment> = comment.children.iter().collect();
    while let Some(node) = stack.pop() {
        total += 1;
        stack.extend(node.children.iter());
    }
    total
}

/// Orders one sibling list. Children are left untouched.
pub fn order(comments: &[Comment], mode: CommentSort) -> Vec<&Comment> {
    let mut keyed: Vec<(usize, &Comment)> = comments
        .iter()
        .map(|comment| {
            let replies = match mode {
                CommentSort::MostReplies => reply_count(comment),
                _ => 0,
            };
            (replies, comment)
        })
        .collect();
    keyed.sort_by(|(replies_a, a), (replies_b, b)| {
        let by_replies = match mode {
            CommentSort::MostReplies => replies_b.cmp(replies_a),
            _ => Ordering::Equal,
        };
        let by_time = match mode {
            CommentSort::OldestFirst => a.created_at.cmp(&b.created_at),
            CommentSort::MostReplies | CommentSort::NewestFirst => {
                b.created_at.cmp(&a.created_at)
            }
        };
        by_replies.then(by_time).then_with(|| a.id.cmp(&b.id))
    });
    keyed.into_iter().map(|(_, comment)| comment).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentRow<'a> {
    pub depth: usize,
    pub comment: &'a Comment,
    pub replies: usize,
    pub collapsed: bool,
}

/// Depth-first display rows for a comment tree. Rows under a collapsed comment are skipped.
pub fn flatten<'a>(
    comments: &'a [Comment],
    mode: CommentSort,
    collapsed: &HashSet<String>,
) -> Vec<CommentRow<'a>> {
    let mut rows = Vec::new();
    let mut stack: Vec<(usize, &'a Comment)> = order(comments, mode)
        .into_iter()
        .rev()
        .map(|comment| (0, comment))
        .collect();

    while let Some((depth, comment)) = stack.pop() {
        let is_collapsed = collapsed.contains(&comment.id);
        rows.push(CommentRow {
            depth,
            comment,
            replies: reply_count(comment),
            collapsed: is_collapsed,
        });
        if is_collapsed {
            continue;
        }
        for child in order(&comment.children, mode).into_iter().rev() {
            stack.push((depth + 1, child));
        }
    }
    rows
}

/// Highest-scoring top-level comment; the earliest one wins a tie.
pub fn top_comment(comments: &[Comment]) -> Option<&Comment> {
    comments.iter().fold(None, |best: Option<&Comment>, candidate| match best {
        Some(current) if current.points >= candidate.points => Some(current),
        _ => Some(candidate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn comment(id: &str, created: i64, children: Vec<Comment>) -> Comment {
        Comment {
            id: id.into(),
            author: format!("user-{id}"),
            text: format!("text {id}"),
            created_at: Utc.timestamp_opt(created, 0).unwrap(),
            points: 0,
            children,
        }
    }

    fn ids(list: &[&Comment]) -> Vec<String> {
        list.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn reply_count_is_recursive() {
        let a = comment(
            "a",
            100,
            vec![
                comment("a1", 101, vec![comment("a1x", 102, vec![])]),
                comment("a2", 103, vec![comment("a2x", 104, vec![])]),
            ],
        );
        assert_eq!(reply_count(&a), 4);
        assert_eq!(reply_count(&comment("leaf", 1, vec![])), 0);
    }

    #[test]
    fn most_replies_beats_timestamp() {
        let a = comment(
            "A",
            100,
            vec![
                comment("a1", 101, vec![comment("a1x", 102, vec![])]),
                comment("a2", 103, vec![comment("a2x", 104, vec![])]),
            ],
        );
        let b = comment("B", 200, vec![comment("b1", 201, vec![])]);
        let list = vec![b, a];
        assert_eq!(ids(&order(&list, CommentSort::MostReplies)), ["A", "B"]);
    }

    #[test]
    fn most_replies_ties_fall_back_to_newest_then_id() {
        let list = vec![
            comment("m", 100, vec![comment("m1", 1, vec![])]),
            comment("n", 300, vec![comment("n1", 1, vec![])]),
            comment("b", 300, vec![comment("b1", 1, vec![])]),
            comment("z", 50, vec![]),
        ];
        assert_eq!(
            ids(&order(&list, CommentSort::MostReplies)),
            ["b", "n", "m", "z"]
        );
    }

    #[test]
    fn oldest_first_ascends() {
        let list = vec![comment("x", 300, vec![]), comment("y", 100, vec![])];
        assert_eq!(ids(&order(&list, CommentSort::OldestFirst)), ["y", "x"]);
    }

    #[test]
    fn newest_first_descends_with_id_tiebreak() {
        let list = vec![
            comment("b", 100, vec![]),
            comment("c", 200, vec![]),
            comment("a", 100, vec![]),
        ];
        assert_eq!(ids(&order(&list, CommentSort::NewestFirst)), ["c", "a", "b"]);
    }

    #[test]
    fn order_is_deterministic() {
        let list = vec![
            comment("q", 5, vec![]),
            comment("p", 5, vec![]),
            comment("r", 7, vec![comment("r1", 8, vec![])]),
        ];
        for mode in [
            CommentSort::MostReplies,
            CommentSort::OldestFirst,
            CommentSort::NewestFirst,
        ] {
            assert_eq!(ids(&order(&list, mode)), ids(&order(&list, mode)));
        }
    }

    #[test]
    fn flatten_sorts_each_level_independently() {
        let tree = vec![
            comment("old", 10, vec![comment("late", 30, vec![]), comment("early", 20, vec![])]),
            comment("new", 40, vec![]),
        ];
        let rows = flatten(&tree, CommentSort::OldestFirst, &HashSet::new());
        let shape: Vec<(usize, &str)> = rows
            .iter()
            .map(|row| (row.depth, row.comment.id.as_str()))
            .collect();
        assert_eq!(
            shape,
            [(0, "old"), (1, "early"), (1, "late"), (0, "new")]
        );
        assert_eq!(rows[0].replies, 2);
    }

    #[test]
    fn flatten_skips_collapsed_subtrees() {
        let tree = vec![comment(
            "root",
            10,
            vec![comment("child", 20, vec![comment("grandchild", 30, vec![])])],
        )];
        let collapsed: HashSet<String> = ["child".to_string()].into_iter().collect();
        let rows = flatten(&tree, CommentSort::NewestFirst, &collapsed);
        assert_eq!(rows.len(), 2);
        assert!(rows[1].collapsed);
        assert_eq!(rows[1].replies, 1);
    }

    #[test]
    fn top_comment_prefers_points_then_list_order() {
        let mut first = comment("first", 1, vec![]);
        first.points = 5;
        let mut second = comment("second", 2, vec![]);
        second.points = 9;
        let mut third = comment("third", 3, vec![]);
        third.points = 9;
        let list = vec![first, second, third];
        assert_eq!(top_comment(&list).map(|c| c.id.as_str()), Some("second"));
        assert_eq!(top_comment(&[]), None);
    }

    #[test]
    fn sort_parses_aliases() {
        assert_eq!("oldest".parse::<CommentSort>(), Ok(CommentSort::OldestFirst));
        assert_eq!(
            "most_replies".parse::<CommentSort>(),
            Ok(CommentSort::MostReplies)
        );
        assert!("random".parse::<CommentSort>().is_err());
        assert_eq!(CommentSort::NewestFirst.cycle(), CommentSort::MostReplies);
    }
}
