//! Post identifiers
//!
//! The server sends `postid` either as a JSON number or as a string, and the
//! page marker always carries it as text. Both forms collapse into one
//! totally ordered [`PostId`]. Numeric text keeps its original spelling, so
//! `"007"` orders as 7 but still renders and is requested as `007`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Ordinal of a post within a thread
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawPostId", into = "RawPostId")]
pub enum PostId {
    /// Integer id (the normal case)
    Numeric {
        value: i64,
        /// Text the id arrived as, when it differs from `value`'s canonical form
        text: Option<String>,
    },
    /// Non-numeric id, compared lexicographically
    Text(String),
}

impl PostId {
    /// Parse an id from text.
    ///
    /// Text that is a signed integer (after trimming) becomes [`PostId::Numeric`],
    /// so `"7"` and `7` are the same id. Non-canonical spellings such as
    /// `"007"` are kept for display.
    pub fn parse(text: &str) -> Self {
        match text.trim().parse::<i64>() {
            Ok(value) => {
                let text = (text != value.to_string()).then(|| text.to_string());
                PostId::Numeric { value, text }
            }
            Err(_) => PostId::Text(text.to_string()),
        }
    }

    /// Numeric value, if this is a numeric id
    pub fn as_number(&self) -> Option<i64> {
        match self {
            PostId::Numeric { value, .. } => Some(*value),
            PostId::Text(_) => None,
        }
    }

    /// The id as the server spelled it, when it was sent as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PostId::Numeric { text, .. } => text.as_deref(),
            PostId::Text(s) => Some(s),
        }
    }
}

impl Ord for PostId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PostId::Numeric { value: a, .. }, PostId::Numeric { value: b, .. }) => a.cmp(b),
            (PostId::Numeric { .. }, PostId::Text(_)) => Ordering::Less,
            (PostId::Text(_), PostId::Numeric { .. }) => Ordering::Greater,
            (PostId::Text(a), PostId::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for PostId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equality follows the ordering: spelling never matters for numeric ids.
impl PartialEq for PostId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PostId {}

impl Hash for PostId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            PostId::Numeric { value, .. } => {
                state.write_u8(0);
                value.hash(state);
            }
            PostId::Text(s) => {
                state.write_u8(1);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostId::Numeric { text: Some(text), .. } => f.write_str(text),
            PostId::Numeric { value, .. } => write!(f, "{}", value),
            PostId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for PostId {
    fn from(value: i64) -> Self {
        PostId::Numeric { value, text: None }
    }
}

impl From<i32> for PostId {
    fn from(value: i32) -> Self {
        PostId::from(i64::from(value))
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> Self {
        PostId::parse(s)
    }
}

/// Wire form: whatever JSON scalar the server sent
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawPostId {
    Number(i64),
    Text(String),
}

impl From<RawPostId> for PostId {
    fn from(raw: RawPostId) -> Self {
        match raw {
            RawPostId::Number(n) => PostId::from(n),
            RawPostId::Text(s) => PostId::parse(&s),
        }
    }
}

impl From<PostId> for RawPostId {
    fn from(id: PostId) -> Self {
        match id {
            PostId::Numeric { text: Some(text), .. } => RawPostId::Text(text),
            PostId::Numeric { value, .. } => RawPostId::Number(value),
            PostId::Text(s) => RawPostId::Text(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_text() {
        assert_eq!(PostId::parse("42"), PostId::from(42));
        assert_eq!(PostId::parse(" 7\n"), PostId::from(7));
        assert_eq!(PostId::parse("-3"), PostId::from(-3));
        assert_eq!(PostId::parse("abc"), PostId::Text("abc".to_string()));
        assert_eq!(PostId::parse("42").as_text(), None);
    }

    #[test]
    fn test_numeric_ordering_is_not_lexicographic() {
        assert!(PostId::from(9) < PostId::from(10));
        assert!(PostId::parse("9") < PostId::parse("10"));
    }

    #[test]
    fn test_numbers_sort_before_text() {
        assert!(PostId::from(1_000_000) < PostId::parse("a"));
        assert!(PostId::parse("a") < PostId::parse("b"));
    }

    #[test]
    fn test_leading_zeros_keep_spelling() {
        let id = PostId::parse("007");
        assert_eq!(id, PostId::from(7));
        assert_eq!(id.as_number(), Some(7));
        assert_eq!(id.to_string(), "007");
        assert!(id < PostId::from(8));
        assert_eq!(PostId::parse("+5").to_string(), "+5");
    }

    #[test]
    fn test_deserialize_number_and_string() {
        let ids: Vec<PostId> = serde_json::from_str(r#"[6, "7", "x1", "007"]"#).unwrap();
        assert_eq!(
            ids,
            vec![
                PostId::from(6),
                PostId::from(7),
                PostId::Text("x1".to_string()),
                PostId::from(7),
            ]
        );
        assert_eq!(ids[3].to_string(), "007");
        assert_eq!(serde_json::to_string(&ids).unwrap(), r#"[6,7,"x1","007"]"#);
    }

    #[test]
    fn test_display() {
        assert_eq!(PostId::from(12).to_string(), "12");
        assert_eq!(PostId::parse("p-3").to_string(), "p-3");
    }
}
