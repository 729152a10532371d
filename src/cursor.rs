//! Thread cursor
//!
//! Tracks the highest post id already rendered. Owned by the poller; there is
//! no ambient cursor state.

use std::borrow::Cow;
use std::fmt;

use crate::thread::PostId;

/// Path segment requested while the cursor is unset
pub const DEFAULT_UNSET_SEGMENT: &str = "0";

/// Highest post id rendered so far
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cursor {
    /// No marker was found; every post counts as new
    #[default]
    Unset,
    /// Last rendered post id
    At(PostId),
}

impl Cursor {
    /// Cursor from marker text. Empty text leaves the cursor unset.
    pub fn from_marker(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            Cursor::Unset
        } else {
            Cursor::At(PostId::parse(text))
        }
    }

    /// Whether `id` is newer than everything rendered so far
    pub fn is_behind(&self, id: &PostId) -> bool {
        match self {
            Cursor::Unset => true,
            Cursor::At(current) => id > current,
        }
    }

    /// Move the cursor to `id`.
    ///
    /// Ids the cursor is not behind are ignored, so the cursor never regresses.
    pub fn advance(&mut self, id: &PostId) -> bool {
        if self.is_behind(id) {
            *self = Cursor::At(id.clone());
            true
        } else {
            false
        }
    }

    /// Current post id, if set
    pub fn post_id(&self) -> Option<&PostId> {
        match self {
            Cursor::Unset => None,
            Cursor::At(id) => Some(id),
        }
    }

    /// Path segment for the poll request, spelled the way the id arrived
    pub fn path_segment<'a>(&'a self, unset: &'a str) -> Cow<'a, str> {
        match self {
            Cursor::Unset => Cow::Borrowed(unset),
            Cursor::At(id) => match id.as_text() {
                Some(text) => Cow::Borrowed(text),
                None => Cow::Owned(id.to_string()),
            },
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Unset => f.write_str("unset"),
            Cursor::At(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_is_behind_everything() {
        let cursor = Cursor::Unset;
        assert!(cursor.is_behind(&PostId::from(-100)));
        assert!(cursor.is_behind(&PostId::parse("zzz")));
    }

    #[test]
    fn test_advance_only_forward() {
        let mut cursor = Cursor::from_marker("5");
        assert!(!cursor.advance(&PostId::from(3)));
        assert!(!cursor.advance(&PostId::from(5)));
        assert_eq!(cursor, Cursor::At(PostId::from(5)));

        assert!(cursor.advance(&PostId::from(6)));
        assert_eq!(cursor.post_id(), Some(&PostId::from(6)));
    }

    #[test]
    fn test_empty_marker_is_unset() {
        assert_eq!(Cursor::from_marker("  "), Cursor::Unset);
        assert_eq!(Cursor::from_marker(""), Cursor::Unset);
    }

    #[test]
    fn test_path_segment() {
        assert_eq!(Cursor::Unset.path_segment(DEFAULT_UNSET_SEGMENT), "0");
        assert_eq!(Cursor::from_marker("12").path_segment("0"), "12");
        assert_eq!(Cursor::from_marker("a b").path_segment("0"), "a b");
        assert_eq!(Cursor::from_marker(" 12\n").path_segment("0"), "12");
    }

    #[test]
    fn test_segment_keeps_server_spelling() {
        let mut cursor = Cursor::from_marker("5");
        assert!(cursor.advance(&PostId::parse("007")));
        assert_eq!(cursor.path_segment("0"), "007");
        assert_eq!(cursor.to_string(), "007");
        assert!(!cursor.advance(&PostId::from(7)));
    }
}
