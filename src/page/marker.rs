//! Cursor marker
//!
//! Thread pages carry the id of the newest post they were rendered with as a
//! comment node, the second child of `<body>`:
//!
//! ```html
//! <body class="background keep_space">
//!     <!--17-->
//!     <div class="background-white">...
//! ```
//!
//! Child nodes are counted the way the DOM counts them, so the whitespace
//! before the comment is child 0.

use thiserror::Error;

use super::scan::{OpenElements, Scanner, TokenKind};
use crate::cursor::Cursor;

/// Index of the marker among the body's child nodes
pub const MARKER_CHILD_INDEX: usize = 1;

/// Why the marker could not be read
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkerError {
    #[error("page has no <body> element")]
    NoBody,

    #[error("body has only {found} child node(s)")]
    MissingChild { found: usize },

    #[error("body child {index} is {found}, not a comment")]
    NotAComment { index: usize, found: String },
}

/// Find the marker comment and return its raw text
pub fn find_marker(html: &str) -> Result<&str, MarkerError> {
    let mut scanner = Scanner::new(html);

    scanner
        .by_ref()
        .find(|t| matches!(&t.kind, TokenKind::StartTag { name, .. } if name == "body"))
        .ok_or(MarkerError::NoBody)?;

    let mut open = OpenElements::new();
    let mut index = 0;

    for token in scanner {
        match token.kind {
            TokenKind::Declaration => {}
            TokenKind::Comment(text) if open.is_empty() => {
                if index == MARKER_CHILD_INDEX {
                    return Ok(text);
                }
                index += 1;
            }
            TokenKind::Text(_) if open.is_empty() => {
                if index == MARKER_CHILD_INDEX {
                    return Err(MarkerError::NotAComment {
                        index,
                        found: "a text node".to_string(),
                    });
                }
                index += 1;
            }
            TokenKind::Comment(_) | TokenKind::Text(_) => {}
            TokenKind::StartTag { ref name, .. } => {
                if open.is_empty() && index == MARKER_CHILD_INDEX {
                    return Err(MarkerError::NotAComment {
                        index,
                        found: format!("a <{}> element", name),
                    });
                }
                if token.opens_element() {
                    open.push(name.clone());
                } else if open.is_empty() {
                    index += 1;
                }
            }
            TokenKind::EndTag { ref name } => {
                if open.is_empty() {
                    if name == "body" || name == "html" {
                        break;
                    }
                } else if open.close(name) && open.is_empty() {
                    index += 1;
                }
            }
        }
    }

    Err(MarkerError::MissingChild { found: index })
}

/// Read the initial cursor from a page.
///
/// A missing marker is logged and leaves the cursor unset.
pub fn initial_cursor(html: &str) -> Cursor {
    match find_marker(html) {
        Ok(text) => {
            let cursor = Cursor::from_marker(text);
            tracing::debug!(cursor = %cursor, "Read cursor marker");
            cursor
        }
        Err(e) => {
            tracing::error!(error = %e, "Cursor marker missing, starting unset");
            Cursor::Unset
        }
    }
}
