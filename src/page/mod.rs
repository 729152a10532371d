//! Thread Pages
//!
//! Native model of the page the watcher renders into.
//!
//! ## Components
//!
//! - **scan**: forgiving HTML tokenizer with byte spans
//! - **node**: element trees for rendered fragments
//! - **marker**: reads the initial cursor from the page's marker comment
//! - **document**: the page with its comment container, and the file mirror

mod document;
mod marker;
mod node;
mod scan;

pub use document::{Page, PageMirror, DEFAULT_CONTAINER_ID};
pub use marker::{find_marker, initial_cursor, MarkerError, MARKER_CHILD_INDEX};
pub use node::{escape_attr, escape_text, Element, Node};
pub use scan::{parse_attributes, Scanner, Token, TokenKind};

use thiserror::Error;

/// Something rendered comments can be appended to
pub trait CommentSink {
    /// Append one rendered comment
    fn append(&mut self, fragment: &Element);

    /// Called after a poll cycle that appended at least one comment
    fn flush(&mut self) -> PageResult<()> {
        Ok(())
    }
}

/// Collects fragments in memory
impl CommentSink for Vec<Element> {
    fn append(&mut self, fragment: &Element) {
        self.push(fragment.clone());
    }
}

/// Errors from page parsing and mirroring
#[derive(Error, Debug)]
pub enum PageError {
    #[error("comment container #{0} not found")]
    ContainerMissing(String),

    #[error("comment container #{0} is never closed")]
    ContainerUnclosed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for page operations
pub type PageResult<T> = Result<T, PageError>;
