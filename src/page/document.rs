//! Page documents
//!
//! A [`Page`] is the fetched thread page with a known insertion point: the
//! end of its comment container. Rendered comments are spliced in there, in
//! order, so the document always reads like the live page would.

use std::path::{Path, PathBuf};

use super::node::Element;
use super::scan::{parse_attributes, OpenElements, Scanner, TokenKind};
use super::{CommentSink, PageError, PageResult};
use crate::cursor::Cursor;

/// Default id of the element new comments are appended to
pub const DEFAULT_CONTAINER_ID: &str = "commentSection";

/// A page document with a comment container
#[derive(Debug, Clone)]
pub struct Page {
    html: String,
    container_id: String,
    /// Byte offset just past the container's start tag
    content_start: usize,
    /// Byte offset of the container's end tag
    insert_at: usize,
    appended: usize,
}

impl Page {
    /// Parse a page and locate the element with id `container_id`
    pub fn parse(html: impl Into<String>, container_id: &str) -> PageResult<Self> {
        let html = html.into();
        let (content_start, insert_at) = locate_container(&html, container_id)?;

        Ok(Self {
            html,
            container_id: container_id.to_string(),
            content_start,
            insert_at,
            appended: 0,
        })
    }

    /// Append markup to the end of the container
    pub fn append_html(&mut self, markup: &str) {
        self.html.insert_str(self.insert_at, markup);
        self.insert_at += markup.len();
        self.appended += 1;
    }

    /// The full current document
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Current inner HTML of the container
    pub fn container_html(&self) -> &str {
        &self.html[self.content_start..self.insert_at]
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Number of fragments appended since the page was parsed
    pub fn appended(&self) -> usize {
        self.appended
    }

    /// Initial cursor from the page's marker comment
    pub fn initial_cursor(&self) -> Cursor {
        super::marker::initial_cursor(&self.html)
    }
}

impl CommentSink for Page {
    fn append(&mut self, fragment: &Element) {
        self.append_html(&fragment.to_html());
    }
}

fn locate_container(html: &str, container_id: &str) -> PageResult<(usize, usize)> {
    let mut scanner = Scanner::new(html);

    let (name, content_start) = loop {
        let token = scanner
            .next()
            .ok_or_else(|| PageError::ContainerMissing(container_id.to_string()))?;

        if let TokenKind::StartTag { name, attrs, .. } = &token.kind {
            let attrs = parse_attributes(attrs);
            if attrs.iter().any(|(n, v)| n == "id" && v == container_id) {
                if !token.opens_element() {
                    return Err(PageError::ContainerUnclosed(container_id.to_string()));
                }
                break (name.clone(), token.end);
            }
        }
    };

    let mut open = OpenElements::new();
    open.push(name);

    for token in scanner {
        match &token.kind {
            TokenKind::StartTag { name, .. } if token.opens_element() => open.push(name.clone()),
            TokenKind::EndTag { name } => {
                if open.close(name) && open.is_empty() {
                    return Ok((content_start, token.start));
                }
            }
            _ => {}
        }
    }

    Err(PageError::ContainerUnclosed(container_id.to_string()))
}

/// A page plus an optional file the page is mirrored to on flush
#[derive(Debug)]
pub struct PageMirror {
    page: Page,
    output: Option<PathBuf>,
    dirty: bool,
}

impl PageMirror {
    pub fn new(page: Page, output: Option<PathBuf>) -> Self {
        Self {
            page,
            output,
            dirty: false,
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Write the page to the output file, if any
    pub fn write(&self) -> PageResult<()> {
        let Some(path) = &self.output else {
            return Ok(());
        };

        // Write next to the target and rename so readers never see half a page.
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let written =
            std::fs::write(&tmp, self.page.html()).and_then(|_| std::fs::rename(&tmp, path));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        tracing::debug!(path = ?path, comments = self.page.appended(), "Mirrored page");
        Ok(())
    }
}

impl CommentSink for PageMirror {
    fn append(&mut self, fragment: &Element) {
        self.page.append(fragment);
        self.dirty = true;
    }

    fn flush(&mut self) -> PageResult<()> {
        if self.dirty {
            self.write()?;
            self.dirty = false;
        }
        Ok(())
    }
}
