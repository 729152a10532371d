//! # Threadwatch
//!
//! Watches a discussion thread and renders new posts as they arrive.
//!
//! The thread page carries the id of its newest post in a marker comment.
//! Threadwatch reads that marker, then polls `<page url>/<cursor>` on a fixed
//! interval and appends every post newer than the cursor to the page's
//! comment container.
//!
//! ## Modules
//!
//! - [`thread`]: wire types for posts
//! - [`cursor`]: the last-rendered post id
//! - [`page`]: page documents, marker lookup and comment containers
//! - [`render`]: comment markup
//! - [`client`]: HTTP access to the thread server
//! - [`poller`]: the serialized poll loop
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use threadwatch::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ThreadClient::new(ClientConfig::new("http://localhost:8000/thread/3"))?;
//!
//!     // Read the cursor marker and find the comment container
//!     let page = Page::parse(client.fetch_page().await?, DEFAULT_CONTAINER_ID)?;
//!     let cursor = page.initial_cursor();
//!
//!     let mut poller = Poller::new(
//!         client,
//!         page,
//!         Renderer::default(),
//!         cursor,
//!         PollerConfig::default(),
//!     );
//!
//!     let report = poller.poll_cycle().await?;
//!     println!("Rendered {} new posts", report.rendered);
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod cursor;
pub mod page;
pub mod poller;
pub mod render;
pub mod thread;

// Re-export top-level types for convenience
pub use client::{decode_messages, ClientConfig, FetchError, MessageSource, ThreadClient};

pub use config::{
    Config, ConfigError, DefaultLoad, LoggingConfig, OutputConfig, RenderSettings, WatchConfig,
};

pub use cursor::Cursor;

pub use page::{
    find_marker, initial_cursor, CommentSink, Element, MarkerError, Page, PageError, PageMirror,
    PageResult, DEFAULT_CONTAINER_ID,
};

pub use poller::{CycleReport, PollStats, Poller, PollerConfig};

pub use render::{MarkupMode, RenderConfig, Renderer};

pub use thread::{Message, PostId};
