//! Thread messages as delivered by the poll endpoint

use serde::{Deserialize, Serialize};

use super::PostId;

/// One post of a thread.
///
/// Field names follow the server's JSON (`poster`, `postid`, `time`, `date`,
/// `body`, `img`). Extra fields such as `threadid` are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Display name of the poster
    pub poster: String,
    /// Ordinal of the post within its thread
    pub postid: PostId,
    /// Time of day the post was made, preformatted by the server
    pub time: String,
    /// Date the post was made, preformatted by the server
    pub date: String,
    /// Post body as HTML markup
    pub body: String,
    /// Image path relative to the site root
    pub img: String,
}

impl Message {
    /// Create a message with empty time, date and image
    pub fn new(poster: impl Into<String>, postid: impl Into<PostId>, body: impl Into<String>) -> Self {
        Self {
            poster: poster.into(),
            postid: postid.into(),
            time: String::new(),
            date: String::new(),
            body: body.into(),
            img: String::new(),
        }
    }

    /// Builder: set time and date
    pub fn posted_at(mut self, time: impl Into<String>, date: impl Into<String>) -> Self {
        self.time = time.into();
        self.date = date.into();
        self
    }

    /// Builder: set image path
    pub fn image(mut self, img: impl Into<String>) -> Self {
        self.img = img.into();
        self
    }
}
