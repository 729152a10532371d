//! Thread data model
//!
//! Wire types for the posts a thread's poll endpoint returns.

mod message;
mod post_id;

pub use message::Message;
pub use post_id::PostId;
