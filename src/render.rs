//! Comment Renderer
//!
//! Turns one [`Message`] into the comment markup the thread page uses and
//! appends it to a [`CommentSink`]:
//!
//! ```html
//! <div class="comment">
//!   <div>
//!     <div class="user">poster</div><div class="id">ID: 6</div>
//!     <div class="time">13:38</div><div class="date">01.02.2019</div>
//!   </div>
//!   <div class="content">
//!     <img class="imgThread" alt="image not found" src="/Pictures/x.png">
//!     <p>body</p>
//!   </div>
//! </div>
//! ```
//!
//! Post fields are server-supplied markup. With [`MarkupMode::Raw`] they are
//! inserted as-is, exactly as the live page does; [`MarkupMode::Escaped`]
//! renders them as plain text instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::page::{CommentSink, Element};
use crate::thread::Message;

/// How post fields are inserted into the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkupMode {
    /// Insert fields as markup
    #[default]
    Raw,
    /// Insert fields as escaped text
    Escaped,
}

impl FromStr for MarkupMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(MarkupMode::Raw),
            "escaped" | "escape" | "text" => Ok(MarkupMode::Escaped),
            other => Err(format!("unknown markup mode: {}", other)),
        }
    }
}

impl fmt::Display for MarkupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkupMode::Raw => f.write_str("raw"),
            MarkupMode::Escaped => f.write_str("escaped"),
        }
    }
}

/// Renderer settings
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub markup: MarkupMode,
    /// Prefix joined to each post's image path
    pub image_root: String,
    /// Alt text shown when the image cannot be loaded
    pub image_alt: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            markup: MarkupMode::Raw,
            image_root: "/".to_string(),
            image_alt: "image not found".to_string(),
        }
    }
}

/// Builds comment fragments
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Build the fragment for one message
    pub fn comment(&self, msg: &Message) -> Element {
        let info = Element::new("div")
            .child(self.field("user", &msg.poster))
            .child(self.field("id", &format!("ID: {}", msg.postid)))
            .child(self.field("time", &msg.time))
            .child(self.field("date", &msg.date));

        let image = Element::new("img")
            .class("imgThread")
            .attr("alt", self.config.image_alt.as_str())
            .attr("src", format!("{}{}", self.config.image_root, msg.img));

        let content = Element::new("div")
            .class("content")
            .child(image)
            .child(self.insert(Element::new("p"), &msg.body));

        Element::new("div").class("comment").child(info).child(content)
    }

    /// Build the fragment for `msg` and append it to `sink`
    pub fn render<K: CommentSink + ?Sized>(&self, sink: &mut K, msg: &Message) {
        let fragment = self.comment(msg);
        sink.append(&fragment);
    }

    fn field(&self, class: &str, value: &str) -> Element {
        self.insert(Element::new("div").class(class), value)
    }

    fn insert(&self, el: Element, value: &str) -> Element {
        match self.config.markup {
            MarkupMode::Raw => el.raw(value),
            MarkupMode::Escaped => el.text(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Node;

    fn sample() -> Message {
        Message::new("Anonymous", 6, "<b>hello</b> & bye")
            .posted_at("13:38", "01.02.2019")
            .image("Pictures/cat.png")
    }

    #[test]
    fn test_comment_structure() {
        let el = Renderer::default().comment(&sample());
        assert_eq!(el.attribute("class"), Some("comment"));

        let parts: Vec<_> = el.child_elements().collect();
        assert_eq!(parts.len(), 2);

        let info: Vec<_> = parts[0].child_elements().collect();
        let classes: Vec<_> = info.iter().filter_map(|e| e.attribute("class")).collect();
        assert_eq!(classes, vec!["user", "id", "time", "date"]);
        assert_eq!(info[1].inner_text(), "ID: 6");

        assert_eq!(parts[1].attribute("class"), Some("content"));
        let content: Vec<_> = parts[1].child_elements().collect();
        assert_eq!(content[0].name(), "img");
        assert_eq!(content[0].attribute("src"), Some("/Pictures/cat.png"));
        assert_eq!(content[0].attribute("alt"), Some("image not found"));
        assert_eq!(content[1].name(), "p");
    }

    #[test]
    fn test_raw_markup() {
        let html = Renderer::default().comment(&sample()).to_html();
        assert_eq!(
            html,
            concat!(
                "<div class=\"comment\"><div>",
                "<div class=\"user\">Anonymous</div><div class=\"id\">ID: 6</div>",
                "<div class=\"time\">13:38</div><div class=\"date\">01.02.2019</div>",
                "</div><div class=\"content\">",
                "<img class=\"imgThread\" alt=\"image not found\" src=\"/Pictures/cat.png\">",
                "<p><b>hello</b> & bye</p></div></div>"
            )
        );
    }

    #[test]
    fn test_escaped_markup() {
        let renderer = Renderer::new(RenderConfig {
            markup: MarkupMode::Escaped,
            ..Default::default()
        });
        let msg = sample();
        let el = renderer.comment(&msg);
        let body = el.child_elements().nth(1).unwrap().child_elements().nth(1).unwrap();
        assert_eq!(body.children(), &[Node::Text("<b>hello</b> & bye".to_string())]);
        assert!(el.to_html().contains("<p>&lt;b&gt;hello&lt;/b&gt; &amp; bye</p>"));
    }

    #[test]
    fn test_image_src_is_attribute_escaped() {
        let msg = sample().image("a\"onerror=\"x.png");
        let html = Renderer::default().comment(&msg).to_html();
        assert!(html.contains("src=\"/a&quot;onerror=&quot;x.png\""));
    }

    #[test]
    fn test_render_appends_in_order() {
        let renderer = Renderer::default();
        let mut sink: Vec<Element> = Vec::new();
        renderer.render(&mut sink, &Message::new("a", 1, "x"));
        renderer.render(&mut sink, &Message::new("b", 2, "y"));
        let ids: Vec<_> = sink
            .iter()
            .map(|c| c.child_elements().next().unwrap().child_elements().nth(1).unwrap().inner_text())
            .collect();
        assert_eq!(ids, vec!["ID: 1", "ID: 2"]);
    }

    #[test]
    fn test_id_rendered_as_sent() {
        let body = r#"[{"poster":"a","body":"x","img":"i.png","time":"1","date":"2","postid":"007"}]"#;
        let posts = crate::client::decode_messages(body).unwrap();
        let html = Renderer::default().comment(&posts[0]).to_html();
        assert!(html.contains("<div class=\"id\">ID: 007</div>"));
    }

    #[test]
    fn test_markup_mode_parse() {
        assert_eq!("raw".parse::<MarkupMode>(), Ok(MarkupMode::Raw));
        assert_eq!("Escaped".parse::<MarkupMode>(), Ok(MarkupMode::Escaped));
        assert!("html".parse::<MarkupMode>().is_err());
    }
}
