use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use crate::util::unescape_entities;

/// Maximum element nesting accepted in a feed document.
const MAX_DEPTH: usize = 64;

/// Errors that make a response body unusable as an RSS document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("feed body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("document has no root element")]
    NoRoot,

    /// Nesting exceeds [`MAX_DEPTH`]
    #[error("XML nesting depth exceeds maximum of {0} levels")]
    TooDeep(usize),

    #[error("document ended inside <{0}>")]
    Truncated(String),
}

/// A decoded RSS channel, with entity-unescaped text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Items in document order
    pub items: Vec<FeedItem>,
}

/// One `<item>` of a channel. Transient: handed straight to ingestion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// `<pubDate>` exactly as the feed wrote it (trimmed)
    pub pub_date: String,
}

/// Where a text-bearing element sits in the document
#[derive(Clone, Copy)]
enum Scope {
    Channel,
    Item,
}

/// Decodes an RSS 2.0 document.
///
/// Reads `<root><channel>` and its direct `title`, `link`, `description` and
/// `item` children, and within each item `title`, `link`, `description` and
/// `pubDate`. Names match exactly, so prefixed elements such as `atom:link`
/// or `media:title` are ignored along with everything else. The root element
/// name is not checked and a document without a channel is an empty feed.
///
/// Titles and descriptions go through [`unescape_entities`] after XML
/// decoding because many producers double-encode them.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, ParseError> {
    let text = std::str::from_utf8(bytes)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = Reader::from_str(text);
    let mut feed = ParsedFeed::default();
    let mut item: Option<FeedItem> = None;
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut field_text = String::new();
    let mut saw_root = false;

    loop {
        let event = reader.read_event().map_err(|e| ParseError::Xml {
            position: reader.error_position(),
            message: e.to_string(),
        })?;

        match event {
            Event::Start(e) => {
                if path.len() >= MAX_DEPTH {
                    return Err(ParseError::TooDeep(MAX_DEPTH));
                }
                saw_root = true;
                path.push(e.name().as_ref().to_vec());
                match scope_of_field(&path) {
                    Some(_) => field_text.clear(),
                    None if is_item(&path) => item = Some(FeedItem::default()),
                    None => {}
                }
            }
            Event::Empty(e) => {
                saw_root = true;
                path.push(e.name().as_ref().to_vec());
                if is_item(&path) {
                    feed.items.push(FeedItem::default());
                }
                path.pop();
            }
            Event::Text(t) => {
                if inside_field(&path) {
                    // An HTML-only entity such as &nbsp; fails the XML layer for
                    // the whole node, so the XML entities are decoded here instead
                    match t.unescape() {
                        Ok(s) => field_text.push_str(&s),
                        Err(_) => {
                            field_text.push_str(&unescape_entities(&String::from_utf8_lossy(&t)))
                        }
                    }
                }
            }
            Event::CData(c) => {
                if inside_field(&path) {
                    field_text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                let scope = scope_of_field(&path);
                let closing_item = is_item(&path);
                let name = path.pop().unwrap_or_default();

                match scope {
                    Some(Scope::Channel) => {
                        let text = std::mem::take(&mut field_text);
                        match name.as_slice() {
                            b"title" => feed.title = text,
                            b"link" => feed.link = text,
                            b"description" => feed.description = text,
                            _ => {}
                        }
                    }
                    Some(Scope::Item) => {
                        let text = std::mem::take(&mut field_text);
                        if let Some(current) = item.as_mut() {
                            match name.as_slice() {
                                b"title" => current.title = text,
                                b"link" => current.link = text,
                                b"description" => current.description = text,
                                b"pubDate" => current.pub_date = text,
                                _ => {}
                            }
                        }
                    }
                    None if closing_item => {
                        if let Some(done) = item.take() {
                            feed.items.push(done);
                        }
                    }
                    None => {}
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and DOCTYPE carry no feed data.
            // DOCTYPE entity declarations are never expanded.
            _ => {}
        }
    }

    if let Some(open) = path.last() {
        return Err(ParseError::Truncated(
            String::from_utf8_lossy(open).into_owned(),
        ));
    }
    if !saw_root {
        return Err(ParseError::NoRoot);
    }

    Ok(normalize(feed))
}

/// `<root><channel><item>`
fn is_item(path: &[Vec<u8>]) -> bool {
    path.len() == 3 && path[1] == b"channel" && path[2] == b"item"
}

/// The scope of the element on top of `path`, if it is a field we collect
fn scope_of_field(path: &[Vec<u8>]) -> Option<Scope> {
    match path {
        [_, channel, field] if channel == b"channel" => {
            matches!(field.as_slice(), b"title" | b"link" | b"description").then_some(Scope::Channel)
        }
        [_, channel, item, field] if channel == b"channel" && item == b"item" => matches!(
            field.as_slice(),
            b"title" | b"link" | b"description" | b"pubDate"
        )
        .then_some(Scope::Item),
        _ => None,
    }
}

/// True while the reader is inside a collected field (including its children)
fn inside_field(path: &[Vec<u8>]) -> bool {
    (3..=path.len()).any(|len| scope_of_field(&path[..len]).is_some())
}

fn normalize(feed: ParsedFeed) -> ParsedFeed {
    ParsedFeed {
        title: unescape_entities(feed.title.trim()).into_owned(),
        link: feed.link.trim().to_string(),
        description: unescape_entities(&feed.description).into_owned(),
        items: feed
            .items
            .into_iter()
            .map(|item| FeedItem {
                title: unescape_entities(item.title.trim()).into_owned(),
                link: item.link.trim().to_string(),
                description: unescape_entities(&item.description).into_owned(),
                pub_date: item.pub_date.trim().to_string(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
<channel>
  <title>Boot &amp;amp; Blog</title>
  <link>https://blog.example.com/</link>
  <description>Notes &amp;amp; essays</description>
  <atom:link href="https://blog.example.com/index.xml" rel="self" type="application/rss+xml"/>
  <language>en-us</language>
  <item>
    <title>First &amp;amp; foremost</title>
    <link>https://blog.example.com/first</link>
    <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
    <guid>https://blog.example.com/first</guid>
    <description><![CDATA[<p>It&#39;s here</p>]]></description>
  </item>
  <item>
    <title></title>
    <link> https://blog.example.com/second </link>
    <pubDate>Tue, 02 Jan 2024 10:00:00 GMT</pubDate>
  </item>
</channel>
</rss>"#;

    #[test]
    fn test_parse_channel_and_items() {
        let feed = parse_feed(SAMPLE.as_bytes()).unwrap();

        assert_eq!(feed.title, "Boot & Blog");
        assert_eq!(feed.link, "https://blog.example.com/");
        assert_eq!(feed.description, "Notes & essays");
        assert_eq!(
            feed.items,
            vec![
                FeedItem {
                    title: "First & foremost".to_string(),
                    link: "https://blog.example.com/first".to_string(),
                    description: "<p>It's here</p>".to_string(),
                    pub_date: "Mon, 01 Jan 2024 10:00:00 GMT".to_string(),
                },
                FeedItem {
                    title: String::new(),
                    link: "https://blog.example.com/second".to_string(),
                    description: String::new(),
                    pub_date: "Tue, 02 Jan 2024 10:00:00 GMT".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_single_encoded_entity_decoded() {
        let xml = r#"<rss><channel><item><title>A &amp; B</title></item></channel></rss>"#;
        let feed = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(feed.items[0].title, "A & B");
    }

    #[test]
    fn test_cdata_entities_unescaped() {
        let xml = r#"<rss><channel><item><title><![CDATA[A &amp; B]]></title></item></channel></rss>"#;
        let feed = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(feed.items[0].title, "A & B");
    }

    #[test]
    fn test_html_only_entity_survives_xml_layer() {
        let xml = r#"<rss><channel><item><title>non&nbsp;breaking</title></item></channel></rss>"#;
        let feed = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(feed.items[0].title, "non\u{a0}breaking");
    }

    #[test]
    fn test_double_encoding_next_to_html_only_entity() {
        let xml = r#"<rss><channel><item>
            <title>A &amp;amp; B&nbsp;C</title>
            <description>&lt;p&gt;x&nbsp;y&lt;/p&gt;</description>
        </item></channel></rss>"#;
        let feed = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(feed.items[0].title, "A & B\u{a0}C");
        assert_eq!(feed.items[0].description, "<p>x\u{a0}y</p>");
    }

    #[test]
    fn test_prefixed_elements_ignored() {
        let xml = r#"<rss xmlns:media="http://search.yahoo.com/mrss/"><channel>
            <item><title>Real</title><media:title>Other</media:title></item>
        </channel></rss>"#;
        let feed = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(feed.items[0].title, "Real");
    }

    #[test]
    fn test_nested_markup_text_collected() {
        let xml = r#"<rss><channel><item><description>Hello <b>world</b></description></item></channel></rss>"#;
        let feed = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(feed.items[0].description, "Hello world");
    }

    #[test]
    fn test_self_closing_item() {
        let xml = r#"<rss><channel><item/><item><title>x</title></item></channel></rss>"#;
        let feed = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.items[0], FeedItem::default());
    }

    #[test]
    fn test_missing_channel_is_empty_feed() {
        let feed = parse_feed(b"<rss version=\"2.0\"></rss>").unwrap();
        assert_eq!(feed, ParsedFeed::default());
    }

    #[test]
    fn test_byte_order_mark_skipped() {
        let xml = "\u{feff}<rss><channel><title>BOM</title></channel></rss>";
        let feed = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(feed.title, "BOM");
    }

    #[test]
    fn test_malformed_xml_rejected() {
        assert!(parse_feed(b"<not valid xml").is_err());
        assert!(matches!(parse_feed(b""), Err(ParseError::NoRoot)));
        assert!(matches!(
            parse_feed(b"<rss><channel><title>x</channel></rss>"),
            Err(ParseError::Xml { .. })
        ));
        assert!(matches!(
            parse_feed(b"<rss><channel>"),
            Err(ParseError::Truncated(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let err = parse_feed(&[0x3c, 0x72, 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, ParseError::Utf8(_)));
    }

    #[test]
    fn test_depth_limit() {
        let xml = format!("{}{}", "<a>".repeat(MAX_DEPTH + 1), "</a>".repeat(MAX_DEPTH + 1));
        assert!(matches!(
            parse_feed(xml.as_bytes()),
            Err(ParseError::TooDeep(_))
        ));
    }
}
