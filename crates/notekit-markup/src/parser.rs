//! # Parser - Tokens to Tree Events
//!
//! Turns the token stream into a flat sequence of [`Event`]s describing the
//! element tree:
//!
//! ```text
//! <p>a<br>b</p>  →  Start(p) Text("a") Start(br) End Text("b") End
//! ```
//!
//! A consumer (the engine's tree builder) keeps a stack of open nodes: Start
//! pushes, End pops. The parser guarantees the events are balanced, which is
//! what lets the builder stay trivial:
//!
//! - void elements (`br`, `img`, ...) and `<x/>` emit `Start` + `End` at once
//! - a close tag closes the innermost open element with the same name,
//!   closing anything opened after it on the way
//! - a close tag with no matching open element is ignored
//! - elements still open at end of input are closed

use logos::Logos;

use crate::lexer::{AttrToken, TokenKind, lex};

/// An event emitted while reading markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Open an element. Names are lower-cased, values entity-decoded.
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    /// Entity-decoded character data. Adjacent runs are merged.
    Text(String),
    /// Close the most recently opened element.
    End,
}

/// Elements that never have content or a close tag.
pub fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Parse markup into balanced tree events.
pub fn parse(input: &str) -> Vec<Event> {
    let mut events = Vec::new();
    let mut open: Vec<String> = Vec::new();

    for token in lex(input) {
        match token.kind {
            TokenKind::Text => push_text(&mut events, token.text),
            TokenKind::Comment | TokenKind::Declaration => {}
            TokenKind::StartTag => {
                let tag = parse_start_tag(token.text);
                let closes_immediately = tag.self_closing || is_void_element(&tag.name);
                events.push(Event::Start {
                    name: tag.name.clone(),
                    attrs: tag.attrs,
                });
                if closes_immediately {
                    events.push(Event::End);
                } else {
                    open.push(tag.name);
                }
            }
            TokenKind::EndTag => {
                let name = end_tag_name(token.text);
                if let Some(depth) = open.iter().rposition(|n| *n == name) {
                    for _ in depth..open.len() {
                        events.push(Event::End);
                    }
                    open.truncate(depth);
                }
            }
        }
    }

    events.extend(open.iter().map(|_| Event::End));
    events
}

fn push_text(events: &mut Vec<Event>, raw: &str) {
    let decoded = html_escape::decode_html_entities(raw);
    if let Some(Event::Text(prev)) = events.last_mut() {
        prev.push_str(&decoded);
    } else {
        events.push(Event::Text(decoded.into_owned()));
    }
}

struct StartTag {
    name: String,
    attrs: Vec<(String, String)>,
    self_closing: bool,
}

fn parse_start_tag(raw: &str) -> StartTag {
    let body = raw
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(raw);
    let self_closing = body.ends_with('/');
    let body = body.strip_suffix('/').unwrap_or(body);

    let name_len = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(body.len());
    let (name, rest) = body.split_at(name_len);

    StartTag {
        name: name.to_ascii_lowercase(),
        attrs: parse_attrs(rest),
        self_closing,
    }
}

fn end_tag_name(raw: &str) -> String {
    raw.trim_start_matches("</")
        .trim_end_matches('>')
        .trim()
        .to_ascii_lowercase()
}

fn parse_attrs(source: &str) -> Vec<(String, String)> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut lexer = AttrToken::lexer(source).spanned().peekable();

    while let Some((token, span)) = lexer.next() {
        if token != Ok(AttrToken::Word) {
            continue;
        }
        let name = source[span].to_ascii_lowercase();

        let mut value = String::new();
        if matches!(lexer.peek(), Some((Ok(AttrToken::Eq), _))) {
            lexer.next();
            if let Some((Ok(kind), span)) = lexer.peek().cloned() {
                let raw = &source[span];
                let unquoted = match kind {
                    AttrToken::DoubleQuoted | AttrToken::SingleQuoted => &raw[1..raw.len() - 1],
                    AttrToken::Word => raw,
                    AttrToken::Eq => "",
                };
                if kind != AttrToken::Eq {
                    lexer.next();
                }
                value = html_escape::decode_html_entities(unquoted).into_owned();
            }
        }

        // First occurrence wins, matching how browsers treat duplicates
        if !attrs.iter().any(|(n, _)| *n == name) {
            attrs.push((name, value));
        }
    }

    attrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn start(name: &str) -> Event {
        Event::Start {
            name: name.to_string(),
            attrs: vec![],
        }
    }

    fn text(t: &str) -> Event {
        Event::Text(t.to_string())
    }

    #[test]
    fn parse_nested_elements() {
        assert_eq!(
            parse("<ul><li>a</li><li>b</li></ul>"),
            vec![
                start("ul"),
                start("li"),
                text("a"),
                Event::End,
                start("li"),
                text("b"),
                Event::End,
                Event::End,
            ]
        );
    }

    #[test]
    fn parse_attributes_in_order() {
        let events = parse(r#"<A HREF="http://x/y?a=1&amp;b=2" target='_blank' hidden>t</A>"#);
        assert_eq!(
            events[0],
            Event::Start {
                name: "a".to_string(),
                attrs: vec![
                    ("href".to_string(), "http://x/y?a=1&b=2".to_string()),
                    ("target".to_string(), "_blank".to_string()),
                    ("hidden".to_string(), String::new()),
                ],
            }
        );
    }

    #[rstest]
    #[case("<p>a<br>b</p>")]
    #[case("<p>a<br/>b</p>")]
    #[case("<p>a<br />b</p>")]
    fn void_elements_close_immediately(#[case] input: &str) {
        assert_eq!(
            parse(input),
            vec![start("p"), text("a"), start("br"), Event::End, text("b"), Event::End]
        );
    }

    #[test]
    fn unmatched_close_tag_is_ignored() {
        assert_eq!(parse("<p>a</b></p>"), vec![start("p"), text("a"), Event::End]);
    }

    #[test]
    fn close_tag_closes_intervening_elements() {
        assert_eq!(
            parse("<p><b>a</p>b"),
            vec![start("p"), start("b"), text("a"), Event::End, Event::End, text("b")]
        );
    }

    #[test]
    fn unclosed_elements_close_at_eof() {
        assert_eq!(
            parse("<p><span>a"),
            vec![start("p"), start("span"), text("a"), Event::End, Event::End]
        );
    }

    #[test]
    fn entities_decoded_and_text_merged() {
        assert_eq!(parse("a &lt; b < c"), vec![text("a < b < c")]);
    }

    #[test]
    fn comments_dropped() {
        assert_eq!(parse("<p><!-- x -->a</p>"), vec![start("p"), text("a"), Event::End]);
    }
}
