//! # Lexer - Tokenizing Markup Source
//!
//! The first stage of reading the document's native serialization: break the
//! source into tags and text runs using the [Logos] lexer generator.
//!
//! [Logos]: https://docs.rs/logos
//!
//! ## Coverage Guarantee
//!
//! Every byte of the input appears in exactly one token. A `<` that does not
//! open a well-formed tag is reported as text, so concatenating the token
//! texts always gives back the input:
//!
//! ```
//! use notekit_markup::lexer::lex;
//!
//! let input = "<p class=\"x\">a < b</p>";
//! let tokens = lex(input);
//!
//! let reconstructed: String = tokens.iter().map(|t| t.text).collect();
//! assert_eq!(input, reconstructed);
//! ```
//!
//! ## Two Token Enums
//!
//! Tags are lexed whole ([`TokenKind::StartTag`] covers `<a href="x">`), and
//! the attribute text inside a start tag is lexed again with [`AttrToken`].
//! Keeping attributes out of the outer lexer means a `>` inside a quoted
//! attribute value never ends the tag early.

use logos::Logos;

/// Token kinds produced by the outer Logos lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `<name attr="v">` or `<name/>`
    #[regex(r#"<[a-zA-Z][a-zA-Z0-9-]*([^>"']|"[^"]*"|'[^']*')*>"#)]
    StartTag,

    /// `</name>`
    #[regex(r"</[a-zA-Z][a-zA-Z0-9-]*[^>]*>")]
    EndTag,

    /// `<!-- ... -->`, unterminated comments run to end of input
    #[token("<!--", comment)]
    Comment,

    /// `<!DOCTYPE ...>` and `<?xml ...?>`
    #[regex(r"<![a-zA-Z][^>]*>")]
    #[regex(r"<\?[^>]*>")]
    Declaration,

    /// Character data between tags
    #[regex(r"[^<]+")]
    Text,
}

fn comment(lex: &mut logos::Lexer<TokenKind>) -> bool {
    let rest = lex.remainder();
    let len = rest.find("-->").map_or(rest.len(), |end| end + 3);
    lex.bump(len);
    true
}

/// Token kinds inside the attribute section of a start tag.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\x0C]+")]
pub enum AttrToken {
    /// Attribute name or unquoted value
    #[regex(r#"[^\s"'=<>`]+"#)]
    Word,

    #[token("=")]
    Eq,

    #[regex(r#""[^"]*""#)]
    DoubleQuoted,

    #[regex(r"'[^']*'")]
    SingleQuoted,
}

/// A lexed token with its kind and text slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

/// Lex the input into a sequence of tokens.
///
/// Guarantees that all bytes from the input appear in the output tokens.
pub fn lex(input: &str) -> Vec<Token<'_>> {
    lex_with_spans(input)
        .into_iter()
        .map(|(token, _)| token)
        .collect()
}

/// Lex and return tokens along with their byte spans.
pub fn lex_with_spans(input: &str) -> Vec<(Token<'_>, std::ops::Range<usize>)> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(input);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let text = lexer.slice();
        // Logos error means a stray `<` - treat as TEXT
        let kind = result.unwrap_or(TokenKind::Text);
        tokens.push((Token { kind, text }, span));
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token(kind: TokenKind, text: &str) -> Token<'_> {
        Token { kind, text }
    }

    #[test]
    fn lex_empty_input() {
        assert_eq!(lex(""), vec![]);
    }

    #[test]
    fn lex_plain_text() {
        assert_eq!(lex("hello world"), vec![token(TokenKind::Text, "hello world")]);
    }

    #[test]
    fn lex_paragraph() {
        assert_eq!(
            lex("<p>hi</p>"),
            vec![
                token(TokenKind::StartTag, "<p>"),
                token(TokenKind::Text, "hi"),
                token(TokenKind::EndTag, "</p>"),
            ]
        );
    }

    #[test]
    fn lex_quoted_gt_stays_inside_tag() {
        assert_eq!(
            lex(r#"<a title="a>b">x</a>"#),
            vec![
                token(TokenKind::StartTag, r#"<a title="a>b">"#),
                token(TokenKind::Text, "x"),
                token(TokenKind::EndTag, "</a>"),
            ]
        );
    }

    #[test]
    fn lex_comment_and_declaration() {
        assert_eq!(
            lex("<!DOCTYPE html><!-- note -->x"),
            vec![
                token(TokenKind::Declaration, "<!DOCTYPE html>"),
                token(TokenKind::Comment, "<!-- note -->"),
                token(TokenKind::Text, "x"),
            ]
        );
    }

    #[test]
    fn lex_unterminated_comment_runs_to_end() {
        assert_eq!(
            lex("<!-- open"),
            vec![token(TokenKind::Comment, "<!-- open")]
        );
    }

    #[test]
    fn stray_angle_bracket_is_text() {
        let tokens = lex("a < b");
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Text));
    }

    #[test]
    fn all_bytes_preserved_complex() {
        let input = "<ul><li style=\"margin-left: 25px\">one</li><li>two<br/></li></ul> < tail";
        let tokens = lex(input);
        let reconstructed: String = tokens.iter().map(|t| t.text).collect();
        assert_eq!(input, reconstructed);
    }

    #[test]
    fn attr_tokens() {
        let tokens: Vec<_> = AttrToken::lexer(r#"href='x' target="_blank" hidden"#)
            .map(|t| t.unwrap())
            .collect();
        assert_eq!(
            tokens,
            vec![
                AttrToken::Word,
                AttrToken::Eq,
                AttrToken::SingleQuoted,
                AttrToken::Word,
                AttrToken::Eq,
                AttrToken::DoubleQuoted,
                AttrToken::Word,
            ]
        );
    }
}
