//! Byte-offset HTML tokenizer.
//!
//! Produces the token stream the tree builder consumes, with every token
//! carrying the exact source range it was read from. Tag names are
//! lowercased; attribute names keep their case so foreign content can use
//! it. Character references in text and attribute values are decoded.

use std::borrow::Cow;

use html5ever::data::NAMED_ENTITIES;
use memchr::{memchr, memmem};

/// Elements whose content is raw text up to the matching end tag.
const RAW_TEXT: &[&str] = &["script", "style", "xmp", "iframe", "noembed", "noframes"];

/// Raw text elements that still decode character references.
const ESCAPABLE_RAW_TEXT: &[&str] = &["textarea", "title"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Doctype {
        name: String,
    },
    StartTag {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug)]
struct RawText {
    tag: String,
    escapable: bool,
}

/// Tokenizer over `src[start..end]`; offsets are always relative to `src`.
pub struct Tokenizer<'s> {
    src: &'s str,
    pos: usize,
    end: usize,
    raw_text: Option<RawText>,
}

impl<'s> Tokenizer<'s> {
    pub fn new(src: &'s str) -> Self {
        Self::with_range(src, 0, src.len())
    }

    /// Tokenize a slice of a larger source, keeping offsets absolute.
    pub fn with_range(src: &'s str, start: usize, end: usize) -> Self {
        Self {
            src,
            pos: start,
            end: end.min(src.len()),
            raw_text: None,
        }
    }

    fn bytes(&self) -> &'s [u8] {
        &self.src.as_bytes()[..self.end]
    }

    /// Text up to the next thing that looks like markup.
    fn text(&mut self) -> Token {
        let bytes = self.bytes();
        let start = self.pos;
        let mut cursor = start + 1;
        let stop = loop {
            match memchr(b'<', &bytes[cursor.min(self.end)..]) {
                Some(offset) => {
                    let at = cursor + offset;
                    if looks_like_markup(bytes, at) {
                        break at;
                    }
                    cursor = at + 1;
                }
                None => break self.end,
            }
        };
        self.pos = stop;
        Token {
            kind: TokenKind::Text(decode_entities(&self.src[start..stop]).into_owned()),
            start,
            end: stop,
        }
    }

    /// Content of a raw text element, or `None` when it is empty.
    fn read_raw_text(&mut self, raw: RawText) -> Option<Token> {
        let bytes = self.bytes();
        let start = self.pos;
        let stop = find_end_tag(bytes, start, &raw.tag).unwrap_or(self.end);
        if stop == start {
            return None;
        }
        self.pos = stop;
        let content = &self.src[start..stop];
        let text = if raw.escapable {
            decode_entities(content).into_owned()
        } else {
            content.to_string()
        };
        Some(Token {
            kind: TokenKind::Text(text),
            start,
            end: stop,
        })
    }

    /// Try to read markup at `self.pos` (which holds `<`).
    fn markup(&mut self) -> Option<Token> {
        let bytes = self.bytes();
        let start = self.pos;
        let rest = &bytes[start..];

        if rest.starts_with(b"<!--") {
            let body = start + 4;
            let (text_end, end) = match memmem::find(&bytes[body..], b"-->") {
                Some(offset) => (body + offset, body + offset + 3),
                None => (self.end, self.end),
            };
            self.pos = end;
            return Some(Token {
                kind: TokenKind::Comment(self.src[body..text_end].to_string()),
                start,
                end,
            });
        }

        if rest.starts_with(b"<!") || rest.starts_with(b"<?") {
            let (inner_end, close) = match memchr(b'>', &bytes[start..]) {
                Some(offset) => (start + offset, start + offset + 1),
                None => (self.end, self.end),
            };
            let inner = self.src[start + 2..inner_end].trim();
            self.pos = close;
            let kind = if inner.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("doctype")) {
                let name = inner[7..]
                    .split_whitespace()
                    .next()
                    .unwrap_or("html")
                    .to_ascii_lowercase();
                TokenKind::Doctype { name }
            } else {
                TokenKind::Comment(inner.to_string())
            };
            return Some(Token {
                kind,
                start,
                end: close,
            });
        }

        if rest.starts_with(b"</") {
            let name_start = start + 2;
            let name_end = scan_name(bytes, name_start);
            if name_end == name_start {
                return None;
            }
            let close = memchr(b'>', &bytes[name_end..])? + name_end + 1;
            self.pos = close;
            return Some(Token {
                kind: TokenKind::EndTag {
                    name: self.src[name_start..name_end].to_ascii_lowercase(),
                },
                start,
                end: close,
            });
        }

        let name_start = start + 1;
        let name_end = scan_name(bytes, name_start);
        if name_end == name_start {
            return None;
        }
        let name = self.src[name_start..name_end].to_ascii_lowercase();
        let (attrs, self_closing, close) = self.attributes(name_end)?;
        self.pos = close;

        if !self_closing {
            if RAW_TEXT.contains(&name.as_str()) {
                self.raw_text = Some(RawText {
                    tag: name.clone(),
                    escapable: false,
                });
            } else if ESCAPABLE_RAW_TEXT.contains(&name.as_str()) {
                self.raw_text = Some(RawText {
                    tag: name.clone(),
                    escapable: true,
                });
            }
        }

        Some(Token {
            kind: TokenKind::StartTag {
                name,
                attrs,
                self_closing,
            },
            start,
            end: close,
        })
    }

    /// Parse attributes starting right after the tag name. Returns the
    /// attributes, the self-closing flag and the offset after `>`.
    fn attributes(&self, mut pos: usize) -> Option<(Vec<(String, String)>, bool, usize)> {
        let bytes = self.bytes();
        let mut attrs: Vec<(String, String)> = Vec::new();

        loop {
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            match *bytes.get(pos)? {
                b'>' => return Some((attrs, false, pos + 1)),
                b'/' if bytes.get(pos + 1) == Some(&b'>') => return Some((attrs, true, pos + 2)),
                b'/' => {
                    pos += 1;
                    continue;
                }
                _ => {}
            }

            let name_start = pos;
            while pos < bytes.len()
                && !bytes[pos].is_ascii_whitespace()
                && !matches!(bytes[pos], b'=' | b'>' | b'/')
            {
                pos += 1;
            }
            if pos == name_start {
                // A stray `=`; skip it like a browser would.
                pos += 1;
                continue;
            }
            let name = self.src[name_start..pos].to_string();

            let mut after = pos;
            while after < bytes.len() && bytes[after].is_ascii_whitespace() {
                after += 1;
            }

            let value = if bytes.get(after) == Some(&b'=') {
                pos = after + 1;
                while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                    pos += 1;
                }
                match *bytes.get(pos)? {
                    quote @ (b'"' | b'\'') => {
                        let value_start = pos + 1;
                        let value_end = memchr(quote, &bytes[value_start..])? + value_start;
                        pos = value_end + 1;
                        decode_entities(&self.src[value_start..value_end]).into_owned()
                    }
                    _ => {
                        let value_start = pos;
                        while pos < bytes.len()
                            && !bytes[pos].is_ascii_whitespace()
                            && bytes[pos] != b'>'
                        {
                            pos += 1;
                        }
                        decode_entities(&self.src[value_start..pos]).into_owned()
                    }
                }
            } else {
                String::new()
            };

            if !attrs.iter().any(|(existing, _)| existing.eq_ignore_ascii_case(&name)) {
                attrs.push((name, value));
            }
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if let Some(raw) = self.raw_text.take()
            && let Some(token) = self.read_raw_text(raw)
        {
            return Some(token);
        }

        if self.pos >= self.end {
            return None;
        }

        if self.bytes()[self.pos] == b'<'
            && let Some(token) = self.markup()
        {
            return Some(token);
        }

        Some(self.text())
    }
}

fn scan_name(bytes: &[u8], start: usize) -> usize {
    if !bytes.get(start).is_some_and(|b| b.is_ascii_alphabetic()) {
        return start;
    }
    let mut pos = start;
    while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && !matches!(bytes[pos], b'/' | b'>') {
        pos += 1;
    }
    pos
}

fn looks_like_markup(bytes: &[u8], at: usize) -> bool {
    match bytes.get(at + 1) {
        Some(b) if b.is_ascii_alphabetic() => true,
        Some(b'!') | Some(b'?') => true,
        Some(b'/') => bytes.get(at + 2).is_some_and(|b| b.is_ascii_alphabetic()),
        _ => false,
    }
}

/// Find `</tag` (ASCII case-insensitive, followed by whitespace, `/` or `>`)
/// at or after `from`. Returns the offset of the `<`.
pub fn find_end_tag(bytes: &[u8], from: usize, tag: &str) -> Option<usize> {
    let hay = bytes.get(from..)?;
    memmem::find_iter(hay, b"</")
        .map(|offset| from + offset)
        .find(|&at| is_end_tag_at(bytes, at, tag))
}

/// Whether an end tag for `tag` starts exactly at `at`.
pub fn is_end_tag_at(bytes: &[u8], at: usize, tag: &str) -> bool {
    let name_start = at + 2;
    let name_end = name_start + tag.len();
    bytes.get(at..name_start) == Some(b"</")
        && bytes
            .get(name_start..name_end)
            .is_some_and(|name| name.eq_ignore_ascii_case(tag.as_bytes()))
        && bytes
            .get(name_end)
            .is_none_or(|b| b.is_ascii_whitespace() || matches!(b, b'/' | b'>'))
}

/// Decode character references. Unknown or malformed references are kept
/// literally.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    if memchr(b'&', input.as_bytes()).is_none() {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match decode_reference(rest) {
            Some((decoded, consumed)) => {
                out.push_str(&decoded);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Decode one reference at the start of `s` (which begins with `&`).
fn decode_reference(s: &str) -> Option<(Cow<'static, str>, usize)> {
    let body = &s[1..];
    if let Some(num) = body.strip_prefix('#') {
        let (digits, radix, prefix) = match num.strip_prefix(|c| c == 'x' || c == 'X') {
            Some(hex) => (hex, 16, 2),
            None => (num, 10, 1),
        };
        let len = digits
            .bytes()
            .take_while(|b| if radix == 16 { b.is_ascii_hexdigit() } else { b.is_ascii_digit() })
            .count();
        if len == 0 {
            return None;
        }
        let value = u32::from_str_radix(&digits[..len], radix).ok()?;
        let ch = char::from_u32(value).filter(|&c| c != '\0').unwrap_or('\u{fffd}');
        let mut consumed = 1 + prefix + len;
        if digits[len..].starts_with(';') {
            consumed += 1;
        }
        return Some((Cow::Owned(ch.to_string()), consumed));
    }

    let len = body.bytes().take_while(|b| b.is_ascii_alphanumeric()).count();
    if len == 0 {
        return None;
    }
    // `&name;`, or a legacy reference like `&copy` that is not followed by `=`.
    if body[len..].starts_with(';') {
        named_reference(&body[..=len]).map(|value| (value, len + 2))
    } else if body[len..].starts_with('=') {
        None
    } else {
        named_reference(&body[..len]).map(|value| (value, len + 1))
    }
}

/// Look up `name` (including its trailing `;`, if any) in the WHATWG table.
fn named_reference(name: &str) -> Option<Cow<'static, str>> {
    let &(first, second) = NAMED_ENTITIES.get(name)?;
    // Prefixes of longer names map to zero.
    if first == 0 {
        return None;
    }
    let decoded: String = [first, second]
        .into_iter()
        .filter(|&cp| cp != 0)
        .filter_map(char::from_u32)
        .collect();
    Some(Cow::Owned(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Tokenizer::new(src).map(|t| t.kind).collect()
    }

    #[test]
    fn test_tags_and_text_with_offsets() {
        let src = r#"<p class="x">Hi &amp; bye</p>"#;
        let tokens: Vec<_> = Tokenizer::new(src).collect();
        assert_eq!(tokens.len(), 3);
        assert_eq!(
            tokens[0].kind,
            TokenKind::StartTag {
                name: "p".into(),
                attrs: vec![("class".into(), "x".into())],
                self_closing: false,
            }
        );
        assert_eq!((tokens[0].start, tokens[0].end), (0, 13));
        assert_eq!(tokens[1].kind, TokenKind::Text("Hi & bye".into()));
        assert_eq!(&src[tokens[1].start..tokens[1].end], "Hi &amp; bye");
        assert_eq!(tokens[2].kind, TokenKind::EndTag { name: "p".into() });
        assert_eq!(tokens[2].end, src.len());
    }

    #[test]
    fn test_attribute_forms() {
        let kinds = kinds(r#"<input type=text disabled value='a "b"' data-x = "1">"#);
        assert_eq!(
            kinds[0],
            TokenKind::StartTag {
                name: "input".into(),
                attrs: vec![
                    ("type".into(), "text".into()),
                    ("disabled".into(), String::new()),
                    ("value".into(), "a \"b\"".into()),
                    ("data-x".into(), "1".into()),
                ],
                self_closing: false,
            }
        );
    }

    #[test]
    fn test_doctype_and_comment() {
        assert_eq!(
            kinds("<!DOCTYPE html><!-- note -->"),
            vec![
                TokenKind::Doctype { name: "html".into() },
                TokenKind::Comment(" note ".into()),
            ]
        );
    }

    #[test]
    fn test_script_content_is_raw() {
        let kinds = kinds("<script>if (a < b && c) { x = '</p>'; }</script>");
        assert_eq!(
            kinds[1],
            TokenKind::Text("if (a < b && c) { x = '</p>'; }".into())
        );
        assert_eq!(kinds[2], TokenKind::EndTag { name: "script".into() });
    }

    #[test]
    fn test_lone_angle_bracket_is_text() {
        assert_eq!(kinds("a < b"), vec![TokenKind::Text("a < b".into())]);
        assert_eq!(kinds("x <3"), vec![TokenKind::Text("x <3".into())]);
    }

    #[test]
    fn test_unterminated_tag_is_text() {
        assert_eq!(kinds("<a href=\"x"), vec![TokenKind::Text("<a href=\"x".into())]);
    }

    #[test]
    fn test_range_offsets_are_absolute() {
        let src = "xxxx<b>y</b>";
        let tokens: Vec<_> = Tokenizer::with_range(src, 4, src.len()).collect();
        assert_eq!(tokens[0].start, 4);
        assert_eq!(tokens[1].kind, TokenKind::Text("y".into()));
        assert_eq!(tokens[1].start, 7);
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &lt;b&gt; &#65;&#x42; &unknown; & c"), "a <b> AB &unknown; & c");
        assert!(matches!(decode_entities("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_decode_full_entity_table() {
        assert_eq!(
            decode_entities("caf&eacute; &alpha;&rarr;&beta; &check; &Sigma; &iuml;"),
            "caf\u{e9} \u{3b1}\u{2192}\u{3b2} \u{2713} \u{3a3} \u{ef}"
        );
        // Two code points.
        assert_eq!(decode_entities("&NotEqualTilde;"), "\u{2242}\u{338}");
        // Legacy form without the semicolon, except before `=`.
        assert_eq!(decode_entities("&copy 2024"), "\u{a9} 2024");
        assert_eq!(decode_entities("?a=1&copy=2"), "?a=1&copy=2");
        // Prefix of a longer name only.
        assert_eq!(decode_entities("&eac;"), "&eac;");
    }

    #[test]
    fn test_end_tag_detection() {
        let bytes = b"x </A > </abbr>";
        assert!(is_end_tag_at(bytes, 2, "a"));
        assert!(!is_end_tag_at(bytes, 8, "a"));
        assert_eq!(find_end_tag(bytes, 3, "a"), None);
    }
}
