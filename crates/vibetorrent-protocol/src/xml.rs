//! A minimal pull reader and escaping helpers for the XML subset XML-RPC uses.
//!
//! XML-RPC documents only ever contain elements, character data, entity
//! references, an optional declaration, and (rarely) comments or CDATA. The
//! reader handles exactly that: attributes are ignored, namespaces are not
//! resolved, and DTDs are skipped without interpretation.

use std::borrow::Cow;

use crate::ProtocolError;

/// One step of the pull reader.
#[derive(Debug, PartialEq)]
pub(crate) enum Event<'a> {
    /// `<name ...>`
    Start(&'a str),
    /// `</name>`
    End(&'a str),
    /// `<name/>`
    Empty(&'a str),
    /// Unescaped character data.
    Text(Cow<'a, str>),
    Eof,
}

pub(crate) struct XmlReader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> XmlReader<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Returns the next event, skipping declarations, comments, and DTDs.
    pub(crate) fn next_event(&mut self) -> Result<Event<'a>, ProtocolError> {
        let input = self.input;
        loop {
            let rest = &input[self.pos..];
            if rest.is_empty() {
                return Ok(Event::Eof);
            }

            if !rest.starts_with('<') {
                let end = rest.find('<').unwrap_or(rest.len());
                self.pos += end;
                return unescape(&rest[..end]).map(Event::Text);
            }

            if rest.starts_with("<?") {
                self.skip_past(rest, "?>")?;
                continue;
            }
            if rest.starts_with("<!--") {
                self.skip_past(rest, "-->")?;
                continue;
            }
            if let Some(body) = rest.strip_prefix("<![CDATA[") {
                let end = body
                    .find("]]>")
                    .ok_or_else(|| decode_err("unterminated CDATA section"))?;
                self.pos += "<![CDATA[".len() + end + "]]>".len();
                return Ok(Event::Text(Cow::Borrowed(&body[..end])));
            }
            if rest.starts_with("<!") {
                self.skip_past(rest, ">")?;
                continue;
            }

            let close = rest
                .find('>')
                .ok_or_else(|| decode_err("unterminated tag"))?;
            let inner = &rest[1..close];
            self.pos += close + 1;

            if let Some(name) = inner.strip_prefix('/') {
                return Ok(Event::End(name.trim()));
            }
            let (inner, empty) = match inner.strip_suffix('/') {
                Some(stripped) => (stripped, true),
                None => (inner, false),
            };
            let name = inner.split_whitespace().next().unwrap_or("");
            if name.is_empty() {
                return Err(decode_err("empty tag name"));
            }
            return Ok(if empty {
                Event::Empty(name)
            } else {
                Event::Start(name)
            });
        }
    }

    /// Like [`next_event`](Self::next_event) but skips whitespace-only text.
    pub(crate) fn next_significant(&mut self) -> Result<Event<'a>, ProtocolError> {
        loop {
            match self.next_event()? {
                Event::Text(t) if t.trim().is_empty() => continue,
                event => return Ok(event),
            }
        }
    }

    pub(crate) fn expect_start(&mut self, name: &str) -> Result<(), ProtocolError> {
        match self.next_significant()? {
            Event::Start(n) if n == name => Ok(()),
            other => Err(unexpected(&other, name)),
        }
    }

    pub(crate) fn expect_end(&mut self, name: &str) -> Result<(), ProtocolError> {
        match self.next_significant()? {
            Event::End(n) if n == name => Ok(()),
            other => Err(unexpected(&other, &format!("/{name}"))),
        }
    }

    /// Collects character data up to `</name>`. Child elements are an error.
    pub(crate) fn read_text(&mut self, name: &str) -> Result<String, ProtocolError> {
        let mut text = String::new();
        loop {
            match self.next_event()? {
                Event::Text(t) => text.push_str(&t),
                Event::End(n) if n == name => return Ok(text),
                other => return Err(unexpected(&other, &format!("text in <{name}>"))),
            }
        }
    }

    fn skip_past(&mut self, rest: &str, terminator: &str) -> Result<(), ProtocolError> {
        let end = rest
            .find(terminator)
            .ok_or_else(|| decode_err(format!("missing `{terminator}`")))?;
        self.pos += end + terminator.len();
        Ok(())
    }
}

pub(crate) fn decode_err(msg: impl Into<String>) -> ProtocolError {
    ProtocolError::Decode(msg.into())
}

pub(crate) fn unexpected(event: &Event<'_>, wanted: &str) -> ProtocolError {
    let found = match event {
        Event::Start(n) => format!("<{n}>"),
        Event::End(n) => format!("</{n}>"),
        Event::Empty(n) => format!("<{n}/>"),
        Event::Text(t) => format!("text {:?}", t.trim()),
        Event::Eof => "end of document".to_string(),
    };
    decode_err(format!("expected {wanted}, found {found}"))
}

/// Appends `text` to `out` with the five predefined entities escaped.
pub(crate) fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
}

/// Resolves predefined and numeric character references.
pub(crate) fn unescape(text: &str) -> Result<Cow<'_, str>, ProtocolError> {
    if !text.contains('&') {
        return Ok(Cow::Borrowed(text));
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| decode_err("unterminated entity reference"))?;
        let entity = &after[..semi];
        let resolved = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| decode_err(format!("unknown entity &{entity};")))?
            }
        };
        out.push(resolved);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(Cow::Owned(out))
}
