use super::{Json, JsonError, NodeId, Value};

const MAX_DEPTH: usize = 512;

/// Parses a complete JSON text. Surrounding whitespace is allowed, anything
/// else after the value is an error.
pub fn decode(text: &str) -> Result<Json, JsonError> {
    let (doc, consumed) = decode_prefix(text)?;
    let mut parser = Parser::new(text, consumed);
    parser.skip_space();
    if parser.pos != text.len() {
        return Err(parser.error("trailing characters after value"));
    }
    Ok(doc)
}

/// Parses one JSON value at the start of `text` (after optional whitespace)
/// and returns it with the number of bytes consumed.
pub fn decode_prefix(text: &str) -> Result<(Json, usize), JsonError> {
    let mut doc = Json::new();
    let mut parser = Parser::new(text, 0);
    parser.skip_space();
    let root = parser.parse_value(&mut doc, 0)?;
    doc.set_root(Some(root));
    Ok((doc, parser.pos))
}

pub fn decode_bytes(bytes: &[u8]) -> Result<Json, JsonError> {
    let text = std::str::from_utf8(bytes).map_err(|_| JsonError::InvalidUtf8)?;
    decode(text)
}

pub fn validate(text: &str) -> bool {
    decode(text).is_ok()
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, pos: usize) -> Parser<'a> {
        Parser {
            bytes: text.as_bytes(),
            pos,
        }
    }

    fn error(&self, reason: &'static str) -> JsonError {
        JsonError::Syntax {
            offset: self.pos,
            reason,
        }
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn expect(&mut self, byte: u8, reason: &'static str) -> Result<(), JsonError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(reason))
        }
    }

    fn skip_space(&mut self) {
        while let Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') = self.peek() {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self, doc: &mut Json, depth: usize) -> Result<NodeId, JsonError> {
        match self.peek() {
            Some(b'n') => {
                self.literal("null")?;
                Ok(doc.new_null())
            }
            Some(b't') => {
                self.literal("true")?;
                Ok(doc.new_bool(true))
            }
            Some(b'f') => {
                self.literal("false")?;
                Ok(doc.new_bool(false))
            }
            Some(b'"') => {
                let s = self.parse_string()?;
                Ok(doc.new_string(s))
            }
            Some(b'[') => self.parse_array(doc, depth + 1),
            Some(b'{') => self.parse_object(doc, depth + 1),
            Some(b'-') | Some(b'0'..=b'9') => {
                let n = self.parse_number()?;
                Ok(doc.new_number(n))
            }
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn literal(&mut self, word: &'static str) -> Result<(), JsonError> {
        if self.bytes[self.pos..].starts_with(word.as_bytes()) {
            self.pos += word.len();
            Ok(())
        } else {
            Err(self.error("invalid literal"))
        }
    }

    fn parse_array(&mut self, doc: &mut Json, depth: usize) -> Result<NodeId, JsonError> {
        if depth > MAX_DEPTH {
            return Err(JsonError::TooDeep(MAX_DEPTH));
        }
        self.expect(b'[', "expected '['")?;
        let array = doc.insert(Value::Array);

        self.skip_space();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(array);
        }

        loop {
            self.skip_space();
            let element = self.parse_value(doc, depth)?;
            doc.link_last(array, element)?;

            self.skip_space();
            match self.bump() {
                Some(b',') => continue,
                Some(b']') => return Ok(array),
                Some(_) => {
                    self.pos -= 1;
                    return Err(self.error("expected ',' or ']'"));
                }
                None => return Err(self.error("unexpected end of input in array")),
            }
        }
    }

    fn parse_object(&mut self, doc: &mut Json, depth: usize) -> Result<NodeId, JsonError> {
        if depth > MAX_DEPTH {
            return Err(JsonError::TooDeep(MAX_DEPTH));
        }
        self.expect(b'{', "expected '{'")?;
        let object = doc.insert(Value::Object);

        self.skip_space();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(object);
        }

        loop {
            self.skip_space();
            if self.peek() != Some(b'"') {
                return Err(self.error("expected member name"));
            }
            let key = self.parse_string()?;

            self.skip_space();
            self.expect(b':', "expected ':'")?;
            self.skip_space();

            let value = self.parse_value(doc, depth)?;
            doc.node_mut(value)?.key = Some(key);
            doc.link_last(object, value)?;

            self.skip_space();
            match self.bump() {
                Some(b',') => continue,
                Some(b'}') => return Ok(object),
                Some(_) => {
                    self.pos -= 1;
                    return Err(self.error("expected ',' or '}'"));
                }
                None => return Err(self.error("unexpected end of input in object")),
            }
        }
    }

    fn parse_string(&mut self) -> Result<String, JsonError> {
        self.expect(b'"', "expected '\"'")?;
        let mut out = String::new();

        loop {
            let start = self.pos;
            while let Some(b) = self.peek() {
                if b == b'"' || b == b'\\' || b < 0x20 {
                    break;
                }
                self.pos += 1;
            }
            // The input is a `str` and the run stops on ASCII bytes, so the
            // slice is on character boundaries.
            let run = std::str::from_utf8(&self.bytes[start..self.pos])
                .map_err(|_| JsonError::InvalidUtf8)?;
            out.push_str(run);

            match self.bump() {
                Some(b'"') => return Ok(out),
                Some(b'\\') => self.parse_escape(&mut out)?,
                Some(_) => {
                    self.pos -= 1;
                    return Err(self.error("control character in string"));
                }
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> Result<(), JsonError> {
        let c = match self.bump() {
            Some(b'"') => '"',
            Some(b'\\') => '\\',
            Some(b'/') => '/',
            Some(b'b') => '\u{8}',
            Some(b'f') => '\u{c}',
            Some(b'n') => '\n',
            Some(b'r') => '\r',
            Some(b't') => '\t',
            Some(b'u') => self.parse_unicode_escape()?,
            _ => return Err(self.error("invalid escape sequence")),
        };
        out.push(c);
        Ok(())
    }

    fn parse_unicode_escape(&mut self) -> Result<char, JsonError> {
        let unit = self.parse_hex4()?;
        let code = match unit {
            0 => return Err(self.error("\\u0000 is not allowed")),
            0xD800..=0xDBFF => {
                if !self.bytes[self.pos..].starts_with(b"\\u") {
                    return Err(self.error("unpaired high surrogate"));
                }
                self.pos += 2;
                let low = self.parse_hex4()?;
                if !(0xDC00..=0xDFFF).contains(&low) {
                    return Err(self.error("invalid low surrogate"));
                }
                0x10000 + (((unit as u32) - 0xD800) << 10) + ((low as u32) - 0xDC00)
            }
            0xDC00..=0xDFFF => return Err(self.error("unpaired low surrogate")),
            _ => unit as u32,
        };
        std::char::from_u32(code).ok_or_else(|| self.error("invalid code point"))
    }

    fn parse_hex4(&mut self) -> Result<u16, JsonError> {
        let mut value: u16 = 0;
        for _ in 0..4 {
            let digit = match self.peek() {
                Some(b @ b'0'..=b'9') => b - b'0',
                Some(b @ b'a'..=b'f') => b - b'a' + 10,
                Some(b @ b'A'..=b'F') => b - b'A' + 10,
                _ => return Err(self.error("invalid \\u escape")),
            };
            self.pos += 1;
            value = (value << 4) | digit as u16;
        }
        Ok(value)
    }

    /// `-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?`
    fn parse_number(&mut self) -> Result<f64, JsonError> {
        let start = self.pos;

        if self.peek() == Some(b'-') {
            self.pos += 1;
        }

        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => self.skip_digits(),
            _ => return Err(self.error("expected digit")),
        }

        if self.peek() == Some(b'.') {
            self.pos += 1;
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(self.error("expected digit after '.'"));
            }
            self.skip_digits();
        }

        if let Some(b'e') | Some(b'E') = self.peek() {
            self.pos += 1;
            if let Some(b'+') | Some(b'-') = self.peek() {
                self.pos += 1;
            }
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(self.error("expected digit in exponent"));
            }
            self.skip_digits();
        }

        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| self.error("invalid number"))
    }

    fn skip_digits(&mut self) {
        while let Some(b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
    }
}
