use std::fmt::Write;

use super::{Json, JsonError, NodeId, Value};

impl Json {
    /// Compact encoding of the subtree at `id`.
    pub fn encode(&self, id: NodeId) -> Result<String, JsonError> {
        let mut out = String::new();
        Emitter::new(self, None, false).value(&mut out, id, 0)?;
        Ok(out)
    }

    /// Compact encoding with every non-ASCII character written as a `\u`
    /// escape, so the output is pure ASCII.
    pub fn encode_ascii(&self, id: NodeId) -> Result<String, JsonError> {
        let mut out = String::new();
        Emitter::new(self, None, true).value(&mut out, id, 0)?;
        Ok(out)
    }

    /// Pretty encoding: one child per line, indented by `space` per level.
    /// With `None` this is the same as [`Json::encode`].
    pub fn stringify(&self, id: NodeId, space: Option<&str>) -> Result<String, JsonError> {
        let mut out = String::new();
        Emitter::new(self, space, false).value(&mut out, id, 0)?;
        Ok(out)
    }
}

/// Encodes `s` as a quoted JSON string.
pub fn encode_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    write_string(&mut out, s, false);
    out
}

/// `%.16g` formatting. Values whose text would not be a JSON number become
/// `null`.
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return "null".to_string();
    }
    if n == 0.0 {
        return if n.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let scientific = format!("{:.15e}", n);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some(parts) => parts,
        None => return "null".to_string(),
    };
    let exponent: i32 = match exponent.parse() {
        Ok(e) => e,
        Err(_) => return "null".to_string(),
    };

    if exponent < -4 || exponent >= 16 {
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            if exponent < 0 { '-' } else { '+' },
            exponent.abs()
        )
    } else {
        let decimals = (15 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, n)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn write_string(out: &mut String, s: &str, ascii_only: bool) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c if ascii_only && !c.is_ascii() => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

struct Emitter<'a> {
    doc: &'a Json,
    space: Option<&'a str>,
    ascii_only: bool,
}

impl<'a> Emitter<'a> {
    fn new(doc: &'a Json, space: Option<&'a str>, ascii_only: bool) -> Emitter<'a> {
        Emitter {
            doc,
            space,
            ascii_only,
        }
    }

    fn indent(&self, out: &mut String, level: usize) {
        if let Some(space) = self.space {
            for _ in 0..level {
                out.push_str(space);
            }
        }
    }

    fn value(&self, out: &mut String, id: NodeId, level: usize) -> Result<(), JsonError> {
        match &self.doc.node(id)?.value {
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::String(s) => write_string(out, s, self.ascii_only),
            Value::Number(n) => out.push_str(&format_number(*n)),
            Value::Array => self.container(out, id, level, '[', ']')?,
            Value::Object => self.container(out, id, level, '{', '}')?,
        }
        Ok(())
    }

    fn container(
        &self,
        out: &mut String,
        id: NodeId,
        level: usize,
        open: char,
        close: char,
    ) -> Result<(), JsonError> {
        let is_object = open == '{';
        let mut children = self.doc.children(id).peekable();

        out.push(open);
        if self.space.is_some() && children.peek().is_some() {
            out.push('\n');
        }

        while let Some(child) = children.next() {
            self.indent(out, level + 1);
            if is_object {
                write_string(out, self.doc.key(child).unwrap_or(""), self.ascii_only);
                out.push_str(if self.space.is_some() { ": " } else { ":" });
            }
            self.value(out, child, level + 1)?;

            let last = children.peek().is_none();
            if !last {
                out.push(',');
            }
            if self.space.is_some() {
                out.push('\n');
                if last {
                    self.indent(out, level);
                }
            }
        }

        out.push(close);
        Ok(())
    }
}
