//! Purpose: Render CLI JSON for terminals, with optional ANSI color.
//! Exports: `render_json`.
//! Role: Pure formatter used by the `xmi` emission paths.
//! Invariants: Arrays holding only numbers stay on one line, so model arrays remain readable.
//! Invariants: ANSI escapes appear only when color is enabled; output is always valid JSON
//!   once escapes are stripped.
use serde_json::{Map, Value};

const INDENT: &str = "  ";

// Plain 8-color codes; bright variants wash out on light themes.
const COLOR_KEY: &str = "36";
const COLOR_STRING: &str = "32";
const COLOR_NUMBER: &str = "33";
const COLOR_LITERAL: &str = "35";

pub fn render_json(value: &Value, use_color: bool) -> String {
    let mut out = String::new();
    Renderer { use_color }.value(value, 0, &mut out);
    out
}

struct Renderer {
    use_color: bool,
}

impl Renderer {
    fn value(&self, value: &Value, indent: usize, out: &mut String) {
        match value {
            Value::Null => self.paint("null", COLOR_LITERAL, out),
            Value::Bool(flag) => self.paint(if *flag { "true" } else { "false" }, COLOR_LITERAL, out),
            Value::Number(num) => self.paint(&num.to_string(), COLOR_NUMBER, out),
            Value::String(text) => self.paint(&encode(text), COLOR_STRING, out),
            Value::Array(items) if items.iter().all(Value::is_number) => self.inline(items, out),
            Value::Array(items) => self.array(items, indent, out),
            Value::Object(map) => self.object(map, indent, out),
        }
    }

    fn inline(&self, items: &[Value], out: &mut String) {
        out.push('[');
        for (idx, item) in items.iter().enumerate() {
            if idx > 0 {
                out.push_str(", ");
            }
            self.value(item, 0, out);
        }
        out.push(']');
    }

    fn array(&self, items: &[Value], indent: usize, out: &mut String) {
        out.push('[');
        for (idx, item) in items.iter().enumerate() {
            out.push_str(if idx == 0 { "\n" } else { ",\n" });
            push_indent(indent + 1, out);
            self.value(item, indent + 1, out);
        }
        out.push('\n');
        push_indent(indent, out);
        out.push(']');
    }

    fn object(&self, map: &Map<String, Value>, indent: usize, out: &mut String) {
        if map.is_empty() {
            out.push_str("{}");
            return;
        }
        out.push('{');
        for (idx, (key, value)) in map.iter().enumerate() {
            out.push_str(if idx == 0 { "\n" } else { ",\n" });
            push_indent(indent + 1, out);
            self.paint(&encode(key), COLOR_KEY, out);
            out.push_str(": ");
            self.value(value, indent + 1, out);
        }
        out.push('\n');
        push_indent(indent, out);
        out.push('}');
    }

    fn paint(&self, text: &str, color: &str, out: &mut String) {
        if self.use_color {
            out.push_str("\u{1b}[");
            out.push_str(color);
            out.push('m');
            out.push_str(text);
            out.push_str("\u{1b}[0m");
        } else {
            out.push_str(text);
        }
    }
}

fn encode(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

fn push_indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}
