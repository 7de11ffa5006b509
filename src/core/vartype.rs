// Closed set of element types the kernel reports, parsed once from its free-text tag.
use std::fmt;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VarType {
    Double,
    Float,
    Int,
    /// Fixed-width text; `width` comes from a `LEN=N` suffix when the kernel reports one.
    String { width: Option<usize> },
    Unknown(String),
}

impl VarType {
    /// Case-insensitive prefix match on the kernel's tag, e.g. `DOUBLE (90)`,
    /// `INTEGER`, `STRING LEN=16 (3)`.
    pub fn parse(raw: &str) -> Self {
        let tag = raw.trim().to_ascii_lowercase();
        if tag.starts_with("double") {
            VarType::Double
        } else if tag.starts_with("float") {
            VarType::Float
        } else if tag.starts_with("int") {
            VarType::Int
        } else if tag.starts_with("string") {
            VarType::String {
                width: parse_len(&tag),
            }
        } else {
            VarType::Unknown(raw.trim().to_string())
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, VarType::Double | VarType::Float | VarType::Int)
    }

    pub fn name(&self) -> &str {
        match self {
            VarType::Double => "double",
            VarType::Float => "float",
            VarType::Int => "int",
            VarType::String { .. } => "string",
            VarType::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarType::String { width: Some(width) } => write!(f, "string len={width}"),
            other => f.write_str(other.name()),
        }
    }
}

fn parse_len(tag: &str) -> Option<usize> {
    let rest = &tag[tag.find("len=")? + 4..];
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
