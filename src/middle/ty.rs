use strum::Display;

/// The two value types of the language. Everything is 32 bits wide at
/// runtime; the distinction only matters to the type checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Type {
    #[strum(serialize = "<unknown>")]
    Unknown,
    #[strum(serialize = "int")]
    Int,
    #[strum(serialize = "bool")]
    Bool,
}

impl Type {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Self::Int),
            "bool" => Some(Self::Bool),
            _ => None,
        }
    }
}
