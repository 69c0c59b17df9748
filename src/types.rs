use std::fmt::{Display, Formatter};

/// Slot and value types of the block language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScratchType {
    Any,
    Number,
    Boolean,
    Text,
    List,
    Loop,
}

impl ScratchType {
    /// `Any` matches everything in both directions; every other type only
    /// matches itself.
    pub fn is_compatible(self, other: ScratchType) -> bool {
        self == ScratchType::Any || other == ScratchType::Any || self == other
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "any" => Some(ScratchType::Any),
            "number" => Some(ScratchType::Number),
            "boolean" => Some(ScratchType::Boolean),
            "text" => Some(ScratchType::Text),
            "list" => Some(ScratchType::List),
            "loop" => Some(ScratchType::Loop),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScratchType::Any => "any",
            ScratchType::Number => "number",
            ScratchType::Boolean => "boolean",
            ScratchType::Text => "text",
            ScratchType::List => "list",
            ScratchType::Loop => "loop",
        }
    }
}

impl Display for ScratchType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ScratchType; 6] = [
        ScratchType::Any,
        ScratchType::Number,
        ScratchType::Boolean,
        ScratchType::Text,
        ScratchType::List,
        ScratchType::Loop,
    ];

    #[test]
    fn any_is_compatible_both_ways() {
        for t in ALL {
            assert!(ScratchType::Any.is_compatible(t));
            assert!(t.is_compatible(ScratchType::Any));
            assert!(t.is_compatible(t));
        }
    }

    #[test]
    fn concrete_types_only_match_themselves() {
        assert!(!ScratchType::Number.is_compatible(ScratchType::Text));
        assert!(!ScratchType::Boolean.is_compatible(ScratchType::Loop));
        assert!(!ScratchType::Loop.is_compatible(ScratchType::Number));
    }

    #[test]
    fn names_round_trip_case_insensitively() {
        for t in ALL {
            assert_eq!(ScratchType::from_name(&t.name().to_uppercase()), Some(t));
        }
        assert_eq!(ScratchType::from_name("colour"), None);
    }
}
