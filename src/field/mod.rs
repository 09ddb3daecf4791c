mod types;

pub use types::{FieldType, UnknownFieldType};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Compact field modifier as written in schema definitions.
///
/// The modifier is the single source of truth for a field's flags:
/// `is_optional`, `is_unique` and `is_indexed` on [`FieldDefinition`] are
/// derived from it. Only `Required` produces a NOT NULL column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Modifier {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "!")]
    Required,
    #[serde(rename = "?")]
    Optional,
    #[serde(rename = "#")]
    Indexed,
}

impl Modifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::None => "",
            Modifier::Required => "!",
            Modifier::Optional => "?",
            Modifier::Indexed => "#",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "" => Some(Modifier::None),
            "!" => Some(Modifier::Required),
            "?" => Some(Modifier::Optional),
            "#" => Some(Modifier::Indexed),
            _ => None,
        }
    }

    pub fn is_nullable(&self) -> bool {
        !matches!(self, Modifier::Required)
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, Modifier::Indexed)
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One column of a schema snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub modifier: Modifier,
    #[serde(default)]
    pub is_array: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            modifier: Modifier::None,
            is_array: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.modifier = Modifier::Required;
        self
    }

    pub fn optional(mut self) -> Self {
        self.modifier = Modifier::Optional;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.modifier = Modifier::Indexed;
        self
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn is_optional(&self) -> bool {
        self.modifier == Modifier::Optional
    }

    pub fn is_unique(&self) -> bool {
        self.modifier == Modifier::Required
    }

    pub fn is_indexed(&self) -> bool {
        self.modifier.is_indexed()
    }

    pub fn is_nullable(&self) -> bool {
        self.modifier.is_nullable()
    }

    /// Type string including array-ness, e.g. `string[]`.
    pub fn type_name(&self) -> String {
        if self.is_array && !self.field_type.ends_with("[]") {
            format!("{}[]", self.field_type)
        } else {
            self.field_type.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_builder_pattern() {
        let field = FieldDefinition::new("email", "string").required();

        assert_eq!(field.name, "email");
        assert_eq!(field.modifier, Modifier::Required);
        assert!(!field.is_nullable());
        assert!(field.is_unique());
        assert!(!field.is_optional());
        assert!(!field.is_indexed());
    }

    #[test]
    fn flags_follow_modifier() {
        let optional = FieldDefinition::new("bio", "text").optional();
        assert!(optional.is_optional());
        assert!(optional.is_nullable());

        let indexed = FieldDefinition::new("slug", "string").indexed();
        assert!(indexed.is_indexed());
        assert!(indexed.is_nullable());

        let plain = FieldDefinition::new("note", "string");
        assert!(plain.is_nullable());
        assert!(!plain.is_optional());
    }

    #[test]
    fn array_type_name() {
        let tags = FieldDefinition::new("tags", "string").array();
        assert_eq!(tags.type_name(), "string[]");
        assert_eq!(FieldDefinition::new("id", "uuid").type_name(), "uuid");
    }

    #[test]
    fn modifier_symbols_round_trip() {
        for modifier in [
            Modifier::None,
            Modifier::Required,
            Modifier::Optional,
            Modifier::Indexed,
        ] {
            assert_eq!(Modifier::from_symbol(modifier.as_str()), Some(modifier));
        }
        assert_eq!(Modifier::from_symbol("*"), None);
    }

    #[test]
    fn deserializes_compact_modifier() {
        let field: FieldDefinition =
            serde_json::from_str(r#"{"name":"email","type":"string","modifier":"!"}"#).unwrap();
        assert_eq!(field.modifier, Modifier::Required);
        assert!(!field.is_array);
    }
}
