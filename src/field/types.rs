use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A schema-level column type, independent of any SQL dialect.
///
/// Parsed from the type strings used in schema snapshots (`"uuid"`,
/// `"long"`, `"varchar(64)"`, `"string[]"`, ...). Aliases collapse onto a
/// single variant so that `bigint` and `long` compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Uuid,
    String,
    Text,
    VarChar(u32),
    Int,
    Long,
    Float,
    Double,
    Decimal(Option<(u8, u8)>),
    Boolean,
    Timestamp,
    Date,
    Json,
    Binary,
    Array(Box<FieldType>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown field type: {0}")]
pub struct UnknownFieldType(pub String);

impl FieldType {
    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::Array(_))
    }

    /// Canonical name used by the narrowing table.
    pub fn canonical_name(&self) -> String {
        match self {
            FieldType::Uuid => "uuid".to_string(),
            FieldType::String => "string".to_string(),
            FieldType::Text => "text".to_string(),
            FieldType::VarChar(len) => format!("varchar({})", len),
            FieldType::Int => "int".to_string(),
            FieldType::Long => "long".to_string(),
            FieldType::Float => "float".to_string(),
            FieldType::Double => "double".to_string(),
            FieldType::Decimal(None) => "decimal".to_string(),
            FieldType::Decimal(Some((p, s))) => format!("decimal({},{})", p, s),
            FieldType::Boolean => "boolean".to_string(),
            FieldType::Timestamp => "timestamp".to_string(),
            FieldType::Date => "date".to_string(),
            FieldType::Json => "json".to_string(),
            FieldType::Binary => "binary".to_string(),
            FieldType::Array(inner) => format!("{}[]", inner.canonical_name()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_name())
    }
}

impl FromStr for FieldType {
    type Err = UnknownFieldType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let unknown = || UnknownFieldType(raw.to_string());

        if let Some(inner) = raw.strip_suffix("[]") {
            let inner: FieldType = inner.parse()?;
            return Ok(FieldType::Array(Box::new(inner)));
        }

        let lower = raw.to_ascii_lowercase();

        if let Some(args) = parameters(&lower, "varchar") {
            let len = args.parse::<u32>().map_err(|_| unknown())?;
            return Ok(FieldType::VarChar(len));
        }

        if let Some(args) = parameters(&lower, "decimal") {
            let (precision, scale) = args.split_once(',').ok_or_else(unknown)?;
            let precision = precision.trim().parse::<u8>().map_err(|_| unknown())?;
            let scale = scale.trim().parse::<u8>().map_err(|_| unknown())?;
            return Ok(FieldType::Decimal(Some((precision, scale))));
        }

        let field_type = match lower.as_str() {
            "uuid" => FieldType::Uuid,
            "string" | "varchar" => FieldType::String,
            "text" => FieldType::Text,
            "int" | "integer" | "int32" => FieldType::Int,
            "long" | "bigint" | "int64" => FieldType::Long,
            "float" | "real" | "float32" => FieldType::Float,
            "double" | "float64" => FieldType::Double,
            "decimal" | "numeric" => FieldType::Decimal(None),
            "boolean" | "bool" => FieldType::Boolean,
            "timestamp" | "datetime" => FieldType::Timestamp,
            "date" => FieldType::Date,
            "json" => FieldType::Json,
            "binary" | "bytes" | "blob" => FieldType::Binary,
            _ => return Err(unknown()),
        };

        Ok(field_type)
    }
}

fn parameters<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    raw.strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
        .map(str::trim)
}
