//! Narrowing classification for type and nullability changes.
//!
//! A change is narrowing when applying it can lose data or precision.
//! Pairs missing from the table are treated as safe.

use crate::field::{FieldType, Modifier};

/// Returns true when converting a column from `old_type` to `new_type` can
/// lose data.
pub fn is_narrowing(old_type: &str, new_type: &str) -> bool {
    let (old, new) = match (old_type.parse::<FieldType>(), new_type.parse::<FieldType>()) {
        (Ok(old), Ok(new)) => (old, new),
        _ => return false,
    };
    is_narrowing_type(&old, &new)
}

pub fn is_narrowing_type(old: &FieldType, new: &FieldType) -> bool {
    use FieldType::*;

    if old == new {
        return false;
    }

    match (old, new) {
        (Array(old_inner), Array(new_inner)) => is_narrowing_type(old_inner, new_inner),
        (Array(_), _) => true,
        (_, Array(_)) => false,

        (Long, Int) | (Long, Float) => true,
        (Double, Float) | (Double, Int) | (Double, Long) => true,
        (Float, Int) | (Float, Long) => true,
        (Decimal(_), Int) | (Decimal(_), Long) | (Decimal(_), Float) => true,
        (Decimal(Some((p1, s1))), Decimal(Some((p2, s2)))) => p2 < p1 || s2 < s1,

        (VarChar(old_len), VarChar(new_len)) => new_len < old_len,
        (String | Text, VarChar(_)) => true,

        (String | Text | VarChar(_), new) => !matches!(new, String | Text | VarChar(_)),

        (Timestamp, Date) => true,
        _ => false,
    }
}

/// Returns true when a modifier change makes a nullable column NOT NULL.
pub fn is_nullability_narrowing(old: Modifier, new: Modifier) -> bool {
    old.is_nullable() && !new.is_nullable()
}
