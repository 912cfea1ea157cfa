use crate::types::SourceValue;

/// Returns `true` when the value carries actual data.
///
/// Null, blank strings, the literals `null` and `undefined` (any case) and empty lists or maps
/// are all treated as absent. Numbers and booleans, including `0` and `false`, are populated.
pub fn is_populated(value: &SourceValue) -> bool {
    match value {
        SourceValue::Null => false,
        SourceValue::Bool(_) | SourceValue::Integer(_) | SourceValue::Float(_) => true,
        SourceValue::String(value) => {
            let trimmed = value.trim();
            !trimmed.is_empty()
                && !trimmed.eq_ignore_ascii_case("null")
                && !trimmed.eq_ignore_ascii_case("undefined")
        }
        SourceValue::List(values) => !values.is_empty(),
        SourceValue::Map(entries) => !entries.is_empty(),
    }
}
