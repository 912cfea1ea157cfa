use crate::types::SourceValue;

/// Stringifies a value for a free-text column.
///
/// Strings are trimmed and blank ones dropped. Lists and maps are kept as compact JSON with
/// sorted keys, so equal documents always produce equal text.
pub fn to_text(value: &SourceValue) -> Option<String> {
    match value {
        SourceValue::Null => None,
        SourceValue::Bool(value) => Some(value.to_string()),
        SourceValue::Integer(value) => Some(value.to_string()),
        SourceValue::Float(value) if value.is_finite() => Some(value.to_string()),
        SourceValue::Float(_) => None,
        SourceValue::String(value) => {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        SourceValue::List(_) | SourceValue::Map(_) => Some(value.to_json().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn strings_are_trimmed() {
        assert_eq!(
            to_text(&SourceValue::from("  Acme Corp \n")),
            Some("Acme Corp".to_string())
        );
        assert_eq!(to_text(&SourceValue::from(" \t ")), None);
        assert_eq!(to_text(&SourceValue::Null), None);
    }

    #[test]
    fn scalars_are_stringified() {
        assert_eq!(to_text(&SourceValue::Integer(42)), Some("42".to_string()));
        assert_eq!(to_text(&SourceValue::Float(1.5)), Some("1.5".to_string()));
        assert_eq!(to_text(&SourceValue::Bool(true)), Some("true".to_string()));
    }

    #[test]
    fn nested_values_become_canonical_json() {
        let value = SourceValue::from(json!({"zip": "100-0001", "city": "Tokyo", "lines": [1, 2]}));

        assert_eq!(
            to_text(&value),
            Some(r#"{"city":"Tokyo","lines":[1,2],"zip":"100-0001"}"#.to_string())
        );
    }
}
