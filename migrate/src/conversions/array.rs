use crate::types::SourceValue;

/// Separators recognised when a column splits delimited strings.
const DELIMITERS: &[char] = &[',', '，', '、'];

/// Normalizes a value for a text array column.
///
/// Lists are stringified element by element, skipping nulls and blank elements. A scalar string
/// becomes a one element array, or is split on [`DELIMITERS`] when `split_delimited` is set. A
/// string that looks like an encoded list (`["a", "b"]` or `['a', 'b']`) is decoded, and yields
/// `None` when it cannot be. Empty results are `None`.
pub fn to_text_array(value: &SourceValue, split_delimited: bool) -> Option<Vec<String>> {
    let elements = match value {
        SourceValue::Null | SourceValue::Map(_) => return None,
        SourceValue::List(values) => values.iter().filter_map(element_text).collect(),
        SourceValue::Bool(_) | SourceValue::Integer(_) | SourceValue::Float(_) => {
            element_text(value).into_iter().collect()
        }
        SourceValue::String(text) => {
            let text = text.trim();
            if text.starts_with('[') && text.ends_with(']') {
                parse_bracketed(text)?
            } else if split_delimited {
                text.split(DELIMITERS)
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect()
            } else if text.is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            }
        }
    };

    (!elements.is_empty()).then_some(elements)
}

fn element_text(value: &SourceValue) -> Option<String> {
    match value {
        SourceValue::Null => None,
        SourceValue::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        SourceValue::Bool(value) => Some(value.to_string()),
        SourceValue::Integer(value) => Some(value.to_string()),
        SourceValue::Float(value) => value.is_finite().then(|| value.to_string()),
        SourceValue::List(_) | SourceValue::Map(_) => Some(value.to_json().to_string()),
    }
}

/// Decodes a list that was stored as a string.
///
/// JSON is tried first. Otherwise the brackets are stripped and the content is split on commas
/// outside of single or double quotes, which also covers lists written with single quotes.
fn parse_bracketed(text: &str) -> Option<Vec<String>> {
    if let Ok(serde_json::Value::Array(values)) = serde_json::from_str::<serde_json::Value>(text) {
        return Some(
            values
                .into_iter()
                .map(SourceValue::from)
                .filter_map(|value| element_text(&value))
                .collect(),
        );
    }

    let inner = text.strip_prefix('[')?.strip_suffix(']')?;

    let mut elements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = inner.chars();

    while let Some(ch) = chars.next() {
        match quote {
            Some(open) => match ch {
                '\\' => current.push(chars.next()?),
                ch if ch == open => quote = None,
                ch => current.push(ch),
            },
            None => match ch {
                '\'' | '"' if current.trim().is_empty() => {
                    current.clear();
                    quote = Some(ch);
                }
                ',' => elements.push(std::mem::take(&mut current)),
                // Nested lists are not supported.
                '[' | ']' => return None,
                ch => current.push(ch),
            },
        }
    }

    if quote.is_some() {
        return None;
    }
    elements.push(current);

    Some(
        elements
            .iter()
            .map(|element| element.trim())
            .filter(|element| {
                !element.is_empty()
                    && !element.eq_ignore_ascii_case("none")
                    && !element.eq_ignore_ascii_case("null")
            })
            .map(str::to_string)
            .collect(),
    )
}
