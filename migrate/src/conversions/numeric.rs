use crate::schema::IntegerUnit;
use crate::types::SourceValue;

/// Value suffixes that state their own unit, checked in order.
const SUFFIX_UNITS: &[(&str, IntegerUnit)] = &[
    ("百万円", IntegerUnit::Millions),
    ("百万", IntegerUnit::Millions),
    ("千円", IntegerUnit::Thousands),
    ("千", IntegerUnit::Thousands),
];

/// Fraction digits beyond this cannot change the truncated result of any supported unit.
const MAX_FRACTION_DIGITS: usize = 12;

/// Converts a value into an integer expressed in ones, scaling it by `unit`.
///
/// Strings may carry a unit suffix (`百万円`, `千円`, ...) which takes precedence over `unit`.
/// The result is truncated toward zero, and any overflow yields `None`.
pub fn parse_scaled_integer(value: &SourceValue, unit: IntegerUnit) -> Option<i64> {
    match value {
        SourceValue::Integer(value) => value.checked_mul(unit.multiplier()),
        SourceValue::Float(value) => scale_float(*value, unit.multiplier()),
        SourceValue::String(value) => parse_integer_text(value, unit),
        SourceValue::Null | SourceValue::Bool(_) | SourceValue::List(_) | SourceValue::Map(_) => {
            None
        }
    }
}

fn scale_float(value: f64, multiplier: i64) -> Option<i64> {
    let scaled = (value * multiplier as f64).trunc();
    if !scaled.is_finite() || scaled < i64::MIN as f64 || scaled >= i64::MAX as f64 {
        return None;
    }

    Some(scaled as i64)
}

/// Parses free-form numeric text such as `"1,234"`, `"-5.5"` or `"12百万円"`.
///
/// A sign is honoured only before the first digit, one decimal point is honoured and every other
/// character is ignored. Text without digits, or with more than one decimal point, yields `None`.
pub fn parse_integer_text(text: &str, unit: IntegerUnit) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() || text == "-" {
        return None;
    }

    let (text, unit) = strip_unit_suffix(text, unit);

    let mut negative = false;
    let mut seen_digit = false;
    let mut seen_point = false;
    let mut whole: i128 = 0;
    let mut fraction: i128 = 0;
    let mut fraction_digits = 0usize;

    for ch in text.chars() {
        match ch {
            '0'..='9' => {
                let digit = i128::from(ch as u8 - b'0');
                seen_digit = true;
                if seen_point {
                    if fraction_digits < MAX_FRACTION_DIGITS {
                        fraction = fraction * 10 + digit;
                        fraction_digits += 1;
                    }
                } else {
                    whole = whole.checked_mul(10)?.checked_add(digit)?;
                    if whole > i128::from(i64::MAX) {
                        return None;
                    }
                }
            }
            '.' => {
                if seen_point {
                    return None;
                }
                seen_point = true;
            }
            '-' if !seen_digit && !seen_point => negative = true,
            _ => {}
        }
    }

    if !seen_digit {
        return None;
    }

    let multiplier = i128::from(unit.multiplier());
    let mut scaled = whole.checked_mul(multiplier)?;
    if fraction_digits > 0 {
        let divisor = 10i128.pow(fraction_digits as u32);
        scaled = scaled.checked_add(fraction.checked_mul(multiplier)? / divisor)?;
    }

    if negative {
        scaled = -scaled;
    }

    i64::try_from(scaled).ok()
}

/// Removes the first unit suffix found in the text and returns the unit it stands for.
fn strip_unit_suffix(text: &str, unit: IntegerUnit) -> (String, IntegerUnit) {
    for (suffix, suffix_unit) in SUFFIX_UNITS {
        if text.contains(suffix) {
            return (text.replacen(suffix, "", 1), *suffix_unit);
        }
    }

    (text.to_string(), unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str, unit: IntegerUnit) -> Option<i64> {
        parse_scaled_integer(&SourceValue::from(text), unit)
    }

    #[test]
    fn millions_column_scales_plain_numbers() {
        assert_eq!(parse("5", IntegerUnit::Millions), Some(5_000_000));
        assert_eq!(parse("5000000", IntegerUnit::One), Some(5_000_000));
        assert_eq!(
            parse_scaled_integer(&SourceValue::Integer(3), IntegerUnit::Thousands),
            Some(3_000)
        );
    }

    #[test]
    fn separators_and_noise_are_stripped() {
        assert_eq!(parse("1,234", IntegerUnit::One), Some(1_234));
        assert_eq!(parse(" 1 234 円", IntegerUnit::One), Some(1_234));
        assert_eq!(parse("-1,500", IntegerUnit::One), Some(-1_500));
        assert_eq!(parse("約12人", IntegerUnit::One), Some(12));
    }

    #[test]
    fn value_suffix_overrides_column_unit() {
        assert_eq!(parse("12百万円", IntegerUnit::One), Some(12_000_000));
        assert_eq!(parse("1,500千円", IntegerUnit::Millions), Some(1_500_000));
        assert_eq!(parse("3千", IntegerUnit::One), Some(3_000));
    }

    #[test]
    fn fractions_are_truncated_toward_zero() {
        assert_eq!(parse("1.5", IntegerUnit::Millions), Some(1_500_000));
        assert_eq!(parse("2.9", IntegerUnit::One), Some(2));
        assert_eq!(parse("-2.9", IntegerUnit::One), Some(-2));
        assert_eq!(
            parse_scaled_integer(&SourceValue::Float(0.25), IntegerUnit::Millions),
            Some(250_000)
        );
    }

    #[test]
    fn unusable_input_yields_none() {
        assert_eq!(parse("", IntegerUnit::One), None);
        assert_eq!(parse("-", IntegerUnit::One), None);
        assert_eq!(parse("n/a", IntegerUnit::One), None);
        assert_eq!(parse("2020.01.01", IntegerUnit::One), None);
        assert_eq!(parse_scaled_integer(&SourceValue::Bool(true), IntegerUnit::One), None);
        assert_eq!(parse_scaled_integer(&SourceValue::Null, IntegerUnit::One), None);
    }

    #[test]
    fn overflow_yields_none() {
        assert_eq!(parse("99999999999999999999", IntegerUnit::One), None);
        assert_eq!(parse("9223372036854775807", IntegerUnit::Thousands), None);
        assert_eq!(
            parse_scaled_integer(&SourceValue::Integer(i64::MAX), IntegerUnit::Millions),
            None
        );
        assert_eq!(
            parse_scaled_integer(&SourceValue::Float(f64::INFINITY), IntegerUnit::One),
            None
        );
    }
}
