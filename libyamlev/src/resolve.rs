//! Plain scalar resolution.
//!
//! The event layer never converts scalars to native values, but the emitter
//! must know when an unquoted rendering of a string would be read back as
//! something else. Both the YAML 1.2 core schema and the YAML 1.1 forms that
//! common parsers still accept are treated as non-strings.

/// Check if a plain scalar with this text would resolve to null, a boolean,
/// an integer or a float, or to a YAML 1.1 merge or value key.
pub(crate) fn resolves_to_non_string(s: &str) -> bool {
    is_null_keyword(s)
        || is_bool_keyword(s)
        || is_special_key(s)
        || is_integer_pattern(s)
        || is_float_pattern(s)
}

// ============================================================================
// Keywords
// ============================================================================

fn is_null_keyword(s: &str) -> bool {
    matches!(s, "" | "~" | "null" | "Null" | "NULL")
}

fn is_bool_keyword(s: &str) -> bool {
    matches!(
        s,
        "true" | "True" | "TRUE" | "false" | "False" | "FALSE"
            | "yes" | "Yes" | "YES" | "no" | "No" | "NO"
            | "on" | "On" | "ON" | "off" | "Off" | "OFF"
            | "y" | "Y" | "n" | "N"
    )
}

fn is_special_key(s: &str) -> bool {
    matches!(s, "<<" | "=")
}

// ============================================================================
// Numbers
// ============================================================================

fn strip_sign(s: &str) -> &str {
    s.strip_prefix('-')
        .or_else(|| s.strip_prefix('+'))
        .unwrap_or(s)
}

/// Digits with `_` grouping; at least one digit.
fn is_digits(s: &str, radix: u32) -> bool {
    s.chars().any(|c| c.is_digit(radix)) && s.chars().all(|c| c.is_digit(radix) || c == '_')
}

/// Check if string matches an integer: decimal with optional sign, or
/// `0x`, `0o`, `0b` prefixed.
fn is_integer_pattern(s: &str) -> bool {
    let s = strip_sign(s);
    if let Some(hex) = s.strip_prefix("0x") {
        return is_digits(hex, 16);
    }
    if let Some(octal) = s.strip_prefix("0o") {
        return is_digits(octal, 8);
    }
    if let Some(binary) = s.strip_prefix("0b") {
        return is_digits(binary, 2);
    }
    is_digits(s, 10) && s.starts_with(|c: char| c.is_ascii_digit())
}

/// Check if string matches a float: `[-+]?(\d*\.\d*)([eE][-+]?\d+)?` with at
/// least one digit, exponent-only notation, or the `.inf` and `.nan` forms.
fn is_float_pattern(s: &str) -> bool {
    let unsigned = strip_sign(s);
    if matches!(unsigned, ".inf" | ".Inf" | ".INF") {
        return true;
    }
    if matches!(s, ".nan" | ".NaN" | ".NAN") {
        return true;
    }

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(pos) => (&unsigned[..pos], Some(&unsigned[pos + 1..])),
        None => (unsigned, None),
    };

    if let Some(exp) = exponent {
        let exp = strip_sign(exp);
        if exp.is_empty() || !exp.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
    }

    match mantissa.split_once('.') {
        Some((before, after)) => {
            let digit_count = before
                .chars()
                .chain(after.chars())
                .filter(|c| c.is_ascii_digit())
                .count();
            digit_count > 0
                && before.chars().all(|c| c.is_ascii_digit() || c == '_')
                && after.chars().all(|c| c.is_ascii_digit() || c == '_')
        }
        None => exponent.is_some() && is_digits(mantissa, 10),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        for s in ["", "~", "null", "NULL", "true", "False", "yes", "off", "Y", "<<"] {
            assert!(resolves_to_non_string(s), "{:?} should not be a string", s);
        }
        for s in ["nul", "tRue", "yess", "hello", "<", "=="] {
            assert!(!resolves_to_non_string(s), "{:?} should be a string", s);
        }
    }

    #[test]
    fn test_integers() {
        for s in ["0", "-12", "+7", "1_000", "0x1F", "0o17", "0b101"] {
            assert!(resolves_to_non_string(s), "{:?} should be an integer", s);
        }
        for s in ["-", "0x", "0xg", "1a", "_1"] {
            assert!(!is_integer_pattern(s), "{:?} should not be an integer", s);
        }
    }

    #[test]
    fn test_floats() {
        for s in ["1.5", ".5", "5.", "-1e10", "2.5E-3", ".inf", "-.Inf", ".NaN"] {
            assert!(resolves_to_non_string(s), "{:?} should be a float", s);
        }
        for s in [".", "-.", "1e", "e5", "1.2.3", "-.nan", "1.5x"] {
            assert!(!is_float_pattern(s), "{:?} should not be a float", s);
        }
    }
}
