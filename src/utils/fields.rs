//! Request field helpers shared by the attendance and student payloads.

use serde::{Deserialize, Deserializer};
use validator::ValidationError;

/// `""` and `null` both mean "not given".
pub fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Distinguishes a missing key (`None`) from an explicit clear
/// (`Some(None)` for `null` or `""`). Pair with `#[serde(default)]`.
pub fn clearable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    empty_as_none(deserializer).map(Some)
}

/// 24-hour `HH:mm`.
pub fn is_clock_time(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return false;
    }
    let digits = |a: u8, b: u8| -> Option<u32> {
        (a.is_ascii_digit() && b.is_ascii_digit()).then(|| u32::from(a - b'0') * 10 + u32::from(b - b'0'))
    };
    matches!(
        (digits(bytes[0], bytes[1]), digits(bytes[3], bytes[4])),
        (Some(h), Some(m)) if h <= 23 && m <= 59
    )
}

pub fn validate_clock_time(value: &str) -> Result<(), ValidationError> {
    if is_clock_time(value) {
        Ok(())
    } else {
        Err(ValidationError::new("clock_time").with_message("Invalid time format, expected \"HH:mm\"".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "clearable")]
        comment: Option<Option<String>>,
        #[serde(default, deserialize_with = "empty_as_none")]
        late: Option<String>,
    }

    #[test]
    fn clock_time_is_strict() {
        for ok in ["00:00", "08:03", "23:59"] {
            assert!(is_clock_time(ok), "{ok}");
        }
        for bad in ["8:03", "24:00", "08:60", "0803", "08:3 ", "ab:cd", ""] {
            assert!(!is_clock_time(bad), "{bad}");
        }
    }

    #[test]
    fn missing_null_and_empty_are_distinguished() {
        let patch: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(patch.comment, None);
        assert_eq!(patch.late, None);

        let patch: Patch = serde_json::from_str(r#"{"comment": null, "late": ""}"#).unwrap();
        assert_eq!(patch.comment, Some(None));
        assert_eq!(patch.late, None);

        let patch: Patch = serde_json::from_str(r#"{"comment": "", "late": "08:10"}"#).unwrap();
        assert_eq!(patch.comment, Some(None));
        assert_eq!(patch.late.as_deref(), Some("08:10"));

        let patch: Patch = serde_json::from_str(r#"{"comment": "sick note"}"#).unwrap();
        assert_eq!(patch.comment, Some(Some("sick note".into())));
    }
}
