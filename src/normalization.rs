use serde::{Deserialize, Deserializer};

/// Normalizes free text by stripping surrounding whitespace and
/// composing it into Unicode Normalization Form C.
///
/// ```
/// use portfolio::normalization::normalize_text;
/// assert_eq!(normalize_text(" Cafe\u{301} "), "Café");
/// ```
pub fn normalize_text(text: impl AsRef<str>) -> String {
    use unicode_normalization::UnicodeNormalization;

    text.as_ref().trim().nfc().collect()
}

/// Normalizes optional text, treating blank input as absent.
///
/// ```
/// use portfolio::normalization::normalize_optional;
/// assert_eq!(normalize_optional(Some("  ")), None);
/// assert_eq!(normalize_optional(Some(" Tour 2024 ")), Some("Tour 2024".to_owned()));
/// ```
pub fn normalize_optional(text: Option<impl AsRef<str>>) -> Option<String> {
    text.map(normalize_text).filter(|t| !t.is_empty())
}

/// Normalizes an email address for storage and lookup.
pub fn normalize_email(email: impl AsRef<str>) -> String {
    email.as_ref().trim().to_lowercase()
}

/// Deserializes an optional `String` after running it through
/// `normalize_optional`.
pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where D: Deserializer<'de> {
    let o: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(normalize_optional(o))
}

/// Deserializes a field of a partial update. An absent field (with
/// `#[serde(default)]`) stays `None`; a blank string or `null` becomes
/// `Some(None)`, i.e. "clear this field".
pub fn deserialize_patch<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where D: Deserializer<'de> {
    let o: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(Some(normalize_optional(o)))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde::Deserialize;
    use unicode_normalization::is_nfc;

    use super::{normalize_email, normalize_optional, normalize_text};

    fn count_whitespace(s: impl AsRef<str>) -> usize {
        s.as_ref().chars().filter(|c| c.is_whitespace()).count()
    }

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default)]
        #[serde(deserialize_with = "super::deserialize_patch")]
        album: Option<Option<String>>,
    }

    #[test]
    fn patches_distinguish_absent_from_cleared() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let blank: Patch = serde_json::from_str(r#"{"album": "   "}"#).unwrap();
        let null: Patch = serde_json::from_str(r#"{"album": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"album": " Tour "}"#).unwrap();

        assert_eq!(absent.album, None);
        assert_eq!(blank.album, Some(None));
        assert_eq!(null.album, Some(None));
        assert_eq!(set.album, Some(Some("Tour".to_owned())));
    }

    #[test]
    fn emails_are_lowercased_and_trimmed() {
        assert_eq!(normalize_email("  Someone@Example.COM "), "someone@example.com");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 2000, ..ProptestConfig::default()
        })]

        #[test]
        fn normalization_works(string in "(\\S.*\\S|\\S+)", space_before in "\\s*", space_after in "\\s*") {
            let normalized = normalize_text(format!("{}{}{}", space_before, string, space_after));

            prop_assert!(is_nfc(&normalized), "{:?} (normalized form of {:?}) is in NFC", normalized, string);

            prop_assert!(!normalized.starts_with(char::is_whitespace) && !normalized.ends_with(char::is_whitespace), "{:?} (normalized form of {:?}) has no leading or trailing whitespace", normalized, string);

            let trimmed = normalized.trim();

            prop_assert_eq!(count_whitespace(&normalized), count_whitespace(&trimmed), "{:?} (normalized form of {:?}) preserves inner whitespace", normalized, string);
        }

        #[test]
        fn blank_text_is_absent(blank in "\\s*") {
            prop_assert_eq!(normalize_optional(Some(blank)), None);
        }
    }
}
