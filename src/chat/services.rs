use time::OffsetDateTime;

use crate::error::ApiError;

pub const MAX_CONTENT_CHARS: usize = 1000;

/// Trimmed message body, rejected when empty or over
/// [`MAX_CONTENT_CHARS`] characters.
pub fn validate_content(raw: Option<&str>) -> Result<String, ApiError> {
    let content = raw.map(str::trim).unwrap_or_default();
    if content.is_empty() {
        return Err(ApiError::validation("El mensaje no puede estar vacío"));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ApiError::validation(format!(
            "El mensaje no puede exceder {MAX_CONTENT_CHARS} caracteres"
        )));
    }
    Ok(content.to_string())
}

/// Spanish relative age of `at`, e.g. "Hace 3 minutos".
pub fn time_ago(at: OffsetDateTime, now: OffsetDateTime) -> String {
    let secs = (now - at).whole_seconds().max(0);
    match secs {
        s if s < 60 => format!("Hace {s} segundos"),
        s if s < 3_600 => format!("Hace {} minutos", s / 60),
        s if s < 86_400 => format!("Hace {} horas", s / 3_600),
        s => format!("Hace {} días", s / 86_400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{macros::datetime, Duration};

    #[test]
    fn content_boundaries() {
        let ok = "a".repeat(1000);
        assert_eq!(validate_content(Some(&ok)).unwrap().len(), 1000);

        let too_long = "a".repeat(1001);
        let err = validate_content(Some(&too_long)).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(err.to_string().contains("1000"));
    }

    #[test]
    fn empty_and_blank_content_rejected() {
        for raw in [None, Some(""), Some("   "), Some("\n\t ")] {
            let err = validate_content(raw).unwrap_err();
            assert_eq!(err.to_string(), "El mensaje no puede estar vacío");
        }
    }

    #[test]
    fn content_is_trimmed_before_measuring() {
        let padded = format!("  {}  ", "b".repeat(1000));
        assert_eq!(validate_content(Some(&padded)).unwrap(), "b".repeat(1000));
    }

    #[test]
    fn multibyte_content_counts_characters() {
        let accents = "ñ".repeat(1000);
        assert!(validate_content(Some(&accents)).is_ok());
    }

    #[test]
    fn time_ago_buckets() {
        let now = datetime!(2026-01-15 12:00:00 UTC);
        assert_eq!(time_ago(now - Duration::seconds(5), now), "Hace 5 segundos");
        assert_eq!(time_ago(now - Duration::seconds(125), now), "Hace 2 minutos");
        assert_eq!(time_ago(now - Duration::hours(3), now), "Hace 3 horas");
        assert_eq!(time_ago(now - Duration::days(2), now), "Hace 2 días");
        assert_eq!(time_ago(now + Duration::seconds(10), now), "Hace 0 segundos");
    }
}
