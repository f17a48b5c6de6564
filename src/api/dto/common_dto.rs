//! Query-string helpers shared by several endpoints.
//!
//! Query values arrive as optional strings and are validated here, so that
//! malformed input renders as the engine's JSON error body rather than a
//! bare extractor rejection.

use uuid::Uuid;

use crate::domain::{Period, Scope};
use crate::error::EngineError;

/// Parses a `limit` value and clamps it to `1..=max`. Absent or blank means
/// `default`.
///
/// # Errors
///
/// Returns [`EngineError::InvalidRequest`] when the value is not an integer.
pub fn parse_limit(raw: Option<&str>, default: usize, max: usize) -> Result<usize, EngineError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(default.clamp(1, max));
    };
    let n: i64 = raw
        .parse()
        .map_err(|_| EngineError::InvalidRequest(format!("limit must be an integer, got {raw:?}")))?;
    let n = usize::try_from(n.max(1)).unwrap_or(max);
    Ok(n.clamp(1, max))
}

/// Parses a required `scope`.
///
/// # Errors
///
/// Returns [`EngineError::InvalidRequest`] when absent, or
/// [`EngineError::UnsupportedScope`] when unknown.
pub fn parse_scope(raw: Option<&str>) -> Result<Scope, EngineError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EngineError::InvalidRequest("scope is required".into()))?
        .parse()
}

/// Parses an optional `period`, defaulting to daily.
///
/// # Errors
///
/// Returns [`EngineError::UnsupportedPeriod`] when unknown.
pub fn parse_period(raw: Option<&str>) -> Result<Period, EngineError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or(Ok(Period::Daily), str::parse)
}

/// Parses an optional subject id.
///
/// # Errors
///
/// Returns [`EngineError::InvalidRequest`] when present but not a UUID.
pub fn parse_subject(raw: Option<&str>) -> Result<Option<Uuid>, EngineError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s)
                .map_err(|_| EngineError::InvalidRequest(format!("subject_id must be a UUID, got {s:?}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(parse_limit(None, 8, 50).ok(), Some(8));
        assert_eq!(parse_limit(Some("0"), 8, 50).ok(), Some(1));
        assert_eq!(parse_limit(Some("-4"), 8, 50).ok(), Some(1));
        assert_eq!(parse_limit(Some("999"), 8, 50).ok(), Some(50));
        assert!(matches!(
            parse_limit(Some("ten"), 8, 50),
            Err(EngineError::InvalidRequest(_))
        ));
    }

    #[test]
    fn scope_is_required() {
        assert!(matches!(parse_scope(None), Err(EngineError::InvalidRequest(_))));
        assert!(matches!(
            parse_scope(Some("binder")),
            Err(EngineError::UnsupportedScope(_))
        ));
        assert_eq!(parse_scope(Some(" Deck ")).ok(), Some(Scope::Deck));
    }

    #[test]
    fn subject_must_be_uuid() {
        assert_eq!(parse_subject(Some("")).ok(), Some(None));
        assert!(parse_subject(Some("card-1")).is_err());
        assert_eq!(
            parse_subject(Some("00000000-0000-0000-0000-000000000000")).ok(),
            Some(Some(Uuid::nil()))
        );
    }
}
