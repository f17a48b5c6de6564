//! DTOs for `GET /api/v1/recommendations`.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::common_dto::{parse_limit, parse_period, parse_scope, parse_subject};
use crate::domain::RecommendationSeed;
use crate::error::EngineError;
use crate::service::resolver::{DEFAULT_LIMIT, MAX_LIMIT, normalize_format};
use crate::service::{ResolveRequest, ResolveResponse};

/// Query parameters for the resolve endpoint.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecommendationQuery {
    /// `card` or `deck`. Required.
    pub scope: Option<String>,
    /// Card or deck UUID to anchor on.
    pub subject_id: Option<String>,
    /// Format every recommended card must be legal in.
    pub format: Option<String>,
    /// Calling surface, echoed back in `meta`.
    pub surface: Option<String>,
    /// Trending period. Defaults to `daily`.
    pub period: Option<String>,
    /// Number of seeds, 1 to 50. Defaults to 8.
    pub limit: Option<String>,
}

impl RecommendationQuery {
    /// Validates the query into a resolver request.
    ///
    /// # Errors
    ///
    /// Returns a 400-class [`EngineError`] for a missing or unknown scope, a
    /// non-UUID subject, an unknown period or a non-integer limit.
    pub fn into_request(self) -> Result<ResolveRequest, EngineError> {
        Ok(ResolveRequest {
            scope: parse_scope(self.scope.as_deref())?,
            subject_id: parse_subject(self.subject_id.as_deref())?,
            format: normalize_format(self.format.as_deref()),
            surface: self
                .surface
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            period: parse_period(self.period.as_deref())?,
            limit: parse_limit(self.limit.as_deref(), DEFAULT_LIMIT, MAX_LIMIT)?,
        })
    }
}

/// Response `meta` block.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecommendationMeta {
    /// Requested scope.
    pub scope: String,
    /// Requested subject.
    pub subject_id: Option<Uuid>,
    /// Normalized format.
    pub format: Option<String>,
    /// Calling surface.
    pub surface: Option<String>,
    /// Trending period.
    pub period: String,
    /// Contributing tiers (`model`, `heuristic`, `trending` joined by `+`) or
    /// `fallback`.
    pub resolver: String,
    /// Number of seeds in `data`.
    pub count: usize,
}

/// Response body for the resolve endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecommendationListResponse {
    /// Ranked seeds.
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<RecommendationSeed>,
    /// How the list was produced.
    pub meta: RecommendationMeta,
}

impl From<ResolveResponse> for RecommendationListResponse {
    fn from(response: ResolveResponse) -> Self {
        let meta = response.meta;
        Self {
            data: response.seeds,
            meta: RecommendationMeta {
                scope: meta.scope.as_str().to_string(),
                subject_id: meta.subject_id,
                format: meta.format,
                surface: meta.surface,
                period: meta.period.as_str().to_string(),
                resolver: meta.resolver,
                count: meta.count,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Period, Scope};

    #[test]
    fn query_normalizes_optional_fields() {
        let query = RecommendationQuery {
            scope: Some("card".into()),
            format: Some("  Pioneer ".into()),
            surface: Some(" ".into()),
            limit: Some("80".into()),
            ..RecommendationQuery::default()
        };
        let Ok(req) = query.into_request() else {
            panic!("query should validate");
        };
        assert_eq!(req.scope, Scope::Card);
        assert_eq!(req.format.as_deref(), Some("pioneer"));
        assert_eq!(req.surface, None);
        assert_eq!(req.period, Period::Daily);
        assert_eq!(req.limit, MAX_LIMIT);
    }

    #[test]
    fn missing_scope_is_rejected() {
        let Err(e) = RecommendationQuery::default().into_request() else {
            panic!("scope should be required");
        };
        assert!(e.is_input_error());
    }
}
