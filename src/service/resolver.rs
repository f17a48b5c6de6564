//! Recommendation resolver: a deduplicating cascade over four tiers.
//!
//! Tiers run in strict precedence: precomputed model rows, heuristic
//! attribute search, the global trending list, and finally the static
//! fallback catalogue. Each live tier is a single timeout-bound attempt; a
//! tier that errors or times out is logged and skipped. Ranks are
//! contiguous across the whole list and a target id is never emitted twice.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::snapshot::trending_reason;
use crate::domain::{
    Card, CardSearch, Deck, Document, Period, RecommendationSeed, Scope, SeedEntity, SeedSource,
    TrendingSnapshot,
};
use crate::error::EngineError;
use crate::persistence::{CatalogStore, ModelFeed, Stores, TrendStore};
use crate::service::fallback::FallbackCatalog;

/// Seeds returned when the caller does not ask for a count.
pub const DEFAULT_LIMIT: usize = 8;
/// Hard ceiling on the number of seeds per response.
pub const MAX_LIMIT: usize = 50;
/// Ceiling on model rows fetched per request.
pub const MODEL_FETCH_CAP: usize = 45;
/// Ceiling on heuristic candidates fetched per request.
pub const HEURISTIC_FETCH_CAP: usize = 200;
/// Ceiling on trending snapshots fetched per request.
pub const TRENDING_FETCH_CAP: usize = 200;

/// Trims and lower-cases a format name. Blank input means no format.
#[must_use]
pub fn normalize_format(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_ascii_lowercase)
}

/// One resolve call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    /// Card or deck recommendations.
    pub scope: Scope,
    /// Card or deck the recommendations are anchored on.
    pub subject_id: Option<Uuid>,
    /// Lower-case format every card target must be legal in.
    pub format: Option<String>,
    /// Calling surface, echoed in the response meta.
    pub surface: Option<String>,
    /// Trending period.
    pub period: Period,
    /// Requested seed count, within `1..=MAX_LIMIT`.
    pub limit: usize,
}

impl ResolveRequest {
    /// A request for `scope` with every option at its default.
    #[must_use]
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            subject_id: None,
            format: None,
            surface: None,
            period: Period::Daily,
            limit: DEFAULT_LIMIT,
        }
    }

    /// Anchors the request on a card or deck.
    #[must_use]
    pub fn with_subject(mut self, subject_id: Uuid) -> Self {
        self.subject_id = Some(subject_id);
        self
    }

    /// Sets the format, normalized by [`normalize_format`].
    #[must_use]
    pub fn with_format(mut self, format: &str) -> Self {
        self.format = normalize_format(Some(format));
        self
    }

    /// Sets the calling surface.
    #[must_use]
    pub fn with_surface(mut self, surface: &str) -> Self {
        self.surface = Some(surface.trim().to_string()).filter(|s| !s.is_empty());
        self
    }

    /// Sets the limit, clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.clamp(1, MAX_LIMIT);
        self
    }
}

/// Describes how a response was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolveMeta {
    /// Requested scope.
    pub scope: Scope,
    /// Requested subject.
    pub subject_id: Option<Uuid>,
    /// Normalized format.
    pub format: Option<String>,
    /// Calling surface.
    pub surface: Option<String>,
    /// Trending period.
    pub period: Period,
    /// Contributing tiers joined by `+`, or `fallback`.
    pub resolver: String,
    /// Number of seeds returned.
    pub count: usize,
}

/// A trending snapshot joined with the catalog entity it scores.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendingEntry {
    /// The stored snapshot.
    pub snapshot: TrendingSnapshot,
    /// Display snapshot of the subject.
    pub entity: SeedEntity,
}

/// Ranked seeds and their provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolveResponse {
    /// Seeds ranked `1..=count`.
    pub seeds: Vec<RecommendationSeed>,
    /// Response metadata.
    pub meta: ResolveMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Model,
    Heuristic,
    Trending,
}

impl Tier {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Heuristic => "heuristic",
            Self::Trending => "trending",
        }
    }
}

/// Running result list with its seen set.
struct Accumulator {
    seeds: Vec<RecommendationSeed>,
    seen: HashSet<Uuid>,
    excluded: HashSet<Uuid>,
    limit: usize,
    tiers: Vec<Tier>,
}

impl Accumulator {
    fn new(limit: usize, subject_id: Option<Uuid>) -> Self {
        Self {
            seeds: Vec::with_capacity(limit),
            seen: HashSet::new(),
            excluded: subject_id.into_iter().collect(),
            limit,
            tiers: Vec::new(),
        }
    }

    fn is_full(&self) -> bool {
        self.seeds.len() >= self.limit
    }

    fn skips(&self, id: Uuid) -> bool {
        self.seen.contains(&id) || self.excluded.contains(&id)
    }

    /// Appends unseen candidates in order until full, numbering ranks from
    /// the current length.
    fn extend(&mut self, tier: Tier, candidates: Vec<RecommendationSeed>) -> usize {
        let before = self.seeds.len();
        for mut seed in candidates {
            if self.is_full() {
                break;
            }
            if self.skips(seed.target_id) {
                continue;
            }
            self.seen.insert(seed.target_id);
            seed.rank = self.seeds.len().saturating_add(1);
            self.seeds.push(seed);
        }
        let added = self.seeds.len().saturating_sub(before);
        if added > 0 {
            self.tiers.push(tier);
        }
        added
    }

    fn resolver_label(&self) -> String {
        self.tiers
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join("+")
    }
}

fn color_label(colors: &[String]) -> String {
    if colors.is_empty() {
        "colorless".to_string()
    } else {
        colors.concat()
    }
}

fn by_id<T>(items: Vec<T>, id: impl Fn(&T) -> Uuid) -> HashMap<Uuid, T> {
    items.into_iter().map(|item| (id(&item), item)).collect()
}

/// Resolves recommendation requests against the live stores.
#[derive(Debug, Clone)]
pub struct RecommendationResolver {
    catalog: Arc<dyn CatalogStore>,
    models: Arc<dyn ModelFeed>,
    trends: Arc<dyn TrendStore>,
    fallback: FallbackCatalog,
    tier_timeout: Duration,
}

impl RecommendationResolver {
    /// Creates a resolver with the built-in fallback catalogue.
    #[must_use]
    pub fn new(stores: &Stores, tier_timeout: Duration) -> Self {
        Self {
            catalog: Arc::clone(&stores.catalog),
            models: Arc::clone(&stores.models),
            trends: Arc::clone(&stores.trends),
            fallback: FallbackCatalog::builtin(),
            tier_timeout,
        }
    }

    /// Replaces the static fallback catalogue.
    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackCatalog) -> Self {
        self.fallback = fallback;
        self
    }

    /// Runs the cascade for `request`.
    ///
    /// Tier failures never surface here. When no live tier produced a seed
    /// the static fallback list for the scope is returned verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Exhausted`] only when every live tier came up
    /// empty and the fallback catalogue has nothing for the scope.
    pub async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse, EngineError> {
        let now = Utc::now();
        let mut acc = Accumulator::new(request.limit, request.subject_id);

        for tier in [Tier::Model, Tier::Heuristic, Tier::Trending] {
            if acc.is_full() {
                break;
            }
            let fetched = match tier {
                Tier::Model => self.bounded(tier, request, self.model_tier(request, &acc, now)).await,
                Tier::Heuristic => {
                    self.bounded(tier, request, self.heuristic_tier(request, &acc, now))
                        .await
                }
                Tier::Trending => {
                    self.bounded(tier, request, self.trending_tier(request, &acc, now))
                        .await
                }
            };
            let added = acc.extend(tier, fetched);
            tracing::debug!(tier = tier.as_str(), scope = %request.scope, added, "tier resolved");
        }

        let (seeds, resolver) = if acc.seeds.is_empty() {
            let seeds = self.fallback.seeds(request.scope, request.limit, now);
            if seeds.is_empty() {
                return Err(EngineError::Exhausted(request.scope.to_string()));
            }
            tracing::info!(scope = %request.scope, count = seeds.len(), "serving static fallback");
            (seeds, "fallback".to_string())
        } else {
            let label = acc.resolver_label();
            (acc.seeds, label)
        };

        let meta = ResolveMeta {
            scope: request.scope,
            subject_id: request.subject_id,
            format: request.format.clone(),
            surface: request.surface.clone(),
            period: request.period,
            resolver,
            count: seeds.len(),
        };
        Ok(ResolveResponse { seeds, meta })
    }

    /// Runs one tier under the tier timeout. Errors and timeouts are logged
    /// and become an empty result.
    async fn bounded<F>(&self, tier: Tier, request: &ResolveRequest, fut: F) -> Vec<RecommendationSeed>
    where
        F: Future<Output = Result<Vec<RecommendationSeed>, EngineError>>,
    {
        let outcome = match tokio::time::timeout(self.tier_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout(format!("{} tier", tier.as_str()))),
        };
        outcome.unwrap_or_else(|e| {
            tracing::warn!(
                tier = tier.as_str(),
                scope = %request.scope,
                subject_id = ?request.subject_id,
                error = %e,
                "recommendation tier failed, falling through"
            );
            Vec::new()
        })
    }

    async fn model_tier(
        &self,
        request: &ResolveRequest,
        acc: &Accumulator,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecommendationSeed>, EngineError> {
        let Some(subject_id) = request.subject_id else {
            return Ok(Vec::new());
        };
        let fetch = request.limit.saturating_mul(3).min(MODEL_FETCH_CAP);

        let (mut rows, owned): (_, HashSet<Uuid>) = match request.scope {
            Scope::Card => (self.models.similar_cards(subject_id, fetch).await?, HashSet::new()),
            Scope::Deck => {
                let rows = self.models.deck_upgrades(subject_id, fetch).await?;
                let owned = self
                    .catalog
                    .deck(subject_id)
                    .await?
                    .map(|d| d.card_ids.into_iter().collect())
                    .unwrap_or_default();
                (rows, owned)
            }
        };
        rows.retain(|r| !owned.contains(&r.target_id) && !acc.skips(r.target_id));
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        rows.sort_by(|a, b| b.score.total_cmp(&a.score));

        let ids: Vec<Uuid> = rows.iter().map(|r| r.target_id).collect();
        let cards = by_id(self.catalog.cards_by_ids(&ids).await?, |c: &Card| c.id);
        let source = SeedSource::requested(request.scope, true);

        let seeds = rows
            .into_iter()
            .filter_map(|row| {
                let card = cards.get(&row.target_id)?;
                if let Some(format) = &request.format
                    && !card.is_legal_in(format)
                {
                    return None;
                }
                let reason = row
                    .rationale
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| match request.scope {
                        Scope::Card => format!("Frequently paired with this card (similarity {:.2})", row.score),
                        Scope::Deck => format!("Suggested upgrade for this deck (score {:.2})", row.score),
                    });
                let metrics = row.components.merged(Document::new().with("model_score", row.score));
                Some(
                    RecommendationSeed::new(request.scope, source, SeedEntity::from(card), reason, now)
                        .with_metrics(metrics),
                )
            })
            .collect();
        Ok(seeds)
    }

    async fn heuristic_tier(
        &self,
        request: &ResolveRequest,
        acc: &Accumulator,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecommendationSeed>, EngineError> {
        let Some(subject_id) = request.subject_id else {
            return Ok(Vec::new());
        };
        let fetch = request.limit.saturating_mul(4).min(HEURISTIC_FETCH_CAP);
        let mut exclude: Vec<Uuid> = acc.seen.iter().chain(&acc.excluded).copied().collect();

        let (search, reason) = match request.scope {
            Scope::Card => {
                let Some(card) = self.catalog.card(subject_id).await? else {
                    return Ok(Vec::new());
                };
                let type_token = card.primary_type().map(str::to_string);
                let reason = match &type_token {
                    Some(t) => format!(
                        "Shares {} color identity and {} type with {}",
                        color_label(&card.color_identity),
                        t,
                        card.name
                    ),
                    None => format!(
                        "Shares {} color identity with {}",
                        color_label(&card.color_identity),
                        card.name
                    ),
                };
                let search = CardSearch {
                    colors: card.color_identity,
                    type_token,
                    format: request.format.clone(),
                    exclude,
                    rank_period: Some(request.period),
                    limit: fetch,
                };
                (search, reason)
            }
            Scope::Deck => {
                let Some(deck) = self.catalog.deck(subject_id).await? else {
                    return Ok(Vec::new());
                };
                exclude.extend(&deck.card_ids);
                let reason = format!(
                    "Shares {} color identity with {}",
                    color_label(&deck.color_identity),
                    deck.name
                );
                let Deck {
                    format,
                    color_identity,
                    ..
                } = deck;
                let search = CardSearch {
                    colors: color_identity,
                    type_token: None,
                    format: request.format.clone().or(format),
                    exclude,
                    rank_period: Some(request.period),
                    limit: fetch,
                };
                (search, reason)
            }
        };

        let mut candidates = self.catalog.search_cards(&search).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
        let scores = self
            .trends
            .trend_scores(Scope::Card, request.period, &ids)
            .await?;

        // Scored candidates first by score, unscored keep search order.
        candidates.sort_by(|a, b| match (scores.get(&a.id), scores.get(&b.id)) {
            (Some(x), Some(y)) => y.total_cmp(x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        let source = SeedSource::requested(request.scope, true);
        let seeds = candidates
            .iter()
            .map(|card| {
                RecommendationSeed::new(
                    request.scope,
                    source,
                    SeedEntity::from(card),
                    reason.clone(),
                    now,
                )
                .with_trend_score(scores.get(&card.id).copied())
            })
            .collect();
        Ok(seeds)
    }

    /// The global trending list for `scope`, joined with catalog entities.
    ///
    /// With a `format`, card entries must be legal in it and deck entries
    /// must declare it. Snapshots whose subject is missing from the catalog
    /// are dropped.
    ///
    /// # Errors
    ///
    /// Returns the first store error. Unlike the cascade, nothing is
    /// swallowed here.
    pub async fn trending(
        &self,
        scope: Scope,
        period: Period,
        format: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TrendingEntry>, EngineError> {
        let limit = limit.clamp(1, MAX_LIMIT);
        let fetch = if format.is_some() {
            limit.saturating_mul(4).min(TRENDING_FETCH_CAP)
        } else {
            limit
        };
        let mut entries = self
            .trending_entries(scope, period, format, fetch, |_| false)
            .await?;
        entries.truncate(limit);
        Ok(entries)
    }

    async fn trending_entries<F>(
        &self,
        scope: Scope,
        period: Period,
        format: Option<&str>,
        fetch: usize,
        skip: F,
    ) -> Result<Vec<TrendingEntry>, EngineError>
    where
        F: Fn(Uuid) -> bool,
    {
        let mut snapshots = self.trends.top_snapshots(scope, period, fetch).await?;
        snapshots.retain(|s| !skip(s.subject_id));
        if snapshots.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = snapshots.iter().map(|s| s.subject_id).collect();
        let mut entities: HashMap<Uuid, SeedEntity> = match scope {
            Scope::Card => self
                .catalog
                .cards_by_ids(&ids)
                .await?
                .iter()
                .filter(|c| format.is_none_or(|f| c.is_legal_in(f)))
                .map(|c| (c.id, SeedEntity::from(c)))
                .collect(),
            Scope::Deck => self
                .catalog
                .decks_by_ids(&ids)
                .await?
                .iter()
                .filter(|d| format.is_none_or(|f| d.is_in_format(f)))
                .map(|d| (d.id, SeedEntity::from(d)))
                .collect(),
        };

        Ok(snapshots
            .into_iter()
            .filter_map(|snapshot| {
                let entity = entities.remove(&snapshot.subject_id)?;
                Some(TrendingEntry { snapshot, entity })
            })
            .collect())
    }

    async fn trending_tier(
        &self,
        request: &ResolveRequest,
        acc: &Accumulator,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecommendationSeed>, EngineError> {
        let fetch = request
            .limit
            .saturating_mul(4)
            .saturating_add(acc.seen.len())
            .min(TRENDING_FETCH_CAP);
        let entries = self
            .trending_entries(
                request.scope,
                request.period,
                request.format.as_deref(),
                fetch,
                |id| acc.skips(id),
            )
            .await?;

        let source = SeedSource::requested(request.scope, request.subject_id.is_some());
        Ok(entries
            .into_iter()
            .map(|TrendingEntry { snapshot, entity }| {
                RecommendationSeed::new(
                    request.scope,
                    source,
                    entity,
                    trending_reason(&snapshot),
                    now,
                )
                .with_trend_score(Some(snapshot.trend_score))
                .with_metrics(snapshot.components)
            })
            .collect())
    }
}
