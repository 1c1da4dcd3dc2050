//! Cache-aside redirect resolution, mapping creation and owner listings.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, warn};

use crate::domain::entities::{NewShortMapping, ShortMapping, Visit};
use crate::domain::repositories::{MappingRepository, VisitRepository};
use crate::domain::visit_event::{ClientContext, VisitEvent};
use crate::error::AppError;
use crate::infrastructure::cache::{CacheError, CacheService};
use crate::utils::code_generator::{CodeGenerator, validate_code};
use crate::utils::url_validator::validate_long_url;

/// Inserts attempted when a freshly generated code loses a uniqueness race.
const INSERT_ATTEMPTS: usize = 3;

/// Tunables for the resolver.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// TTL applied to `mapping:` entries. Counters never expire.
    pub mapping_ttl_seconds: Option<u64>,
    /// Recent visits attached to each mapping in listings.
    pub recent_visits_limit: i64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            mapping_ttl_seconds: Some(604_800),
            recent_visits_limit: 20,
        }
    }
}

/// A mapping together with its most recent visits, newest first.
#[derive(Debug, Clone)]
pub struct MappingWithVisits {
    pub mapping: ShortMapping,
    pub recent_visits: Vec<Visit>,
}

impl MappingWithVisits {
    fn last_visit(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.recent_visits.first().map(|v| v.visited_at)
    }
}

/// Serves redirects from the cache, repairs it from the durable store on a
/// miss, and counts every resolved visit.
///
/// Holds no in-process locks: concurrent requests coordinate only through
/// the cache's atomic increment and set-if-absent primitives.
pub struct RedirectResolver {
    mappings: Arc<dyn MappingRepository>,
    visits: Arc<dyn VisitRepository>,
    cache: Arc<dyn CacheService>,
    generator: CodeGenerator,
    visit_sender: mpsc::Sender<VisitEvent>,
    settings: ResolverSettings,
}

impl RedirectResolver {
    /// Creates a resolver over injected store, cache and visit queue handles.
    pub fn new(
        mappings: Arc<dyn MappingRepository>,
        visits: Arc<dyn VisitRepository>,
        cache: Arc<dyn CacheService>,
        visit_sender: mpsc::Sender<VisitEvent>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            generator: CodeGenerator::new(mappings.clone()),
            mappings,
            visits,
            cache,
            visit_sender,
            settings,
        }
    }

    /// Replaces the code generator (e.g. to change the attempt bound).
    pub fn with_generator(mut self, generator: CodeGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Creates a new short mapping for `long_url`.
    ///
    /// The mapping is persisted first; the cache is then warmed with the
    /// mapping entry and a zero counter (set-if-absent, so an existing counter
    /// is never clobbered). Cache failures do not fail creation.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidFormat`] if `long_url` is not an absolute HTTP(S) URL
    /// - [`AppError::GenerationExhausted`] if no free code could be drawn
    /// - [`AppError::StoreUnavailable`] if the durable store fails
    pub async fn create(
        &self,
        long_url: &str,
        owner_id: Option<String>,
    ) -> Result<ShortMapping, AppError> {
        validate_long_url(long_url).map_err(|e| {
            AppError::bad_request("Invalid URL format", json!({ "reason": e.to_string() }))
        })?;

        let mapping = self.insert_with_fresh_code(long_url, owner_id).await?;

        self.warm_cache(&mapping.code, &mapping.long_url).await;

        Ok(mapping)
    }

    async fn insert_with_fresh_code(
        &self,
        long_url: &str,
        owner_id: Option<String>,
    ) -> Result<ShortMapping, AppError> {
        for _ in 0..INSERT_ATTEMPTS {
            let code = self.generator.generate().await?;

            let new_mapping = NewShortMapping {
                code,
                long_url: long_url.to_string(),
                owner_id: owner_id.clone(),
            };

            match self.mappings.create(new_mapping).await {
                Ok(mapping) => return Ok(mapping),
                Err(AppError::Conflict { .. }) => {
                    debug!("Generated code was taken concurrently, drawing again");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::GenerationExhausted {
            attempts: INSERT_ATTEMPTS,
        })
    }

    /// Resolves `code` to its long URL and counts the visit.
    ///
    /// - **Cache hit**: increment the counter, queue the visit, return.
    /// - **Cache miss**: load from the store, repopulate the mapping entry,
    ///   seed a zero counter if absent, then increment.
    /// - **Cache unavailable**: serve from the store and count the visit
    ///   directly in the durable total.
    ///
    /// Visit persistence is queued and never awaited.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidFormat`] if `code` is not 6 alphanumerics (no I/O is done)
    /// - [`AppError::NotFound`] if the store has no such code
    /// - [`AppError::StoreUnavailable`] if the store fails on a miss
    pub async fn resolve(&self, code: &str, context: ClientContext) -> Result<String, AppError> {
        validate_code(code)?;

        let cache_usable = match self.cache.get_mapping(code).await {
            Ok(Some(long_url)) => {
                metrics::counter!("cache_hits_total").increment(1);
                self.count_visit(code).await;
                self.enqueue_visit(code, context);
                return Ok(long_url);
            }
            Ok(None) => {
                metrics::counter!("cache_misses_total").increment(1);
                true
            }
            Err(e) => {
                metrics::counter!("cache_fallbacks_total").increment(1);
                log_cache_fault("lookup", code, &e);
                false
            }
        };

        let mapping = self.mappings.find_by_code(code).await?.ok_or_else(|| {
            AppError::not_found("Short code not found", json!({ "code": code }))
        })?;

        if cache_usable {
            self.warm_cache(code, &mapping.long_url).await;
            self.count_visit(code).await;
        } else {
            self.count_visit_durably(code).await;
        }

        self.enqueue_visit(code, context);

        Ok(mapping.long_url)
    }

    /// Lists an owner's mappings with up to `recent` visits each.
    ///
    /// `None` uses the configured default limit.
    pub async fn list_by_owner(
        &self,
        owner_id: &str,
        recent: Option<i64>,
    ) -> Result<Vec<MappingWithVisits>, AppError> {
        let mappings = self.mappings.list_by_owner(owner_id).await?;
        self.attach_recent_visits(mappings, recent).await
    }

    /// Lists mappings created without an owner, with recent visits.
    pub async fn list_unowned(
        &self,
        recent: Option<i64>,
    ) -> Result<Vec<MappingWithVisits>, AppError> {
        let mappings = self.mappings.list_unowned().await?;
        self.attach_recent_visits(mappings, recent).await
    }

    /// Whether the durable store answers.
    pub async fn store_healthy(&self) -> Result<i64, AppError> {
        self.mappings.count().await
    }

    /// Returns `(is_open, free_slots)` of the visit queue.
    pub fn visit_queue_status(&self) -> (bool, usize) {
        (!self.visit_sender.is_closed(), self.visit_sender.capacity())
    }

    /// Puts the mapping entry in place and seeds a zero counter if absent.
    ///
    /// The counter only holds visits not yet folded into the store, so the
    /// seed never depends on the durable total read earlier.
    async fn warm_cache(&self, code: &str, long_url: &str) {
        if let Err(e) = self
            .cache
            .set_mapping(code, long_url, self.settings.mapping_ttl_seconds)
            .await
        {
            log_cache_fault("mapping write", code, &e);
            return;
        }

        match self.cache.init_counter(code, 0).await {
            Ok(true) => debug!("Seeded counter for {}", code),
            Ok(false) => debug!("Counter for {} already present, keeping it", code),
            Err(e) => log_cache_fault("counter seed", code, &e),
        }
    }

    async fn count_visit(&self, code: &str) {
        match self.cache.incr_counter(code).await {
            Ok(n) => debug!("Counter for {} is now {}", code, n),
            Err(e) => {
                log_cache_fault("counter increment", code, &e);
                self.count_visit_durably(code).await;
            }
        }
    }

    async fn count_visit_durably(&self, code: &str) {
        if let Err(e) = self.mappings.increment_visits(code, 1).await {
            error!("Failed to count visit for {} in store: {}", code, e);
        }
    }

    fn enqueue_visit(&self, code: &str, context: ClientContext) {
        match self.visit_sender.try_send(VisitEvent::new(code, context)) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                metrics::counter!("visit_events_dropped_total").increment(1);
                warn!("Visit queue full, dropping visit for {}", event.code);
            }
            Err(TrySendError::Closed(event)) => {
                metrics::counter!("visit_events_dropped_total").increment(1);
                error!("Visit queue closed, dropping visit for {}", event.code);
            }
        }
    }

    /// Joins recent visits onto mappings and orders by latest visit.
    ///
    /// Mappings with visits come first, most recently visited first; the rest
    /// keep the store's newest-first order.
    async fn attach_recent_visits(
        &self,
        mappings: Vec<ShortMapping>,
        recent: Option<i64>,
    ) -> Result<Vec<MappingWithVisits>, AppError> {
        if mappings.is_empty() {
            return Ok(Vec::new());
        }

        let per_mapping = recent.unwrap_or(self.settings.recent_visits_limit);
        let ids: Vec<i64> = mappings.iter().map(|m| m.id).collect();
        let visits = self.visits.recent_for_mappings(&ids, per_mapping).await?;

        let mut by_mapping: HashMap<i64, Vec<Visit>> = HashMap::new();
        for visit in visits {
            by_mapping.entry(visit.mapping_id).or_default().push(visit);
        }

        let mut listed: Vec<MappingWithVisits> = mappings
            .into_iter()
            .map(|mapping| {
                let mut recent_visits = by_mapping.remove(&mapping.id).unwrap_or_default();
                recent_visits.sort_by(|a, b| b.visited_at.cmp(&a.visited_at));
                MappingWithVisits {
                    mapping,
                    recent_visits,
                }
            })
            .collect();

        // Stable sort keeps store order among unvisited mappings.
        listed.sort_by(|a, b| b.last_visit().cmp(&a.last_visit()));

        Ok(listed)
    }
}

fn log_cache_fault(op: &str, code: &str, e: &CacheError) {
    match e {
        CacheError::Disabled => debug!("Cache disabled, skipping {} for {}", op, code),
        CacheError::Unavailable(_) => warn!("Cache {} failed for {}: {}", op, code, e),
    }
}
