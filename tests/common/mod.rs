#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::ConnectInfo;
use cached_shortener::application::services::{
    ReconciliationJob, RedirectResolver, ResolverSettings,
};
use cached_shortener::domain::entities::{NewShortMapping, NewVisit, ShortMapping, Visit};
use cached_shortener::domain::repositories::{MappingRepository, VisitRepository};
use cached_shortener::domain::visit_event::VisitEvent;
use cached_shortener::error::AppError;
use cached_shortener::infrastructure::cache::{CacheError, CacheResult, CacheService, MemoryCache};
use cached_shortener::state::AppState;
use chrono::Utc;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tower::Layer;

// ── Durable store ───────────────────────────────────────────────────────────

#[derive(Default)]
struct StoreInner {
    mappings: Vec<ShortMapping>,
    visits: Vec<Visit>,
}

/// In-memory stand-in for PostgreSQL with fault injection.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<StoreInner>,
    down: AtomicBool,
    failing_writes: Mutex<HashSet<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail with `StoreUnavailable`.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Makes `increment_visits` fail for one code.
    pub fn fail_writes_for(&self, code: &str) {
        self.failing_writes.lock().unwrap().insert(code.to_string());
    }

    pub fn clear_write_failures(&self) {
        self.failing_writes.lock().unwrap().clear();
    }

    pub fn visits_of(&self, code: &str) -> Option<i64> {
        let inner = self.inner.lock().unwrap();
        inner
            .mappings
            .iter()
            .find(|m| m.code == code)
            .map(|m| m.visits)
    }

    pub fn recorded_visits(&self) -> usize {
        self.inner.lock().unwrap().visits.len()
    }

    /// Inserts a mapping directly, bypassing the resolver.
    pub fn seed(&self, code: &str, long_url: &str, owner_id: Option<&str>, visits: i64) {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let id = inner.mappings.len() as i64 + 1;
        inner.mappings.push(ShortMapping::new(
            id,
            code.to_string(),
            long_url.to_string(),
            owner_id.map(String::from),
            visits,
            now,
            now,
        ));
    }

    fn check(&self) -> Result<(), AppError> {
        if self.down.load(Ordering::SeqCst) {
            Err(AppError::StoreUnavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

fn newest_first(mut mappings: Vec<ShortMapping>) -> Vec<ShortMapping> {
    mappings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    mappings
}

#[async_trait]
impl MappingRepository for InMemoryStore {
    async fn create(&self, new_mapping: NewShortMapping) -> Result<ShortMapping, AppError> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();

        if inner.mappings.iter().any(|m| m.code == new_mapping.code) {
            return Err(AppError::conflict(
                "Unique constraint violation",
                json!({ "constraint": "short_mappings_code_key" }),
            ));
        }

        let now = Utc::now();
        let mapping = ShortMapping::new(
            inner.mappings.len() as i64 + 1,
            new_mapping.code,
            new_mapping.long_url,
            new_mapping.owner_id,
            0,
            now,
            now,
        );
        inner.mappings.push(mapping.clone());
        Ok(mapping)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ShortMapping>, AppError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.mappings.iter().find(|m| m.code == code).cloned())
    }

    async fn exists(&self, code: &str) -> Result<bool, AppError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.mappings.iter().any(|m| m.code == code))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ShortMapping>, AppError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(newest_first(
            inner
                .mappings
                .iter()
                .filter(|m| m.owner_id.as_deref() == Some(owner_id))
                .cloned()
                .collect(),
        ))
    }

    async fn list_unowned(&self) -> Result<Vec<ShortMapping>, AppError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(newest_first(
            inner
                .mappings
                .iter()
                .filter(|m| m.owner_id.is_none())
                .cloned()
                .collect(),
        ))
    }

    async fn page_after(&self, after_id: i64, limit: i64) -> Result<Vec<ShortMapping>, AppError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .mappings
            .iter()
            .filter(|m| m.id > after_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn increment_visits(&self, code: &str, by: i64) -> Result<(), AppError> {
        self.check()?;
        if self.failing_writes.lock().unwrap().contains(code) {
            return Err(AppError::StoreUnavailable("deadlock detected".into()));
        }

        let mut inner = self.inner.lock().unwrap();
        if let Some(m) = inner.mappings.iter_mut().find(|m| m.code == code) {
            m.visits += by;
            m.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64, AppError> {
        self.check()?;
        Ok(self.inner.lock().unwrap().mappings.len() as i64)
    }

    async fn total_visits(&self) -> Result<i64, AppError> {
        self.check()?;
        Ok(self.inner.lock().unwrap().mappings.iter().map(|m| m.visits).sum())
    }
}

#[async_trait]
impl VisitRepository for InMemoryStore {
    async fn record(&self, new_visit: NewVisit) -> Result<Visit, AppError> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();

        let mapping_id = inner
            .mappings
            .iter()
            .find(|m| m.code == new_visit.code)
            .map(|m| m.id)
            .ok_or_else(|| AppError::not_found("Short code not found", json!({})))?;

        let visit = Visit {
            id: inner.visits.len() as i64 + 1,
            mapping_id,
            visited_at: new_visit.visited_at,
            client_ip: new_visit.client_ip,
            user_agent: new_visit.user_agent,
            referrer: new_visit.referrer,
            country_code: new_visit.geo.country_code,
            city: new_visit.geo.city,
        };
        inner.visits.push(visit.clone());
        Ok(visit)
    }

    async fn recent_for_mappings(
        &self,
        mapping_ids: &[i64],
        per_mapping: i64,
    ) -> Result<Vec<Visit>, AppError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();

        let mut out = Vec::new();
        for id in mapping_ids {
            let mut visits: Vec<Visit> = inner
                .visits
                .iter()
                .filter(|v| v.mapping_id == *id)
                .cloned()
                .collect();
            visits.sort_by(|a, b| b.visited_at.cmp(&a.visited_at).then(b.id.cmp(&a.id)));
            out.extend(visits.into_iter().take(per_mapping as usize));
        }
        Ok(out)
    }

    async fn count(&self) -> Result<i64, AppError> {
        self.check()?;
        Ok(self.inner.lock().unwrap().visits.len() as i64)
    }
}

// ── Cache ───────────────────────────────────────────────────────────────────

/// [`MemoryCache`] that can be switched to report itself unreachable, and
/// that can run a one-shot hook in front of a chosen call.
#[derive(Default)]
pub struct FlakyCache {
    inner: MemoryCache,
    down: AtomicBool,
    hooks: Mutex<HashMap<CacheOp, Hook>>,
}

/// Cache calls a test can run code in front of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOp {
    GetMapping,
    SetMapping,
    InitCounter,
    IncrCounter,
    GetCounters,
    SubtractCounter,
}

type Hook = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

impl FlakyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.inner
    }

    /// Runs `hook` to completion right before the next `op` reaches the
    /// backend. Fires once.
    pub fn before_next<F, Fut>(&self, op: CacheOp, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks
            .lock()
            .unwrap()
            .insert(op, Box::new(move || Box::pin(hook())));
    }

    async fn enter(&self, op: CacheOp) -> CacheResult<()> {
        let hook = self.hooks.lock().unwrap().remove(&op);
        if let Some(hook) = hook {
            hook().await;
        }
        self.check()
    }

    fn check(&self) -> CacheResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(CacheError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheService for FlakyCache {
    async fn get_mapping(&self, code: &str) -> CacheResult<Option<String>> {
        self.enter(CacheOp::GetMapping).await?;
        self.inner.get_mapping(code).await
    }

    async fn set_mapping(
        &self,
        code: &str,
        long_url: &str,
        ttl_seconds: Option<u64>,
    ) -> CacheResult<()> {
        self.enter(CacheOp::SetMapping).await?;
        self.inner.set_mapping(code, long_url, ttl_seconds).await
    }

    async fn init_counter(&self, code: &str, value: i64) -> CacheResult<bool> {
        self.enter(CacheOp::InitCounter).await?;
        self.inner.init_counter(code, value).await
    }

    async fn incr_counter(&self, code: &str) -> CacheResult<i64> {
        self.enter(CacheOp::IncrCounter).await?;
        self.inner.incr_counter(code).await
    }

    async fn get_counters(&self, codes: &[String]) -> CacheResult<Vec<Option<i64>>> {
        self.enter(CacheOp::GetCounters).await?;
        self.inner.get_counters(codes).await
    }

    async fn subtract_counter(&self, code: &str, delta: i64) -> CacheResult<Option<i64>> {
        self.enter(CacheOp::SubtractCounter).await?;
        self.inner.subtract_counter(code, delta).await
    }

    async fn health_check(&self) -> bool {
        !self.down.load(Ordering::SeqCst)
    }

    fn backend(&self) -> &'static str {
        "flaky-memory"
    }
}

// ── Wiring ──────────────────────────────────────────────────────────────────

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<FlakyCache>,
    pub resolver: Arc<RedirectResolver>,
    pub job: Arc<ReconciliationJob>,
    pub visit_rx: mpsc::Receiver<VisitEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_queue_capacity(1024)
    }

    pub fn with_queue_capacity(capacity: usize) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(FlakyCache::new());
        let (tx, rx) = mpsc::channel(capacity);

        let resolver = Arc::new(RedirectResolver::new(
            store.clone(),
            store.clone(),
            cache.clone(),
            tx,
            ResolverSettings::default(),
        ));
        let job = Arc::new(ReconciliationJob::new(store.clone(), cache.clone(), 2));

        Self {
            store,
            cache,
            resolver,
            job,
            visit_rx: rx,
        }
    }

    pub fn state(&self) -> AppState {
        AppState::new(
            self.resolver.clone(),
            self.cache.clone(),
            "http://sho.rt",
            false,
        )
    }

    pub fn counter(&self, code: &str) -> Option<i64> {
        self.cache.memory().counter(code)
    }

    /// Drains queued visit events without persisting them.
    pub fn drain_events(&mut self) -> Vec<VisitEvent> {
        let mut events = Vec::new();
        while let Ok(e) = self.visit_rx.try_recv() {
            events.push(e);
        }
        events
    }
}

// ── HTTP ────────────────────────────────────────────────────────────────────

/// Inserts a fixed peer address, as `into_make_service_with_connect_info` would.
#[derive(Clone)]
pub struct MockConnectInfoLayer;

impl<S> Layer<S> for MockConnectInfoLayer {
    type Service = MockConnectInfoService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MockConnectInfoService { inner }
    }
}

#[derive(Clone)]
pub struct MockConnectInfoService<S> {
    inner: S,
}

impl<S, B> tower::Service<axum::http::Request<B>> for MockConnectInfoService<S>
where
    S: tower::Service<axum::http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        let addr: SocketAddr = "127.0.0.1:12345".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        self.inner.call(req)
    }
}
