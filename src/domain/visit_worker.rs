//! Background worker that persists visit events off the redirect path.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, error, info, warn};

use crate::domain::entities::{GeoInfo, NewVisit};
use crate::domain::geo::GeoLocator;
use crate::domain::repositories::VisitRepository;
use crate::domain::visit_event::VisitEvent;
use crate::error::AppError;

/// Retries after the first failed insert.
const MAX_RETRIES: usize = 3;

const USER_AGENT_MAX_CHARS: usize = 255;
const REFERRER_MAX_CHARS: usize = 2048;
const CITY_MAX_CHARS: usize = 255;

/// Drains the visit queue until every sender is dropped.
///
/// Up to `concurrency` inserts run at once. Transient store errors are
/// retried with jittered exponential backoff; anything else is logged and the
/// event is dropped. Once the channel closes, in-flight inserts are awaited
/// before returning.
pub async fn run_visit_worker(
    mut rx: mpsc::Receiver<VisitEvent>,
    visits: Arc<dyn VisitRepository>,
    geo: Arc<dyn GeoLocator>,
    concurrency: usize,
) {
    let concurrency = concurrency.max(1);
    let permits = Arc::new(Semaphore::new(concurrency));

    while let Some(event) = rx.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };

        let visits = visits.clone();
        let geo = geo.clone();
        tokio::spawn(async move {
            let _permit = permit;
            process_event(event, visits.as_ref(), geo.as_ref()).await;
        });
    }

    // Wait for in-flight inserts before reporting shutdown.
    let _ = permits.acquire_many(concurrency as u32).await;
    info!("Visit worker stopped");
}

/// Persists one event, filling geo data and retrying transient failures.
async fn process_event(event: VisitEvent, visits: &dyn VisitRepository, geo: &dyn GeoLocator) {
    let code = event.code.clone();
    let new_visit = build_visit(event, geo).await;

    let strategy = ExponentialBackoff::from_millis(10)
        .max_delay(Duration::from_secs(2))
        .map(jitter)
        .take(MAX_RETRIES);

    let result = RetryIf::start(
        strategy,
        || visits.record(new_visit.clone()),
        |e: &AppError| {
            if e.is_transient() {
                warn!("Retrying visit insert for {}: {}", new_visit.code, e);
            }
            e.is_transient()
        },
    )
    .await;

    match result {
        Ok(visit) => {
            metrics::counter!("visit_events_recorded_total").increment(1);
            debug!("Recorded visit {} for {}", visit.id, code);
        }
        Err(AppError::NotFound { .. }) => {
            metrics::counter!("visit_events_failed_total").increment(1);
            warn!("Dropping visit for unknown code {}", code);
        }
        Err(e) => {
            metrics::counter!("visit_events_failed_total").increment(1);
            error!("Failed to record visit for {}: {}", code, e);
        }
    }
}

async fn build_visit(event: VisitEvent, geo: &dyn GeoLocator) -> NewVisit {
    let VisitEvent {
        code,
        occurred_at,
        context,
    } = event;

    let located = match context.geo {
        Some(known) => known,
        None => geo.locate(&context.client_ip).await.unwrap_or_default(),
    };

    NewVisit {
        code,
        visited_at: occurred_at,
        client_ip: context.client_ip,
        user_agent: context
            .user_agent
            .map(|ua| truncate(&ua, USER_AGENT_MAX_CHARS))
            .unwrap_or_default(),
        referrer: context
            .referrer
            .filter(|r| !r.is_empty())
            .map(|r| truncate(&r, REFERRER_MAX_CHARS)),
        geo: sanitize_geo(located),
    }
}

/// Keeps only values that fit the visit columns.
fn sanitize_geo(geo: GeoInfo) -> GeoInfo {
    GeoInfo {
        country_code: geo
            .country_code
            .filter(|c| c.len() == 2 && c.chars().all(|ch| ch.is_ascii_alphabetic()))
            .map(|c| c.to_ascii_uppercase()),
        city: geo
            .city
            .filter(|c| !c.is_empty())
            .map(|c| truncate(&c, CITY_MAX_CHARS)),
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Visit;
    use crate::domain::geo::NoGeoLocator;
    use crate::domain::repositories::MockVisitRepository;
    use crate::domain::visit_event::ClientContext;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedGeo;

    #[async_trait]
    impl GeoLocator for FixedGeo {
        async fn locate(&self, _ip: &str) -> Option<GeoInfo> {
            Some(GeoInfo {
                country_code: Some("nl".to_string()),
                city: Some("Amsterdam".to_string()),
            })
        }
    }

    fn stored(new_visit: &NewVisit) -> Visit {
        Visit {
            id: 1,
            mapping_id: 1,
            visited_at: new_visit.visited_at,
            client_ip: new_visit.client_ip.clone(),
            user_agent: new_visit.user_agent.clone(),
            referrer: new_visit.referrer.clone(),
            country_code: new_visit.geo.country_code.clone(),
            city: new_visit.geo.city.clone(),
        }
    }

    #[tokio::test]
    async fn test_build_visit_uses_locator_when_context_has_no_geo() {
        let event = VisitEvent::new("abc123", ClientContext::new("8.8.8.8"));
        let visit = build_visit(event, &FixedGeo).await;

        assert_eq!(visit.geo.country_code.as_deref(), Some("NL"));
        assert_eq!(visit.geo.city.as_deref(), Some("Amsterdam"));
    }

    #[tokio::test]
    async fn test_build_visit_prefers_context_geo() {
        let ctx = ClientContext::new("8.8.8.8").with_geo(GeoInfo {
            country_code: Some("FR".to_string()),
            city: None,
        });
        let visit = build_visit(VisitEvent::new("abc123", ctx), &FixedGeo).await;

        assert_eq!(visit.geo.country_code.as_deref(), Some("FR"));
        assert!(visit.geo.city.is_none());
    }

    #[tokio::test]
    async fn test_build_visit_truncates_and_defaults() {
        let long_agent = "a".repeat(400);
        let ctx = ClientContext::new("10.0.0.1")
            .with_user_agent(Some(&long_agent))
            .with_referrer(Some(""));
        let visit = build_visit(VisitEvent::new("abc123", ctx), &NoGeoLocator).await;

        assert_eq!(visit.user_agent.chars().count(), USER_AGENT_MAX_CHARS);
        assert!(visit.referrer.is_none());
        assert!(visit.geo.is_empty());

        let bare = build_visit(
            VisitEvent::new("abc123", ClientContext::new("10.0.0.1")),
            &NoGeoLocator,
        )
        .await;
        assert_eq!(bare.user_agent, "");
    }

    #[test]
    fn test_sanitize_geo_drops_malformed_country() {
        let geo = sanitize_geo(GeoInfo {
            country_code: Some("USA".to_string()),
            city: Some(String::new()),
        });
        assert!(geo.is_empty());
    }

    #[tokio::test]
    async fn test_process_event_retries_transient_errors() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();

        let mut repo = MockVisitRepository::new();
        repo.expect_record().times(3).returning(move |v| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AppError::StoreUnavailable("connection reset".into()))
            } else {
                Ok(stored(&v))
            }
        });

        let event = VisitEvent::new("abc123", ClientContext::new("1.1.1.1"));
        process_event(event, &repo, &NoGeoLocator).await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_process_event_gives_up_after_bounded_retries() {
        let mut repo = MockVisitRepository::new();
        repo.expect_record()
            .times(MAX_RETRIES + 1)
            .returning(|_| Err(AppError::StoreUnavailable("down".into())));

        let event = VisitEvent::new("abc123", ClientContext::new("1.1.1.1"));
        process_event(event, &repo, &NoGeoLocator).await;
    }

    #[tokio::test]
    async fn test_process_event_does_not_retry_unknown_code() {
        let mut repo = MockVisitRepository::new();
        repo.expect_record()
            .times(1)
            .returning(|_| Err(AppError::not_found("Short code not found", json!({}))));

        let event = VisitEvent::new("nope00", ClientContext::new("1.1.1.1"));
        process_event(event, &repo, &NoGeoLocator).await;
    }

    #[tokio::test]
    async fn test_worker_drains_queue_before_exit() {
        let mut repo = MockVisitRepository::new();
        repo.expect_record().times(5).returning(|v| Ok(stored(&v)));

        let (tx, rx) = mpsc::channel(16);
        for i in 0..5 {
            tx.send(VisitEvent::new(
                format!("code0{i}"),
                ClientContext::new("127.0.0.1"),
            ))
            .await
            .unwrap();
        }
        drop(tx);

        run_visit_worker(rx, Arc::new(repo), Arc::new(NoGeoLocator), 2).await;
    }

    #[tokio::test]
    async fn test_event_time_is_preserved() {
        let event = VisitEvent::new("abc123", ClientContext::new("1.1.1.1"));
        let at = event.occurred_at;
        let visit = build_visit(event, &NoGeoLocator).await;

        assert_eq!(visit.visited_at, at);
        assert!(visit.visited_at <= Utc::now());
    }
}
