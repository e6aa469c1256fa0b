//! Deterministic in-memory [`ItemSource`] for tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;

use crate::{
    source::{
        Breadcrumb, ExtractionRequest, ExtractionScope, FetchError, FetchResult, ItemSource,
        RawExtraction, RawStatics,
    },
    state::item::TrackedItemId,
};

/// What the scripted source does for one call.
#[derive(Debug, Clone)]
pub enum Step {
    /// Answer immediately.
    Respond(RawExtraction),
    /// Answer after a delay.
    Slow(Duration, RawExtraction),
    /// Fail immediately.
    Fail(FetchError),
    /// Never answer.
    Hang,
}

/// Source replaying per-item scripts; the last step of a script repeats forever.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<TrackedItemId, VecDeque<Step>>>,
    calls: Mutex<Vec<ExtractionRequest>>,
    unhealthy: AtomicBool,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the script for `item_id`.
    pub fn script(&self, item_id: &str, steps: impl IntoIterator<Item = Step>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(item_id.into(), steps.into_iter().collect());
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Scopes requested for `item_id`, in call order.
    pub fn scopes(&self, item_id: &str) -> Vec<ExtractionScope> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.item_id.as_str() == item_id)
            .map(|request| request.scope)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self, item_id: &TrackedItemId) -> Step {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(item_id) {
            Some(steps) if steps.len() > 1 => steps.pop_front().unwrap(),
            Some(steps) => steps.front().cloned().unwrap_or(Step::Hang),
            None => Step::Fail(FetchError::extraction(item_id, "no script")),
        }
    }
}

impl ItemSource for ScriptedSource {
    fn extract(&self, request: ExtractionRequest) -> BoxFuture<'static, FetchResult<RawExtraction>> {
        let step = self.next_step(&request.item_id);
        self.calls.lock().unwrap().push(request);

        let in_flight = self.in_flight.clone();
        let max_in_flight = self.max_in_flight.clone();
        Box::pin(async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_in_flight.fetch_max(now, Ordering::SeqCst);
            let result = match step {
                Step::Respond(raw) => Ok(raw),
                Step::Slow(delay, raw) => {
                    tokio::time::sleep(delay).await;
                    Ok(raw)
                }
                Step::Fail(err) => Err(err),
                Step::Hang => std::future::pending().await,
            };
            in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }

    fn health_check(&self) -> BoxFuture<'static, FetchResult<()>> {
        let unhealthy = self.unhealthy.load(Ordering::SeqCst);
        Box::pin(async move {
            if unhealthy {
                Err(FetchError::Unavailable("browser not ready".into()))
            } else {
                Ok(())
            }
        })
    }
}

/// Page with static and volatile fields, as returned for a full extraction.
pub fn full_page(country: &str, league: &str, home: &str, away: &str, phase: &str) -> RawExtraction {
    RawExtraction {
        statics: Some(RawStatics {
            breadcrumbs: vec![
                Breadcrumb {
                    text: "Football".into(),
                    href: Some("/football/".into()),
                },
                Breadcrumb {
                    text: country.into(),
                    href: None,
                },
                Breadcrumb {
                    text: league.into(),
                    href: Some(format!("/football/{}/", country.to_lowercase())),
                },
            ],
            home_name: Some(format!("{league} home")),
            away_name: Some(format!("{league} away")),
            ..RawStatics::default()
        }),
        ..score_page(home, away, phase)
    }
}

/// Page with only the score and status blocks.
pub fn score_page(home: &str, away: &str, phase: &str) -> RawExtraction {
    RawExtraction {
        score_spans: vec![home.into(), "-".into(), away.into()],
        status_spans: vec![phase.into()],
        ..RawExtraction::default()
    }
}

/// Fresh [`SharedState`] wired to a scripted source and a manual clock.
pub fn shared_state(
    config: crate::config::AppConfig,
) -> (
    crate::state::SharedState,
    Arc<ScriptedSource>,
    Arc<crate::state::clock::ManualClock>,
) {
    let source = Arc::new(ScriptedSource::new());
    let clock = Arc::new(crate::state::clock::ManualClock::new(
        std::time::SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
    ));
    let state = crate::state::AppState::new(config, source.clone(), clock.clone());
    (state, source, clock)
}
