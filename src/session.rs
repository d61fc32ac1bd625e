use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
    time::{Duration, Instant},
};

use serde_json::{json, Value as JsonValue};

use crate::error::{GeocodeError, SubmitError, WeatherError};
use crate::geocode_sys;
use crate::marker_sys::{FocusOutcome, LatLon, MarkerLayer, MarkerReconciler};
use crate::report::Report;
use crate::store::ReportStore;
use crate::submit_sys::{ReportDraft, SubmissionFlow};
use crate::sync_sys::ReportSynchronizer;
use crate::util::{self, Latest};
use crate::weather_sys::{self, Weather};


const SESSION_ID_LENGTH: usize = 32;
pub const STORE_UNAVAILABLE: &'static str =
    "Failed to initialize the report store. Community features may not work.";
pub const LOCATION_UNAVAILABLE: &'static str =
    "Unable to retrieve your location. Displaying weather for the default area. \
     Please ensure location permissions are granted in your browser settings.";


/// Sequence numbers of the lookups started by a position change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookupTickets {
    pub position: LatLon,
    pub weather: u64,
    pub location_name: u64,
}


/// Everything one visit of the page works with.
pub struct Session {
    identity: String,
    position: LatLon,
    show_geolocation_tip: bool,
    location_error: Option<String>,
    weather: Latest<Result<Weather, String>>,
    location_name: Latest<String>,
    sync: ReportSynchronizer,
    layer: MarkerLayer,
    reconciler: MarkerReconciler,
    reconciled_revision: Option<u64>,
    submission: SubmissionFlow,
    last_seen: Instant,
}

impl Session {
    pub fn new(identity: String, position: LatLon, store: Option<&dyn ReportStore>,
        collection: &str) -> Self {

        let sync = match store {
            Some(store) => ReportSynchronizer::start(store, collection),
            None => ReportSynchronizer::unavailable(STORE_UNAVAILABLE),
        };

        Session {
            identity,
            position,
            show_geolocation_tip: true,
            location_error: None,
            weather: Latest::default(),
            location_name: Latest::default(),
            sync,
            layer: MarkerLayer::new(position),
            reconciler: MarkerReconciler::new(),
            reconciled_revision: None,
            submission: SubmissionFlow::new(),
            last_seen: Instant::now(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn position(&self) -> LatLon {
        self.position
    }

    pub fn layer(&self) -> &MarkerLayer {
        &self.layer
    }

    pub fn submission(&self) -> &SubmissionFlow {
        &self.submission
    }

    pub fn reports(&self) -> Vec<Report> {
        self.sync.reports()
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }

    /// Brings the map in line with the latest reports and drops expired
    /// temporary markers.
    pub fn refresh(&mut self, now: Instant) {
        self.last_seen = now;

        let revision = self.sync.revision();
        if self.reconciled_revision != Some(revision) {
            let reports = self.sync.reports();
            self.reconciler.reconcile(&reports, &mut self.layer);
            self.reconciled_revision = Some(revision);
        }

        self.sweep(now);
    }

    pub fn sweep(&mut self, now: Instant) -> usize {
        self.reconciler.sweep_expired(&mut self.layer, now)
    }

    /// Moves to a position reported by the browser.
    pub fn set_position(&mut self, position: LatLon) -> LookupTickets {
        self.show_geolocation_tip = false;
        self.location_error = None;
        self.move_to(position)
    }

    /// Geolocation failed; stay on the current position and say why.
    pub fn position_unavailable(&mut self, reason: &str) -> LookupTickets {
        self.show_geolocation_tip = true;
        self.location_error = Some(reason.to_owned());
        self.move_to(self.position)
    }

    fn move_to(&mut self, position: LatLon) -> LookupTickets {
        self.position = position;
        self.layer.pan_to(position);

        LookupTickets {
            position,
            weather: self.weather.begin(),
            location_name: self.location_name.begin(),
        }
    }

    pub fn apply_weather(&mut self, seq: u64, result: Result<Weather, WeatherError>) -> bool {
        let outcome = result.map_err(|err| {
            warn!("Weather lookup failed: {}", err);
            weather_sys::describe_failure(&err)
        });

        let applied = self.weather.resolve(seq, outcome);
        if !applied {
            debug!("Dropped stale weather result {}", seq);
        }
        applied
    }

    pub fn apply_location_name(&mut self, seq: u64, result: Result<String, GeocodeError>,
        position: LatLon) -> bool {

        let applied = self.location_name.resolve(seq, geocode_sys::location_label(result, position));
        if !applied {
            debug!("Dropped stale place name {}", seq);
        }
        applied
    }

    pub fn location_name(&self) -> Option<&str> {
        self.location_name.value().map(|s| s.as_str())
    }

    pub fn request_report(&mut self, draft: ReportDraft, store_ready: bool) -> Result<(), SubmitError> {
        let identity = Some(self.identity.as_str()).filter(|id| !id.is_empty());
        self.submission.request(draft, identity, store_ready)
    }

    pub fn confirm_report(&mut self, store: &dyn ReportStore, collection: &str, now_millis: i64)
        -> Result<(), SubmitError> {

        self.submission.confirm(store, collection, &self.identity, self.position, now_millis)
    }

    pub fn cancel_report(&mut self) {
        self.submission.cancel();
    }

    pub fn dismiss_notification(&mut self) {
        self.submission.dismiss();
    }

    pub fn focus(&mut self, target: LatLon, message: &str, now: Instant) -> FocusOutcome {
        self.refresh(now);
        self.reconciler.focus(target, message, &mut self.layer, now)
    }

    pub fn view(&mut self, now: Instant) -> JsonValue {
        self.refresh(now);

        let weather = match self.weather.value() {
            Some(Ok(w)) => json!({
                "data": w,
                "icon_url": w.icon_url(),
                "error": null,
            }),
            Some(Err(err)) => json!({
                "data": null,
                "error": err,
            }),
            None => json!({
                "data": null,
                "error": null,
            }),
        };

        json!({
            "identity": self.identity,
            "position": self.position,
            "show_geolocation_tip": self.show_geolocation_tip,
            "location_error": self.location_error,
            "location_name": self.location_name(),
            "weather": weather,
            "loading_weather": self.weather.is_pending(),
            "reports": self.reports(),
            "reports_error": self.sync.error(),
            "map": self.layer.to_json(),
            "submission": {
                "state": self.submission.state(),
                "draft": self.submission.draft(),
                "notification": self.submission.notification(),
            },
        })
    }
}


/// Open sessions by session id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, session: Session) -> String {
        let mut sessions = util::write(&self.sessions);

        let id = loop {
            let id = util::generate_rand_id(SESSION_ID_LENGTH);
            if !sessions.contains_key(&id) {
                break id;
            }
        };

        sessions.insert(id.clone(), Arc::new(Mutex::new(session)));
        id
    }

    pub fn get(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        util::read(&self.sessions).get(id).cloned()
    }

    /// Dropping the session releases its report subscription.
    pub fn close(&self, id: &str) -> bool {
        util::write(&self.sessions).remove(id).is_some()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        util::read(&self.sessions).len()
    }

    fn all(&self) -> Vec<Arc<Mutex<Session>>> {
        util::read(&self.sessions).values().cloned().collect()
    }

    pub fn sweep_markers(&self, now: Instant) -> usize {
        self.all().iter()
            .map(|session| util::lock(session).sweep(now))
            .sum()
    }

    pub fn expire_idle(&self, now: Instant, limit: Duration) -> usize {
        let mut sessions = util::write(&self.sessions);
        let before = sessions.len();

        sessions.retain(|_, session| util::lock(session).idle_for(now) <= limit);

        before - sessions.len()
    }
}
