use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::auth_sys::{self, PasswordGate};
use crate::config::Config;
use crate::error::AuthError;
use crate::geocode_sys::GeocodeClient;
use crate::session::{self, Session, SessionRegistry};
use crate::store::{DbReportStore, ReportStore};
use crate::sync_sys::ReportSynchronizer;
use crate::weather_sys::WeatherClient;


const HTTP_TIMEOUT: Duration = Duration::from_secs(10);


/// Process-wide state shared by every route.
pub struct AppContext {
    pub config: Config,
    pub collection: String,
    pub store: Option<Arc<dyn ReportStore>>,
    /// Feed behind the public report map.
    pub reports: ReportSynchronizer,
    pub gate: PasswordGate,
    pub weather: WeatherClient,
    pub geocode: GeocodeClient,
    pub sessions: Arc<SessionRegistry>,
    http: reqwest::Client,
}

impl AppContext {
    pub fn new(config: Config, store: Option<Arc<dyn ReportStore>>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(config.geocode_user_agent.as_str())
            .timeout(HTTP_TIMEOUT)
            .build()?;

        let weather = WeatherClient::new(http.clone(), &config.weather_api_url,
            config.openweather_api_key.clone());
        if !weather.has_key() {
            warn!("OPENWEATHER_API_KEY is not set; weather is disabled");
        }

        let collection = config.report_collection();
        let reports = match &store {
            Some(store) => ReportSynchronizer::start(store.as_ref(), &collection),
            None => ReportSynchronizer::unavailable(session::STORE_UNAVAILABLE),
        };

        Ok(AppContext {
            collection,
            reports,
            gate: PasswordGate::new(config.secure_password.clone()),
            weather,
            geocode: GeocodeClient::new(http.clone(), &config.geocode_api_url),
            http,
            store,
            sessions: Arc::new(SessionRegistry::new()),
            config,
        })
    }

    /// Builds the context and, when a secret endpoint is configured, fetches
    /// the gate password from it once.
    pub async fn load(config: Config, store: Option<Arc<dyn ReportStore>>) -> Result<Self, reqwest::Error> {
        let mut app = Self::new(config, store)?;

        if let Some(url) = app.config.password_secret_url.clone() {
            app.gate = PasswordGate::fetch(&app.http, &url).await;
            if app.gate.is_configured() {
                info!("Loaded gate password from {}", url);
            }
        }

        Ok(app)
    }

    /// Opens the configured report store. A failure leaves the server
    /// running without community reports.
    pub fn open_store(config: &Config) -> Option<Arc<dyn ReportStore>> {
        match DbReportStore::open(&config.database_url, &config.report_collection()) {
            Ok(store) => Some(Arc::new(store)),
            Err(err) => {
                error!("Fail to open report store: {}", err);
                None
            },
        }
    }

    pub fn store_ready(&self) -> bool {
        self.store.is_some()
    }

    /// Checks the gate password and opens a session for a fresh identity.
    pub fn admit(&self, password: &str) -> Result<String, AuthError> {
        self.gate.check(password)?;

        let identity = auth_sys::issue_identity();
        let session = Session::new(identity.clone(), self.config.default_position,
            self.store.as_deref(), &self.collection);

        info!("Admitted {}", identity);

        Ok(self.sessions.open(session))
    }

    pub fn session(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.get(id)
    }
}
