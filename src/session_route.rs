use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use rocket::{
    catch, get, post, FromForm, State, Request,
    form::Form,
    http::{Cookie, CookieJar, Status},
    outcome::Outcome,
    request::{self, FromRequest},
    response::status,
    serde::json::Json,
};
use serde_json::{json, Value as JsonValue};

use crate::beacon_sys::{self, Beacon, BeaconStatus};
use crate::context::AppContext;
use crate::error::AuthError;
use crate::marker_sys::LatLon;
use crate::session::{LookupTickets, Session, SessionRegistry, LOCATION_UNAVAILABLE};
use crate::task_scheduler::{Task, TaskSchedulerBuilder};
use crate::util;


pub type JsonResponse = status::Custom<Json<JsonValue>>;

pub const SESSION_COOKIE: &'static str = "session_id";
const MARKER_SWEEP_PERIOD: Duration = Duration::from_secs(1);
const SESSION_EXPIRY_PERIOD: Duration = Duration::from_secs(60);


pub fn json_response(status: Status, body: JsonValue) -> JsonResponse {
    status::Custom(status, Json(body))
}

pub fn invalid_coordinates() -> JsonResponse {
    json_response(Status::UnprocessableEntity, json!({
        "success": false,
        "message": "Invalid coordinates.",
    }))
}


/// A session opened through the password gate.
pub struct ActiveSession(pub Arc<Mutex<Session>>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ActiveSession {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let app = match req.rocket().state::<AppContext>() {
            Some(app) => app,
            None => return Outcome::Error((Status::InternalServerError, ())),
        };

        let session = req.cookies()
            .get_private(SESSION_COOKIE)
            .and_then(|cookie| app.session(cookie.value()));

        match session {
            Some(session) => Outcome::Success(ActiveSession(session)),
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

#[catch(401)]
pub fn unauthorized() -> Json<JsonValue> {
    Json(json!({
        "success": false,
        "message": "Please enter the password first.",
    }))
}


#[derive(FromForm)]
pub struct PasswordForm {
    password: String,
}

#[derive(FromForm)]
pub struct LocationForm {
    latitude: f64,
    longitude: f64,
}

impl LocationForm {
    pub fn position(&self) -> Option<LatLon> {
        LatLon::checked(self.latitude, self.longitude)
    }
}

#[derive(FromForm)]
pub struct UnavailableForm {
    reason: Option<String>,
}

#[derive(FromForm)]
pub struct BeaconForm {
    status: BeaconStatus,
    location: Option<String>,
    custom_message: Option<String>,
    contact_number: Option<String>,
}


#[post("/api/check-password", data = "<form>")]
pub fn check_password(form: Form<PasswordForm>, cookies: &CookieJar<'_>, app: &State<AppContext>)
    -> JsonResponse {

    match app.admit(&form.password) {
        Ok(id) => {
            if let Some(old) = cookies.get_private(SESSION_COOKIE) {
                app.sessions.close(old.value());
            }
            cookies.add_private(Cookie::new(SESSION_COOKIE, id));

            json_response(Status::Ok, json!({ "success": true }))
        },
        Err(err) => {
            let status = match err {
                AuthError::Misconfigured => {
                    error!("Password gate is not configured");
                    Status::InternalServerError
                },
                AuthError::IncorrectPassword => Status::Unauthorized,
            };

            json_response(status, json!({
                "success": false,
                "message": err.to_string(),
            }))
        },
    }
}

#[post("/api/logout")]
pub fn logout(cookies: &CookieJar<'_>, app: &State<AppContext>) -> Json<JsonValue> {
    let closed = cookies.get_private(SESSION_COOKIE)
        .map(|cookie| app.sessions.close(cookie.value()))
        .unwrap_or(false);

    cookies.remove_private(Cookie::new(SESSION_COOKIE, ""));

    Json(json!({ "success": closed }))
}

#[get("/api/session")]
pub fn get_session(session: ActiveSession) -> Json<JsonValue> {
    Json(util::lock(&session.0).view(Instant::now()))
}

#[post("/api/location", data = "<form>")]
pub fn post_location(form: Form<LocationForm>, session: ActiveSession, app: &State<AppContext>)
    -> JsonResponse {

    let position = match form.position() {
        Some(position) => position,
        None => return invalid_coordinates(),
    };

    let tickets = util::lock(&session.0).set_position(position);
    start_lookups(app, session.0, tickets);

    json_response(Status::Ok, json!({
        "success": true,
        "position": position,
    }))
}

#[post("/api/location/unavailable", data = "<form>")]
pub fn location_unavailable(form: Form<UnavailableForm>, session: ActiveSession,
    app: &State<AppContext>) -> Json<JsonValue> {

    if let Some(reason) = &form.reason {
        info!("Geolocation unavailable: {}", reason);
    }

    let tickets = util::lock(&session.0).position_unavailable(LOCATION_UNAVAILABLE);
    start_lookups(app, session.0, tickets);

    Json(json!({
        "success": true,
        "message": LOCATION_UNAVAILABLE,
    }))
}

#[post("/api/beacon", data = "<form>")]
pub fn post_beacon(form: Form<BeaconForm>, session: ActiveSession) -> Json<JsonValue> {
    let session = util::lock(&session.0);

    let location = form.location.clone()
        .filter(|l| !l.trim().is_empty())
        .or_else(|| session.location_name().map(|name| name.to_owned()))
        .unwrap_or_default();

    let beacon = Beacon {
        status: form.status,
        location,
        custom_message: form.custom_message.clone().unwrap_or_default(),
        contact_number: form.contact_number.clone().unwrap_or_default(),
    };
    let message = beacon.compose(session.position());

    Json(json!({
        "sms_link": beacon_sys::sms_link(&message),
        "message": message,
    }))
}


/// Runs the weather and place name lookups for a position change. Results
/// land in the session only if no newer lookup was started meanwhile.
fn start_lookups(app: &AppContext, session: Arc<Mutex<Session>>, tickets: LookupTickets) {
    let weather = app.weather.clone();
    let t_session = session.clone();
    rocket::tokio::spawn(async move {
        let result = weather.fetch(tickets.position).await;
        util::lock(&t_session).apply_weather(tickets.weather, result);
    });

    let geocode = app.geocode.clone();
    rocket::tokio::spawn(async move {
        let result = geocode.reverse(tickets.position).await;
        util::lock(&session).apply_location_name(tickets.location_name, result, tickets.position);
    });
}


pub fn init_session_jobs(builder: &mut TaskSchedulerBuilder, sessions: Arc<SessionRegistry>,
    idle_limit: Duration) {

    let t_sessions = sessions.clone();
    builder.add_task(Task::new("marker sweep", move || {
        let removed = t_sessions.sweep_markers(Instant::now());
        if removed > 0 {
            debug!("Removed {} temporary markers", removed);
        }
        MARKER_SWEEP_PERIOD
    }, MARKER_SWEEP_PERIOD));

    builder.add_task(Task::new("session expiry", move || {
        let expired = sessions.expire_idle(Instant::now(), idle_limit);
        if expired > 0 {
            info!("Closed {} idle sessions", expired);
        }
        SESSION_EXPIRY_PERIOD
    }, SESSION_EXPIRY_PERIOD));
}
