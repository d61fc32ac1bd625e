use std::time::Instant;
use rocket::{
    get, post, FromForm, State,
    form::Form,
    http::Status,
    serde::json::Json,
};
use serde_json::{json, Value as JsonValue};

use crate::context::AppContext;
use crate::error::SubmitError;
use crate::marker_sys::{FocusOutcome, LatLon};
use crate::report::FloodLevel;
use crate::session::Session;
use crate::session_route::{invalid_coordinates, json_response, ActiveSession, JsonResponse};
use crate::submit_sys::ReportDraft;
use crate::util;


#[derive(FromForm)]
pub struct ReportForm {
    flood_level: String,
    message: Option<String>,
}

#[derive(FromForm)]
pub struct FocusForm {
    latitude: f64,
    longitude: f64,
    message: Option<String>,
}


fn submission_json(session: &Session) -> JsonValue {
    let flow = session.submission();

    json!({
        "state": flow.state(),
        "draft": flow.draft(),
        "notification": flow.notification(),
    })
}

fn submit_failure(err: &SubmitError, session: &Session) -> JsonResponse {
    let status = match err {
        SubmitError::NotReady => Status::ServiceUnavailable,
        SubmitError::NotAwaitingConfirmation => Status::Conflict,
        SubmitError::Write(_) => Status::BadGateway,
    };

    json_response(status, json!({
        "success": false,
        "message": err.to_string(),
        "submission": submission_json(session),
    }))
}


#[get("/report-map")]
pub fn get_report_map(app: &State<AppContext>) -> Json<JsonValue> {
    let reports = app.reports.reports();

    Json(json!({
        "size": reports.len(),
        "reports": reports,
        "live": app.reports.is_live(),
        "error": app.reports.error(),
    }))
}

#[post("/api/report/request", data = "<form>")]
pub fn request_report(form: Form<ReportForm>, session: ActiveSession, app: &State<AppContext>)
    -> JsonResponse {

    let draft = ReportDraft {
        flood_level: FloodLevel::from(form.flood_level.clone()),
        message: form.message.clone().unwrap_or_default(),
    };

    let mut session = util::lock(&session.0);
    match session.request_report(draft, app.store_ready()) {
        Ok(()) => json_response(Status::Ok, json!({
            "success": true,
            "submission": submission_json(&session),
        })),
        Err(err) => submit_failure(&err, &session),
    }
}

#[post("/api/report/confirm")]
pub fn confirm_report(session: ActiveSession, app: &State<AppContext>) -> JsonResponse {
    let mut session = util::lock(&session.0);

    let result = match &app.store {
        Some(store) => session.confirm_report(store.as_ref(), &app.collection, util::now_millis()),
        None => Err(SubmitError::NotReady),
    };

    match result {
        Ok(()) => json_response(Status::Ok, json!({
            "success": true,
            "submission": submission_json(&session),
        })),
        Err(err) => {
            warn!("Report from {} not sent: {}", session.identity(), err);
            submit_failure(&err, &session)
        },
    }
}

#[post("/api/report/cancel")]
pub fn cancel_report(session: ActiveSession) -> Json<JsonValue> {
    let mut session = util::lock(&session.0);
    session.cancel_report();

    Json(json!({
        "success": true,
        "submission": submission_json(&session),
    }))
}

#[post("/api/report/dismiss")]
pub fn dismiss_notification(session: ActiveSession) -> Json<JsonValue> {
    let mut session = util::lock(&session.0);
    session.dismiss_notification();

    Json(json!({
        "success": true,
        "submission": submission_json(&session),
    }))
}

#[post("/api/focus", data = "<form>")]
pub fn focus(form: Form<FocusForm>, session: ActiveSession) -> JsonResponse {
    let target = match LatLon::checked(form.latitude, form.longitude) {
        Some(target) => target,
        None => return invalid_coordinates(),
    };
    let message = form.message.as_deref().unwrap_or("");

    let mut session = util::lock(&session.0);
    let (temporary, id) = match session.focus(target, message, Instant::now()) {
        FocusOutcome::Existing(id) => (false, id),
        FocusOutcome::Temporary(id) => (true, id),
    };

    json_response(Status::Ok, json!({
        "marker": id,
        "temporary": temporary,
        "map": session.layer().to_json(),
    }))
}


#[cfg(test)]
mod tests {
    use rocket::http::ContentType;
    use crate::session_route::tests::{client, login};
    use super::*;

    fn post_form(client: &rocket::local::blocking::Client, uri: &'static str, body: &str)
        -> (Status, JsonValue) {

        let res = client.post(uri)
            .header(ContentType::Form)
            .body(body.to_owned())
            .dispatch();
        let status = res.status();

        (status, res.into_json().unwrap())
    }

    #[test]
    fn report_routes_need_session() {
        let client = client(Some("letmein"));

        let (status, _) = post_form(&client, "/api/report/request", "flood_level=All%20Good!");
        assert_eq!(status, Status::Unauthorized);
    }

    #[test]
    fn request_then_confirm_publishes_report() {
        let client = client(Some("letmein"));
        login(&client, "letmein");

        let (status, body) = post_form(&client, "/api/report/request",
            "flood_level=Minor%20Injury&message=Baha%20na%20dito");
        assert_eq!(status, Status::Ok);
        assert_eq!(body["submission"]["state"], "awaiting_confirmation");
        assert_eq!(body["submission"]["notification"]["needs_answer"], true);

        let (status, body) = post_form(&client, "/api/report/confirm", "");
        assert_eq!(status, Status::Ok);
        assert_eq!(body["submission"]["state"], "succeeded");
        assert_eq!(body["submission"]["notification"]["message"], "Report successfully sent!");
        assert_eq!(body["submission"]["draft"]["message"], "");

        let map: JsonValue = client.get("/report-map").dispatch().into_json().unwrap();
        assert_eq!(map["live"], true);
        assert_eq!(map["size"], 1);
        assert_eq!(map["reports"][0]["floodLevel"], "Minor Injury");
        assert_eq!(map["reports"][0]["message"], "Baha na dito");

        let view: JsonValue = client.get("/api/session").dispatch().into_json().unwrap();
        assert_eq!(view["map"]["size"], 1);
        assert_eq!(view["map"]["markers"][0]["color"], "#8BC34A");
    }

    #[test]
    fn confirm_without_request_conflicts() {
        let client = client(Some("letmein"));
        login(&client, "letmein");

        let (status, body) = post_form(&client, "/api/report/confirm", "");

        assert_eq!(status, Status::Conflict);
        assert_eq!(body["success"], false);
    }

    #[test]
    fn cancel_keeps_draft() {
        let client = client(Some("letmein"));
        login(&client, "letmein");

        post_form(&client, "/api/report/request", "flood_level=Urgent%20Care%20Needed&message=help");
        let (_, body) = post_form(&client, "/api/report/cancel", "");

        assert_eq!(body["submission"]["state"], "idle");
        assert_eq!(body["submission"]["draft"]["message"], "help");

        let map: JsonValue = client.get("/report-map").dispatch().into_json().unwrap();
        assert_eq!(map["size"], 0);
    }

    #[test]
    fn focus_on_empty_map_adds_temporary_marker() {
        let client = client(Some("letmein"));
        login(&client, "letmein");

        let (status, body) = post_form(&client, "/api/focus",
            "latitude=14.5&longitude=121&message=Here");

        assert_eq!(status, Status::Ok);
        assert_eq!(body["temporary"], true);
        assert_eq!(body["map"]["zoom"], 14);
        assert_eq!(body["map"]["size"], 1);
    }

    #[test]
    fn focus_rejects_non_finite_coordinates() {
        let client = client(Some("letmein"));
        login(&client, "letmein");

        let (status, body) = post_form(&client, "/api/focus", "latitude=NaN&longitude=inf");
        assert_eq!(status, Status::UnprocessableEntity);
        assert_eq!(body["message"], "Invalid coordinates.");

        let view: JsonValue = client.get("/api/session").dispatch().into_json().unwrap();
        assert_eq!(view["map"]["size"], 0);
        assert_eq!(view["map"]["center"]["lat"], 14.7921);
    }
}
