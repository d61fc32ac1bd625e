#[macro_use] extern crate log;


mod auth_sys;
mod beacon_sys;
mod config;
mod context;
mod db;
mod error;
mod geocode_sys;
mod logger;
mod marker_sys;
mod report;
mod report_route;
mod session;
mod session_route;
mod store;
mod submit_sys;
mod sync_sys;
mod task_scheduler;
mod util;
mod weather_sys;


use std::path::{Path, PathBuf};
use std::fs::create_dir_all;
use log::LevelFilter;
use rocket::{get, routes, catchers, Build, Rocket, fs::NamedFile};

use crate::config::Config;
use crate::context::AppContext;
use crate::task_scheduler::TaskSchedulerBuilder;


const STATIC_DIR: &'static str = "static/";


#[get("/")]
fn index() -> &'static str {
    "Crisis Map Server"
}

#[get("/<file..>")]
async fn get_static_file(file: PathBuf) -> Option<NamedFile> {
    NamedFile::open(Path::new(STATIC_DIR).join(file)).await.ok()
}


pub fn build_rocket(app: AppContext) -> Rocket<Build> {
    rocket::build()
        .manage(app)
        .mount("/", routes![index])
        .mount("/static", routes![get_static_file])
        .mount("/", routes![
            session_route::check_password,
            session_route::logout,
            session_route::get_session,
            session_route::post_location,
            session_route::location_unavailable,
            session_route::post_beacon,
        ])
        .mount("/", routes![
            report_route::get_report_map,
            report_route::request_report,
            report_route::confirm_report,
            report_route::cancel_report,
            report_route::dismiss_notification,
            report_route::focus,
        ])
        .register("/", catchers![session_route::unauthorized])
}


#[rocket::main]
async fn main() {
    let level = if cfg!(debug_assertions) { LevelFilter::Debug } else { LevelFilter::Info };
    if let Err(err) = logger::init(level) {
        eprintln!("Fail to install logger: {}", err);
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        },
    };

    let _sentry = config.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((dsn.as_str(), sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        }))
    });

    if let Err(err) = create_dir_all(STATIC_DIR) {
        warn!("Fail to create {}: {}", STATIC_DIR, err);
    }

    let store = AppContext::open_store(&config);
    let app = match AppContext::load(config, store).await {
        Ok(app) => app,
        Err(err) => {
            error!("Fail to build HTTP client: {}", err);
            std::process::exit(1);
        },
    };

    let mut builder = TaskSchedulerBuilder::new();
    session_route::init_session_jobs(&mut builder, app.sessions.clone(),
        app.config.session_idle_limit);
    let scheduler = builder.build();

    if let Err(err) = build_rocket(app).launch().await {
        error!("Server stopped: {}", err);
    }

    scheduler.join();
}


#[cfg(test)]
mod tests {
    use rocket::http::Status;
    use crate::session_route::tests::client;

    #[test]
    fn index_names_server() {
        let client = client(Some("letmein"));

        let res = client.get("/").dispatch();

        assert_eq!(res.status(), Status::Ok);
        assert_eq!(res.into_string().unwrap(), "Crisis Map Server");
    }

    #[test]
    fn missing_static_file_is_not_found() {
        let client = client(Some("letmein"));

        assert_eq!(client.get("/static/no-such-file.js").dispatch().status(), Status::NotFound);
    }
}
