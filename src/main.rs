#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

mod config;
mod db;
mod guards;
mod models;
mod routes;
mod services;
mod utils;

use dotenvy::dotenv;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::fs::FileServer;
use rocket::http::Header;
use rocket::{Build, Request, Response, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{make_swagger_ui, SwaggerUIConfig};

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

#[catch(404)]
fn not_found() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Resource not found (check /api/v1 prefix)"
    })
}

#[catch(500)]
fn internal_error() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Internal server error"
    })
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    // The document itself is generated and served under the API mount
    SwaggerUIConfig {
        url: "/api/v1/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- LAUNCH ----------------------------- */

fn build_rocket() -> Rocket<Build> {
    rocket::build()
        .attach(db::init())
        .attach(CORS)
        .mount("/", routes![options_handler])
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Auth
                routes::auth::register,
                routes::auth::login,
                routes::auth::refresh_token,
                // Drivers
                routes::driver::search_drivers,
                routes::driver::get_my_drivers,
                routes::driver::get_driver,
                routes::driver::update_driver,
                routes::driver::delete_driver,
                // Submissions
                routes::submission::create_submission,
                routes::submission::get_my_submissions,
                // Admin - approval workflow
                routes::admin::get_all_submissions,
                routes::admin::get_submission_by_id,
                routes::admin::approve_driver,
                routes::admin::reject_driver,
                routes::admin::reject_submission,
                // Reviews
                routes::review::create_review,
                routes::review::get_driver_reviews,
                routes::review::delete_review,
                // Uploads
                routes::upload::upload_licence,
                routes::upload::verify_licence,
            ],
        )
        .mount("/uploads", FileServer::from("uploads"))
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register("/", catchers![not_found, internal_error])
}

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    info!("🚗 Ridelink API running");
    info!("📚 Swagger UI → http://localhost:8000/api/docs");

    build_rocket()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_is_mounted_where_swagger_expects_it() {
        let rocket = build_rocket();
        let openapi_path = rocket
            .routes()
            .map(|r| r.uri.to_string())
            .find(|uri| uri.ends_with("openapi.json"));
        assert_eq!(openapi_path.as_deref(), Some("/api/v1/openapi.json"));
        assert!(swagger_config().url.ends_with("/api/v1/openapi.json"));
    }
}
