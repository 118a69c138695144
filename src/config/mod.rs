use rocket::figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use rocket::Config as RocketConfig;
use std::env;

pub struct Config;

impl Config {
    fn figment() -> Figment {
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            .merge(Env::prefixed("ROCKET_").split("_"))
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| "default-secret".to_string())
    }

    pub fn jwt_refresh_secret() -> String {
        Self::figment()
            .extract_inner("jwt_refresh_secret")
            .unwrap_or_else(|_| "default-refresh-secret".to_string())
    }

    pub fn jwt_expiry() -> i64 {
        Self::figment().extract_inner("jwt_expiry").unwrap_or(900)
    }

    pub fn jwt_refresh_expiry() -> i64 {
        Self::figment()
            .extract_inner("jwt_refresh_expiry")
            .unwrap_or(604800)
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017/ridelink".to_string())
    }

    pub fn idanalyzer_api_key() -> Option<String> {
        Self::figment().extract_inner("idanalyzer_api_key").ok()
    }

    pub fn idanalyzer_url() -> String {
        Self::figment()
            .extract_inner("idanalyzer_url")
            .unwrap_or_else(|_| "https://api.idanalyzer.com/coreapi".to_string())
    }

    pub fn is_idanalyzer_enabled() -> bool {
        Self::idanalyzer_api_key().is_some()
    }
}
