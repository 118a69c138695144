pub mod admin;
pub mod auth;
pub mod driver;
pub mod review;
pub mod submission;
pub mod upload;
