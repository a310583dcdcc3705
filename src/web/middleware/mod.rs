//! # Web API Middleware

pub mod auth;
pub mod request_id;
