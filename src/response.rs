//! The JSON envelope every endpoint answers with.

use actix_web::{http::StatusCode, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub message: String,
    pub data: Option<T>,
    pub errors: Option<Vec<String>>,
    pub status: String,
    pub timestamp: String,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(status: StatusCode, message: &str, data: Option<T>, errors: Option<Vec<String>>) -> Self {
        Self {
            message: message.to_string(),
            data,
            errors,
            status: status.canonical_reason().unwrap_or("Unknown").to_string(),
            timestamp: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

pub fn respond<T: Serialize>(status: StatusCode, message: &str, data: T) -> HttpResponse {
    HttpResponse::build(status).json(Envelope::new(status, message, Some(data), None))
}

pub fn ok<T: Serialize>(message: &str, data: T) -> HttpResponse {
    respond(StatusCode::OK, message, data)
}

pub fn ok_empty(message: &str) -> HttpResponse {
    HttpResponse::Ok().json(Envelope::<()>::new(StatusCode::OK, message, None, None))
}

pub fn error(status: StatusCode, message: &str, detail: String) -> HttpResponse {
    HttpResponse::build(status).json(Envelope::<()>::new(status, message, None, Some(vec![detail])))
}
