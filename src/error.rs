//! Typed errors and HTTP mapping.

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures raised while configuring resources (before any request is served).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} id '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: model {model_id} column {column}")]
    InvalidPrimaryKey { model_id: String, column: String },
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("no resource view methods found for view: {0}")]
    NoViewMethods(String),
    #[error("invalid route pattern: {0}")]
    InvalidPattern(String),
    #[error("unknown renderer: {0}")]
    UnknownRenderer(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Request-time errors. Each variant maps to one HTTP status.
#[derive(Error, Debug)]
pub enum RestError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("method not allowed: {method}")]
    MethodNotAllowed { method: Method, allowed: Vec<Method> },
    #[error("not acceptable: {0}")]
    NotAcceptable(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("internal: {0}")]
    Internal(String),
}

impl RestError {
    pub fn method_not_allowed(method: &Method) -> Self {
        RestError::MethodNotAllowed {
            method: method.clone(),
            allowed: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RestError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RestError::Forbidden(_) => StatusCode::FORBIDDEN,
            RestError::NotFound(_) => StatusCode::NOT_FOUND,
            RestError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            RestError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            RestError::Conflict(_) => StatusCode::CONFLICT,
            RestError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            RestError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RestError::Db(e) => match e {
                sqlx::Error::RowNotFound => StatusCode::NOT_FOUND,
                sqlx::Error::Database(db) => match db.code().as_deref() {
                    Some("23505") => StatusCode::CONFLICT,
                    // not_null_violation, invalid_text_representation,
                    // string_data_right_truncation, numeric_value_out_of_range
                    Some("23502") | Some("22P02") | Some("22001") | Some("22003") => {
                        StatusCode::BAD_REQUEST
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                },
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            RestError::Config(_) | RestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn explanation(&self) -> String {
        match self.status() {
            StatusCode::BAD_REQUEST => "The server could not comply with the request since it is \
                either malformed or otherwise incorrect."
                .to_string(),
            StatusCode::FORBIDDEN => "Access was denied to this resource.".to_string(),
            StatusCode::NOT_FOUND => "The resource could not be found.".to_string(),
            StatusCode::METHOD_NOT_ALLOWED => {
                let method = match self {
                    RestError::MethodNotAllowed { method, .. } => method.as_str(),
                    _ => "",
                };
                format!("The method {} is not allowed for this resource.", method)
            }
            StatusCode::NOT_ACCEPTABLE => "The resource could not be generated that was \
                acceptable to your browser."
                .to_string(),
            StatusCode::CONFLICT => {
                "There was a conflict when trying to complete your request.".to_string()
            }
            StatusCode::PAYLOAD_TOO_LARGE => {
                "The request is larger than the server is willing or able to process.".to_string()
            }
            StatusCode::UNSUPPORTED_MEDIA_TYPE => {
                "The request media type is not supported by this server.".to_string()
            }
            _ => "The server has either erred or is incapable of performing the requested \
                operation."
                .to_string(),
        }
    }

    /// Human-readable detail; empty for variants that carry none.
    pub fn detail(&self) -> String {
        match self {
            RestError::BadRequest(d)
            | RestError::Forbidden(d)
            | RestError::NotFound(d)
            | RestError::NotAcceptable(d)
            | RestError::Conflict(d)
            | RestError::PayloadTooLarge(d)
            | RestError::UnsupportedMediaType(d)
            | RestError::Internal(d) => d.clone(),
            RestError::MethodNotAllowed { .. } => String::new(),
            RestError::Db(sqlx::Error::RowNotFound) => "No row found".to_string(),
            // Store internals stay out of responses.
            RestError::Db(_) | RestError::Config(_) => String::new(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        let status = self.status();
        let explanation = self.explanation();
        let detail = self.detail();
        let comment = String::new();
        let message = format!("{}\n\n{}\n\n{}", explanation, detail, comment)
            .trim_end()
            .to_string();
        ErrorBody {
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            explanation,
            detail,
            comment,
            message,
        }
    }
}

/// JSON error body: explanation, detail and comment are kept apart and also joined in `message`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub title: String,
    pub explanation: String,
    pub detail: String,
    pub comment: String,
    pub message: String,
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "request rejected");
        }
        let mut response = (status, Json(self.body())).into_response();
        if let RestError::MethodNotAllowed { allowed, .. } = &self {
            if !allowed.is_empty() {
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                if let Ok(v) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(header::ALLOW, v);
                }
            }
        }
        response
    }
}
