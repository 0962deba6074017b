use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use rust_decimal::Decimal;

/// Application-wide Result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Loan terms cannot produce a repayment plan
    #[error("Invalid loan terms: {0}")]
    InvalidTerms(String),

    /// Installments were already generated for the mandate
    #[error("Schedule already exists for mandate {mandate_id}")]
    ScheduleAlreadyExists { mandate_id: String },

    /// Payment larger than the outstanding balance
    #[error("Payment of {amount} exceeds outstanding balance {outstanding}")]
    Overpayment { amount: Decimal, outstanding: Decimal },

    /// Operation not allowed in the mandate's (or loan's) current state
    #[error("State conflict: {0}")]
    MandateStateConflict(String),

    /// Webhook HMAC did not match
    #[error("Invalid webhook signature")]
    SignatureInvalid,

    /// Event already applied; informational only
    #[error("Duplicate event: {0}")]
    DuplicateEvent(String),

    /// Gateway could not be reached or refused the request
    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Balance arithmetic would break the ledger invariants
    #[error("Ledger inconsistency: {0}")]
    LedgerInconsistency(String),

    /// Validation errors for business rules
    #[error("Validation error: {0}")]
    Validation(String),

    /// Gateway event lacks the reference needed to locate its target
    #[error("Missing reference: {0}")]
    MissingReference(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database operation errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        HttpResponse::build(status_code).json(serde_json::json!({
            "success": false,
            "error": {
                "message": error_message,
                "code": status_code.as_u16(),
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidTerms(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ScheduleAlreadyExists { .. } => StatusCode::CONFLICT,
            AppError::Overpayment { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::MandateStateConflict(_) => StatusCode::CONFLICT,
            AppError::SignatureInvalid => StatusCode::BAD_REQUEST,
            AppError::DuplicateEvent(_) => StatusCode::OK,
            AppError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::LedgerInconsistency(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::MissingReference(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Helper functions for common error scenarios
impl AppError {
    pub fn invalid_terms(msg: impl Into<String>) -> Self {
        AppError::InvalidTerms(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::MandateStateConflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        AppError::GatewayUnavailable(msg.into())
    }

    pub fn inconsistency(msg: impl Into<String>) -> Self {
        AppError::LedgerInconsistency(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}
