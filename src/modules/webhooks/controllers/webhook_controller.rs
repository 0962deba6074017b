use actix_web::{post, web, HttpRequest, HttpResponse};
use serde::Serialize;
use tracing::info;

use crate::core::Result;
use crate::modules::webhooks::services::{WebhookEventProcessor, WebhookOutcome};

/// Header carrying the hex HMAC-SHA256 of the raw body
pub const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

/// Configure webhook routes
///
/// # Arguments
/// * `cfg` - Service configuration
/// * `processor` - Shared event processor
pub fn configure(cfg: &mut web::ServiceConfig, processor: web::Data<WebhookEventProcessor>) {
    cfg.service(
        web::scope("/webhooks")
            .app_data(processor)
            .service(razorpay_webhook),
    );
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: WebhookOutcome,
}

/// POST /webhooks/razorpay
///
/// The body is taken as raw bytes because the signature covers the exact
/// payload the gateway sent.
///
/// # Returns
/// * `200 OK` - processed, duplicate, or recognised but ignored
/// * `400 Bad Request` - bad signature, malformed body, or missing reference
/// * `404 Not Found` - payment attempt not recorded yet; gateway redelivers
/// * `500 Internal Server Error` - unexpected failure
#[post("/razorpay")]
async fn razorpay_webhook(
    req: HttpRequest,
    body: web::Bytes,
    processor: web::Data<WebhookEventProcessor>,
) -> Result<HttpResponse> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());

    let outcome = processor.handle_event(&body, signature).await?;

    info!(outcome = ?outcome, "Webhook handled");

    Ok(HttpResponse::Ok().json(WebhookResponse {
        success: true,
        outcome,
    }))
}
