use async_trait::async_trait;
use chrono::{NaiveTime, TimeZone};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error};

use super::gateway_trait::{
    ChargeResponse, MandateRegistration, MandateRegistrationRequest, MandateStatusReport,
    PaymentGateway, RecurringChargeRequest,
};
use crate::config::RazorpayConfig;
use crate::core::{AppError, Currency, Result};

/// Razorpay client for e-mandate registration and recurring debits
pub struct RazorpayGateway {
    client: Client,
    key_id: String,
    key_secret: String,
    base_url: String,
}

impl RazorpayGateway {
    pub fn new(config: &RazorpayConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, operation: &str) -> Result<T> {
        let response = request
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(|e| AppError::gateway(format!("Razorpay {} failed: {}", operation, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(operation, status = status.as_u16(), body = %body, "Razorpay API error");
            return Err(AppError::gateway(format!(
                "Razorpay {} returned {}: {}",
                operation,
                status,
                error_description(&body).unwrap_or(body)
            )));
        }

        response.json::<T>().await.map_err(|e| {
            AppError::gateway(format!("Failed to parse Razorpay {} response: {}", operation, e))
        })
    }
}

fn paise(amount: rust_decimal::Decimal, currency: Currency) -> Result<i64> {
    currency
        .to_minor_units(amount)
        .ok_or_else(|| AppError::validation(format!("amount {} out of range", amount)))
}

/// Razorpay wraps errors as `{"error": {"description": ...}}`
fn error_description(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/description")
        .and_then(|d| d.as_str())
        .map(str::to_string)
}

fn recurring_payment_body(
    request: &RecurringChargeRequest,
    order_id: &str,
) -> Result<serde_json::Value> {
    Ok(json!({
        "email": request.email,
        "contact": request.phone,
        "amount": paise(request.amount, request.currency)?,
        "currency": request.currency.to_string(),
        "order_id": order_id,
        "customer_id": request.customer_ref,
        "token": request.token_ref,
        "recurring": "1",
        "description": request.description,
        "notes": {
            "loan_id": request.loan_id,
            "installment_id": request.installment_id,
            "sequence_number": request.sequence_number.to_string(),
        }
    }))
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
struct AuthLinkResponse {
    order_id: String,
    customer_id: Option<String>,
    short_url: Option<String>,
}

#[derive(Deserialize)]
struct OrderPayments {
    #[serde(default)]
    items: Vec<OrderPayment>,
}

#[derive(Deserialize)]
struct OrderPayment {
    status: String,
    token_id: Option<String>,
}

#[derive(Deserialize)]
struct RecurringPaymentResponse {
    razorpay_payment_id: String,
    razorpay_order_id: Option<String>,
}

fn mandate_status_from_payments(payments: OrderPayments) -> MandateStatusReport {
    let tokenised = payments
        .items
        .into_iter()
        .find(|p| p.token_id.is_some() && matches!(p.status.as_str(), "authorized" | "captured"));

    match tokenised {
        Some(payment) => MandateStatusReport {
            token_ref: payment.token_id,
            confirmed: true,
            bank_account: None,
        },
        None => MandateStatusReport {
            token_ref: None,
            confirmed: false,
            bank_account: None,
        },
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_mandate_registration(
        &self,
        request: MandateRegistrationRequest,
    ) -> Result<MandateRegistration> {
        let customer: IdResponse = self
            .send(
                self.client.post(self.url("/v1/customers")).json(&json!({
                    "name": request.customer.name,
                    "email": request.customer.email,
                    "contact": request.customer.phone,
                    "fail_existing": "0",
                })),
                "customer creation",
            )
            .await?;

        let expire_at = chrono::Utc
            .from_utc_datetime(&request.expire_on.and_time(NaiveTime::MIN))
            .timestamp();

        let link: AuthLinkResponse = self
            .send(
                self.client
                    .post(self.url("/v1/subscription_registration/auth_links"))
                    .json(&json!({
                        "customer": {
                            "name": request.customer.name,
                            "email": request.customer.email,
                            "contact": request.customer.phone,
                        },
                        "type": "link",
                        "amount": 0,
                        "currency": request.currency.to_string(),
                        "description": request.description,
                        "receipt": request.loan_reference,
                        "email_notify": true,
                        "sms_notify": true,
                        "subscription_registration": {
                            "method": "emandate",
                            "auth_type": "netbanking",
                            "expire_at": expire_at,
                            "max_amount": paise(request.max_amount, request.currency)?,
                            "bank_account": {
                                "beneficiary_name": request.customer.name,
                                "account_number": request.bank_account.account_number,
                                "account_type": request.bank_account.account_type.clone().unwrap_or_else(|| "savings".to_string()),
                                "ifsc_code": request.bank_account.ifsc,
                            }
                        }
                    })),
                "mandate registration",
            )
            .await?;

        debug!(order_id = %link.order_id, customer_id = %customer.id, "Mandate registration created");

        Ok(MandateRegistration {
            order_ref: link.order_id,
            customer_ref: link.customer_id.or(Some(customer.id)),
            authorization_url: link.short_url,
        })
    }

    async fn fetch_mandate_status(&self, order_ref: &str) -> Result<MandateStatusReport> {
        let payments: OrderPayments = self
            .send(
                self.client
                    .get(self.url(&format!("/v1/orders/{}/payments", order_ref))),
                "mandate status",
            )
            .await?;

        Ok(mandate_status_from_payments(payments))
    }

    async fn create_recurring_charge(&self, request: RecurringChargeRequest) -> Result<ChargeResponse> {
        let order: IdResponse = self
            .send(
                self.client.post(self.url("/v1/orders")).json(&json!({
                    "amount": paise(request.amount, request.currency)?,
                    "currency": request.currency.to_string(),
                    "payment_capture": true,
                    "receipt": request.installment_id,
                    "notes": {
                        "loan_id": request.loan_id,
                        "installment_id": request.installment_id,
                    }
                })),
                "order creation",
            )
            .await?;

        let body = recurring_payment_body(&request, &order.id)?;
        let payment: RecurringPaymentResponse = self
            .send(
                self.client
                    .post(self.url("/v1/payments/create/recurring"))
                    .json(&body),
                "recurring charge",
            )
            .await?;

        Ok(ChargeResponse {
            payment_ref: payment.razorpay_payment_id,
            order_ref: payment.razorpay_order_id.or(Some(order.id)),
        })
    }

    fn name(&self) -> &str {
        "razorpay"
    }
}
