use serde_json::{json, Value};

/// `token.*` webhook body
pub fn token_event(event: &str, order_id: &str, token_id: &str) -> Value {
    json!({
        "entity": "event",
        "account_id": "acc_test",
        "event": event,
        "contains": ["token"],
        "payload": {
            "token": {
                "entity": {
                    "id": token_id,
                    "entity": "token",
                    "order_id": order_id,
                    "method": "emandate",
                    "recurring": true,
                    "bank_account": {
                        "account_number": "50100012345678",
                        "ifsc": "HDFC0001234",
                        "account_type": "savings",
                        "name": "Asha Rao"
                    }
                }
            }
        },
        "created_at": 1767225600
    })
}

/// `payment.*` webhook body; `amount_paise` in minor units
pub fn payment_event(
    event: &str,
    payment_id: &str,
    amount_paise: i64,
    installment_id: Option<&str>,
) -> Value {
    let notes = match installment_id {
        Some(id) => json!({ "installment_id": id }),
        None => json!([]),
    };

    json!({
        "entity": "event",
        "account_id": "acc_test",
        "event": event,
        "contains": ["payment"],
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "entity": "payment",
                    "amount": amount_paise,
                    "currency": "INR",
                    "status": event.trim_start_matches("payment."),
                    "method": "emandate",
                    "notes": notes
                }
            }
        },
        "created_at": 1767225600
    })
}

/// `payment.failed` body with a bank error
pub fn payment_failed_event(payment_id: &str, amount_paise: i64, reason: &str) -> Value {
    let mut body = payment_event("payment.failed", payment_id, amount_paise, None);
    let entity = &mut body["payload"]["payment"]["entity"];
    entity["error_code"] = json!("BAD_REQUEST_ERROR");
    entity["error_description"] = json!(reason);
    entity["error_reason"] = json!("payment_failed");
    body
}
