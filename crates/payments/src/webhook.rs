//! Decoding webhook deliveries into the events billing reacts to.

use serde::Deserialize;

use crate::error::PaymentError;

/// A webhook event, reduced to what billing needs.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    /// A subscription invoice was paid; start a new period.
    InvoicePaid { subscription_id: String },
    InvoicePaymentFailed { subscription_id: String },
    /// The subscription was ended at the gateway.
    SubscriptionDeleted { subscription_id: String },
    /// Anything else; acknowledged and ignored.
    Ignored { event_type: String },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, PaymentError> {
        let envelope: Envelope = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;
        let object = &envelope.data.object;

        let field = |name: &str| -> Result<String, PaymentError> {
            object
                .get(name)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    PaymentError::InvalidPayload(format!(
                        "{} without data.object.{name}",
                        envelope.event_type
                    ))
                })
        };

        Ok(match envelope.event_type.as_str() {
            "invoice.payment_succeeded" => Self::InvoicePaid {
                subscription_id: field("subscription")?,
            },
            "invoice.payment_failed" => Self::InvoicePaymentFailed {
                subscription_id: field("subscription")?,
            },
            "customer.subscription.deleted" => Self::SubscriptionDeleted {
                subscription_id: field("id")?,
            },
            _ => Self::Ignored {
                event_type: envelope.event_type,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn invoice_paid() {
        let body = br#"{"type":"invoice.payment_succeeded","data":{"object":{"id":"in_1","subscription":"sub_9"}}}"#;
        assert_eq!(
            WebhookEvent::parse(body).unwrap(),
            WebhookEvent::InvoicePaid {
                subscription_id: "sub_9".into()
            }
        );
    }

    #[test]
    fn subscription_deleted_uses_object_id() {
        let body = br#"{"type":"customer.subscription.deleted","data":{"object":{"id":"sub_9"}}}"#;
        assert_matches!(
            WebhookEvent::parse(body).unwrap(),
            WebhookEvent::SubscriptionDeleted { subscription_id } if subscription_id == "sub_9"
        );
    }

    #[test]
    fn unknown_types_are_ignored() {
        let body = br#"{"type":"charge.refunded","data":{"object":{}}}"#;
        assert_matches!(WebhookEvent::parse(body).unwrap(), WebhookEvent::Ignored { .. });
    }

    #[test]
    fn missing_subscription_is_invalid() {
        let body = br#"{"type":"invoice.payment_failed","data":{"object":{"id":"in_1"}}}"#;
        assert_matches!(WebhookEvent::parse(body), Err(PaymentError::InvalidPayload(_)));
        assert_matches!(WebhookEvent::parse(b"not json"), Err(PaymentError::InvalidPayload(_)));
    }
}
