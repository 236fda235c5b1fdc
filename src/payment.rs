use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;

use crate::error::{AppError, Result};

type HmacSha512 = Hmac<Sha512>;

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

#[derive(Debug, Default, Deserialize)]
pub struct PaystackCustomer {
    #[serde(default)]
    pub email: String,
}

/// Only `event` is guaranteed; transfer and refund events omit most charge fields.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PaystackEventData {
    pub reference: String,
    pub amount: i64, // In kobo
    pub status: String,
    pub customer: PaystackCustomer,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct PaystackWebhook {
    pub event: String,
    #[serde(default)]
    pub data: PaystackEventData,
}

impl PaystackWebhook {
    pub fn is_successful_charge(&self) -> bool {
        self.event == "charge.success" && self.data.status == "success"
    }
}

/// Authenticates Paystack callbacks: hex HMAC-SHA512 of the raw body, keyed by the secret key.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self) -> Option<HmacSha512> {
        HmacSha512::new_from_slice(self.secret.as_bytes()).ok()
    }

    pub fn sign(&self, payload: &[u8]) -> String {
        match self.mac() {
            Some(mut mac) => {
                mac.update(payload);
                hex::encode(mac.finalize().into_bytes())
            }
            None => String::new(),
        }
    }

    /// Constant-time comparison against the hex signature.
    pub fn verify(&self, signature: &str, payload: &[u8]) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        let Some(mut mac) = self.mac() else {
            return false;
        };
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    }

    /// Checks the signature before looking at the body.
    pub fn authenticate(&self, signature: Option<&str>, payload: &[u8]) -> Result<PaystackWebhook> {
        let signature = signature
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::Validation("missing webhook signature".to_string()))?;
        if !self.verify(signature, payload) {
            return Err(AppError::InvalidSignature);
        }
        serde_json::from_slice(payload)
            .map_err(|e| AppError::Validation(format!("invalid webhook payload: {}", e)))
    }

    pub fn handle(&self, event: &PaystackWebhook) {
        if event.is_successful_charge() {
            tracing::info!(
                "Payment {} succeeded: {} kobo from {}",
                event.data.reference,
                event.data.amount,
                event.data.customer.email
            );
        } else {
            tracing::info!(
                "Ignoring webhook event {} ({}) for {}",
                event.event,
                event.data.status,
                event.data.reference
            );
        }
    }
}
