//! # Payment gateway signatures
//!
//! Requests to, and callbacks from, the eSewa payment gateway are authenticated with an HMAC-SHA256 over a subset of
//! the message fields. The subset is named in the `signed_field_names` field, and the signed message is built by
//! joining `name=value` pairs with commas, in the order the names are listed:
//!
//! ```text
//!    total_amount=250.00,transaction_uuid=agromart-1717200000000-8fJ2kQ,product_code=EPAYTEST
//! ```
//!
//! The HMAC is keyed with the merchant secret, and the digest is base64 encoded.
//!
//! The gateway returns to the success URL in one of two shapes:
//! * a single `data` query parameter holding base64 encoded JSON, or
//! * flat query parameters (`refId`, `status`, `transaction_uuid`, `total_amount`, `signature`, ...).
//!
//! Both are normalised into a [`GatewayCallback`].
use std::collections::HashMap;

use hmac::{Hmac, Mac};
use log::*;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

pub const DEFAULT_SIGNED_FIELDS: &str = "total_amount,transaction_uuid,product_code";
pub const STATUS_COMPLETE: &str = "COMPLETE";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Error)]
pub enum GatewaySignatureError {
    #[error("The signing key is not usable: {0}")]
    InvalidKey(String),
    #[error("The signed field {0} is missing from the message")]
    MissingField(String),
    #[error("The callback could not be decoded: {0}")]
    MalformedCallback(String),
}

/// Builds the message that is signed for the given field names. Every name must have a value in `fields`.
pub fn signing_message(
    signed_field_names: &str,
    fields: &HashMap<String, String>,
) -> Result<String, GatewaySignatureError> {
    signed_field_names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            fields
                .get(name)
                .map(|value| format!("{name}={value}"))
                .ok_or_else(|| GatewaySignatureError::MissingField(name.to_string()))
        })
        .collect::<Result<Vec<String>, _>>()
        .map(|pairs| pairs.join(","))
}

/// Signs the message with HMAC-SHA256 and returns the base64 encoded digest.
pub fn sign_message(secret: &str, message: &str) -> Result<String, GatewaySignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| GatewaySignatureError::InvalidKey(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(base64::encode(mac.finalize().into_bytes()))
}

/// Checks a base64 encoded signature against the message. The digest comparison is constant-time.
pub fn verify_signature(secret: &str, message: &str, signature: &str) -> bool {
    let Ok(sig_bytes) = base64::decode(signature.trim()) else {
        debug!("🔐️ Signature is not valid base64");
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(message.as_bytes());
    mac.verify_slice(&sig_bytes).is_ok()
}

/// A normalised payment gateway callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCallback {
    /// The gateway's own reference for the payment (`transaction_code` or `refId`)
    pub reference: Option<String>,
    pub status: Option<String>,
    pub transaction_uuid: String,
    pub total_amount: String,
    pub product_code: Option<String>,
    pub signed_field_names: String,
    pub signature: Option<String>,
    /// Every field of the callback as a string, used to rebuild the signed message.
    pub fields: HashMap<String, String>,
}

impl GatewayCallback {
    /// Normalises the query parameters of a success redirect. Flat redirects without a `status` are only sent for
    /// successful payments, so they are read as successful.
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, GatewaySignatureError> {
        match params.get("data") {
            Some(data) => Self::from_encoded_data(data),
            None => {
                let mut fields = params.clone();
                fields.entry("status".to_string()).or_insert_with(|| "success".to_string());
                Self::from_fields(fields)
            },
        }
    }

    /// Decodes the `data` parameter: base64 encoded JSON.
    pub fn from_encoded_data(data: &str) -> Result<Self, GatewaySignatureError> {
        let bytes = base64::decode(data.trim())
            .map_err(|e| GatewaySignatureError::MalformedCallback(format!("data is not base64. {e}")))?;
        let json: HashMap<String, Value> = serde_json::from_slice(&bytes)
            .map_err(|e| GatewaySignatureError::MalformedCallback(format!("data is not a JSON object. {e}")))?;
        let fields = json
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect();
        Self::from_fields(fields)
    }

    fn from_fields(mut fields: HashMap<String, String>) -> Result<Self, GatewaySignatureError> {
        // Older callbacks carry the gateway reference as `refId` and the amount as `amt`
        if !fields.contains_key("transaction_code") {
            if let Some(ref_id) = fields.get("refId").cloned() {
                fields.insert("transaction_code".into(), ref_id);
            }
        }
        if !fields.contains_key("total_amount") {
            if let Some(amt) = fields.get("amt").cloned() {
                fields.insert("total_amount".into(), amt);
            }
        }
        let transaction_uuid = fields
            .get("transaction_uuid")
            .or_else(|| fields.get("oid"))
            .cloned()
            .ok_or_else(|| GatewaySignatureError::MissingField("transaction_uuid".into()))?;
        let total_amount =
            fields.get("total_amount").cloned().ok_or_else(|| GatewaySignatureError::MissingField("total_amount".into()))?;
        let signed_field_names =
            fields.get("signed_field_names").cloned().unwrap_or_else(|| DEFAULT_SIGNED_FIELDS.to_string());
        Ok(Self {
            reference: fields.get("transaction_code").cloned(),
            status: fields.get("status").cloned(),
            transaction_uuid,
            total_amount,
            product_code: fields.get("product_code").cloned(),
            signed_field_names,
            signature: fields.get("signature").cloned(),
            fields,
        })
    }

    /// Whether the gateway reported the payment as complete. Flat callbacks report `success` rather than `COMPLETE`.
    pub fn is_complete(&self) -> bool {
        matches!(self.status.as_deref().map(str::to_ascii_uppercase).as_deref(), Some(STATUS_COMPLETE) | Some("SUCCESS"))
    }

    /// Rebuilds the signed message with some field values replaced. Used to check the callback against the values
    /// that were staged locally, rather than the ones the callback claims.
    pub fn message_with(&self, overrides: &[(&str, &str)]) -> Result<String, GatewaySignatureError> {
        let mut fields = self.fields.clone();
        for (name, value) in overrides {
            fields.insert(name.to_string(), value.to_string());
        }
        signing_message(&self.signed_field_names, &fields)
    }

    /// Verifies the callback's signature against its own field values, with the given overrides.
    pub fn verify(&self, secret: &str, overrides: &[(&str, &str)]) -> bool {
        let Some(signature) = self.signature.as_deref() else {
            warn!("🔐️ Callback for {} carries no signature", self.transaction_uuid);
            return false;
        };
        match self.message_with(overrides) {
            Ok(message) => {
                let valid = verify_signature(secret, &message, signature);
                if !valid {
                    warn!("🔐️ Signature check failed for callback {}", self.transaction_uuid);
                }
                valid
            },
            Err(e) => {
                warn!("🔐️ Callback for {} cannot be verified. {e}", self.transaction_uuid);
                false
            },
        }
    }
}
