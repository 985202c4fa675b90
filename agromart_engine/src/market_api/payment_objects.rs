use agromart_common::Secret;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{DeliveryInfo, Money, Order, Transaction},
    helpers::DEFAULT_SIGNED_FIELDS,
};

pub const DEFAULT_PRODUCT_CODE: &str = "EPAYTEST";
pub const DEFAULT_GATEWAY_URL: &str = "https://rc-epay.esewa.com.np/api/epay/main/v2/form";

/// Merchant settings for the payment gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub secret: Secret<String>,
    pub product_code: String,
    pub gateway_url: String,
    pub success_url: String,
    pub failure_url: String,
}

impl GatewayConfig {
    pub fn new<S: Into<String>>(secret: Secret<String>, product_code: S) -> Self {
        Self {
            secret,
            product_code: product_code.into(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            success_url: String::new(),
            failure_url: String::new(),
        }
    }

    pub fn with_gateway_url<S: Into<String>>(mut self, url: S) -> Self {
        self.gateway_url = url.into();
        self
    }

    pub fn with_success_url<S: Into<String>>(mut self, url: S) -> Self {
        self.success_url = url.into();
        self
    }

    pub fn with_failure_url<S: Into<String>>(mut self, url: S) -> Self {
        self.failure_url = url.into();
        self
    }
}

/// A buyer's request to pay for their cart online.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiation {
    pub cart_id: String,
    #[serde(flatten)]
    pub delivery: DeliveryInfo,
    #[serde(default)]
    pub declared_total: Option<f64>,
}

/// The signed form that the buyer's browser posts to the payment gateway. Field names are the gateway's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPaymentRequest {
    pub amount: String,
    pub tax_amount: String,
    pub total_amount: String,
    pub transaction_uuid: String,
    pub product_code: String,
    pub product_service_charge: String,
    pub product_delivery_charge: String,
    pub success_url: String,
    pub failure_url: String,
    pub signed_field_names: String,
    pub signature: String,
    /// Where the form must be posted to
    pub gateway_url: String,
}

impl SignedPaymentRequest {
    pub fn new(
        total: Money,
        transaction_uuid: String,
        config: &GatewayConfig,
        signature: String,
    ) -> Self {
        let amount = total.to_decimal_string();
        Self {
            amount: amount.clone(),
            tax_amount: "0".to_string(),
            total_amount: amount,
            transaction_uuid,
            product_code: config.product_code.clone(),
            product_service_charge: "0".to_string(),
            product_delivery_charge: "0".to_string(),
            success_url: config.success_url.clone(),
            failure_url: config.failure_url.clone(),
            signed_field_names: DEFAULT_SIGNED_FIELDS.to_string(),
            signature,
            gateway_url: config.gateway_url.clone(),
        }
    }
}

/// The outcome of a success callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub transaction: Transaction,
    pub orders: Vec<Order>,
    /// True if this callback had been processed before and nothing new was recorded
    pub replayed: bool,
}

impl ReconciliationResult {
    pub fn needs_review(&self) -> bool {
        self.transaction.needs_review
    }
}
