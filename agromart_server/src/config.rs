use std::env;

use agromart_common::{parse_boolean_flag, Money, Secret};
use agromart_engine::{
    market_api::order_flow_api::DEFAULT_DELIVERY_FEE,
    payment_objects::{GatewayConfig, DEFAULT_GATEWAY_URL, DEFAULT_PRODUCT_CODE},
};
use chrono::Duration;
use log::*;

const DEFAULT_AMS_HOST: &str = "127.0.0.1";
const DEFAULT_AMS_PORT: u16 = 8370;
const DEFAULT_DRAFT_TTL: Duration = Duration::hours(24);
const DEFAULT_SUCCESS_URL: &str = "http://localhost:5173/esewa/success";
const DEFAULT_FAILURE_URL: &str = "http://localhost:5173/esewa/failure";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// The flat delivery fee added to every seller order.
    pub delivery_fee: Money,
    /// Payment drafts that have not been settled within this time are deleted by the draft purge worker.
    pub draft_ttl: Duration,
    /// Payment gateway merchant settings
    pub gateway: GatewayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_AMS_HOST.to_string(),
            port: DEFAULT_AMS_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            delivery_fee: DEFAULT_DELIVERY_FEE,
            draft_ttl: DEFAULT_DRAFT_TTL,
            gateway: GatewayConfig::new(Secret::default(), DEFAULT_PRODUCT_CODE)
                .with_success_url(DEFAULT_SUCCESS_URL)
                .with_failure_url(DEFAULT_FAILURE_URL),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("AMS_HOST").ok().unwrap_or_else(|| DEFAULT_AMS_HOST.into());
        let port = env::var("AMS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for AMS_PORT. {e} Using the default, {DEFAULT_AMS_PORT}, instead."
                    );
                    DEFAULT_AMS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_AMS_PORT);
        let database_url = env::var("AMS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ AMS_DATABASE_URL is not set. Please set it to the URL for the AgroMart database.");
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("AMS_USE_X_FORWARDED_FOR").ok(), false);
        let delivery_fee = configure_delivery_fee();
        let draft_ttl = configure_draft_ttl();
        let gateway = configure_gateway();
        Self { host, port, database_url, use_x_forwarded_for, delivery_fee, draft_ttl, gateway }
    }
}

fn configure_delivery_fee() -> Money {
    env::var("AMS_DELIVERY_FEE")
        .map_err(|_| info!("🪛️ AMS_DELIVERY_FEE is not set. Using the default of {DEFAULT_DELIVERY_FEE}."))
        .and_then(|s| {
            Money::parse_decimal(&s)
                .map_err(|e| warn!("🪛️ Invalid configuration value for AMS_DELIVERY_FEE. {e}"))
                .and_then(|fee| {
                    if fee.value() < 0 {
                        warn!("🪛️ AMS_DELIVERY_FEE cannot be negative ({fee}).");
                        Err(())
                    } else {
                        Ok(fee)
                    }
                })
        })
        .ok()
        .unwrap_or(DEFAULT_DELIVERY_FEE)
}

fn configure_draft_ttl() -> Duration {
    env::var("AMS_DRAFT_TTL")
        .map_err(|_| {
            info!("🪛️ AMS_DRAFT_TTL is not set. Using the default value of {} hrs.", DEFAULT_DRAFT_TTL.num_hours())
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for AMS_DRAFT_TTL. {e}"))
                .and_then(|h| {
                    if h > 0 {
                        Ok(Duration::hours(h))
                    } else {
                        warn!("🪛️ AMS_DRAFT_TTL must be a positive number of hours, not {h}.");
                        Err(())
                    }
                })
        })
        .ok()
        .unwrap_or(DEFAULT_DRAFT_TTL)
}

fn configure_gateway() -> GatewayConfig {
    let secret = env::var("AMS_ESEWA_SECRET").ok().unwrap_or_else(|| {
        error!(
            "🪛️ AMS_ESEWA_SECRET is not set. Online payments cannot be verified until it is set to the merchant \
             secret issued by the payment gateway."
        );
        String::default()
    });
    let product_code = env::var("AMS_ESEWA_PRODUCT_CODE").ok().unwrap_or_else(|| {
        info!("🪛️ AMS_ESEWA_PRODUCT_CODE is not set. Using the test merchant code, {DEFAULT_PRODUCT_CODE}.");
        DEFAULT_PRODUCT_CODE.to_string()
    });
    let gateway_url = env::var("AMS_ESEWA_GATEWAY_URL").ok().unwrap_or_else(|| {
        info!("🪛️ AMS_ESEWA_GATEWAY_URL is not set. Using the test gateway at {DEFAULT_GATEWAY_URL}.");
        DEFAULT_GATEWAY_URL.to_string()
    });
    let success_url = env::var("AMS_PAYMENT_SUCCESS_URL").ok().unwrap_or_else(|| {
        warn!("🪛️ AMS_PAYMENT_SUCCESS_URL is not set. Using {DEFAULT_SUCCESS_URL}.");
        DEFAULT_SUCCESS_URL.to_string()
    });
    let failure_url = env::var("AMS_PAYMENT_FAILURE_URL").ok().unwrap_or_else(|| {
        warn!("🪛️ AMS_PAYMENT_FAILURE_URL is not set. Using {DEFAULT_FAILURE_URL}.");
        DEFAULT_FAILURE_URL.to_string()
    });
    GatewayConfig::new(Secret::new(secret), product_code)
        .with_gateway_url(gateway_url)
        .with_success_url(success_url)
        .with_failure_url(failure_url)
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for }
    }
}
