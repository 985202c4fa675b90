mod gateway_signature;

pub use gateway_signature::{
    sign_message,
    signing_message,
    verify_signature,
    GatewayCallback,
    GatewaySignatureError,
    DEFAULT_SIGNED_FIELDS,
    STATUS_COMPLETE,
};
