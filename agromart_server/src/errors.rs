use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use agromart_engine::{
    order_objects::PartialCheckoutFailure,
    traits::{CartError, CatalogError, InventoryError, OrderFlowError, PaymentError},
};
use log::error;
use thiserror::Error;

/// The message shown for any payment that fails signature verification. It never says what was wrong.
pub const PAYMENT_VERIFICATION_FAILED: &str = "Payment verification failed. Please contact support if you were charged.";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("The database is unavailable. {0}")]
    StorageUnavailable(String),
    #[error("Invalid request. {0}")]
    InvalidRequest(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{PAYMENT_VERIFICATION_FAILED}")]
    PaymentVerificationFailed,
    #[error("Checkout only partially succeeded. {}", .0.reason)]
    PartialCheckout(PartialCheckoutFailure),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::PaymentVerificationFailed => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PartialCheckout(_) => StatusCode::MULTI_STATUS,
            Self::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            // The committed orders are returned alongside the lines that could not be ordered
            Self::PartialCheckout(failure) => HttpResponse::build(self.status_code()).json(failure),
            _ => HttpResponse::build(self.status_code())
                .insert_header(ContentType::json())
                .body(serde_json::json!({ "error": self.to_string() }).to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("The {0} header is not valid text")]
    MalformedHeader(String),
    #[error("No role was provided for the user")]
    MissingRole,
    #[error("{0} is not a known role")]
    UnknownRole(String),
}

impl From<InventoryError> for ServerError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::DatabaseError(s) => {
                error!("💻️ Inventory storage error. {s}");
                Self::StorageUnavailable(s)
            },
            InventoryError::ListingNotFound(_) => Self::NoRecordFound(e.to_string()),
            InventoryError::InsufficientStock { .. } => Self::InvalidRequest(e.to_string()),
            InventoryError::OwnershipMismatch(_) => Self::InsufficientPermissions(e.to_string()),
            InventoryError::ValidationError(_) => Self::InvalidRequest(e.to_string()),
        }
    }
}

impl From<CartError> for ServerError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::DatabaseError(s) => {
                error!("💻️ Cart storage error. {s}");
                Self::StorageUnavailable(s)
            },
            CartError::CartNotFound(_) | CartError::LineNotFound { .. } => Self::NoRecordFound(e.to_string()),
            CartError::NotCartOwner(_) => Self::InsufficientPermissions(e.to_string()),
            CartError::ValidationError(_) => Self::InvalidRequest(e.to_string()),
            CartError::Inventory(e) => e.into(),
        }
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::DatabaseError(s) => {
                error!("💻️ Order storage error. {s}");
                Self::StorageUnavailable(s)
            },
            OrderFlowError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            OrderFlowError::OrderAlreadyExists(_) => Self::Conflict(e.to_string()),
            OrderFlowError::IllegalTransition { .. } => Self::Conflict(e.to_string()),
            OrderFlowError::NotOrderSeller(_) | OrderFlowError::NotOrderBuyer(_) => {
                Self::InsufficientPermissions(e.to_string())
            },
            OrderFlowError::ValidationError(_) |
            OrderFlowError::MissingSellerInfo(_) |
            OrderFlowError::TotalMismatch { .. } |
            OrderFlowError::EmptyCart => Self::InvalidRequest(e.to_string()),
            OrderFlowError::PartialCheckout(failure) => Self::PartialCheckout(failure),
            OrderFlowError::Cart(e) => e.into(),
            OrderFlowError::Inventory(e) => e.into(),
        }
    }
}

impl From<PaymentError> for ServerError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::DatabaseError(s) => {
                error!("💻️ Payment storage error. {s}");
                Self::StorageUnavailable(s)
            },
            PaymentError::SignatureMismatch => Self::PaymentVerificationFailed,
            PaymentError::DraftNotFound(_) | PaymentError::TransactionNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            PaymentError::NotDraftOwner(_) | PaymentError::NotTransactionOwner(_) => {
                Self::InsufficientPermissions(e.to_string())
            },
            PaymentError::InvalidCallback(_) | PaymentError::PaymentNotCompleted(_) => {
                Self::InvalidRequest(e.to_string())
            },
            PaymentError::ConfigurationError(s) => Self::ConfigurationError(s),
            PaymentError::Checkout(e) => e.into(),
            PaymentError::Cart(e) => e.into(),
        }
    }
}

impl From<CatalogError> for ServerError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::DatabaseError(s) => {
                error!("💻️ Catalog storage error. {s}");
                Self::StorageUnavailable(s)
            },
        }
    }
}
