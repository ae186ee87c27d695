use crate::ids::OrderId;
use crate::order::OrderAction;
use orderchain_types::ConceptCode;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("{action} requires a previous order")]
    PreviousOrderRequired { action: OrderAction },
    #[error("revision changes drug from {previous} to {submitted}")]
    DrugChangedForRevision {
        previous: ConceptCode,
        submitted: ConceptCode,
    },
    #[error("renewal changes the dosing of order {previous}")]
    DosingChangedForRenew { previous: OrderId },
    #[error("previous order {0} not found for this patient and drug")]
    PreviousOrderNotFound(OrderId),
    #[error("order {order} cannot be changed: {reason}")]
    ChainIntegrityViolation { order: OrderId, reason: String },

    #[error("{action} requires dosing")]
    DosingRequired { action: OrderAction },
    #[error("discontinuation requires a discontinue reason")]
    DiscontinueReasonRequired,
    #[error("an order on a scheduled date requires a scheduled date")]
    ScheduledDateRequired,
    #[error("a routine order cannot carry a scheduled date")]
    ScheduledDateNotAllowed,

    #[error("invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("order store lock was poisoned")]
    StorePoisoned,
    #[error("failed to create order store directory: {0}")]
    StoreDirCreation(std::io::Error),
    #[error("failed to read order ledger: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write order ledger: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize order ledger: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize order ledger: {0}")]
    Deserialization(serde_json::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
}

impl OrderError {
    pub(crate) fn integrity(order: &OrderId, reason: impl Into<String>) -> Self {
        OrderError::ChainIntegrityViolation {
            order: order.clone(),
            reason: reason.into(),
        }
    }

    /// Stable key under which the user-facing message for this failure is localised.
    ///
    /// Returns `None` for storage and configuration failures, which are not the user's to fix.
    pub fn message_key(&self) -> Option<&'static str> {
        let key = match self {
            OrderError::PreviousOrderRequired { .. } => "drugOrderError.previousOrderRequired",
            OrderError::DrugChangedForRevision { .. } => "drugOrderError.drugChangedForRevision",
            OrderError::DosingChangedForRenew { .. } => "drugOrderError.dosingChangedForRenew",
            OrderError::PreviousOrderNotFound(_) => "drugOrderError.previousOrderNotFound",
            OrderError::ChainIntegrityViolation { .. } => "drugOrderError.chainIntegrityViolation",
            OrderError::DosingRequired { .. } => "drugOrderError.dosingRequired",
            OrderError::DiscontinueReasonRequired => "drugOrderError.discontinueReasonRequired",
            OrderError::ScheduledDateRequired => "drugOrderError.scheduledDateRequired",
            OrderError::ScheduledDateNotAllowed => "drugOrderError.scheduledDateNotAllowed",
            OrderError::InvalidField { .. } => "drugOrderError.invalidField",
            _ => return None,
        };
        Some(key)
    }
}

pub type OrderResult<T> = std::result::Result<T, OrderError>;
