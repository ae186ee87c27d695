//! # Orderchain Core
//!
//! Drug order action resolution and versioning.
//!
//! A drug order form submits one intended action (NEW, REVISE, RENEW or DISCONTINUE) for one
//! drug. This crate turns that submission into persisted order versions:
//! - validates the action against the submitted fields and the order it acts on
//! - resolves the chain transition, including the same-encounter collapse rule
//! - resolves activation, effective-start and stop timestamps
//! - builds the new order and commits it with every close and void as one unit
//!
//! **No presentation concerns**: form rendering and message localisation live outside this
//! crate. Errors carry a stable [`OrderError::message_key`] for that purpose.

pub mod builder;
pub mod chain;
pub mod config;
pub mod constants;
pub mod dates;
pub mod draft;
pub mod error;
pub mod form;
pub mod ids;
pub mod order;
pub mod repositories;
pub mod service;
pub mod validation;

pub use builder::ChainCommit;
pub use chain::{ChainPlan, CloseMode, Closure};
pub use config::{date_activated_source_from_env_value, CoreConfig, DateActivatedSource};
pub use draft::{ActivationInput, EncounterContext, OrderDraft};
pub use error::{OrderError, OrderResult};
pub use form::{DrugOrderFormFields, FieldDefaults};
pub use ids::{EncounterId, OrderId, PatientId};
pub use order::{
    Dispensing, Dosing, DosingType, FreeTextDosing, Order, OrderAction, OrderDuration,
    OrderState, SimpleDosing, Urgency,
};
pub use repositories::file::FileOrderRepository;
pub use repositories::memory::InMemoryOrderRepository;
pub use repositories::{CommitOutcome, OrderRepository};
pub use service::OrderEntryService;

pub use orderchain_types::{ConceptCode, NonEmptyText, NonNegativeDecimal, ValueError};
