//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into [`OrderEntryService`]
//! as an `Arc<CoreConfig>`. Nothing in the engine reads environment variables while a
//! submission is being processed.
//!
//! [`OrderEntryService`]: crate::service::OrderEntryService

use crate::constants::{DEFAULT_DRUG_ORDER_TYPE, DEFAULT_VOID_REASON, ORDERS_DIR_NAME};
use crate::{OrderError, OrderResult};
use orderchain_types::{ConceptCode, NonEmptyText};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where an order's activation date comes from when the submission does not supply one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DateActivatedSource {
    /// The encounter's effective date.
    #[default]
    EncounterDate,
    /// The moment the form was submitted.
    EntryDate,
}

impl FromStr for DateActivatedSource {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "encounter_date" | "encounterDate" => Ok(Self::EncounterDate),
            "entry_date" | "entryDate" => Ok(Self::EntryDate),
            other => Err(OrderError::InvalidInput(format!(
                "unknown date activated source '{}' (expected encounter_date or entry_date)",
                other
            ))),
        }
    }
}

impl fmt::Display for DateActivatedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EncounterDate => "encounter_date",
            Self::EntryDate => "entry_date",
        })
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    date_activated_source: DateActivatedSource,
    void_reason: NonEmptyText,
    default_order_type: ConceptCode,
}

impl CoreConfig {
    pub fn new(
        data_dir: PathBuf,
        date_activated_source: DateActivatedSource,
        void_reason: NonEmptyText,
        default_order_type: ConceptCode,
    ) -> Self {
        Self {
            data_dir,
            date_activated_source,
            void_reason,
            default_order_type,
        }
    }

    /// Configuration with the stock void reason and order type.
    pub fn with_defaults(
        data_dir: PathBuf,
        date_activated_source: DateActivatedSource,
    ) -> OrderResult<Self> {
        let void_reason = NonEmptyText::new(DEFAULT_VOID_REASON)
            .map_err(|e| OrderError::InvalidInput(e.to_string()))?;
        let default_order_type = ConceptCode::parse(DEFAULT_DRUG_ORDER_TYPE)
            .map_err(|e| OrderError::InvalidInput(e.to_string()))?;
        Ok(Self::new(
            data_dir,
            date_activated_source,
            void_reason,
            default_order_type,
        ))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn orders_dir(&self) -> PathBuf {
        self.data_dir.join(ORDERS_DIR_NAME)
    }

    pub fn date_activated_source(&self) -> DateActivatedSource {
        self.date_activated_source
    }

    pub fn void_reason(&self) -> &NonEmptyText {
        &self.void_reason
    }

    pub fn default_order_type(&self) -> &ConceptCode {
        &self.default_order_type
    }
}

/// Parse the activation date source from an optional environment value.
///
/// `None`, empty or whitespace-only values select [`DateActivatedSource::EncounterDate`].
pub fn date_activated_source_from_env_value(
    value: Option<String>,
) -> OrderResult<DateActivatedSource> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let parsed = value
        .map(|v| v.parse::<DateActivatedSource>())
        .transpose()?;

    Ok(parsed.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_value_defaults_to_encounter_date() {
        assert_eq!(
            date_activated_source_from_env_value(None).unwrap(),
            DateActivatedSource::EncounterDate
        );
        assert_eq!(
            date_activated_source_from_env_value(Some("   ".into())).unwrap(),
            DateActivatedSource::EncounterDate
        );
    }

    #[test]
    fn env_value_accepts_both_spellings() {
        for value in ["entry_date", "entryDate", " entry_date "] {
            assert_eq!(
                date_activated_source_from_env_value(Some(value.into())).unwrap(),
                DateActivatedSource::EntryDate
            );
        }
    }

    #[test]
    fn env_value_rejects_unknown_source() {
        let err = date_activated_source_from_env_value(Some("yesterday".into())).unwrap_err();
        assert!(matches!(err, OrderError::InvalidInput(msg) if msg.contains("yesterday")));
    }

    #[test]
    fn defaults_fill_void_reason_and_order_type() {
        let cfg = CoreConfig::with_defaults(
            PathBuf::from("/tmp/orders"),
            DateActivatedSource::EncounterDate,
        )
        .unwrap();
        assert_eq!(cfg.void_reason().as_str(), DEFAULT_VOID_REASON);
        assert_eq!(cfg.default_order_type().as_str(), DEFAULT_DRUG_ORDER_TYPE);
        assert_eq!(cfg.orders_dir(), PathBuf::from("/tmp/orders/orders"));
    }
}
