//! Constants used throughout the orderchain core crate.

/// Directory (under the data directory) holding the per-patient order ledgers.
pub const ORDERS_DIR_NAME: &str = "orders";

/// Filename of a patient's order ledger.
pub const ORDER_LEDGER_FILENAME: &str = "orders.json";

/// Suffix of the scratch file a ledger is written to before being renamed into place.
pub const LEDGER_TMP_SUFFIX: &str = "tmp";

/// Default data directory when none is configured.
pub const DEFAULT_DATA_DIR: &str = "order_data";

/// Reason recorded on orders voided by the same-encounter collapse rule.
pub const DEFAULT_VOID_REASON: &str = "Voided by orderchain";

/// Order type applied when a submission does not name one.
pub const DEFAULT_DRUG_ORDER_TYPE: &str = "drug-order";

/// Environment variable naming the data directory.
pub const DATA_DIR_ENV: &str = "ORDERCHAIN_DATA_DIR";

/// Environment variable selecting where default activation dates come from.
pub const DATE_ACTIVATED_SOURCE_ENV: &str = "ORDERCHAIN_DATE_ACTIVATED_SOURCE";

/// Environment variable naming the YAML file of form field defaults.
pub const FIELD_DEFAULTS_ENV: &str = "ORDERCHAIN_FIELD_DEFAULTS";
