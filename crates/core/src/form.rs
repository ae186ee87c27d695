//! Translation of raw drug order form fields into an [`OrderDraft`].
//!
//! A form submits every property of a drug order as a string. Empty and whitespace-only
//! values are treated as absent, and configured per-field defaults fill absent values before
//! anything is parsed.
//!
//! # Value formats
//!
//! - `action`, `urgency`: upper-case names (`REVISE`, `ON_SCHEDULED_DATE`).
//! - `dosingType`: `SIMPLE`/`FREE_TEXT` or the class-style names.
//! - `dose`, `quantity`: non-negative decimals.
//! - `duration`, `numRefills`: non-negative integers.
//! - `asNeeded`: `true` or `false`.
//! - dates: `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`.

use crate::draft::{ActivationInput, OrderDraft};
use crate::ids::OrderId;
use crate::order::{
    parse_code, Dispensing, Dosing, DosingType, FreeTextDosing, OrderAction, OrderDuration,
    SimpleDosing, Urgency,
};
use crate::{OrderError, OrderResult};
use chrono::{NaiveDate, NaiveDateTime};
use orderchain_types::{ConceptCode, NonEmptyText, NonNegativeDecimal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Raw values of one drug order form field, keyed by property name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DrugOrderFormFields {
    pub drug: Option<String>,
    pub action: Option<String>,
    pub previous_order: Option<String>,
    pub care_setting: Option<String>,
    pub order_type: Option<String>,
    pub dosing_type: Option<String>,
    pub dosing_instructions: Option<String>,
    pub dose: Option<String>,
    pub dose_units: Option<String>,
    pub route: Option<String>,
    pub frequency: Option<String>,
    pub as_needed: Option<String>,
    pub instructions: Option<String>,
    pub urgency: Option<String>,
    pub scheduled_date: Option<String>,
    pub date_activated: Option<String>,
    pub duration: Option<String>,
    pub duration_units: Option<String>,
    pub quantity: Option<String>,
    pub quantity_units: Option<String>,
    pub num_refills: Option<String>,
    pub order_reason: Option<String>,
    pub discontinue_reason: Option<String>,
}

impl DrugOrderFormFields {
    fn slot_mut(&mut self, property: &str) -> Option<&mut Option<String>> {
        let slot = match property {
            "drug" => &mut self.drug,
            "action" => &mut self.action,
            "previousOrder" => &mut self.previous_order,
            "careSetting" => &mut self.care_setting,
            "orderType" => &mut self.order_type,
            "dosingType" => &mut self.dosing_type,
            "dosingInstructions" => &mut self.dosing_instructions,
            "dose" => &mut self.dose,
            "doseUnits" => &mut self.dose_units,
            "route" => &mut self.route,
            "frequency" => &mut self.frequency,
            "asNeeded" => &mut self.as_needed,
            "instructions" => &mut self.instructions,
            "urgency" => &mut self.urgency,
            "scheduledDate" => &mut self.scheduled_date,
            "dateActivated" => &mut self.date_activated,
            "duration" => &mut self.duration,
            "durationUnits" => &mut self.duration_units,
            "quantity" => &mut self.quantity,
            "quantityUnits" => &mut self.quantity_units,
            "numRefills" => &mut self.num_refills,
            "orderReason" => &mut self.order_reason,
            "discontinueReason" => &mut self.discontinue_reason,
            _ => return None,
        };
        Some(slot)
    }

    /// Parses the fields into a draft after applying `defaults`.
    ///
    /// The previous-order reference is only parsed for actions that use one.
    ///
    /// # Errors
    ///
    /// [`OrderError::InvalidField`] naming the first property that is missing or malformed.
    pub fn into_draft(mut self, defaults: &FieldDefaults) -> OrderResult<OrderDraft> {
        defaults.apply(&mut self)?;
        let fields = self.normalised();

        let action: OrderAction = required(fields.action.as_deref(), "action")?.parse()?;
        let drug = parse_code("drug", required(fields.drug.as_deref(), "drug")?)?;
        let care_setting = parse_code(
            "careSetting",
            required(fields.care_setting.as_deref(), "careSetting")?,
        )?;

        let mut draft = OrderDraft::new(action, drug, care_setting);

        if action.requires_previous_order() {
            draft.previous_order = fields
                .previous_order
                .as_deref()
                .map(|value| {
                    OrderId::parse(value).map_err(|e| OrderError::InvalidField {
                        field: "previousOrder",
                        message: e.to_string(),
                    })
                })
                .transpose()?;
        }

        draft.order_type = optional_code(fields.order_type.as_deref(), "orderType")?;
        if let Some(urgency) = fields.urgency.as_deref() {
            draft.urgency = urgency.parse::<Urgency>()?;
        }
        draft.scheduled_date = fields
            .scheduled_date
            .as_deref()
            .map(|value| parse_date(value, "scheduledDate"))
            .transpose()?;
        draft.date_activated = fields
            .date_activated
            .as_deref()
            .map(|value| parse_activation(value, "dateActivated"))
            .transpose()?;

        draft.dosing = fields.dosing()?;
        draft.duration = fields.order_duration()?;
        draft.dispensing = fields.dispensing()?;

        draft.instructions = fields
            .instructions
            .as_deref()
            .map(|value| text(value, "instructions"))
            .transpose()?;
        draft.order_reason = optional_code(fields.order_reason.as_deref(), "orderReason")?;
        draft.discontinue_reason =
            optional_code(fields.discontinue_reason.as_deref(), "discontinueReason")?;

        Ok(draft)
    }

    fn normalised(self) -> Self {
        fn present(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            drug: present(self.drug),
            action: present(self.action),
            previous_order: present(self.previous_order),
            care_setting: present(self.care_setting),
            order_type: present(self.order_type),
            dosing_type: present(self.dosing_type),
            dosing_instructions: present(self.dosing_instructions),
            dose: present(self.dose),
            dose_units: present(self.dose_units),
            route: present(self.route),
            frequency: present(self.frequency),
            as_needed: present(self.as_needed),
            instructions: present(self.instructions),
            urgency: present(self.urgency),
            scheduled_date: present(self.scheduled_date),
            date_activated: present(self.date_activated),
            duration: present(self.duration),
            duration_units: present(self.duration_units),
            quantity: present(self.quantity),
            quantity_units: present(self.quantity_units),
            num_refills: present(self.num_refills),
            order_reason: present(self.order_reason),
            discontinue_reason: present(self.discontinue_reason),
        }
    }

    fn has_simple_dosing_fields(&self) -> bool {
        self.dose.is_some()
            || self.dose_units.is_some()
            || self.route.is_some()
            || self.frequency.is_some()
            || self.as_needed.is_some()
    }

    /// Picks the dosing group: an explicit type wins, otherwise the group that has values.
    fn dosing(&self) -> OrderResult<Option<Dosing>> {
        let dosing_type = match self.dosing_type.as_deref() {
            Some(value) => value.parse::<DosingType>()?,
            None => match (
                self.dosing_instructions.is_some(),
                self.has_simple_dosing_fields(),
            ) {
                (false, false) => return Ok(None),
                (true, false) => DosingType::FreeText,
                (false, true) => DosingType::Simple,
                (true, true) => {
                    return Err(OrderError::InvalidField {
                        field: "dosingType",
                        message: "both simple and free-text dosing supplied".into(),
                    })
                }
            },
        };

        let dosing = match dosing_type {
            DosingType::FreeText => Dosing::FreeText(FreeTextDosing {
                instructions: text(
                    required(self.dosing_instructions.as_deref(), "dosingInstructions")?,
                    "dosingInstructions",
                )?,
            }),
            DosingType::Simple => Dosing::Simple(SimpleDosing {
                dose: decimal(required(self.dose.as_deref(), "dose")?, "dose")?,
                dose_units: parse_code(
                    "doseUnits",
                    required(self.dose_units.as_deref(), "doseUnits")?,
                )?,
                route: parse_code("route", required(self.route.as_deref(), "route")?)?,
                frequency: parse_code(
                    "frequency",
                    required(self.frequency.as_deref(), "frequency")?,
                )?,
                as_needed: self
                    .as_needed
                    .as_deref()
                    .map(|value| boolean(value, "asNeeded"))
                    .transpose()?
                    .unwrap_or(false),
            }),
        };
        Ok(Some(dosing))
    }

    fn order_duration(&self) -> OrderResult<Option<OrderDuration>> {
        match (self.duration.as_deref(), self.duration_units.as_deref()) {
            (None, None) => Ok(None),
            (Some(value), Some(units)) => Ok(Some(OrderDuration {
                value: count(value, "duration")?,
                units: parse_code("durationUnits", units)?,
            })),
            (Some(_), None) => Err(missing("durationUnits")),
            (None, Some(_)) => Err(missing("duration")),
        }
    }

    /// The dispensing group exists exactly when a quantity is given.
    fn dispensing(&self) -> OrderResult<Option<Dispensing>> {
        let Some(quantity) = self.quantity.as_deref() else {
            if self.quantity_units.is_some() || self.num_refills.is_some() {
                return Err(missing("quantity"));
            }
            return Ok(None);
        };

        Ok(Some(Dispensing {
            quantity: decimal(quantity, "quantity")?,
            quantity_units: parse_code(
                "quantityUnits",
                required(self.quantity_units.as_deref(), "quantityUnits")?,
            )?,
            num_refills: self
                .num_refills
                .as_deref()
                .map(|value| count(value, "numRefills"))
                .transpose()?
                .unwrap_or(0),
        }))
    }
}

// ============================================================================
// FIELD DEFAULTS
// ============================================================================

/// A configured default for one property.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDefault {
    pub value: String,
}

/// Per-property defaults applied to absent form values, loaded from YAML:
///
/// ```yaml
/// careSetting:
///   value: "2"
/// urgency:
///   value: ROUTINE
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FieldDefaults(BTreeMap<String, FieldDefault>);

impl FieldDefaults {
    pub fn from_yaml_str(yaml: &str) -> OrderResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(OrderError::YamlDeserialization)
    }

    pub fn from_path(path: &Path) -> OrderResult<Self> {
        let yaml = fs::read_to_string(path).map_err(OrderError::FileRead)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fills every absent or blank property that has a default.
    ///
    /// # Errors
    ///
    /// [`OrderError::InvalidField`] if a default names an unknown property.
    pub fn apply(&self, fields: &mut DrugOrderFormFields) -> OrderResult<()> {
        for (property, default) in &self.0 {
            let slot = fields
                .slot_mut(property)
                .ok_or_else(|| OrderError::InvalidField {
                    field: "defaults",
                    message: format!("unknown property '{}'", property),
                })?;
            let absent = slot.as_deref().map_or(true, |v| v.trim().is_empty());
            if absent {
                *slot = Some(default.value.clone());
            }
        }
        Ok(())
    }
}

// ============================================================================
// VALUE PARSING
// ============================================================================

fn missing(field: &'static str) -> OrderError {
    OrderError::InvalidField {
        field,
        message: "is required".into(),
    }
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> OrderResult<&'a str> {
    value.ok_or_else(|| missing(field))
}

fn optional_code(value: Option<&str>, field: &'static str) -> OrderResult<Option<ConceptCode>> {
    value.map(|v| parse_code(field, v)).transpose()
}

fn text(value: &str, field: &'static str) -> OrderResult<NonEmptyText> {
    NonEmptyText::new(value).map_err(|e| OrderError::InvalidField {
        field,
        message: e.to_string(),
    })
}

fn decimal(value: &str, field: &'static str) -> OrderResult<NonNegativeDecimal> {
    let number: f64 = value.parse().map_err(|_| OrderError::InvalidField {
        field,
        message: format!("'{}' is not a number", value),
    })?;
    NonNegativeDecimal::new(number).map_err(|e| OrderError::InvalidField {
        field,
        message: e.to_string(),
    })
}

fn count(value: &str, field: &'static str) -> OrderResult<u32> {
    value.parse().map_err(|_| OrderError::InvalidField {
        field,
        message: format!("'{}' is not a non-negative whole number", value),
    })
}

fn boolean(value: &str, field: &'static str) -> OrderResult<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(OrderError::InvalidField {
            field,
            message: format!("'{}' is not true or false", other),
        }),
    }
}

fn parse_activation(value: &str, field: &'static str) -> OrderResult<ActivationInput> {
    if let Ok(ts) = NaiveDateTime::parse_from_str(value, DATE_TIME_FORMAT) {
        return Ok(ActivationInput::Timestamp(ts));
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(ActivationInput::Date)
        .map_err(|_| OrderError::InvalidField {
            field,
            message: format!("'{}' is not a date", value),
        })
}

fn parse_date(value: &str, field: &'static str) -> OrderResult<NaiveDate> {
    parse_activation(value, field).map(|input| input.to_datetime().date())
}
