//! The persisted order model.
//!
//! An [`Order`] is one version in a patient's prescribing history for one drug. Versions link
//! backwards through [`Order::previous_order`] by identifier; the chain is resolved through a
//! repository rather than held as in-memory references.

use crate::ids::{EncounterId, OrderId, PatientId};
use crate::{OrderError, OrderResult};
use chrono::NaiveDateTime;
use orderchain_types::{ConceptCode, NonEmptyText, NonNegativeDecimal};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a submission intends to do to the drug's order chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderAction {
    New,
    Revise,
    Renew,
    Discontinue,
}

impl OrderAction {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderAction::New => "NEW",
            OrderAction::Revise => "REVISE",
            OrderAction::Renew => "RENEW",
            OrderAction::Discontinue => "DISCONTINUE",
        }
    }

    /// Every action except NEW acts on an existing order.
    pub fn requires_previous_order(self) -> bool {
        !matches!(self, OrderAction::New)
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderAction {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "NEW" => Ok(OrderAction::New),
            "REVISE" => Ok(OrderAction::Revise),
            "RENEW" => Ok(OrderAction::Renew),
            "DISCONTINUE" => Ok(OrderAction::Discontinue),
            other => Err(OrderError::InvalidField {
                field: "action",
                message: format!("unknown order action '{}'", other),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    #[default]
    Routine,
    OnScheduledDate,
}

impl FromStr for Urgency {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ROUTINE" => Ok(Urgency::Routine),
            "ON_SCHEDULED_DATE" => Ok(Urgency::OnScheduledDate),
            other => Err(OrderError::InvalidField {
                field: "urgency",
                message: format!("unknown urgency '{}'", other),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DosingType {
    Simple,
    FreeText,
}

impl FromStr for DosingType {
    type Err = OrderError;

    /// Accepts `SIMPLE`/`FREE_TEXT` as well as the class-style names used by form
    /// configuration, optionally package-qualified (`org.example.SimpleDosingInstructions`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let simple_name = trimmed.rsplit('.').next().unwrap_or(trimmed);
        match simple_name {
            "SIMPLE" | "SimpleDosingInstructions" => Ok(DosingType::Simple),
            "FREE_TEXT" | "FreeTextDosingInstructions" => Ok(DosingType::FreeText),
            _ => Err(OrderError::InvalidField {
                field: "dosingType",
                message: format!("unknown dosing type '{}'", trimmed),
            }),
        }
    }
}

/// Structured dosing: an amount of a unit by a route at a frequency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimpleDosing {
    pub dose: NonNegativeDecimal,
    pub dose_units: ConceptCode,
    pub route: ConceptCode,
    pub frequency: ConceptCode,
    #[serde(default)]
    pub as_needed: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FreeTextDosing {
    pub instructions: NonEmptyText,
}

/// Dosing content of an order. Exactly one field group exists per order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dosing_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Dosing {
    Simple(SimpleDosing),
    FreeText(FreeTextDosing),
}

impl Dosing {
    pub fn dosing_type(&self) -> DosingType {
        match self {
            Dosing::Simple(_) => DosingType::Simple,
            Dosing::FreeText(_) => DosingType::FreeText,
        }
    }

    pub fn free_text(instructions: NonEmptyText) -> Self {
        Dosing::FreeText(FreeTextDosing { instructions })
    }
}

/// How long the order runs, as a count of a duration unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDuration {
    pub value: u32,
    pub units: ConceptCode,
}

/// Outpatient dispensing instructions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dispensing {
    pub quantity: NonNegativeDecimal,
    pub quantity_units: ConceptCode,
    pub num_refills: u32,
}

/// Where an order sits in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderState {
    /// The currently active prescription for the drug.
    Open,
    /// Superseded, discontinued, or itself a discontinuation record.
    Closed,
    /// Removed from history by the collapse rule. Terminal.
    Voided,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub patient: PatientId,
    pub encounter: EncounterId,
    pub drug: ConceptCode,
    pub action: OrderAction,
    pub previous_order: Option<OrderId>,
    pub care_setting: ConceptCode,
    pub order_type: ConceptCode,
    pub urgency: Urgency,
    pub scheduled_date: Option<NaiveDateTime>,
    pub date_activated: NaiveDateTime,
    pub date_stopped: Option<NaiveDateTime>,
    pub date_created: NaiveDateTime,
    /// Absent only on discontinuation records.
    pub dosing: Option<Dosing>,
    pub duration: Option<OrderDuration>,
    pub dispensing: Option<Dispensing>,
    pub instructions: Option<NonEmptyText>,
    pub order_reason: Option<ConceptCode>,
    pub discontinue_reason: Option<ConceptCode>,
    pub orderer: Option<ConceptCode>,
    #[serde(default)]
    pub voided: bool,
    pub void_reason: Option<NonEmptyText>,
}

impl Order {
    /// A discontinuation record is never itself an active prescription.
    pub fn is_open(&self) -> bool {
        !self.voided && self.date_stopped.is_none() && self.action != OrderAction::Discontinue
    }

    pub fn state(&self) -> OrderState {
        if self.voided {
            OrderState::Voided
        } else if self.is_open() {
            OrderState::Open
        } else {
            OrderState::Closed
        }
    }

    /// When therapy is intended to begin: the scheduled date for scheduled orders, otherwise
    /// the activation date.
    pub fn effective_start_date(&self) -> NaiveDateTime {
        match (self.urgency, self.scheduled_date) {
            (Urgency::OnScheduledDate, Some(scheduled)) => scheduled,
            _ => self.date_activated,
        }
    }

    pub fn same_dosing_as(&self, dosing: Option<&Dosing>) -> bool {
        self.dosing.as_ref() == dosing
    }

    pub fn belongs_to(&self, patient: &PatientId, drug: &ConceptCode) -> bool {
        &self.patient == patient && &self.drug == drug
    }
}

/// Sorts orders oldest first by activation, then by entry time.
pub(crate) fn sort_chronologically(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        a.date_activated
            .cmp(&b.date_activated)
            .then(a.date_created.cmp(&b.date_created))
    });
}

pub(crate) fn parse_code(field: &'static str, value: &str) -> OrderResult<ConceptCode> {
    ConceptCode::parse(value).map_err(|e| OrderError::InvalidField {
        field,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_order(action: OrderAction) -> Order {
        Order {
            id: OrderId::new(),
            patient: PatientId::new(),
            encounter: EncounterId::new(),
            drug: ConceptCode::parse("2").unwrap(),
            action,
            previous_order: None,
            care_setting: ConceptCode::parse("2").unwrap(),
            order_type: ConceptCode::parse("drug-order").unwrap(),
            urgency: Urgency::Routine,
            scheduled_date: None,
            date_activated: at(2020, 3, 30),
            date_stopped: None,
            date_created: at(2020, 3, 30),
            dosing: Some(Dosing::free_text(NonEmptyText::new("Triomune").unwrap())),
            duration: None,
            dispensing: None,
            instructions: None,
            order_reason: None,
            discontinue_reason: None,
            orderer: None,
            voided: false,
            void_reason: None,
        }
    }

    #[test]
    fn action_names_round_trip() {
        for action in [
            OrderAction::New,
            OrderAction::Revise,
            OrderAction::Renew,
            OrderAction::Discontinue,
        ] {
            assert_eq!(action.as_str().parse::<OrderAction>().unwrap(), action);
        }
        assert!("revise".parse::<OrderAction>().is_err());
    }

    #[test]
    fn dosing_type_accepts_class_style_names() {
        assert_eq!(
            "org.openmrs.SimpleDosingInstructions"
                .parse::<DosingType>()
                .unwrap(),
            DosingType::Simple
        );
        assert_eq!(
            "FreeTextDosingInstructions".parse::<DosingType>().unwrap(),
            DosingType::FreeText
        );
        assert_eq!("FREE_TEXT".parse::<DosingType>().unwrap(), DosingType::FreeText);
        assert!("Taper".parse::<DosingType>().is_err());
    }

    #[test]
    fn state_follows_stop_and_void() {
        let mut order = sample_order(OrderAction::New);
        assert_eq!(order.state(), OrderState::Open);

        order.date_stopped = Some(at(2020, 5, 14));
        assert_eq!(order.state(), OrderState::Closed);

        order.voided = true;
        assert_eq!(order.state(), OrderState::Voided);
    }

    #[test]
    fn discontinuation_record_is_never_open() {
        let mut order = sample_order(OrderAction::Discontinue);
        order.dosing = None;
        assert!(!order.is_open());
        assert_eq!(order.state(), OrderState::Closed);
    }

    #[test]
    fn effective_start_uses_scheduled_date_only_when_scheduled() {
        let mut order = sample_order(OrderAction::New);
        order.scheduled_date = Some(at(2020, 5, 2));
        assert_eq!(order.effective_start_date(), at(2020, 3, 30));

        order.urgency = Urgency::OnScheduledDate;
        assert_eq!(order.effective_start_date(), at(2020, 5, 2));
    }

    #[test]
    fn dosing_serializes_with_type_tag() {
        let dosing = Dosing::Simple(SimpleDosing {
            dose: NonNegativeDecimal::new(2.0).unwrap(),
            dose_units: ConceptCode::parse("51").unwrap(),
            route: ConceptCode::parse("1").unwrap(),
            frequency: ConceptCode::parse("22").unwrap(),
            as_needed: true,
        });
        let json = serde_json::to_value(&dosing).unwrap();
        assert_eq!(json["dosing_type"], "SIMPLE");
        assert_eq!(json["dose_units"], "51");
    }
}
