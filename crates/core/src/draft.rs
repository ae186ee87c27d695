//! In-memory submissions and the encounter they are submitted in.

use crate::ids::{EncounterId, OrderId, PatientId};
use crate::order::{Dispensing, Dosing, OrderAction, OrderDuration, Urgency};
use chrono::{NaiveDate, NaiveDateTime};
use orderchain_types::{ConceptCode, NonEmptyText};
use std::collections::BTreeSet;

/// An explicitly submitted activation date.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivationInput {
    /// Date-only input; normalised to midnight.
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl ActivationInput {
    pub fn to_datetime(self) -> NaiveDateTime {
        match self {
            ActivationInput::Date(date) => start_of_day(date),
            ActivationInput::Timestamp(ts) => ts,
        }
    }
}

pub(crate) fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::default())
}

/// One submitted order action and the fields it targets, not yet persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderDraft {
    pub action: OrderAction,
    pub drug: ConceptCode,
    /// Ignored for NEW.
    pub previous_order: Option<OrderId>,
    pub care_setting: ConceptCode,
    /// Falls back to the configured drug order type.
    pub order_type: Option<ConceptCode>,
    pub urgency: Urgency,
    pub scheduled_date: Option<NaiveDate>,
    pub date_activated: Option<ActivationInput>,
    pub dosing: Option<Dosing>,
    pub duration: Option<OrderDuration>,
    pub dispensing: Option<Dispensing>,
    pub instructions: Option<NonEmptyText>,
    pub order_reason: Option<ConceptCode>,
    pub discontinue_reason: Option<ConceptCode>,
}

impl OrderDraft {
    /// A routine draft with nothing but its action, drug and care setting.
    pub fn new(action: OrderAction, drug: ConceptCode, care_setting: ConceptCode) -> Self {
        Self {
            action,
            drug,
            previous_order: None,
            care_setting,
            order_type: None,
            urgency: Urgency::Routine,
            scheduled_date: None,
            date_activated: None,
            dosing: None,
            duration: None,
            dispensing: None,
            instructions: None,
            order_reason: None,
            discontinue_reason: None,
        }
    }

    pub fn with_previous_order(mut self, previous: OrderId) -> Self {
        self.previous_order = Some(previous);
        self
    }

    pub fn with_dosing(mut self, dosing: Dosing) -> Self {
        self.dosing = Some(dosing);
        self
    }

    pub fn with_dispensing(mut self, dispensing: Dispensing) -> Self {
        self.dispensing = Some(dispensing);
        self
    }

    pub fn with_duration(mut self, duration: OrderDuration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn scheduled_for(mut self, date: NaiveDate) -> Self {
        self.urgency = Urgency::OnScheduledDate;
        self.scheduled_date = Some(date);
        self
    }

    pub fn activated_at(mut self, activation: ActivationInput) -> Self {
        self.date_activated = Some(activation);
        self
    }

    pub fn with_discontinue_reason(mut self, reason: ConceptCode) -> Self {
        self.discontinue_reason = Some(reason);
        self
    }

    /// The previous-order reference that applies to this action.
    pub fn previous_reference(&self) -> Option<&OrderId> {
        if self.action.requires_previous_order() {
            self.previous_order.as_ref()
        } else {
            None
        }
    }
}

/// The form session a submission arrives through.
///
/// `session_orders` lists the orders this session has already submitted; an edit that targets
/// one of them may be collapsed instead of chained.
#[derive(Clone, Debug)]
pub struct EncounterContext {
    pub patient: PatientId,
    pub encounter: EncounterId,
    pub effective_date: NaiveDateTime,
    pub provider: Option<ConceptCode>,
    pub entry_timestamp: NaiveDateTime,
    pub session_orders: BTreeSet<OrderId>,
}

impl EncounterContext {
    /// A fresh (non-editing) session entered now.
    pub fn new(patient: PatientId, encounter: EncounterId, effective_date: NaiveDateTime) -> Self {
        Self {
            patient,
            encounter,
            effective_date,
            provider: None,
            entry_timestamp: chrono::Local::now().naive_local(),
            session_orders: BTreeSet::new(),
        }
    }

    pub fn with_provider(mut self, provider: ConceptCode) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_entry_timestamp(mut self, entry_timestamp: NaiveDateTime) -> Self {
        self.entry_timestamp = entry_timestamp;
        self
    }

    /// Reopens the session for editing after it has submitted `orders`.
    pub fn reopen_for_editing(mut self, orders: impl IntoIterator<Item = OrderId>) -> Self {
        self.session_orders.extend(orders);
        self
    }

    pub fn is_session_order(&self, id: &OrderId) -> bool {
        self.session_orders.contains(id)
    }
}
