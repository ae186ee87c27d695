//! Activation, scheduled and stop timestamps.

use crate::config::DateActivatedSource;
use crate::draft::{start_of_day, EncounterContext, OrderDraft};
use crate::order::Urgency;
use chrono::{Duration, NaiveDateTime};

/// Timestamps resolved for one submission.
///
/// The effective start is not stored separately; [`crate::Order::effective_start_date`] derives
/// it from these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedDates {
    pub date_activated: NaiveDateTime,
    /// Midnight of the scheduled day, only for ON_SCHEDULED_DATE orders.
    pub scheduled_date: Option<NaiveDateTime>,
}

/// Resolves the activation and scheduled dates of a submission.
///
/// An explicit activation date wins. Otherwise `source` picks either the encounter's effective
/// date, taken at midnight, or the moment the form was entered.
pub fn resolve_dates(
    draft: &OrderDraft,
    ctx: &EncounterContext,
    source: DateActivatedSource,
) -> ResolvedDates {
    let date_activated = match draft.date_activated {
        Some(explicit) => explicit.to_datetime(),
        None => match source {
            DateActivatedSource::EncounterDate => start_of_day(ctx.effective_date.date()),
            DateActivatedSource::EntryDate => ctx.entry_timestamp,
        },
    };

    let scheduled_date = match draft.urgency {
        Urgency::OnScheduledDate => draft.scheduled_date.map(start_of_day),
        Urgency::Routine => None,
    };

    ResolvedDates {
        date_activated,
        scheduled_date,
    }
}

/// The instant a predecessor stops when its successor activates at `activation`.
///
/// One second earlier, which is 23:59:59 of the prior day for a date-only activation.
pub fn stop_instant_before(activation: NaiveDateTime) -> NaiveDateTime {
    activation - Duration::seconds(1)
}

/// Whether two activation timestamps fall on the same calendar day.
pub fn same_activation_day(a: NaiveDateTime, b: NaiveDateTime) -> bool {
    a.date() == b.date()
}
