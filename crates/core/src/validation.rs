//! Per-action precondition checks.
//!
//! Every check here runs before anything is resolved or written, so a failure leaves no
//! trace in the order store. Callers check the previous-order reference first, then resolve and
//! compare against the previous order, and only then check the remaining fields.

use crate::draft::OrderDraft;
use crate::ids::OrderId;
use crate::order::{Order, OrderAction, Urgency};
use crate::{OrderError, OrderResult};

/// Returns the previous-order reference the action needs, or `None` for NEW.
///
/// # Errors
///
/// [`OrderError::PreviousOrderRequired`] when REVISE, RENEW or DISCONTINUE has no reference.
pub fn require_previous_reference(draft: &OrderDraft) -> OrderResult<Option<&OrderId>> {
    if !draft.action.requires_previous_order() {
        return Ok(None);
    }
    draft
        .previous_reference()
        .map(Some)
        .ok_or(OrderError::PreviousOrderRequired {
            action: draft.action,
        })
}

/// Checks that the submitted fields fit the action and urgency.
pub fn validate_fields(draft: &OrderDraft) -> OrderResult<()> {
    match draft.action {
        OrderAction::Discontinue => {
            if draft.discontinue_reason.is_none() {
                return Err(OrderError::DiscontinueReasonRequired);
            }
        }
        action => {
            if draft.dosing.is_none() {
                return Err(OrderError::DosingRequired { action });
            }
        }
    }

    match (draft.urgency, draft.scheduled_date) {
        (Urgency::OnScheduledDate, None) => Err(OrderError::ScheduledDateRequired),
        (Urgency::Routine, Some(_)) => Err(OrderError::ScheduledDateNotAllowed),
        _ => Ok(()),
    }
}

/// Checks the draft against the order it acts on.
///
/// - REVISE may not change the drug.
/// - RENEW may not change any dosing field, including the dosing type.
/// - RENEW and DISCONTINUE must reference an order for the same drug.
pub fn validate_against_previous(draft: &OrderDraft, previous: &Order) -> OrderResult<()> {
    match draft.action {
        OrderAction::New => Ok(()),
        OrderAction::Revise => {
            if previous.drug != draft.drug {
                return Err(OrderError::DrugChangedForRevision {
                    previous: previous.drug.clone(),
                    submitted: draft.drug.clone(),
                });
            }
            Ok(())
        }
        OrderAction::Renew => {
            if previous.drug != draft.drug {
                return Err(OrderError::PreviousOrderNotFound(previous.id.clone()));
            }
            if !previous.same_dosing_as(draft.dosing.as_ref()) {
                return Err(OrderError::DosingChangedForRenew {
                    previous: previous.id.clone(),
                });
            }
            Ok(())
        }
        OrderAction::Discontinue => {
            if previous.drug != draft.drug {
                return Err(OrderError::PreviousOrderNotFound(previous.id.clone()));
            }
            Ok(())
        }
    }
}
