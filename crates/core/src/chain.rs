//! Chain resolution.
//!
//! Given a validated submission and the order it acts on, decides which order the new version
//! links back to, which orders are closed and which are voided. Nothing is written here; the
//! result is a [`ChainPlan`] that the builder turns into a single commit.
//!
//! ## Same-encounter collapse
//!
//! Re-editing an order that the current form session itself submitted, in the same encounter
//! and on the same activation day, does not append another version. The edited order is voided
//! and the new version links to that order's own predecessor instead. Only one link is
//! skipped. With no usable predecessor the submission becomes a NEW order, and a
//! discontinuation of it creates nothing at all.

use crate::dates::{same_activation_day, stop_instant_before};
use crate::draft::{EncounterContext, OrderDraft};
use crate::ids::OrderId;
use crate::order::{Order, OrderAction};
use crate::repositories::OrderRepository;
use crate::validation::require_previous_reference;
use crate::{OrderError, OrderResult};
use chrono::NaiveDateTime;
use serde::Serialize;

/// How a closure treats the order it stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseMode {
    /// The order must still be open when the commit is applied.
    Open,
    /// The order is already closed; only its stop instant moves.
    Restamp,
}

/// One order to stop as part of a chain transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Closure {
    pub order: OrderId,
    pub date_stopped: NaiveDateTime,
    pub mode: CloseMode,
}

/// The outcome of chain resolution for one submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainPlan {
    /// The action recorded on the new order; collapse may turn an edit into NEW.
    pub action: OrderAction,
    pub previous_link: Option<OrderId>,
    pub closures: Vec<Closure>,
    pub voids: Vec<OrderId>,
    /// False only when a collapsed DISCONTINUE has nothing left to discontinue.
    pub creates_order: bool,
    pub collapsed: bool,
}

impl ChainPlan {
    fn new_order() -> Self {
        Self {
            action: OrderAction::New,
            previous_link: None,
            closures: Vec::new(),
            voids: Vec::new(),
            creates_order: true,
            collapsed: false,
        }
    }
}

/// Looks up the order a REVISE, RENEW or DISCONTINUE acts on.
///
/// Returns `Ok(None)` for NEW. The drug is compared later, by the action validator, because a
/// drug change is reported differently per action.
///
/// # Errors
///
/// - [`OrderError::PreviousOrderRequired`] if the action needs a reference and has none.
/// - [`OrderError::PreviousOrderNotFound`] if the reference is unknown, voided, or belongs to
///   another patient.
pub fn resolve_previous<R>(
    repo: &R,
    ctx: &EncounterContext,
    draft: &OrderDraft,
) -> OrderResult<Option<Order>>
where
    R: OrderRepository + ?Sized,
{
    let Some(reference) = require_previous_reference(draft)? else {
        return Ok(None);
    };

    match repo.find_patient_order(&ctx.patient, reference)? {
        Some(order) if !order.voided => Ok(Some(order)),
        _ => Err(OrderError::PreviousOrderNotFound(reference.clone())),
    }
}

/// Builds the chain plan for an action whose previous order (if any) has been resolved and
/// validated.
///
/// # Errors
///
/// [`OrderError::ChainIntegrityViolation`] if the previous order is no longer open, or if
/// stopping it before `date_activated` would stop it before it started.
pub fn resolve_chain<R>(
    repo: &R,
    ctx: &EncounterContext,
    action: OrderAction,
    previous: Option<&Order>,
    date_activated: NaiveDateTime,
) -> OrderResult<ChainPlan>
where
    R: OrderRepository + ?Sized,
{
    let Some(target) = previous else {
        return Ok(ChainPlan::new_order());
    };

    if collapses_into(ctx, target, date_activated) {
        return collapse(repo, ctx, action, target, date_activated);
    }

    if !target.is_open() {
        return Err(OrderError::integrity(&target.id, "order is not open"));
    }

    Ok(ChainPlan {
        action,
        previous_link: Some(target.id.clone()),
        closures: vec![closure_for(target, date_activated, CloseMode::Open)?],
        voids: Vec::new(),
        creates_order: true,
        collapsed: false,
    })
}

fn collapses_into(ctx: &EncounterContext, target: &Order, date_activated: NaiveDateTime) -> bool {
    ctx.is_session_order(&target.id)
        && target.encounter == ctx.encounter
        && same_activation_day(target.date_activated, date_activated)
        && !target.voided
        && target.date_stopped.is_none()
}

fn collapse<R>(
    repo: &R,
    ctx: &EncounterContext,
    action: OrderAction,
    target: &Order,
    date_activated: NaiveDateTime,
) -> OrderResult<ChainPlan>
where
    R: OrderRepository + ?Sized,
{
    let ancestor = match &target.previous_order {
        Some(id) => repo
            .find_patient_order(&ctx.patient, id)?
            .filter(|order| !order.voided && order.drug == target.drug),
        None => None,
    };

    let voids = vec![target.id.clone()];

    let Some(ancestor) = ancestor else {
        tracing::debug!(
            target_order = %target.id,
            "collapsed edit has no usable predecessor"
        );
        return Ok(ChainPlan {
            action: OrderAction::New,
            previous_link: None,
            closures: Vec::new(),
            voids,
            creates_order: action != OrderAction::Discontinue,
            collapsed: true,
        });
    };

    let mode = if ancestor.is_open() {
        CloseMode::Open
    } else {
        CloseMode::Restamp
    };

    Ok(ChainPlan {
        action,
        previous_link: Some(ancestor.id.clone()),
        closures: vec![closure_for(&ancestor, date_activated, mode)?],
        voids,
        creates_order: true,
        collapsed: true,
    })
}

fn closure_for(
    order: &Order,
    successor_activation: NaiveDateTime,
    mode: CloseMode,
) -> OrderResult<Closure> {
    let date_stopped = stop_instant_before(successor_activation);
    if date_stopped < order.date_activated {
        return Err(OrderError::integrity(
            &order.id,
            format!(
                "stop instant {} precedes activation {}",
                date_stopped, order.date_activated
            ),
        ));
    }
    Ok(Closure {
        order: order.id.clone(),
        date_stopped,
        mode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::start_of_day;
    use crate::ids::{EncounterId, PatientId};
    use crate::order::{Dosing, Urgency};
    use crate::repositories::memory::InMemoryOrderRepository;
    use chrono::NaiveDate;
    use orderchain_types::{ConceptCode, NonEmptyText};

    fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
        start_of_day(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn code(value: &str) -> ConceptCode {
        ConceptCode::parse(value).unwrap()
    }

    fn stored_order(
        patient: &PatientId,
        encounter: &EncounterId,
        action: OrderAction,
        activated: NaiveDateTime,
    ) -> Order {
        Order {
            id: OrderId::new(),
            patient: patient.clone(),
            encounter: encounter.clone(),
            drug: code("2"),
            action,
            previous_order: None,
            care_setting: code("2"),
            order_type: code("drug-order"),
            urgency: Urgency::Routine,
            scheduled_date: None,
            date_activated: activated,
            date_stopped: None,
            date_created: activated,
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
    fn new_action_has_no_link_or_side_effects() {
        let repo = InMemoryOrderRepository::new();
        let ctx = EncounterContext::new(PatientId::new(), EncounterId::new(), day(2020, 3, 30));
        let plan = resolve_chain(&repo, &ctx, OrderAction::New, None, day(2020, 3, 30)).unwrap();
        assert_eq!(plan, ChainPlan::new_order());
    }

    #[test]
    fn revise_in_later_encounter_closes_previous() {
        let patient = PatientId::new();
        let first = stored_order(&patient, &EncounterId::new(), OrderAction::New, day(2020, 3, 30));
        let repo = InMemoryOrderRepository::with_orders([first.clone()]);
        let ctx = EncounterContext::new(patient, EncounterId::new(), day(2020, 5, 15));

        let plan =
            resolve_chain(&repo, &ctx, OrderAction::Revise, Some(&first), day(2020, 5, 15))
                .unwrap();
        assert_eq!(plan.action, OrderAction::Revise);
        assert_eq!(plan.previous_link, Some(first.id.clone()));
        assert!(plan.voids.is_empty());
        assert_eq!(plan.closures.len(), 1);
        assert_eq!(plan.closures[0].order, first.id);
        assert_eq!(plan.closures[0].mode, CloseMode::Open);
        assert_eq!(plan.closures[0].date_stopped.to_string(), "2020-05-14 23:59:59");
    }

    #[test]
    fn closed_previous_is_an_integrity_violation() {
        let patient = PatientId::new();
        let mut first =
            stored_order(&patient, &EncounterId::new(), OrderAction::New, day(2020, 3, 30));
        first.date_stopped = Some(day(2020, 4, 1));
        let repo = InMemoryOrderRepository::with_orders([first.clone()]);
        let ctx = EncounterContext::new(patient, EncounterId::new(), day(2020, 5, 15));

        let err = resolve_chain(&repo, &ctx, OrderAction::Renew, Some(&first), day(2020, 5, 15))
            .unwrap_err();
        assert!(matches!(err, OrderError::ChainIntegrityViolation { order, .. } if order == first.id));
    }

    #[test]
    fn backdated_successor_is_an_integrity_violation() {
        let patient = PatientId::new();
        let first = stored_order(&patient, &EncounterId::new(), OrderAction::New, day(2020, 5, 15));
        let repo = InMemoryOrderRepository::with_orders([first.clone()]);
        let ctx = EncounterContext::new(patient, EncounterId::new(), day(2020, 3, 1));

        let err = resolve_chain(&repo, &ctx, OrderAction::Revise, Some(&first), day(2020, 3, 1))
            .unwrap_err();
        assert!(matches!(err, OrderError::ChainIntegrityViolation { .. }));
    }

    #[test]
    fn collapse_without_predecessor_becomes_new() {
        let patient = PatientId::new();
        let encounter = EncounterId::new();
        let first = stored_order(&patient, &encounter, OrderAction::New, day(2020, 3, 30));
        let repo = InMemoryOrderRepository::with_orders([first.clone()]);
        let ctx = EncounterContext::new(patient, encounter, day(2020, 3, 30))
            .reopen_for_editing([first.id.clone()]);

        let plan =
            resolve_chain(&repo, &ctx, OrderAction::Revise, Some(&first), day(2020, 3, 30))
                .unwrap();
        assert!(plan.collapsed);
        assert!(plan.creates_order);
        assert_eq!(plan.action, OrderAction::New);
        assert_eq!(plan.previous_link, None);
        assert_eq!(plan.voids, vec![first.id.clone()]);
        assert!(plan.closures.is_empty());
    }

    #[test]
    fn collapse_links_to_predecessor_and_restamps_it() {
        let patient = PatientId::new();
        let root = {
            let mut root =
                stored_order(&patient, &EncounterId::new(), OrderAction::New, day(2020, 3, 1));
            root.date_stopped = Some(day(2020, 3, 29) + chrono::Duration::seconds(86_399));
            root
        };
        let encounter = EncounterId::new();
        let mut revision = stored_order(&patient, &encounter, OrderAction::Revise, day(2020, 3, 30));
        revision.previous_order = Some(root.id.clone());
        let repo = InMemoryOrderRepository::with_orders([root.clone(), revision.clone()]);
        let ctx = EncounterContext::new(patient, encounter, day(2020, 3, 30))
            .reopen_for_editing([revision.id.clone()]);

        let plan = resolve_chain(
            &repo,
            &ctx,
            OrderAction::Revise,
            Some(&revision),
            day(2020, 3, 30),
        )
        .unwrap();
        assert_eq!(plan.action, OrderAction::Revise);
        assert_eq!(plan.previous_link, Some(root.id.clone()));
        assert_eq!(plan.voids, vec![revision.id.clone()]);
        assert_eq!(
            plan.closures,
            vec![Closure {
                order: root.id.clone(),
                date_stopped: root.date_stopped.unwrap(),
                mode: CloseMode::Restamp,
            }]
        );
    }

    #[test]
    fn collapse_never_links_to_voided_predecessor() {
        let patient = PatientId::new();
        let mut root =
            stored_order(&patient, &EncounterId::new(), OrderAction::New, day(2020, 3, 1));
        root.voided = true;
        let encounter = EncounterId::new();
        let mut revision = stored_order(&patient, &encounter, OrderAction::Revise, day(2020, 3, 30));
        revision.previous_order = Some(root.id.clone());
        let repo = InMemoryOrderRepository::with_orders([root, revision.clone()]);
        let ctx = EncounterContext::new(patient, encounter, day(2020, 3, 30))
            .reopen_for_editing([revision.id.clone()]);

        let plan =
            resolve_chain(&repo, &ctx, OrderAction::Renew, Some(&revision), day(2020, 3, 30))
                .unwrap();
        assert_eq!(plan.action, OrderAction::New);
        assert_eq!(plan.previous_link, None);
    }

    #[test]
    fn collapsed_discontinue_without_predecessor_creates_nothing() {
        let patient = PatientId::new();
        let encounter = EncounterId::new();
        let first = stored_order(&patient, &encounter, OrderAction::New, day(2020, 3, 30));
        let repo = InMemoryOrderRepository::with_orders([first.clone()]);
        let ctx = EncounterContext::new(patient, encounter, day(2020, 3, 30))
            .reopen_for_editing([first.id.clone()]);

        let plan = resolve_chain(
            &repo,
            &ctx,
            OrderAction::Discontinue,
            Some(&first),
            day(2020, 3, 30),
        )
        .unwrap();
        assert!(!plan.creates_order);
        assert_eq!(plan.voids, vec![first.id]);
    }

    #[test]
    fn other_encounter_or_day_does_not_collapse() {
        let patient = PatientId::new();
        let encounter = EncounterId::new();
        let first = stored_order(&patient, &encounter, OrderAction::New, day(2020, 3, 30));
        let repo = InMemoryOrderRepository::with_orders([first.clone()]);

        let other_encounter = EncounterContext::new(patient.clone(), EncounterId::new(), day(2020, 3, 30))
            .reopen_for_editing([first.id.clone()]);
        let plan = resolve_chain(
            &repo,
            &other_encounter,
            OrderAction::Revise,
            Some(&first),
            day(2020, 3, 30) + chrono::Duration::hours(2),
        )
        .unwrap();
        assert!(!plan.collapsed);

        let other_day = EncounterContext::new(patient, encounter, day(2020, 3, 31))
            .reopen_for_editing([first.id.clone()]);
        let plan = resolve_chain(&repo, &other_day, OrderAction::Revise, Some(&first), day(2020, 3, 31))
            .unwrap();
        assert!(!plan.collapsed);
        assert_eq!(plan.previous_link, Some(first.id));
    }

    #[test]
    fn resolve_previous_rejects_other_patients_and_voided_orders() {
        let patient = PatientId::new();
        let theirs = stored_order(&PatientId::new(), &EncounterId::new(), OrderAction::New, day(2020, 3, 1));
        let mut voided = stored_order(&patient, &EncounterId::new(), OrderAction::New, day(2020, 3, 1));
        voided.voided = true;
        let repo = InMemoryOrderRepository::with_orders([theirs.clone(), voided.clone()]);
        let ctx = EncounterContext::new(patient, EncounterId::new(), day(2020, 5, 15));

        for id in [theirs.id, voided.id, OrderId::new()] {
            let draft = OrderDraft::new(OrderAction::Revise, code("2"), code("2"))
                .with_previous_order(id.clone());
            let err = resolve_previous(&repo, &ctx, &draft).unwrap_err();
            assert!(matches!(err, OrderError::PreviousOrderNotFound(missing) if missing == id));
        }
    }
}
