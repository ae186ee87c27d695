//! Assembles the unit of work for one submission.

use crate::chain::{ChainPlan, Closure};
use crate::config::CoreConfig;
use crate::dates::ResolvedDates;
use crate::draft::{EncounterContext, OrderDraft};
use crate::ids::{OrderId, PatientId};
use crate::order::{Order, OrderAction};
use orderchain_types::NonEmptyText;

/// Everything one submission writes, applied by a repository as a single unit.
///
/// A repository either applies all of it or none of it. Closures and voids are re-checked
/// against the stored orders at commit time, so a predecessor closed by a concurrent
/// submission fails the commit instead of being closed twice.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainCommit {
    pub patient: PatientId,
    pub new_order: Option<Order>,
    pub closures: Vec<Closure>,
    pub voids: Vec<OrderId>,
    pub void_reason: NonEmptyText,
}

impl ChainCommit {
    /// Orders touched by the commit other than the one it creates.
    pub fn touched_orders(&self) -> impl Iterator<Item = &OrderId> {
        self.closures
            .iter()
            .map(|closure| &closure.order)
            .chain(self.voids.iter())
    }
}

/// Builds the commit for a validated draft.
///
/// DISCONTINUE records carry no dosing, duration or dispensing; anything submitted for them is
/// dropped here.
pub fn build_commit(
    cfg: &CoreConfig,
    ctx: &EncounterContext,
    draft: OrderDraft,
    plan: ChainPlan,
    dates: ResolvedDates,
) -> ChainCommit {
    let new_order = plan.creates_order.then(|| {
        let discontinue = plan.action == OrderAction::Discontinue;
        Order {
            id: OrderId::new(),
            patient: ctx.patient.clone(),
            encounter: ctx.encounter.clone(),
            drug: draft.drug,
            action: plan.action,
            previous_order: plan.previous_link,
            care_setting: draft.care_setting,
            order_type: draft
                .order_type
                .unwrap_or_else(|| cfg.default_order_type().clone()),
            urgency: draft.urgency,
            scheduled_date: dates.scheduled_date,
            date_activated: dates.date_activated,
            date_stopped: None,
            date_created: ctx.entry_timestamp,
            dosing: if discontinue { None } else { draft.dosing },
            duration: if discontinue { None } else { draft.duration },
            dispensing: if discontinue { None } else { draft.dispensing },
            instructions: draft.instructions,
            order_reason: draft.order_reason,
            discontinue_reason: draft.discontinue_reason,
            orderer: ctx.provider.clone(),
            voided: false,
            void_reason: None,
        }
    });

    ChainCommit {
        patient: ctx.patient.clone(),
        new_order,
        closures: plan.closures,
        voids: plan.voids,
        void_reason: cfg.void_reason().clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::CloseMode;
    use crate::config::DateActivatedSource;
    use crate::draft::start_of_day;
    use crate::ids::EncounterId;
    use crate::order::{Dispensing, Dosing, OrderDuration, Urgency};
    use chrono::NaiveDate;
    use orderchain_types::{ConceptCode, NonNegativeDecimal};
    use std::path::PathBuf;

    fn code(value: &str) -> ConceptCode {
        ConceptCode::parse(value).unwrap()
    }

    fn cfg() -> CoreConfig {
        CoreConfig::with_defaults(
            PathBuf::from("/tmp/orderchain"),
            DateActivatedSource::EncounterDate,
        )
        .unwrap()
    }

    fn dates() -> ResolvedDates {
        let activated = start_of_day(NaiveDate::from_ymd_opt(2020, 5, 15).unwrap());
        ResolvedDates {
            date_activated: activated,
            scheduled_date: None,
        }
    }

    fn context() -> EncounterContext {
        EncounterContext::new(PatientId::new(), EncounterId::new(), dates().date_activated)
            .with_provider(code("provider-1"))
    }

    fn plan(action: OrderAction, previous: Option<OrderId>) -> ChainPlan {
        let closures = previous
            .iter()
            .map(|id| Closure {
                order: id.clone(),
                date_stopped: dates().date_activated - chrono::Duration::seconds(1),
                mode: CloseMode::Open,
            })
            .collect();
        ChainPlan {
            action,
            previous_link: previous,
            closures,
            voids: Vec::new(),
            creates_order: true,
            collapsed: false,
        }
    }

    #[test]
    fn new_order_takes_context_and_defaults() {
        let ctx = context();
        let draft = OrderDraft::new(OrderAction::New, code("2"), code("1"))
            .with_dosing(Dosing::free_text(NonEmptyText::new("Triomune").unwrap()));
        let commit = build_commit(&cfg(), &ctx, draft, plan(OrderAction::New, None), dates());

        let order = commit.new_order.unwrap();
        assert_eq!(order.patient, ctx.patient);
        assert_eq!(order.encounter, ctx.encounter);
        assert_eq!(order.orderer, Some(code("provider-1")));
        assert_eq!(order.order_type, code("drug-order"));
        assert_eq!(order.urgency, Urgency::Routine);
        assert_eq!(order.date_created, ctx.entry_timestamp);
        assert!(order.is_open());
        assert_eq!(commit.void_reason.as_str(), "Voided by orderchain");
    }

    #[test]
    fn discontinue_drops_dosing_duration_and_dispensing() {
        let previous = OrderId::new();
        let draft = OrderDraft::new(OrderAction::Discontinue, code("2"), code("1"))
            .with_previous_order(previous.clone())
            .with_discontinue_reason(code("556"))
            .with_dosing(Dosing::free_text(NonEmptyText::new("ignored").unwrap()))
            .with_duration(OrderDuration {
                value: 5,
                units: code("days"),
            })
            .with_dispensing(Dispensing {
                quantity: NonNegativeDecimal::new(30.0).unwrap(),
                quantity_units: code("51"),
                num_refills: 2,
            });
        let commit = build_commit(
            &cfg(),
            &context(),
            draft,
            plan(OrderAction::Discontinue, Some(previous.clone())),
            dates(),
        );

        let order = commit.new_order.clone().unwrap();
        assert_eq!(order.previous_order, Some(previous.clone()));
        assert_eq!(order.dosing, None);
        assert_eq!(order.duration, None);
        assert_eq!(order.dispensing, None);
        assert_eq!(order.discontinue_reason, Some(code("556")));
        assert!(!order.is_open());
        assert_eq!(commit.touched_orders().collect::<Vec<_>>(), vec![&previous]);
    }

    #[test]
    fn plan_without_order_builds_side_effects_only() {
        let voided = OrderId::new();
        let mut plan = plan(OrderAction::New, None);
        plan.creates_order = false;
        plan.voids = vec![voided.clone()];
        let draft = OrderDraft::new(OrderAction::Discontinue, code("2"), code("1"));
        let commit = build_commit(&cfg(), &context(), draft, plan, dates());
        assert!(commit.new_order.is_none());
        assert_eq!(commit.voids, vec![voided]);
    }
}
