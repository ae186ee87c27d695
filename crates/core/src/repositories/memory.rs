//! In-process order store.

use super::{apply_commit, select_for_drug, select_for_patient, CommitOutcome, OrderRepository};
use crate::builder::ChainCommit;
use crate::ids::{OrderId, PatientId};
use crate::order::Order;
use crate::{OrderError, OrderResult};
use orderchain_types::ConceptCode;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Orders held in an arena keyed by identifier, guarded by one lock.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<BTreeMap<OrderId, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with existing orders, e.g. history imported from elsewhere.
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        Self {
            orders: Mutex::new(
                orders
                    .into_iter()
                    .map(|order| (order.id.clone(), order))
                    .collect(),
            ),
        }
    }

    fn lock(&self) -> OrderResult<MutexGuard<'_, BTreeMap<OrderId, Order>>> {
        self.orders.lock().map_err(|_| OrderError::StorePoisoned)
    }
}

impl OrderRepository for InMemoryOrderRepository {
    fn find_order(&self, id: &OrderId) -> OrderResult<Option<Order>> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn orders_for_drug(&self, patient: &PatientId, drug: &ConceptCode) -> OrderResult<Vec<Order>> {
        Ok(select_for_drug(self.lock()?.values(), patient, drug))
    }

    fn orders_for_patient(&self, patient: &PatientId) -> OrderResult<Vec<Order>> {
        Ok(select_for_patient(self.lock()?.values(), patient))
    }

    fn commit(&self, commit: ChainCommit) -> OrderResult<CommitOutcome> {
        let mut orders = self.lock()?;
        apply_commit(&mut orders, commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::start_of_day;
    use crate::ids::EncounterId;
    use crate::order::{Dosing, OrderAction, Urgency};
    use chrono::NaiveDate;
    use orderchain_types::NonEmptyText;

    fn order(patient: &PatientId, drug: &str) -> Order {
        let activated = start_of_day(NaiveDate::from_ymd_opt(2020, 3, 30).unwrap());
        Order {
            id: OrderId::new(),
            patient: patient.clone(),
            encounter: EncounterId::new(),
            drug: ConceptCode::parse(drug).unwrap(),
            action: OrderAction::New,
            previous_order: None,
            care_setting: ConceptCode::parse("2").unwrap(),
            order_type: ConceptCode::parse("drug-order").unwrap(),
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
    fn find_open_order_skips_closed_and_voided() {
        let patient = PatientId::new();
        let mut closed = order(&patient, "2");
        closed.date_stopped = Some(closed.date_activated);
        let mut voided = order(&patient, "2");
        voided.voided = true;
        let open = order(&patient, "2");
        let other_drug = order(&patient, "3");
        let repo = InMemoryOrderRepository::with_orders([
            closed,
            voided,
            open.clone(),
            other_drug,
        ]);

        let drug = ConceptCode::parse("2").unwrap();
        assert_eq!(repo.find_open_order(&patient, &drug).unwrap(), Some(open));
        assert_eq!(repo.orders_for_drug(&patient, &drug).unwrap().len(), 3);
        assert_eq!(repo.orders_for_patient(&patient).unwrap().len(), 4);
        assert!(repo
            .find_open_order(&PatientId::new(), &drug)
            .unwrap()
            .is_none());
    }
}
