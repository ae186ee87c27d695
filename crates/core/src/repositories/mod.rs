//! Order storage.
//!
//! An [`OrderRepository`] is the only shared mutable state in the engine. Each implementation
//! serialises commits so that two submissions acting on the same predecessor cannot both close
//! it; the shared [`apply_commit`] re-checks every closure and void against the stored orders
//! before anything is changed.

pub mod file;
pub mod memory;

use crate::builder::ChainCommit;
use crate::chain::CloseMode;
use crate::ids::{OrderId, PatientId};
use crate::order::{sort_chronologically, Order, OrderAction};
use crate::{OrderError, OrderResult};
use orderchain_types::ConceptCode;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// What a successful commit changed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CommitOutcome {
    pub created: Option<Order>,
    pub closed: Vec<Order>,
    pub voided: Vec<Order>,
}

pub trait OrderRepository {
    /// Any stored order, voided ones included.
    fn find_order(&self, id: &OrderId) -> OrderResult<Option<Order>>;

    /// A stored order of one patient, voided ones included.
    ///
    /// An order belonging to another patient is reported as absent.
    fn find_patient_order(
        &self,
        patient: &PatientId,
        id: &OrderId,
    ) -> OrderResult<Option<Order>> {
        Ok(self
            .find_order(id)?
            .filter(|order| &order.patient == patient))
    }

    /// Every stored order for one patient and drug, voided ones included, oldest first.
    fn orders_for_drug(&self, patient: &PatientId, drug: &ConceptCode) -> OrderResult<Vec<Order>>;

    /// Every stored order for one patient, oldest first.
    fn orders_for_patient(&self, patient: &PatientId) -> OrderResult<Vec<Order>>;

    /// Applies a commit atomically.
    ///
    /// # Errors
    ///
    /// - [`OrderError::PreviousOrderNotFound`] if a closed or voided order does not exist for
    ///   the commit's patient.
    /// - [`OrderError::ChainIntegrityViolation`] if an order is no longer in the state the
    ///   commit expects.
    fn commit(&self, commit: ChainCommit) -> OrderResult<CommitOutcome>;

    /// The open order for a drug, if there is one.
    ///
    /// When upstream data holds more than one, the most recently activated wins.
    fn find_open_order(
        &self,
        patient: &PatientId,
        drug: &ConceptCode,
    ) -> OrderResult<Option<Order>> {
        Ok(self
            .orders_for_drug(patient, drug)?
            .into_iter()
            .filter(Order::is_open)
            .last())
    }
}

/// Orders for one patient and drug out of an arena, oldest first.
pub(crate) fn select_for_drug<'a>(
    orders: impl IntoIterator<Item = &'a Order>,
    patient: &PatientId,
    drug: &ConceptCode,
) -> Vec<Order> {
    let mut selected: Vec<Order> = orders
        .into_iter()
        .filter(|order| order.belongs_to(patient, drug))
        .cloned()
        .collect();
    sort_chronologically(&mut selected);
    selected
}

pub(crate) fn select_for_patient<'a>(
    orders: impl IntoIterator<Item = &'a Order>,
    patient: &PatientId,
) -> Vec<Order> {
    let mut selected: Vec<Order> = orders
        .into_iter()
        .filter(|order| &order.patient == patient)
        .cloned()
        .collect();
    sort_chronologically(&mut selected);
    selected
}

/// Validates a commit against an arena of stored orders, then applies it.
///
/// Every check runs before the first mutation, so on error `orders` is unchanged.
pub(crate) fn apply_commit(
    orders: &mut BTreeMap<OrderId, Order>,
    commit: ChainCommit,
) -> OrderResult<CommitOutcome> {
    let superseded: BTreeSet<OrderId> = commit.touched_orders().cloned().collect();
    let ChainCommit {
        patient,
        new_order,
        closures,
        voids,
        void_reason,
    } = commit;

    let stored = |id: &OrderId| -> OrderResult<&Order> {
        orders
            .get(id)
            .filter(|order| order.patient == patient)
            .ok_or_else(|| OrderError::PreviousOrderNotFound(id.clone()))
    };

    for id in &voids {
        let order = stored(id)?;
        if order.voided || order.date_stopped.is_some() {
            return Err(OrderError::integrity(id, "order was changed by another submission"));
        }
    }

    for closure in &closures {
        let order = stored(&closure.order)?;
        match closure.mode {
            CloseMode::Open if !order.is_open() => {
                return Err(OrderError::integrity(&closure.order, "order is no longer open"));
            }
            CloseMode::Restamp if order.voided || order.date_stopped.is_none() => {
                return Err(OrderError::integrity(
                    &closure.order,
                    "order was changed by another submission",
                ));
            }
            _ => {}
        }
        if closure.date_stopped < order.date_activated {
            return Err(OrderError::integrity(
                &closure.order,
                "stop instant precedes activation",
            ));
        }
    }

    if let Some(order) = &new_order {
        if orders.contains_key(&order.id) {
            return Err(OrderError::integrity(&order.id, "order already exists"));
        }
        if order.patient != patient {
            return Err(OrderError::InvalidInput(format!(
                "order {} does not belong to patient {}",
                order.id, patient
            )));
        }
        if order.action == OrderAction::New {
            let still_open = orders.values().any(|existing| {
                existing.belongs_to(&patient, &order.drug)
                    && existing.is_open()
                    && !superseded.contains(&existing.id)
            });
            if still_open {
                tracing::warn!(
                    patient = %patient,
                    drug = %order.drug,
                    "new order created while another order for the drug is open"
                );
            }
        }
    }

    let mut outcome = CommitOutcome::default();

    for id in voids {
        if let Some(order) = orders.get_mut(&id) {
            order.voided = true;
            order.void_reason = Some(void_reason.clone());
            outcome.voided.push(order.clone());
        }
    }

    for closure in closures {
        if let Some(order) = orders.get_mut(&closure.order) {
            order.date_stopped = Some(closure.date_stopped);
            outcome.closed.push(order.clone());
        }
    }

    if let Some(order) = new_order {
        orders.insert(order.id.clone(), order.clone());
        outcome.created = Some(order);
    }

    Ok(outcome)
}
