//! Drug order entry.
//!
//! [`OrderEntryService`] runs one submission to completion: validate the action, resolve the
//! previous order and the chain transition, resolve dates, build the new order, and commit the
//! whole unit of work through the repository. A submission either fully succeeds or fails with
//! nothing written.

use crate::builder::build_commit;
use crate::chain::{resolve_chain, resolve_previous};
use crate::config::CoreConfig;
use crate::dates::resolve_dates;
use crate::draft::{EncounterContext, OrderDraft};
use crate::form::{DrugOrderFormFields, FieldDefaults};
use crate::ids::{OrderId, PatientId};
use crate::order::Order;
use crate::repositories::{CommitOutcome, OrderRepository};
use crate::validation::{require_previous_reference, validate_against_previous, validate_fields};
use crate::{OrderError, OrderResult};
use orderchain_types::ConceptCode;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Service for submitting and reading drug orders over a repository.
#[derive(Clone, Debug)]
pub struct OrderEntryService<R> {
    cfg: Arc<CoreConfig>,
    repo: R,
}

impl<R: OrderRepository> OrderEntryService<R> {
    pub fn new(cfg: Arc<CoreConfig>, repo: R) -> Self {
        Self { cfg, repo }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Submits one drug order action within an encounter.
    ///
    /// Checks run in a fixed order: the previous-order reference, then the previous order
    /// itself, and only then the submitted fields. A REVISE that changes the drug is reported as
    /// such even when its other fields are incomplete.
    ///
    /// # Errors
    ///
    /// Any validation kind of [`OrderError`] if the submission is rejected, or
    /// [`OrderError::ChainIntegrityViolation`] if the chain changed underneath it. Storage
    /// errors are propagated from the repository.
    pub fn submit(&self, ctx: &EncounterContext, draft: OrderDraft) -> OrderResult<CommitOutcome> {
        require_previous_reference(&draft)?;
        let previous = resolve_previous(&self.repo, ctx, &draft)?;
        if let Some(previous) = &previous {
            validate_against_previous(&draft, previous)?;
        }
        validate_fields(&draft)?;

        let dates = resolve_dates(&draft, ctx, self.cfg.date_activated_source());
        let plan = resolve_chain(
            &self.repo,
            ctx,
            draft.action,
            previous.as_ref(),
            dates.date_activated,
        )?;
        tracing::debug!(
            submitted = %draft.action,
            resolved = %plan.action,
            collapsed = plan.collapsed,
            closures = plan.closures.len(),
            voids = plan.voids.len(),
            "resolved order chain"
        );

        let commit = build_commit(&self.cfg, ctx, draft, plan, dates);
        let outcome = self.repo.commit(commit)?;

        tracing::info!(
            patient = %ctx.patient,
            encounter = %ctx.encounter,
            created = ?outcome.created.as_ref().map(|order| order.id.to_string()),
            closed = outcome.closed.len(),
            voided = outcome.voided.len(),
            "drug order submission committed"
        );
        Ok(outcome)
    }

    /// Parses raw form fields, applying `defaults`, and submits the result.
    pub fn submit_form(
        &self,
        ctx: &EncounterContext,
        fields: DrugOrderFormFields,
        defaults: &FieldDefaults,
    ) -> OrderResult<CommitOutcome> {
        let draft = fields.into_draft(defaults)?;
        self.submit(ctx, draft)
    }

    /// The non-voided orders for a drug, oldest first, as shown when reopening a form.
    pub fn existing_orders(
        &self,
        patient: &PatientId,
        drug: &ConceptCode,
    ) -> OrderResult<Vec<Order>> {
        let mut orders = self.repo.orders_for_drug(patient, drug)?;
        orders.retain(|order| !order.voided);
        Ok(orders)
    }

    /// Every order for a drug including voided ones, oldest first.
    pub fn order_history(
        &self,
        patient: &PatientId,
        drug: &ConceptCode,
    ) -> OrderResult<Vec<Order>> {
        self.repo.orders_for_drug(patient, drug)
    }

    pub fn patient_orders(&self, patient: &PatientId) -> OrderResult<Vec<Order>> {
        self.repo.orders_for_patient(patient)
    }

    pub fn find_order(&self, id: &OrderId) -> OrderResult<Option<Order>> {
        self.repo.find_order(id)
    }

    /// Follows previous-order links from `id` back to the first order of its chain.
    ///
    /// The result starts with the order itself.
    ///
    /// # Errors
    ///
    /// - [`OrderError::InvalidInput`] if `id` is unknown.
    /// - [`OrderError::PreviousOrderNotFound`] if a link points at a missing order.
    /// - [`OrderError::ChainIntegrityViolation`] if the links form a cycle.
    pub fn order_chain(&self, id: &OrderId) -> OrderResult<Vec<Order>> {
        let mut current = self
            .repo
            .find_order(id)?
            .ok_or_else(|| OrderError::InvalidInput(format!("order {} not found", id)))?;

        let mut seen = BTreeSet::new();
        let mut chain = Vec::new();
        loop {
            if !seen.insert(current.id.clone()) {
                return Err(OrderError::integrity(
                    &current.id,
                    "previous-order links form a cycle",
                ));
            }
            let previous = current.previous_order.clone();
            chain.push(current);

            let Some(previous) = previous else {
                return Ok(chain);
            };
            current = self
                .repo
                .find_order(&previous)?
                .ok_or(OrderError::PreviousOrderNotFound(previous))?;
        }
    }
}
