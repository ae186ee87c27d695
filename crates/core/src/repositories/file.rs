//! File-backed order store.
//!
//! Each patient's orders live in a single JSON ledger:
//!
//! ```text
//! <data_dir>/orders/<s1>/<s2>/<patient_uuid>/orders.json
//! ```
//!
//! where `s1`/`s2` are the first four hex characters of the patient UUID. A commit rewrites the
//! whole ledger into a temporary file next to it and renames it into place, so readers see
//! either the old ledger or the new one and never a partial write.

use super::{apply_commit, select_for_drug, select_for_patient, CommitOutcome, OrderRepository};
use crate::builder::ChainCommit;
use crate::config::CoreConfig;
use crate::constants::{LEDGER_TMP_SUFFIX, ORDER_LEDGER_FILENAME};
use crate::ids::{OrderId, PatientId};
use crate::order::Order;
use crate::{OrderError, OrderResult};
use orderchain_types::ConceptCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Serialize, Deserialize)]
struct OrderLedger {
    patient: PatientId,
    orders: Vec<Order>,
}

/// Order store over per-patient ledger files.
///
/// Commits are serialised within the process by a single lock.
#[derive(Debug)]
pub struct FileOrderRepository {
    cfg: Arc<CoreConfig>,
    write_lock: Mutex<()>,
}

impl FileOrderRepository {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            cfg,
            write_lock: Mutex::new(()),
        }
    }

    fn ledger_path(&self, patient: &PatientId) -> PathBuf {
        patient
            .as_uuid()
            .sharded_dir(&self.cfg.orders_dir())
            .join(ORDER_LEDGER_FILENAME)
    }

    fn load(&self, patient: &PatientId) -> OrderResult<BTreeMap<OrderId, Order>> {
        let ledger = match read_ledger(&self.ledger_path(patient))? {
            Some(ledger) => ledger,
            None => return Ok(BTreeMap::new()),
        };
        Ok(ledger
            .orders
            .into_iter()
            .map(|order| (order.id.clone(), order))
            .collect())
    }

    fn store(&self, patient: &PatientId, orders: &BTreeMap<OrderId, Order>) -> OrderResult<()> {
        let path = self.ledger_path(patient);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(OrderError::StoreDirCreation)?;
        }

        let ledger = OrderLedger {
            patient: patient.clone(),
            orders: orders.values().cloned().collect(),
        };
        let contents = serde_json::to_string_pretty(&ledger).map_err(OrderError::Serialization)?;

        let tmp_path = path.with_extension(format!("json.{}", LEDGER_TMP_SUFFIX));
        fs::write(&tmp_path, contents).map_err(OrderError::FileWrite)?;
        if let Err(e) = fs::rename(&tmp_path, &path) {
            // the ledger itself was not touched; only the temporary file needs removing
            let _ = fs::remove_file(&tmp_path);
            return Err(OrderError::FileWrite(e));
        }
        Ok(())
    }

    /// Every ledger in the store. Ledgers that cannot be read are logged and skipped.
    ///
    /// Only lookups by order id alone scan; anything that knows the patient reads its ledger
    /// through [`Self::load`] and sees read errors.
    fn scan_ledgers(&self) -> Vec<OrderLedger> {
        let mut ledgers = Vec::new();

        let s1_iter = match fs::read_dir(self.cfg.orders_dir()) {
            Ok(it) => it,
            Err(_) => return ledgers,
        };
        for s1 in s1_iter.flatten() {
            let s2_iter = match fs::read_dir(s1.path()) {
                Ok(it) => it,
                Err(_) => continue,
            };
            for s2 in s2_iter.flatten() {
                let id_iter = match fs::read_dir(s2.path()) {
                    Ok(it) => it,
                    Err(_) => continue,
                };
                for id_ent in id_iter.flatten() {
                    let ledger_path = id_ent.path().join(ORDER_LEDGER_FILENAME);
                    if !ledger_path.is_file() {
                        continue;
                    }
                    match read_ledger(&ledger_path) {
                        Ok(Some(ledger)) => ledgers.push(ledger),
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(
                                "failed to read order ledger: {} - {}",
                                ledger_path.display(),
                                e
                            );
                        }
                    }
                }
            }
        }

        ledgers
    }
}

fn read_ledger(path: &Path) -> OrderResult<Option<OrderLedger>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(OrderError::FileRead(e)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(OrderError::Deserialization)
}

impl OrderRepository for FileOrderRepository {
    fn find_order(&self, id: &OrderId) -> OrderResult<Option<Order>> {
        Ok(self
            .scan_ledgers()
            .into_iter()
            .flat_map(|ledger| ledger.orders)
            .find(|order| &order.id == id))
    }

    fn find_patient_order(
        &self,
        patient: &PatientId,
        id: &OrderId,
    ) -> OrderResult<Option<Order>> {
        Ok(self
            .load(patient)?
            .remove(id)
            .filter(|order| &order.patient == patient))
    }

    fn orders_for_drug(&self, patient: &PatientId, drug: &ConceptCode) -> OrderResult<Vec<Order>> {
        Ok(select_for_drug(self.load(patient)?.values(), patient, drug))
    }

    fn orders_for_patient(&self, patient: &PatientId) -> OrderResult<Vec<Order>> {
        Ok(select_for_patient(self.load(patient)?.values(), patient))
    }

    fn commit(&self, commit: ChainCommit) -> OrderResult<CommitOutcome> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| OrderError::StorePoisoned)?;

        let patient = commit.patient.clone();
        let mut orders = self.load(&patient)?;
        let outcome = apply_commit(&mut orders, commit)?;
        self.store(&patient, &orders)?;

        tracing::debug!(
            patient = %patient,
            ledger = %self.ledger_path(&patient).display(),
            "order ledger written"
        );
        Ok(outcome)
    }
}
