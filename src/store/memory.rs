use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LoanStore, StoreTx};
use crate::core::{AppError, Result};
use crate::modules::installments::models::{Installment, InstallmentStatus};
use crate::modules::loans::models::{ClosureCertificate, LedgerEntry, Loan, LoanLedger, LoanStatus};
use crate::modules::mandates::models::{Mandate, MandateStatus};
use crate::modules::payments::models::PaymentAttempt;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    loans: HashMap<String, Loan>,
    ledgers: HashMap<String, LoanLedger>,
    entries: Vec<LedgerEntry>,
    certificates: HashMap<String, ClosureCertificate>,
    mandates: HashMap<String, Mandate>,
    installments: HashMap<String, Installment>,
    attempts: HashMap<String, PaymentAttempt>,
}

/// In-process store used by tests and local runs without MySQL.
///
/// Transactions are serialized: `begin` holds the state lock until the
/// transaction commits or is dropped, and writes go to a private copy that
/// replaces the shared state only on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoanStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

fn duplicate(what: &str, key: &str) -> AppError {
    AppError::conflict(format!("duplicate {}: {}", what, key))
}

fn missing(what: &str, key: &str) -> AppError {
    AppError::not_found(format!("{} {}", what, key))
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_loan(&mut self, loan: &Loan) -> Result<()> {
        if self.working.loans.contains_key(&loan.id) {
            return Err(duplicate("loan", &loan.id));
        }
        self.working.loans.insert(loan.id.clone(), loan.clone());
        Ok(())
    }

    async fn lock_loan(&mut self, loan_id: &str) -> Result<Option<Loan>> {
        Ok(self.working.loans.get(loan_id).cloned())
    }

    async fn update_loan_status(&mut self, loan_id: &str, status: LoanStatus) -> Result<()> {
        let loan = self
            .working
            .loans
            .get_mut(loan_id)
            .ok_or_else(|| missing("loan", loan_id))?;
        loan.status = status;
        loan.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_ledger(&mut self, ledger: &LoanLedger) -> Result<()> {
        if self.working.ledgers.contains_key(&ledger.loan_id) {
            return Err(duplicate("ledger", &ledger.loan_id));
        }
        self.working
            .ledgers
            .insert(ledger.loan_id.clone(), ledger.clone());
        Ok(())
    }

    async fn lock_ledger(&mut self, loan_id: &str) -> Result<Option<LoanLedger>> {
        Ok(self.working.ledgers.get(loan_id).cloned())
    }

    async fn update_ledger(&mut self, ledger: &LoanLedger) -> Result<()> {
        let slot = self
            .working
            .ledgers
            .get_mut(&ledger.loan_id)
            .ok_or_else(|| missing("ledger", &ledger.loan_id))?;
        *slot = ledger.clone();
        Ok(())
    }

    async fn append_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<()> {
        let exists = self
            .working
            .entries
            .iter()
            .any(|e| e.loan_id == entry.loan_id && e.payment_ref == entry.payment_ref);
        if exists {
            return Err(duplicate("ledger entry", &entry.payment_ref));
        }
        self.working.entries.push(entry.clone());
        Ok(())
    }

    async fn find_ledger_entry(
        &mut self,
        loan_id: &str,
        payment_ref: &str,
    ) -> Result<Option<LedgerEntry>> {
        Ok(self
            .working
            .entries
            .iter()
            .find(|e| e.loan_id == loan_id && e.payment_ref == payment_ref)
            .cloned())
    }

    async fn list_ledger_entries(&mut self, loan_id: &str) -> Result<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .working
            .entries
            .iter()
            .filter(|e| e.loan_id == loan_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.applied_at);
        Ok(entries)
    }

    async fn find_closure_certificate(
        &mut self,
        loan_id: &str,
    ) -> Result<Option<ClosureCertificate>> {
        Ok(self.working.certificates.get(loan_id).cloned())
    }

    async fn insert_closure_certificate(&mut self, certificate: &ClosureCertificate) -> Result<()> {
        if self.working.certificates.contains_key(&certificate.loan_id) {
            return Err(duplicate("closure certificate", &certificate.loan_id));
        }
        self.working
            .certificates
            .insert(certificate.loan_id.clone(), certificate.clone());
        Ok(())
    }

    async fn insert_mandate(&mut self, mandate: &Mandate) -> Result<()> {
        let loan_taken = self
            .working
            .mandates
            .values()
            .any(|m| m.loan_id == mandate.loan_id);
        if loan_taken {
            return Err(duplicate("mandate for loan", &mandate.loan_id));
        }
        self.working
            .mandates
            .insert(mandate.id.clone(), mandate.clone());
        Ok(())
    }

    async fn lock_mandate_for_loan(&mut self, loan_id: &str) -> Result<Option<Mandate>> {
        Ok(self
            .working
            .mandates
            .values()
            .find(|m| m.loan_id == loan_id)
            .cloned())
    }

    async fn lock_mandate_by_gateway_ref(
        &mut self,
        order_ref: Option<&str>,
        token_ref: Option<&str>,
    ) -> Result<Option<Mandate>> {
        let by_order = order_ref.and_then(|order| {
            self.working
                .mandates
                .values()
                .find(|m| m.gateway_order_ref == order)
        });
        let found = by_order.or_else(|| {
            token_ref.and_then(|token| {
                self.working
                    .mandates
                    .values()
                    .find(|m| m.gateway_token_ref.as_deref() == Some(token))
            })
        });
        Ok(found.cloned())
    }

    async fn find_mandate_loan_id(
        &mut self,
        order_ref: Option<&str>,
        token_ref: Option<&str>,
    ) -> Result<Option<String>> {
        Ok(self
            .lock_mandate_by_gateway_ref(order_ref, token_ref)
            .await?
            .map(|m| m.loan_id))
    }

    async fn update_mandate(&mut self, mandate: &Mandate) -> Result<()> {
        let slot = self
            .working
            .mandates
            .get_mut(&mandate.id)
            .ok_or_else(|| missing("mandate", &mandate.id))?;
        *slot = mandate.clone();
        Ok(())
    }

    async fn insert_installments(&mut self, installments: &[Installment]) -> Result<()> {
        for installment in installments {
            let clash = self.working.installments.values().any(|i| {
                i.mandate_id == installment.mandate_id
                    && i.sequence_number == installment.sequence_number
            });
            if clash {
                return Err(duplicate(
                    "installment sequence",
                    &installment.sequence_number.to_string(),
                ));
            }
            self.working
                .installments
                .insert(installment.id.clone(), installment.clone());
        }
        Ok(())
    }

    async fn count_installments(&mut self, mandate_id: &str) -> Result<u64> {
        Ok(self
            .working
            .installments
            .values()
            .filter(|i| i.mandate_id == mandate_id)
            .count() as u64)
    }

    async fn list_installments(&mut self, mandate_id: &str) -> Result<Vec<Installment>> {
        let mut items: Vec<Installment> = self
            .working
            .installments
            .values()
            .filter(|i| i.mandate_id == mandate_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.sequence_number);
        Ok(items)
    }

    async fn lock_installment(&mut self, installment_id: &str) -> Result<Option<Installment>> {
        Ok(self.working.installments.get(installment_id).cloned())
    }

    async fn find_installment_loan_id(&mut self, installment_id: &str) -> Result<Option<String>> {
        Ok(self
            .working
            .installments
            .get(installment_id)
            .map(|i| i.loan_id.clone()))
    }

    async fn update_installment(&mut self, installment: &Installment) -> Result<()> {
        let slot = self
            .working
            .installments
            .get_mut(&installment.id)
            .ok_or_else(|| missing("installment", &installment.id))?;
        *slot = installment.clone();
        Ok(())
    }

    async fn find_due_installments(
        &mut self,
        due_on: NaiveDate,
        max_retries: u32,
    ) -> Result<Vec<Installment>> {
        let mandates = &self.working.mandates;
        let mut due: Vec<Installment> = self
            .working
            .installments
            .values()
            .filter(|i| i.due_date <= due_on && i.is_chargeable(max_retries))
            .filter(|i| {
                mandates
                    .get(&i.mandate_id)
                    .map(|m| m.status == MandateStatus::Active)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then(a.sequence_number.cmp(&b.sequence_number))
        });
        Ok(due)
    }

    async fn claim_installment(&mut self, installment_id: &str, max_retries: u32) -> Result<bool> {
        match self.working.installments.get_mut(installment_id) {
            Some(inst) if inst.is_chargeable(max_retries) => {
                inst.status = InstallmentStatus::Processing;
                inst.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_attempt(&mut self, attempt: &PaymentAttempt) -> Result<()> {
        if self
            .working
            .attempts
            .contains_key(&attempt.gateway_payment_ref)
        {
            return Err(duplicate("payment attempt", &attempt.gateway_payment_ref));
        }
        self.working
            .attempts
            .insert(attempt.gateway_payment_ref.clone(), attempt.clone());
        Ok(())
    }

    async fn lock_attempt(&mut self, gateway_payment_ref: &str) -> Result<Option<PaymentAttempt>> {
        Ok(self.working.attempts.get(gateway_payment_ref).cloned())
    }

    async fn update_attempt(&mut self, attempt: &PaymentAttempt) -> Result<()> {
        let slot = self
            .working
            .attempts
            .get_mut(&attempt.gateway_payment_ref)
            .ok_or_else(|| missing("payment attempt", &attempt.gateway_payment_ref))?;
        *slot = attempt.clone();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
