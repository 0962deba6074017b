// MySQL-backed store.
// Row locks use SELECT ... FOR UPDATE inside the surrounding transaction.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{MySql, MySqlPool, Transaction};

use super::{LoanStore, StoreTx};
use crate::core::{AppError, Result};
use crate::modules::installments::models::{Installment, InstallmentStatus};
use crate::modules::loans::models::{
    Applicant, ClosureCertificate, LedgerEntry, Loan, LoanLedger, LoanStatus, LoanTerms,
};
use crate::modules::mandates::models::{BankAccount, Mandate};
use crate::modules::payments::models::PaymentAttempt;

/// Store over a MySQL connection pool
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanStore for MySqlStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(MySqlTx { tx }))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct MySqlTx {
    tx: Transaction<'static, MySql>,
}

fn parse_column<T: std::str::FromStr<Err = String>>(value: &str) -> Result<T> {
    value.parse().map_err(AppError::Internal)
}

const LOAN_COLUMNS: &str = r#"
    id, reference, applicant_name, applicant_email, applicant_phone,
    principal, annual_rate, tenure_months, interest_type, interest_payer,
    emi_amount, status, created_at, updated_at
"#;

const MANDATE_COLUMNS: &str = r#"
    id, loan_id, status, gateway_order_ref, gateway_token_ref, gateway_customer_ref,
    account_number, ifsc, account_type, max_amount, valid_from, valid_to,
    authorization_url, created_at, updated_at
"#;

const INSTALLMENT_COLUMNS: &str = r#"
    id, mandate_id, loan_id, sequence_number, amount, due_date, status,
    retry_count, linked_payment_ref, failure_reason, paid_at, created_at, updated_at
"#;

const ATTEMPT_COLUMNS: &str = r#"
    id, gateway_payment_ref, loan_id, mandate_id, installment_id, amount, status,
    method, principal_portion, interest_portion, failure_reason, created_at, updated_at
"#;

const ENTRY_COLUMNS: &str = r#"
    id, loan_id, payment_ref, source, amount, principal_portion, interest_portion,
    outstanding_after, installment_id, applied_at
"#;

#[async_trait]
impl StoreTx for MySqlTx {
    async fn insert_loan(&mut self, loan: &Loan) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO loans (
                id, reference, applicant_name, applicant_email, applicant_phone,
                principal, annual_rate, tenure_months, interest_type, interest_payer,
                emi_amount, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&loan.id)
        .bind(&loan.reference)
        .bind(&loan.applicant.name)
        .bind(&loan.applicant.email)
        .bind(&loan.applicant.phone)
        .bind(loan.terms.principal)
        .bind(loan.terms.annual_rate)
        .bind(loan.terms.tenure_months)
        .bind(loan.terms.interest_type.as_str())
        .bind(loan.terms.interest_payer.as_str())
        .bind(loan.emi_amount)
        .bind(loan.status.as_str())
        .bind(loan.created_at)
        .bind(loan.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_loan(&mut self, loan_id: &str) -> Result<Option<Loan>> {
        let sql = format!("SELECT {} FROM loans WHERE id = ? FOR UPDATE", LOAN_COLUMNS);
        let row = sqlx::query_as::<_, LoanRow>(&sql)
            .bind(loan_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(Loan::try_from).transpose()
    }

    async fn update_loan_status(&mut self, loan_id: &str, status: LoanStatus) -> Result<()> {
        let result = sqlx::query("UPDATE loans SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(loan_id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("loan {}", loan_id)));
        }
        Ok(())
    }

    async fn insert_ledger(&mut self, ledger: &LoanLedger) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO loan_ledgers (
                loan_id, principal_outstanding, interest_outstanding,
                total_outstanding, total_paid, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&ledger.loan_id)
        .bind(ledger.principal_outstanding)
        .bind(ledger.interest_outstanding)
        .bind(ledger.total_outstanding)
        .bind(ledger.total_paid)
        .bind(ledger.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_ledger(&mut self, loan_id: &str) -> Result<Option<LoanLedger>> {
        let row = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT loan_id, principal_outstanding, interest_outstanding,
                   total_outstanding, total_paid, updated_at
            FROM loan_ledgers
            WHERE loan_id = ?
            FOR UPDATE
            "#,
        )
        .bind(loan_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(LoanLedger::from))
    }

    async fn update_ledger(&mut self, ledger: &LoanLedger) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE loan_ledgers
            SET principal_outstanding = ?, interest_outstanding = ?,
                total_outstanding = ?, total_paid = ?, updated_at = ?
            WHERE loan_id = ?
            "#,
        )
        .bind(ledger.principal_outstanding)
        .bind(ledger.interest_outstanding)
        .bind(ledger.total_outstanding)
        .bind(ledger.total_paid)
        .bind(ledger.updated_at)
        .bind(&ledger.loan_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn append_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                id, loan_id, payment_ref, source, amount, principal_portion,
                interest_portion, outstanding_after, installment_id, applied_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.loan_id)
        .bind(&entry.payment_ref)
        .bind(entry.source.as_str())
        .bind(entry.amount)
        .bind(entry.principal_portion)
        .bind(entry.interest_portion)
        .bind(entry.outstanding_after)
        .bind(&entry.installment_id)
        .bind(entry.applied_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_ledger_entry(
        &mut self,
        loan_id: &str,
        payment_ref: &str,
    ) -> Result<Option<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE loan_id = ? AND payment_ref = ?",
            ENTRY_COLUMNS
        );
        let row = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(loan_id)
            .bind(payment_ref)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(LedgerEntry::try_from).transpose()
    }

    async fn list_ledger_entries(&mut self, loan_id: &str) -> Result<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE loan_id = ? ORDER BY applied_at ASC",
            ENTRY_COLUMNS
        );
        let rows = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(loan_id)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    async fn find_closure_certificate(
        &mut self,
        loan_id: &str,
    ) -> Result<Option<ClosureCertificate>> {
        let row = sqlx::query_as::<_, CertificateRow>(
            r#"
            SELECT id, loan_id, certificate_number, total_paid, issued_at
            FROM closure_certificates
            WHERE loan_id = ?
            "#,
        )
        .bind(loan_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| ClosureCertificate {
            id: r.id,
            loan_id: r.loan_id,
            certificate_number: r.certificate_number,
            total_paid: r.total_paid,
            issued_at: r.issued_at,
        }))
    }

    async fn insert_closure_certificate(&mut self, certificate: &ClosureCertificate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO closure_certificates (id, loan_id, certificate_number, total_paid, issued_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&certificate.id)
        .bind(&certificate.loan_id)
        .bind(&certificate.certificate_number)
        .bind(certificate.total_paid)
        .bind(certificate.issued_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_mandate(&mut self, mandate: &Mandate) -> Result<()> {
        let bank = mandate.bank_account.as_ref();
        sqlx::query(
            r#"
            INSERT INTO mandates (
                id, loan_id, status, gateway_order_ref, gateway_token_ref, gateway_customer_ref,
                account_number, ifsc, account_type, max_amount, valid_from, valid_to,
                authorization_url, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&mandate.id)
        .bind(&mandate.loan_id)
        .bind(mandate.status.as_str())
        .bind(&mandate.gateway_order_ref)
        .bind(&mandate.gateway_token_ref)
        .bind(&mandate.gateway_customer_ref)
        .bind(bank.map(|b| b.account_number.clone()))
        .bind(bank.map(|b| b.ifsc.clone()))
        .bind(bank.and_then(|b| b.account_type.clone()))
        .bind(mandate.max_amount)
        .bind(mandate.valid_from)
        .bind(mandate.valid_to)
        .bind(&mandate.authorization_url)
        .bind(mandate.created_at)
        .bind(mandate.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_mandate_for_loan(&mut self, loan_id: &str) -> Result<Option<Mandate>> {
        let sql = format!(
            "SELECT {} FROM mandates WHERE loan_id = ? FOR UPDATE",
            MANDATE_COLUMNS
        );
        let row = sqlx::query_as::<_, MandateRow>(&sql)
            .bind(loan_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(Mandate::try_from).transpose()
    }

    async fn lock_mandate_by_gateway_ref(
        &mut self,
        order_ref: Option<&str>,
        token_ref: Option<&str>,
    ) -> Result<Option<Mandate>> {
        if let Some(order_ref) = order_ref {
            let sql = format!(
                "SELECT {} FROM mandates WHERE gateway_order_ref = ? FOR UPDATE",
                MANDATE_COLUMNS
            );
            let row = sqlx::query_as::<_, MandateRow>(&sql)
                .bind(order_ref)
                .fetch_optional(&mut *self.tx)
                .await?;
            if let Some(row) = row {
                return Mandate::try_from(row).map(Some);
            }
        }

        let Some(token_ref) = token_ref else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT {} FROM mandates WHERE gateway_token_ref = ? FOR UPDATE",
            MANDATE_COLUMNS
        );
        let row = sqlx::query_as::<_, MandateRow>(&sql)
            .bind(token_ref)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(Mandate::try_from).transpose()
    }

    async fn find_mandate_loan_id(
        &mut self,
        order_ref: Option<&str>,
        token_ref: Option<&str>,
    ) -> Result<Option<String>> {
        if let Some(order_ref) = order_ref {
            let row: Option<(String,)> =
                sqlx::query_as("SELECT loan_id FROM mandates WHERE gateway_order_ref = ?")
                    .bind(order_ref)
                    .fetch_optional(&mut *self.tx)
                    .await?;
            if let Some((loan_id,)) = row {
                return Ok(Some(loan_id));
            }
        }

        let Some(token_ref) = token_ref else {
            return Ok(None);
        };

        let row: Option<(String,)> =
            sqlx::query_as("SELECT loan_id FROM mandates WHERE gateway_token_ref = ?")
                .bind(token_ref)
                .fetch_optional(&mut *self.tx)
                .await?;

        Ok(row.map(|(loan_id,)| loan_id))
    }

    async fn update_mandate(&mut self, mandate: &Mandate) -> Result<()> {
        let bank = mandate.bank_account.as_ref();
        sqlx::query(
            r#"
            UPDATE mandates
            SET status = ?, gateway_token_ref = ?, account_number = ?, ifsc = ?,
                account_type = ?, authorization_url = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(mandate.status.as_str())
        .bind(&mandate.gateway_token_ref)
        .bind(bank.map(|b| b.account_number.clone()))
        .bind(bank.map(|b| b.ifsc.clone()))
        .bind(bank.and_then(|b| b.account_type.clone()))
        .bind(&mandate.authorization_url)
        .bind(mandate.updated_at)
        .bind(&mandate.id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_installments(&mut self, installments: &[Installment]) -> Result<()> {
        for installment in installments {
            sqlx::query(
                r#"
                INSERT INTO installments (
                    id, mandate_id, loan_id, sequence_number, amount, due_date, status,
                    retry_count, linked_payment_ref, failure_reason, paid_at, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&installment.id)
            .bind(&installment.mandate_id)
            .bind(&installment.loan_id)
            .bind(installment.sequence_number)
            .bind(installment.amount)
            .bind(installment.due_date)
            .bind(installment.status.as_str())
            .bind(installment.retry_count)
            .bind(&installment.linked_payment_ref)
            .bind(&installment.failure_reason)
            .bind(installment.paid_at)
            .bind(installment.created_at)
            .bind(installment.updated_at)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn count_installments(&mut self, mandate_id: &str) -> Result<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM installments WHERE mandate_id = ?")
                .bind(mandate_id)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(count.max(0) as u64)
    }

    async fn list_installments(&mut self, mandate_id: &str) -> Result<Vec<Installment>> {
        let sql = format!(
            "SELECT {} FROM installments WHERE mandate_id = ? ORDER BY sequence_number ASC",
            INSTALLMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, InstallmentRow>(&sql)
            .bind(mandate_id)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(Installment::try_from).collect()
    }

    async fn lock_installment(&mut self, installment_id: &str) -> Result<Option<Installment>> {
        let sql = format!(
            "SELECT {} FROM installments WHERE id = ? FOR UPDATE",
            INSTALLMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, InstallmentRow>(&sql)
            .bind(installment_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(Installment::try_from).transpose()
    }

    async fn find_installment_loan_id(&mut self, installment_id: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT loan_id FROM installments WHERE id = ?")
            .bind(installment_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(|(loan_id,)| loan_id))
    }

    async fn update_installment(&mut self, installment: &Installment) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE installments
            SET status = ?, retry_count = ?, linked_payment_ref = ?, failure_reason = ?,
                paid_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(installment.status.as_str())
        .bind(installment.retry_count)
        .bind(&installment.linked_payment_ref)
        .bind(&installment.failure_reason)
        .bind(installment.paid_at)
        .bind(installment.updated_at)
        .bind(&installment.id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_due_installments(
        &mut self,
        due_on: NaiveDate,
        max_retries: u32,
    ) -> Result<Vec<Installment>> {
        let rows = sqlx::query_as::<_, InstallmentRow>(
            r#"
            SELECT i.id, i.mandate_id, i.loan_id, i.sequence_number, i.amount, i.due_date,
                   i.status, i.retry_count, i.linked_payment_ref, i.failure_reason, i.paid_at,
                   i.created_at, i.updated_at
            FROM installments i
            JOIN mandates m ON m.id = i.mandate_id
            WHERE i.status IN ('PENDING', 'FAILED')
              AND i.retry_count < ?
              AND i.due_date <= ?
              AND m.status = 'ACTIVE'
            ORDER BY i.due_date ASC, i.sequence_number ASC
            "#,
        )
        .bind(max_retries)
        .bind(due_on)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(Installment::try_from).collect()
    }

    async fn claim_installment(&mut self, installment_id: &str, max_retries: u32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE installments
            SET status = 'PROCESSING', updated_at = ?
            WHERE id = ? AND status IN ('PENDING', 'FAILED') AND retry_count < ?
            "#,
        )
        .bind(Utc::now())
        .bind(installment_id)
        .bind(max_retries)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_attempt(&mut self, attempt: &PaymentAttempt) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_attempts (
                id, gateway_payment_ref, loan_id, mandate_id, installment_id, amount, status,
                method, principal_portion, interest_portion, failure_reason, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&attempt.id)
        .bind(&attempt.gateway_payment_ref)
        .bind(&attempt.loan_id)
        .bind(&attempt.mandate_id)
        .bind(&attempt.installment_id)
        .bind(attempt.amount)
        .bind(attempt.status.as_str())
        .bind(&attempt.method)
        .bind(attempt.principal_portion)
        .bind(attempt.interest_portion)
        .bind(&attempt.failure_reason)
        .bind(attempt.created_at)
        .bind(attempt.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_attempt(&mut self, gateway_payment_ref: &str) -> Result<Option<PaymentAttempt>> {
        let sql = format!(
            "SELECT {} FROM payment_attempts WHERE gateway_payment_ref = ? FOR UPDATE",
            ATTEMPT_COLUMNS
        );
        let row = sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(gateway_payment_ref)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(PaymentAttempt::try_from).transpose()
    }

    async fn update_attempt(&mut self, attempt: &PaymentAttempt) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE payment_attempts
            SET status = ?, method = ?, principal_portion = ?, interest_portion = ?,
                failure_reason = ?, updated_at = ?
            WHERE gateway_payment_ref = ?
            "#,
        )
        .bind(attempt.status.as_str())
        .bind(&attempt.method)
        .bind(attempt.principal_portion)
        .bind(attempt.interest_portion)
        .bind(&attempt.failure_reason)
        .bind(attempt.updated_at)
        .bind(&attempt.gateway_payment_ref)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct LoanRow {
    id: String,
    reference: String,
    applicant_name: String,
    applicant_email: String,
    applicant_phone: String,
    principal: Decimal,
    annual_rate: Decimal,
    tenure_months: u32,
    interest_type: String,
    interest_payer: String,
    emi_amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LoanRow> for Loan {
    type Error = AppError;

    fn try_from(row: LoanRow) -> Result<Self> {
        Ok(Loan {
            id: row.id,
            reference: row.reference,
            applicant: Applicant {
                name: row.applicant_name,
                email: row.applicant_email,
                phone: row.applicant_phone,
            },
            terms: LoanTerms {
                principal: row.principal,
                annual_rate: row.annual_rate,
                tenure_months: row.tenure_months,
                interest_type: parse_column(&row.interest_type)?,
                interest_payer: parse_column(&row.interest_payer)?,
            },
            emi_amount: row.emi_amount,
            status: parse_column(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    loan_id: String,
    principal_outstanding: Decimal,
    interest_outstanding: Decimal,
    total_outstanding: Decimal,
    total_paid: Decimal,
    updated_at: DateTime<Utc>,
}

impl From<LedgerRow> for LoanLedger {
    fn from(row: LedgerRow) -> Self {
        LoanLedger {
            loan_id: row.loan_id,
            principal_outstanding: row.principal_outstanding,
            interest_outstanding: row.interest_outstanding,
            total_outstanding: row.total_outstanding,
            total_paid: row.total_paid,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: String,
    loan_id: String,
    payment_ref: String,
    source: String,
    amount: Decimal,
    principal_portion: Decimal,
    interest_portion: Decimal,
    outstanding_after: Decimal,
    installment_id: Option<String>,
    applied_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for LedgerEntry {
    type Error = AppError;

    fn try_from(row: EntryRow) -> Result<Self> {
        Ok(LedgerEntry {
            id: row.id,
            loan_id: row.loan_id,
            payment_ref: row.payment_ref,
            source: parse_column(&row.source)?,
            amount: row.amount,
            principal_portion: row.principal_portion,
            interest_portion: row.interest_portion,
            outstanding_after: row.outstanding_after,
            installment_id: row.installment_id,
            applied_at: row.applied_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CertificateRow {
    id: String,
    loan_id: String,
    certificate_number: String,
    total_paid: Decimal,
    issued_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct MandateRow {
    id: String,
    loan_id: String,
    status: String,
    gateway_order_ref: String,
    gateway_token_ref: Option<String>,
    gateway_customer_ref: Option<String>,
    account_number: Option<String>,
    ifsc: Option<String>,
    account_type: Option<String>,
    max_amount: Decimal,
    valid_from: NaiveDate,
    valid_to: NaiveDate,
    authorization_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MandateRow> for Mandate {
    type Error = AppError;

    fn try_from(row: MandateRow) -> Result<Self> {
        let bank_account = match (row.account_number, row.ifsc) {
            (Some(account_number), Some(ifsc)) => Some(BankAccount {
                account_number,
                ifsc,
                account_type: row.account_type,
            }),
            _ => None,
        };

        Ok(Mandate {
            id: row.id,
            loan_id: row.loan_id,
            status: parse_column(&row.status)?,
            gateway_order_ref: row.gateway_order_ref,
            gateway_token_ref: row.gateway_token_ref,
            gateway_customer_ref: row.gateway_customer_ref,
            bank_account,
            max_amount: row.max_amount,
            valid_from: row.valid_from,
            valid_to: row.valid_to,
            authorization_url: row.authorization_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InstallmentRow {
    id: String,
    mandate_id: String,
    loan_id: String,
    sequence_number: u32,
    amount: Decimal,
    due_date: NaiveDate,
    status: String,
    retry_count: u32,
    linked_payment_ref: Option<String>,
    failure_reason: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InstallmentRow> for Installment {
    type Error = AppError;

    fn try_from(row: InstallmentRow) -> Result<Self> {
        let status: InstallmentStatus = parse_column(&row.status)?;

        Ok(Installment {
            id: row.id,
            mandate_id: row.mandate_id,
            loan_id: row.loan_id,
            sequence_number: row.sequence_number,
            amount: row.amount,
            due_date: row.due_date,
            status,
            retry_count: row.retry_count,
            linked_payment_ref: row.linked_payment_ref,
            failure_reason: row.failure_reason,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: String,
    gateway_payment_ref: String,
    loan_id: String,
    mandate_id: String,
    installment_id: Option<String>,
    amount: Decimal,
    status: String,
    method: Option<String>,
    principal_portion: Option<Decimal>,
    interest_portion: Option<Decimal>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AttemptRow> for PaymentAttempt {
    type Error = AppError;

    fn try_from(row: AttemptRow) -> Result<Self> {
        Ok(PaymentAttempt {
            id: row.id,
            gateway_payment_ref: row.gateway_payment_ref,
            loan_id: row.loan_id,
            mandate_id: row.mandate_id,
            installment_id: row.installment_id,
            amount: row.amount,
            status: parse_column(&row.status)?,
            method: row.method,
            principal_portion: row.principal_portion,
            interest_portion: row.interest_portion,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
