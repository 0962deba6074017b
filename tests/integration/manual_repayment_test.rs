// Offline repayments identified by bank UTR, repayment history, and
// closure through manual payoff

#[path = "../helpers/mod.rs"]
mod helpers;

use edu_loan_engine::core::AppError;
use edu_loan_engine::modules::installments::models::InstallmentStatus;
use edu_loan_engine::modules::loans::models::{LoanStatus, RepaymentSource};
use edu_loan_engine::modules::loans::services::{ManualRepayment, RepaymentOutcome};
use edu_loan_engine::modules::mandates::models::MandateStatus;
use edu_loan_engine::modules::notifications::services::NotificationKind;
use helpers::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn repayment(utr: &str, amount: Decimal, installment_id: Option<&str>) -> ManualRepayment {
    ManualRepayment {
        utr: utr.to_string(),
        amount,
        installment_id: installment_id.map(str::to_string),
    }
}

#[tokio::test]
async fn test_manual_repayment_settles_installment() {
    let env = TestEnv::new();
    let disbursement = env.disbursed_loan("EDU-4001", flat_terms(), None).await;
    let loan_id = disbursement.loan.id.clone();
    let first = &disbursement.installments[0];

    let outcome = env
        .repayments
        .record_manual(&loan_id, repayment("UTR0001", first.amount, Some(&first.id)))
        .await
        .unwrap();

    let RepaymentOutcome::Applied(posted) = outcome else {
        panic!("expected the repayment to be applied");
    };
    assert_eq!(posted.entry.source, RepaymentSource::Manual);
    assert_eq!(posted.entry.payment_ref, "UTR0001");
    assert_eq!(posted.ledger.total_outstanding, dec!(102666.66));
    assert!(!posted.closed);

    let installment = env.installment(&first.id).await;
    assert_eq!(installment.status, InstallmentStatus::PaidManually);
    assert_eq!(installment.linked_payment_ref.as_deref(), Some("UTR0001"));

    // Settled manually, so the scheduler leaves it alone on its due date
    env.clock.set_date(first.due_date);
    let summary = env.scheduler.run_once().await.unwrap().unwrap();
    assert_eq!(summary.selected, 0);

    assert_eq!(env.notifier.count(NotificationKind::PaymentReceived), 1);
}

#[tokio::test]
async fn test_repeated_utr_is_duplicate() {
    let env = TestEnv::new();
    let disbursement = env.disbursed_loan("EDU-4002", flat_terms(), None).await;
    let loan_id = disbursement.loan.id.clone();

    env.repayments
        .record_manual(&loan_id, repayment("UTR0002", dec!(5000), None))
        .await
        .unwrap();
    let again = env
        .repayments
        .record_manual(&loan_id, repayment(" UTR0002 ", dec!(5000), None))
        .await
        .unwrap();

    let RepaymentOutcome::Duplicate(entry) = again else {
        panic!("expected duplicate");
    };
    assert_eq!(entry.amount, dec!(5000));

    let ledger = env.ledger(&loan_id).await;
    assert_eq!(ledger.total_paid, dec!(5000));
    assert_eq!(ledger.total_outstanding, dec!(107000));
}

#[tokio::test]
async fn test_invalid_manual_repayments_rejected() {
    let env = TestEnv::new();
    let disbursement = env.disbursed_loan("EDU-4003", flat_terms(), None).await;
    let other = env.disbursed_loan("EDU-4004", flat_terms(), None).await;
    let loan_id = disbursement.loan.id.clone();

    let blank = env
        .repayments
        .record_manual(&loan_id, repayment("  ", dec!(100), None))
        .await;
    assert!(matches!(blank, Err(AppError::Validation(_))));

    let foreign = env
        .repayments
        .record_manual(
            &loan_id,
            repayment("UTR0003", dec!(100), Some(&other.installments[0].id)),
        )
        .await;
    assert!(matches!(foreign, Err(AppError::NotFound(_))));

    let over = env
        .repayments
        .record_manual(&loan_id, repayment("UTR0004", dec!(112000.01), None))
        .await;
    assert!(matches!(over, Err(AppError::Overpayment { .. })));

    let ledger = env.ledger(&loan_id).await;
    assert_eq!(ledger.total_outstanding, dec!(112000));
    assert_eq!(ledger.total_paid, Decimal::ZERO);
}

#[tokio::test]
async fn test_in_flight_installment_cannot_be_paid_manually() {
    let env = TestEnv::new();
    let disbursement = env.disbursed_loan("EDU-4005", flat_terms(), None).await;
    let first = &disbursement.installments[0];

    env.clock.set_date(first.due_date);
    env.scheduler.run_once().await.unwrap();

    let result = env
        .repayments
        .record_manual(
            &disbursement.loan.id,
            repayment("UTR0005", first.amount, Some(&first.id)),
        )
        .await;
    assert!(matches!(result, Err(AppError::MandateStateConflict(_))));
}

#[tokio::test]
async fn test_repayment_before_disbursement_rejected() {
    let env = TestEnv::new();
    let (loan, _) = env.mandated_loan("EDU-4006", flat_terms()).await;

    let result = env
        .repayments
        .record_manual(&loan.id, repayment("UTR0006", dec!(100), None))
        .await;
    assert!(matches!(result, Err(AppError::MandateStateConflict(_))));
}

#[tokio::test]
async fn test_manual_payoff_closes_loan() {
    let env = TestEnv::new();
    let disbursement = env.disbursed_loan("EDU-4007", partner_terms(), None).await;
    let loan_id = disbursement.loan.id.clone();

    env.repayments
        .record_manual(&loan_id, repayment("UTR0007", dec!(40000), None))
        .await
        .unwrap();
    let outcome = env
        .repayments
        .record_manual(&loan_id, repayment("UTR0008", dec!(60000), None))
        .await
        .unwrap();

    let RepaymentOutcome::Applied(posted) = outcome else {
        panic!("expected the payoff to be applied");
    };
    assert!(posted.closed);
    let certificate = posted.certificate.clone().expect("certificate");
    assert_eq!(certificate.total_paid, dec!(100000));

    assert_eq!(env.loans.get(&loan_id).await.unwrap().status, LoanStatus::Closed);
    assert_eq!(env.mandate(&loan_id).await.status, MandateStatus::Completed);
    assert_eq!(
        env.repayments.closure_certificate(&loan_id).await.unwrap(),
        certificate
    );
    assert_eq!(env.notifier.count(NotificationKind::LoanClosed), 1);

    // Remaining installments belong to a completed mandate and are never charged
    env.clock.set_date(date(2027, 6, 1));
    let summary = env.scheduler.run_once().await.unwrap().unwrap();
    assert_eq!(summary.selected, 0);
}

#[tokio::test]
async fn test_history_lists_newest_first() {
    let env = TestEnv::new();
    let disbursement = env
        .disbursed_loan("EDU-4008", flat_terms(), Some(dec!(9333.34)))
        .await;
    let loan_id = disbursement.loan.id.clone();

    env.clock.set_date(date(2026, 2, 15));
    env.repayments
        .record_manual(&loan_id, repayment("UTR0009", dec!(2000), None))
        .await
        .unwrap();

    let history = env.repayments.history(&loan_id).await.unwrap();
    let refs: Vec<&str> = history.entries.iter().map(|e| e.payment_ref.as_str()).collect();
    assert_eq!(refs, vec!["UTR0009", "ADVANCE-EDU-4008"]);
    assert_eq!(history.installments.len(), 11);
    assert_eq!(
        history.ledger.map(|l| l.total_paid),
        Some(dec!(11333.34))
    );
}

#[tokio::test]
async fn test_certificate_missing_until_closed() {
    let env = TestEnv::new();
    let disbursement = env.disbursed_loan("EDU-4009", flat_terms(), None).await;

    let result = env.repayments.closure_certificate(&disbursement.loan.id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}
