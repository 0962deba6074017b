// End-to-end servicing: approval, mandate, disbursement, scheduled EMIs
// collected by webhook, and closure

#[path = "../helpers/mod.rs"]
mod helpers;

use edu_loan_engine::core::AppError;
use edu_loan_engine::modules::installments::models::InstallmentStatus;
use edu_loan_engine::modules::loans::models::{LoanStatus, RepaymentSource};
use edu_loan_engine::modules::mandates::models::MandateStatus;
use edu_loan_engine::modules::notifications::services::NotificationKind;
use edu_loan_engine::modules::webhooks::services::WebhookOutcome;
use helpers::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_mandate_initiation_sets_window_and_cap() {
    let env = TestEnv::new();
    let loan = env.approved_loan("EDU-1001", flat_terms()).await;
    assert_eq!(loan.status, LoanStatus::Approved);
    assert_eq!(loan.emi_amount, dec!(9333.34));

    let mandate = env.mandates.initiate(&loan.id, bank_account()).await.unwrap();

    assert_eq!(mandate.status, MandateStatus::Created);
    assert_eq!(mandate.valid_from, date(2026, 2, 1));
    assert_eq!(mandate.valid_to, date(2027, 2, 1));
    assert_eq!(mandate.max_amount, dec!(10266.67));
    assert!(mandate.authorization_url.is_some());

    let registrations = env.gateway.registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].max_amount, dec!(10266.67));
    assert_eq!(registrations[0].expire_on, date(2027, 2, 1));

    let loan = env.loans.get(&loan.id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::MandatePending);
    assert_eq!(env.notifier.count(NotificationKind::MandateAuthorizationRequested), 1);
}

#[tokio::test]
async fn test_second_mandate_rejected() {
    let env = TestEnv::new();
    let loan = env.approved_loan("EDU-1002", flat_terms()).await;
    env.mandates.initiate(&loan.id, bank_account()).await.unwrap();

    let result = env.mandates.initiate(&loan.id, bank_account()).await;
    assert!(matches!(result, Err(AppError::MandateStateConflict(_))));
    assert_eq!(env.gateway.registrations().len(), 1);
}

#[tokio::test]
async fn test_confirmation_activates_mandate_and_loan() {
    let env = TestEnv::new();
    let (loan, mandate) = env.mandated_loan("EDU-1003", flat_terms()).await;

    assert_eq!(loan.status, LoanStatus::MandateActive);
    assert_eq!(mandate.status, MandateStatus::Active);
    assert_eq!(
        mandate.gateway_token_ref,
        Some(token_for(&mandate.gateway_order_ref))
    );
    assert_eq!(env.notifier.count(NotificationKind::MandateActivated), 1);
}

#[tokio::test]
async fn test_sync_status_activates_confirmed_mandate() {
    let env = TestEnv::new();
    let loan = env.approved_loan("EDU-1004", flat_terms()).await;
    env.mandates.initiate(&loan.id, bank_account()).await.unwrap();

    let pending = env.mandates.sync_status(&loan.id).await.unwrap();
    assert_eq!(pending.status, MandateStatus::Created);

    env.gateway.set_confirmed(true);
    let active = env.mandates.sync_status(&loan.id).await.unwrap();
    assert_eq!(active.status, MandateStatus::Active);
    assert!(active.gateway_token_ref.is_some());
    assert_eq!(
        env.loans.get(&loan.id).await.unwrap().status,
        LoanStatus::MandateActive
    );

    // Already active: nothing more to do
    let again = env.mandates.sync_status(&loan.id).await.unwrap();
    assert_eq!(again.status, MandateStatus::Active);
    assert_eq!(env.notifier.count(NotificationKind::MandateActivated), 1);
}

#[tokio::test]
async fn test_disbursement_requires_active_mandate() {
    let env = TestEnv::new();
    let loan = env.approved_loan("EDU-1005", flat_terms()).await;

    let result = env.disbursements.disburse(&loan.id, None).await;
    assert!(matches!(result, Err(AppError::MandateStateConflict(_))));

    env.mandates.initiate(&loan.id, bank_account()).await.unwrap();
    let result = env.disbursements.disburse(&loan.id, None).await;
    assert!(matches!(result, Err(AppError::MandateStateConflict(_))));
}

#[tokio::test]
async fn test_disbursement_builds_ledger_and_schedule() {
    let env = TestEnv::new();
    let disbursement = env.disbursed_loan("EDU-1006", flat_terms(), None).await;

    assert_eq!(disbursement.loan.status, LoanStatus::Disbursed);
    assert_eq!(disbursement.ledger.principal_outstanding, dec!(100000));
    assert_eq!(disbursement.ledger.interest_outstanding, dec!(12000));
    assert_eq!(disbursement.ledger.total_outstanding, dec!(112000));
    assert!(disbursement.advance_entry.is_none());

    let installments = &disbursement.installments;
    assert_eq!(installments.len(), 12);
    assert_eq!(installments[0].due_date, date(2026, 3, 1));
    assert_eq!(installments[11].due_date, date(2027, 2, 1));
    let total: Decimal = installments.iter().map(|i| i.amount).sum();
    assert_eq!(total, disbursement.ledger.total_outstanding);

    let again = env.disbursements.disburse(&disbursement.loan.id, None).await;
    assert!(matches!(again, Err(AppError::MandateStateConflict(_))));
}

#[tokio::test]
async fn test_reducing_and_partner_opening_ledgers() {
    let env = TestEnv::new();

    let reducing = env.disbursed_loan("EDU-1007", reducing_terms(), None).await;
    assert_eq!(reducing.ledger.interest_outstanding, dec!(6618.56));
    assert_eq!(reducing.installments.len(), 12);
    assert!(reducing.installments.iter().all(|i| i.amount == dec!(8884.88)));

    let partner = env.disbursed_loan("EDU-1008", partner_terms(), None).await;
    assert_eq!(partner.ledger.interest_outstanding, Decimal::ZERO);
    assert_eq!(partner.ledger.total_outstanding, dec!(100000));
    assert_eq!(partner.installments[11].amount, dec!(8333.26));
}

#[tokio::test]
async fn test_advance_emi_recorded_at_disbursement() {
    let env = TestEnv::new();
    let disbursement = env
        .disbursed_loan("EDU-1009", flat_terms(), Some(dec!(9333.34)))
        .await;

    let entry = disbursement.advance_entry.expect("advance entry");
    assert_eq!(entry.payment_ref, "ADVANCE-EDU-1009");
    assert_eq!(entry.source, RepaymentSource::AdvanceEmi);
    assert_eq!(entry.interest_portion, dec!(1000.00));
    assert_eq!(disbursement.ledger.total_outstanding, dec!(102666.66));
    assert_eq!(disbursement.ledger.total_paid, dec!(9333.34));
    assert_eq!(disbursement.installments.len(), 11);

    // Reducing loans split the advance pro-rata too, not a month of interest
    let reducing = env
        .disbursed_loan("EDU-1019", reducing_terms(), Some(dec!(8884.88)))
        .await;

    let entry = reducing.advance_entry.expect("advance entry");
    assert_eq!(entry.interest_portion, dec!(551.55));
    assert_eq!(entry.principal_portion, dec!(8333.33));
    assert_eq!(reducing.ledger.interest_outstanding, dec!(6067.01));
    assert_eq!(reducing.ledger.principal_outstanding, dec!(91666.67));
    assert_eq!(reducing.ledger.total_outstanding, dec!(97733.68));
    assert_eq!(reducing.installments.len(), 11);
    assert!(reducing.installments.iter().all(|i| i.amount == dec!(8884.88)));
}

#[tokio::test]
async fn test_advance_covering_whole_loan_rejected() {
    let env = TestEnv::new();
    let (loan, _) = env.mandated_loan("EDU-1010", flat_terms()).await;

    let result = env.disbursements.disburse(&loan.id, Some(dec!(112000))).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(
        env.loans.get(&loan.id).await.unwrap().status,
        LoanStatus::MandateActive
    );
}

#[tokio::test]
async fn test_full_repayment_closes_loan_once() {
    let env = TestEnv::new();
    let disbursement = env.disbursed_loan("EDU-1011", flat_terms(), None).await;
    let loan_id = disbursement.loan.id.clone();
    let mandate_id = disbursement.installments[0].mandate_id.clone();

    for scheduled in &disbursement.installments {
        env.clock.set_date(scheduled.due_date);
        let summary = env.scheduler.run_once().await.unwrap().expect("run");
        assert_eq!(summary.initiated, 1);

        let installment = env.installment(&scheduled.id).await;
        assert_eq!(installment.status, InstallmentStatus::Processing);
        let payment_ref = installment.linked_payment_ref.clone().expect("linked payment");

        let outcome = env
            .deliver(&payment_event(
                "payment.captured",
                &payment_ref,
                paise(installment.amount),
                Some(&installment.id),
            ))
            .await
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::Processed { .. }));
    }

    let loan = env.loans.get(&loan_id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Closed);

    let ledger = env.ledger(&loan_id).await;
    assert_eq!(ledger.total_outstanding, Decimal::ZERO);
    assert_eq!(ledger.total_paid, dec!(112000));

    let installments = env.installments(&mandate_id).await;
    assert!(installments.iter().all(|i| i.status == InstallmentStatus::Success));
    assert_eq!(env.mandate(&loan_id).await.status, MandateStatus::Completed);

    let certificate = env.repayments.closure_certificate(&loan_id).await.unwrap();
    assert_eq!(certificate.total_paid, dec!(112000));
    assert!(certificate.certificate_number.starts_with("NOC-EDU-1011-"));
    assert_eq!(env.notifier.count(NotificationKind::LoanClosed), 1);
    assert_eq!(env.notifier.count(NotificationKind::PaymentReceived), 12);

    // Nothing left for the scheduler
    env.clock.set_date(date(2027, 3, 1));
    let summary = env.scheduler.run_once().await.unwrap().unwrap();
    assert_eq!(summary.selected, 0);

    // A repayment after closure is refused and no second certificate appears
    let late = env
        .repayments
        .record_manual(
            &loan_id,
            edu_loan_engine::modules::loans::services::ManualRepayment {
                utr: "UTR-LATE-1".to_string(),
                amount: dec!(1),
                installment_id: None,
            },
        )
        .await;
    assert!(matches!(late, Err(AppError::MandateStateConflict(_))));
    let again = env.repayments.closure_certificate(&loan_id).await.unwrap();
    assert_eq!(again.id, certificate.id);
}

#[tokio::test]
async fn test_cancellation_before_disbursement_reverts_loan() {
    let env = TestEnv::new();
    let (loan, mandate) = env.mandated_loan("EDU-1012", flat_terms()).await;

    let outcome = env
        .deliver(&token_event(
            "token.cancelled",
            &mandate.gateway_order_ref,
            mandate.gateway_token_ref.as_deref().unwrap(),
        ))
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::Processed { .. }));

    assert_eq!(env.mandate(&loan.id).await.status, MandateStatus::Cancelled);
    assert_eq!(
        env.loans.get(&loan.id).await.unwrap().status,
        LoanStatus::Approved
    );
    assert_eq!(env.notifier.count(NotificationKind::MandateCancelled), 1);
}
