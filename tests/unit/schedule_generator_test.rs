// Schedule generation: totals, remainder placement, due dates

use chrono::NaiveDate;
use edu_loan_engine::core::AppError;
use edu_loan_engine::modules::installments::models::InstallmentStatus;
use edu_loan_engine::modules::installments::services::ScheduleGenerator;
use edu_loan_engine::modules::mandates::models::Mandate;
use edu_loan_engine::store::{LoanStore, MemoryStore};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn valid_from() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
}

#[test]
fn test_flat_schedule_last_installment_absorbs_remainder() {
    let schedule =
        ScheduleGenerator::build("mandate-1", "loan-1", dec!(112000), dec!(9333.34), valid_from())
            .unwrap();

    assert_eq!(schedule.len(), 12);
    assert!(schedule[..11].iter().all(|i| i.amount == dec!(9333.34)));
    assert_eq!(schedule[11].amount, dec!(9333.26));

    let total: Decimal = schedule.iter().map(|i| i.amount).sum();
    assert_eq!(total, dec!(112000));
}

#[tokio::test]
async fn test_schedule_generated_once_per_mandate() {
    let store = MemoryStore::new();
    let mandate = Mandate::new(
        "loan-1".to_string(),
        "order_1".to_string(),
        None,
        None,
        dec!(10266.67),
        valid_from(),
        NaiveDate::from_ymd_opt(2027, 2, 1).unwrap(),
        None,
    );

    let mut tx = store.begin().await.unwrap();
    let first = ScheduleGenerator::generate(tx.as_mut(), &mandate, dec!(112000), dec!(9333.34))
        .await
        .unwrap();
    assert_eq!(first.len(), 12);

    let again =
        ScheduleGenerator::generate(tx.as_mut(), &mandate, dec!(112000), dec!(9333.34)).await;
    assert!(matches!(
        again,
        Err(AppError::ScheduleAlreadyExists { ref mandate_id }) if *mandate_id == mandate.id
    ));
    assert_eq!(tx.count_installments(&mandate.id).await.unwrap(), 12);
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.list_installments(&mandate.id).await.unwrap().len(), 12);
}

#[test]
fn test_due_dates_are_monthly_after_mandate_start() {
    let schedule =
        ScheduleGenerator::build("mandate-1", "loan-1", dec!(30000), dec!(10000), valid_from())
            .unwrap();

    let dates: Vec<NaiveDate> = schedule.iter().map(|i| i.due_date).collect();
    assert_eq!(
        dates,
        vec![
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
        ]
    );

    for (index, installment) in schedule.iter().enumerate() {
        assert_eq!(installment.sequence_number, index as u32 + 1);
        assert_eq!(installment.status, InstallmentStatus::Pending);
        assert_eq!(installment.retry_count, 0);
        assert_eq!(installment.mandate_id, "mandate-1");
    }
}

#[test]
fn test_partial_outstanding_shortens_schedule() {
    // Advance EMI already collected: 1,12,000 - 9,333.34
    let schedule = ScheduleGenerator::build(
        "mandate-1",
        "loan-1",
        dec!(102666.66),
        dec!(9333.34),
        valid_from(),
    )
    .unwrap();

    assert_eq!(schedule.len(), 11);
    assert_eq!(schedule[10].amount, dec!(9333.26));
}

#[test]
fn test_zero_outstanding_yields_empty_schedule() {
    let schedule =
        ScheduleGenerator::build("mandate-1", "loan-1", Decimal::ZERO, dec!(9333.34), valid_from())
            .unwrap();
    assert!(schedule.is_empty());
}

#[test]
fn test_non_positive_emi_rejected() {
    let result = ScheduleGenerator::build("mandate-1", "loan-1", dec!(1000), Decimal::ZERO, valid_from());
    assert!(matches!(result, Err(AppError::InvalidTerms(_))));
}

proptest! {
    /// Installments sum to the outstanding, every one but the last equals the
    /// EMI, and the last is positive and no larger than the EMI
    #[test]
    fn prop_schedule_sums_to_outstanding(
        total_paise in 100i64..50_000_000,
        emi_paise in 100i64..5_000_000,
    ) {
        let total = Decimal::new(total_paise, 2);
        let emi = Decimal::new(emi_paise, 2);
        prop_assume!(total / emi <= Decimal::from(600));

        let schedule = ScheduleGenerator::build("m", "l", total, emi, valid_from()).unwrap();

        let sum: Decimal = schedule.iter().map(|i| i.amount).sum();
        prop_assert_eq!(sum, total);

        let (last, rest) = schedule.split_last().unwrap();
        prop_assert!(rest.iter().all(|i| i.amount == emi));
        prop_assert!(last.amount > Decimal::ZERO);
        prop_assert!(last.amount <= emi);

        for pair in schedule.windows(2) {
            prop_assert!(pair[0].due_date < pair[1].due_date);
        }
    }
}
