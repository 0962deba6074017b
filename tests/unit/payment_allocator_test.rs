// Payment allocation properties: monotonic balances, exact totals,
// overpayment rejection, and settlement

use chrono::Utc;
use edu_loan_engine::core::AppError;
use edu_loan_engine::modules::loans::models::{
    InterestPayer, InterestType, LoanLedger, LoanTerms,
};
use edu_loan_engine::modules::loans::services::{EmiCalculator, PaymentAllocator};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn terms(interest_type: InterestType, payer: InterestPayer) -> LoanTerms {
    LoanTerms::new(dec!(100000), dec!(12), 12, interest_type, payer).unwrap()
}

fn opening(terms: &LoanTerms) -> LoanLedger {
    let emi = EmiCalculator::for_terms(terms).unwrap();
    let interest = EmiCalculator::total_interest(terms, emi).unwrap();
    LoanLedger::opening("loan-1".to_string(), terms.principal, interest)
}

#[test]
fn test_partner_paid_never_allocates_interest() {
    let terms = terms(InterestType::Flat, InterestPayer::Partner);
    let mut ledger = opening(&terms);
    assert_eq!(ledger.interest_outstanding, Decimal::ZERO);

    for _ in 0..3 {
        let allocation = PaymentAllocator::apply_payment(&ledger, &terms, dec!(8333.34), Utc::now()).unwrap();
        assert_eq!(allocation.interest_portion, Decimal::ZERO);
        assert_eq!(allocation.principal_portion, dec!(8333.34));
        ledger = allocation.ledger;
    }
}

#[test]
fn test_overpayment_rejected_and_ledger_untouched() {
    let terms = terms(InterestType::Flat, InterestPayer::Student);
    let ledger = opening(&terms);
    let before = ledger.clone();

    let result = PaymentAllocator::apply_payment(
        &ledger,
        &terms,
        ledger.total_outstanding + Decimal::ONE,
        Utc::now(),
    );

    assert!(matches!(result, Err(AppError::Overpayment { .. })));
    assert_eq!(ledger, before);
}

#[test]
fn test_exact_payoff_settles_ledger() {
    let terms = terms(InterestType::Flat, InterestPayer::Student);
    let ledger = opening(&terms);

    let allocation =
        PaymentAllocator::apply_payment(&ledger, &terms, ledger.total_outstanding, Utc::now()).unwrap();

    assert!(allocation.closes_loan);
    assert_eq!(allocation.ledger.total_outstanding, Decimal::ZERO);
    assert_eq!(allocation.ledger.principal_outstanding, Decimal::ZERO);
    assert_eq!(allocation.ledger.interest_outstanding, Decimal::ZERO);
    assert_eq!(allocation.interest_portion, dec!(12000));
    assert_eq!(allocation.principal_portion, dec!(100000));
}

fn regime() -> impl Strategy<Value = (InterestType, InterestPayer)> {
    prop_oneof![
        Just((InterestType::Flat, InterestPayer::Student)),
        Just((InterestType::Reducing, InterestPayer::Student)),
        Just((InterestType::Flat, InterestPayer::Partner)),
    ]
}

proptest! {
    /// Outstanding never increases or goes negative, the components always
    /// sum to the total, and total_paid is the sum of accepted payments
    #[test]
    fn prop_allocation_monotonic_and_exact(
        (interest_type, payer) in regime(),
        payments in prop::collection::vec(1i64..3_000_000, 1..30),
    ) {
        let terms = terms(interest_type, payer);
        let mut ledger = opening(&terms);
        let mut paid = Decimal::ZERO;

        for paise in payments {
            let amount = Decimal::new(paise, 2);
            let before = ledger.total_outstanding;

            match PaymentAllocator::apply_payment(&ledger, &terms, amount, Utc::now()) {
                Ok(allocation) => {
                    prop_assert_eq!(allocation.principal_portion + allocation.interest_portion, amount);
                    prop_assert!(allocation.principal_portion >= Decimal::ZERO);
                    prop_assert!(allocation.interest_portion >= Decimal::ZERO);

                    ledger = allocation.ledger;
                    paid += amount;

                    prop_assert!(ledger.total_outstanding <= before);
                    prop_assert!(ledger.principal_outstanding >= Decimal::ZERO);
                    prop_assert!(ledger.interest_outstanding >= Decimal::ZERO);
                    prop_assert_eq!(
                        ledger.total_outstanding,
                        ledger.principal_outstanding + ledger.interest_outstanding
                    );
                    prop_assert_eq!(ledger.total_paid, paid);
                }
                Err(AppError::Overpayment { .. }) => {
                    prop_assert!(amount > before);
                }
                Err(e) => prop_assert!(false, "unexpected error {}", e),
            }

            if ledger.total_outstanding.is_zero() {
                break;
            }
        }
    }
}
