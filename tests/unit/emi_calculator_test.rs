// EMI calculator examples and properties

use edu_loan_engine::core::AppError;
use edu_loan_engine::modules::loans::models::{InterestPayer, InterestType, LoanTerms};
use edu_loan_engine::modules::loans::services::EmiCalculator;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// 1,00,000 at 12% flat for a year: 12,000 interest, 1,12,000 / 12 per month
#[test]
fn test_flat_student_paid_example() {
    let emi = EmiCalculator::compute_emi(
        dec!(100000),
        dec!(12),
        12,
        InterestType::Flat,
        InterestPayer::Student,
    )
    .expect("valid terms");

    assert_eq!(emi, dec!(9333.34));

    let terms = LoanTerms::new(dec!(100000), dec!(12), 12, InterestType::Flat, InterestPayer::Student)
        .unwrap();
    assert_eq!(EmiCalculator::total_interest(&terms, emi).unwrap(), dec!(12000));
}

#[test]
fn test_partner_paid_excludes_interest() {
    for interest_type in [InterestType::Flat, InterestType::Reducing] {
        let emi = EmiCalculator::compute_emi(
            dec!(100000),
            dec!(12),
            12,
            interest_type,
            InterestPayer::Partner,
        )
        .unwrap();
        assert_eq!(emi, dec!(8333.34));
    }
}

#[test]
fn test_reducing_amortized_example() {
    let emi = EmiCalculator::compute_emi(
        dec!(100000),
        dec!(12),
        12,
        InterestType::Reducing,
        InterestPayer::Student,
    )
    .unwrap();

    assert_eq!(emi, dec!(8884.88));
}

#[test]
fn test_invalid_terms_rejected() {
    let cases = [
        (dec!(0), dec!(12), 12),
        (dec!(-5000), dec!(12), 12),
        (dec!(100000), dec!(-1), 12),
        (dec!(100000), dec!(12), 0),
    ];

    for (principal, rate, tenure) in cases {
        let result = EmiCalculator::compute_emi(
            principal,
            rate,
            tenure,
            InterestType::Flat,
            InterestPayer::Student,
        );
        assert!(
            matches!(result, Err(AppError::InvalidTerms(_))),
            "expected InvalidTerms for {} / {} / {}",
            principal,
            rate,
            tenure
        );
    }
}

proptest! {
    /// Zero rate degenerates to principal / tenure for every regime
    #[test]
    fn prop_zero_rate_is_principal_over_tenure(
        principal_rupees in 1_000u64..5_000_000,
        tenure in 1u32..120,
        reducing in any::<bool>(),
    ) {
        let principal = Decimal::from(principal_rupees);
        let interest_type = if reducing { InterestType::Reducing } else { InterestType::Flat };

        let emi = EmiCalculator::compute_emi(
            principal,
            Decimal::ZERO,
            tenure,
            interest_type,
            InterestPayer::Student,
        ).unwrap();

        let exact = principal / Decimal::from(tenure);
        prop_assert!(emi >= exact);
        prop_assert!(emi - exact < dec!(0.01));
    }

    /// Rounded EMIs over the tenure always cover the amount owed
    #[test]
    fn prop_emis_cover_principal_and_interest(
        principal_rupees in 10_000u64..2_000_000,
        rate_tenths in 0u32..300,
        tenure in 1u32..84,
        reducing in any::<bool>(),
    ) {
        let interest_type = if reducing { InterestType::Reducing } else { InterestType::Flat };
        let terms = LoanTerms::new(
            Decimal::from(principal_rupees),
            Decimal::new(rate_tenths as i64, 1),
            tenure,
            interest_type,
            InterestPayer::Student,
        ).unwrap();

        let emi = EmiCalculator::for_terms(&terms).unwrap();
        let interest = EmiCalculator::total_interest(&terms, emi).unwrap();

        prop_assert!(emi.scale() <= 2);
        prop_assert!(interest >= Decimal::ZERO);
        prop_assert!(emi * Decimal::from(tenure) >= terms.principal + interest);
    }

    /// A higher rate never lowers the EMI
    #[test]
    fn prop_emi_monotonic_in_rate(
        principal_rupees in 10_000u64..2_000_000,
        rate_tenths in 0u32..250,
        tenure in 1u32..84,
        reducing in any::<bool>(),
    ) {
        let interest_type = if reducing { InterestType::Reducing } else { InterestType::Flat };
        let principal = Decimal::from(principal_rupees);
        let low = EmiCalculator::compute_emi(
            principal, Decimal::new(rate_tenths as i64, 1), tenure, interest_type, InterestPayer::Student,
        ).unwrap();
        let high = EmiCalculator::compute_emi(
            principal, Decimal::new(rate_tenths as i64 + 10, 1), tenure, interest_type, InterestPayer::Student,
        ).unwrap();

        prop_assert!(high >= low);
    }
}
