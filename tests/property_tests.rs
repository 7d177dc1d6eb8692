/// Property-based tests using proptest
/// Tests invariants and properties that should hold for all inputs
use proptest::prelude::*;

use credit_api::auth::JwtProvider;
use credit_api::models::{normalize_cpf, validate_cpf};

// Property: CPF validation should never panic
proptest! {
    #[test]
    fn cpf_validation_never_panics(cpf in "\\PC*") {
        let _ = validate_cpf(&cpf);
    }

    #[test]
    fn eleven_digit_cpfs_always_accepted(cpf in "[0-9]{11}") {
        prop_assert!(validate_cpf(&cpf).is_ok());
    }

    #[test]
    fn punctuated_cpfs_accepted_and_normalize_to_digits(cpf in "[0-9]{11}") {
        let formatted = format!(
            "{}.{}.{}-{}",
            &cpf[0..3], &cpf[3..6], &cpf[6..9], &cpf[9..11]
        );

        prop_assert!(validate_cpf(&formatted).is_ok());
        prop_assert_eq!(normalize_cpf(&formatted), cpf);
    }

    #[test]
    fn wrong_length_cpfs_rejected(cpf in "[0-9]{0,10}|[0-9]{12,20}") {
        prop_assert!(validate_cpf(&cpf).is_err());
    }
}

// Property: normalization keeps digits in order and drops everything else
proptest! {
    #[test]
    fn normalize_cpf_output_is_digits_only(input in "\\PC*") {
        let normalized = normalize_cpf(&input);
        prop_assert!(normalized.chars().all(|c| c.is_ascii_digit()));

        let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
        prop_assert_eq!(normalized, digits);
    }
}

// Property: token issue/verify roundtrip
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn issued_tokens_validate_and_carry_their_claims(
        local in "[a-z]{1,10}",
        domain in "[a-z]{1,10}",
        roles in prop::collection::vec("[A-Z]{1,8}", 0..3),
        secret in "[a-zA-Z0-9]{8,32}"
    ) {
        let subject = format!("{}@{}.com", local, domain);
        let jwt = JwtProvider::new(secret.clone(), 3600);

        let token = jwt.issue(&subject, roles.clone()).unwrap();

        prop_assert!(jwt.validate(&token));
        prop_assert_eq!(jwt.subject(&token).unwrap(), subject);
        prop_assert_eq!(jwt.roles(&token).unwrap(), roles);

        // A provider with any other secret must reject the same token.
        let other = JwtProvider::new(format!("{}x", secret), 3600);
        prop_assert!(!other.validate(&token));
        prop_assert!(other.subject(&token).is_err());
    }
}
