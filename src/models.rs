use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::borrow::Cow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// ============ Database Entities ============

/// A registered customer.
///
/// Central entity of the system; owns zero or more credits. The `password`
/// column holds a bcrypt hash and is never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct Customer {
    /// Unique identifier, generated by the database.
    pub id: i64,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// CPF document, stored as 11 digits with punctuation stripped.
    pub cpf: String,
    /// Email address, unique across customers.
    pub email: String,
    /// Declared monthly income.
    pub income: BigDecimal,
    /// Bcrypt hash of the password.
    pub password: String,
    /// Postal code.
    pub zip_code: String,
    /// Street address.
    pub street: String,
    /// Timestamp of registration.
    pub created_at: DateTime<Utc>,
}

/// A credit requested by a customer.
#[derive(Debug, Clone, FromRow)]
pub struct Credit {
    /// Unique identifier, generated by the database.
    pub id: i64,
    /// Opaque public lookup key, assigned once at creation.
    pub credit_code: Uuid,
    /// Requested amount.
    pub credit_value: BigDecimal,
    /// Date the first installment is due.
    pub day_first_installment: NaiveDate,
    /// Number of installments, within [1, 48].
    pub number_of_installments: i32,
    /// Approval status. New credits always start as `Pending`.
    pub status: CreditStatus,
    /// Owning customer.
    pub customer_id: i64,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
}

/// Approval status of a credit.
///
/// No transition logic exists; the value is `Pending` from creation onward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "credit_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum CreditStatus {
    /// Awaiting review.
    Pending,
    /// Approved for disbursement.
    Approved,
    /// Rejected.
    Rejected,
}

// ============ API Request Models ============

/// Registration payload for a new customer.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRequest {
    #[validate(length(min = 1, message = "firstName must not be empty"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "lastName must not be empty"))]
    pub last_name: String,
    /// CPF document; punctuation such as `123.456.789-01` is accepted.
    #[validate(custom(function = validate_cpf))]
    pub cpf: String,
    #[validate(custom(function = validate_non_negative))]
    #[schema(value_type = String, example = "4500.00")]
    pub income: BigDecimal,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must have at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "zipCode must not be empty"))]
    pub zip_code: String,
    #[validate(length(min = 1, message = "street must not be empty"))]
    pub street: String,
}

/// Partial update for an existing customer. Absent fields keep their value.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUpdateRequest {
    #[validate(length(min = 1, message = "firstName must not be empty"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, message = "lastName must not be empty"))]
    pub last_name: Option<String>,
    #[validate(custom(function = validate_non_negative))]
    #[schema(value_type = String, example = "5200.00")]
    pub income: Option<BigDecimal>,
    #[validate(length(min = 1, message = "zipCode must not be empty"))]
    pub zip_code: Option<String>,
    #[validate(length(min = 1, message = "street must not be empty"))]
    pub street: Option<String>,
}

/// Payload for requesting a new credit.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditRequest {
    #[validate(custom(function = validate_positive))]
    #[schema(value_type = String, example = "10000.00")]
    pub credit_value: BigDecimal,
    /// Date of the first installment, at most three months ahead.
    pub day_first_installment: NaiveDate,
    pub number_of_installments: i32,
    /// Customer requesting the credit.
    pub customer_id: i64,
}

/// Credentials for obtaining a bearer token.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
}

// ============ API Response Models ============

/// Public view of a customer profile.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub cpf: String,
    #[schema(value_type = String)]
    pub income: BigDecimal,
    pub email: String,
    pub zip_code: String,
    pub street: String,
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            first_name: customer.first_name,
            last_name: customer.last_name,
            cpf: customer.cpf,
            income: customer.income,
            email: customer.email,
            zip_code: customer.zip_code,
            street: customer.street,
        }
    }
}

/// Created credit, returned from the creation endpoint.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditResponse {
    pub credit_code: Uuid,
    #[schema(value_type = String)]
    pub credit_value: BigDecimal,
    pub day_first_installment: NaiveDate,
    pub number_of_installments: i32,
    pub status: CreditStatus,
    pub customer_id: i64,
}

impl From<Credit> for CreditResponse {
    fn from(credit: Credit) -> Self {
        Self {
            credit_code: credit.credit_code,
            credit_value: credit.credit_value,
            day_first_installment: credit.day_first_installment,
            number_of_installments: credit.number_of_installments,
            status: credit.status,
            customer_id: credit.customer_id,
        }
    }
}

/// Compact credit entry for list responses.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditSummary {
    pub credit_code: Uuid,
    #[schema(value_type = String)]
    pub credit_value: BigDecimal,
    pub number_of_installments: i32,
    pub status: CreditStatus,
}

impl From<Credit> for CreditSummary {
    fn from(credit: Credit) -> Self {
        Self {
            credit_code: credit.credit_code,
            credit_value: credit.credit_value,
            number_of_installments: credit.number_of_installments,
            status: credit.status,
        }
    }
}

/// Detailed credit view including owner details.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditView {
    pub credit_code: Uuid,
    #[schema(value_type = String)]
    pub credit_value: BigDecimal,
    pub day_first_installment: NaiveDate,
    pub number_of_installments: i32,
    pub status: CreditStatus,
    pub email_customer: String,
    #[schema(value_type = String)]
    pub income_customer: BigDecimal,
}

impl CreditView {
    /// Assembles the view from a credit and its owning customer.
    pub fn new(credit: Credit, owner: &Customer) -> Self {
        Self {
            credit_code: credit.credit_code,
            credit_value: credit.credit_value,
            day_first_installment: credit.day_first_installment,
            number_of_installments: credit.number_of_installments,
            status: credit.status,
            email_customer: owner.email.clone(),
            income_customer: owner.income.clone(),
        }
    }
}

/// Bearer token issued on a successful login.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

// ============ Query Parameters ============

/// Query parameters for listing a customer's credits.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CreditListParams {
    /// Customer whose credits are listed.
    pub customer_id: i64,
    /// Zero-based page number.
    #[serde(default)]
    pub page: u32,
    /// Page size.
    #[serde(default = "default_page_size")]
    pub size: u32,
}

/// Query parameter identifying the customer a credit must belong to.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CreditOwnerParams {
    pub customer_id: i64,
}

fn default_page_size() -> u32 {
    20
}

// ============ Validation Rules ============

/// Accepts an 11-digit CPF, with `.` and `-` separators tolerated.
pub fn validate_cpf(cpf: &str) -> Result<(), ValidationError> {
    let stripped: String = cpf.chars().filter(|c| !matches!(c, '.' | '-')).collect();
    if stripped.len() == 11 && stripped.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("cpf");
        err.message = Some(Cow::Borrowed("cpf must contain exactly 11 digits"));
        Err(err)
    }
}

/// Strips CPF punctuation, keeping only the digits.
pub fn normalize_cpf(cpf: &str) -> String {
    cpf.chars().filter(char::is_ascii_digit).collect()
}

fn validate_non_negative(value: &BigDecimal) -> Result<(), ValidationError> {
    if *value < BigDecimal::from(0) {
        let mut err = ValidationError::new("non_negative");
        err.message = Some(Cow::Borrowed("must not be negative"));
        return Err(err);
    }
    Ok(())
}

fn validate_positive(value: &BigDecimal) -> Result<(), ValidationError> {
    if *value <= BigDecimal::from(0) {
        let mut err = ValidationError::new("positive");
        err.message = Some(Cow::Borrowed("must be greater than zero"));
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_cpf_accepts_plain_digits() {
        assert!(validate_cpf("12345678909").is_ok());
    }

    #[test]
    fn test_cpf_accepts_punctuated_form() {
        assert!(validate_cpf("123.456.789-09").is_ok());
    }

    #[test]
    fn test_cpf_rejects_wrong_length_and_letters() {
        assert!(validate_cpf("1234567890").is_err());
        assert!(validate_cpf("123456789012").is_err());
        assert!(validate_cpf("123456789ab").is_err());
        assert!(validate_cpf("").is_err());
    }

    #[test]
    fn test_normalize_cpf_strips_punctuation() {
        assert_eq!(normalize_cpf("123.456.789-09"), "12345678909");
        assert_eq!(normalize_cpf("12345678909"), "12345678909");
    }

    #[test]
    fn test_registration_payload_validation() {
        let valid = CustomerRequest {
            first_name: "Camila".to_string(),
            last_name: "Cavalcante".to_string(),
            cpf: "285.396.460-03".to_string(),
            income: BigDecimal::from_str("1000.0").unwrap(),
            email: "camila@example.com".to_string(),
            password: "s3cr3tpw".to_string(),
            zip_code: "12345".to_string(),
            street: "Rua da Cami".to_string(),
        };
        assert!(valid.validate().is_ok());

        let invalid = CustomerRequest {
            first_name: String::new(),
            email: "not-an-email".to_string(),
            ..valid_clone(&valid)
        };
        let errors = invalid.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("first_name"));
        assert!(fields.contains_key("email"));
    }

    #[test]
    fn test_credit_payload_rejects_non_positive_value() {
        let request = CreditRequest {
            credit_value: BigDecimal::from(0),
            day_first_installment: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            number_of_installments: 12,
            customer_id: 1,
        };
        assert!(request.validate().is_err());
    }

    fn valid_clone(source: &CustomerRequest) -> CustomerRequest {
        CustomerRequest {
            first_name: source.first_name.clone(),
            last_name: source.last_name.clone(),
            cpf: source.cpf.clone(),
            income: source.income.clone(),
            email: source.email.clone(),
            password: source.password.clone(),
            zip_code: source.zip_code.clone(),
            street: source.street.clone(),
        }
    }
}
