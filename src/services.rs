use crate::errors::AppError;
use crate::models::{
    normalize_cpf, Credit, CreditRequest, Customer, CustomerRequest, CustomerUpdateRequest,
};
use crate::storage::{CreditStorage, CustomerStorage};
use chrono::{Months, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const MIN_INSTALLMENTS: i32 = 1;
const MAX_INSTALLMENTS: i32 = 48;
const INSTALLMENT_WINDOW_MONTHS: u32 = 3;

/// Source of "today" for the first-installment date rule.
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    /// Civil date of the system clock, in UTC.
    System,
    /// A fixed date, for deterministic rule checks in tests.
    Fixed(NaiveDate),
}

impl Clock {
    pub fn today(&self) -> NaiveDate {
        match self {
            Clock::System => Utc::now().date_naive(),
            Clock::Fixed(date) => *date,
        }
    }
}

/// Customer registration and profile management.
pub struct CustomerService {
    customers: CustomerStorage,
}

impl CustomerService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            customers: CustomerStorage::new(pool),
        }
    }

    /// Register a new customer.
    ///
    /// CPF uniqueness is checked before email uniqueness; the password is
    /// bcrypt-hashed before it reaches storage.
    pub async fn create(&self, request: &CustomerRequest) -> Result<Customer, AppError> {
        let cpf = normalize_cpf(&request.cpf);

        if self.customers.exists_by_cpf(&cpf).await? {
            return Err(AppError::BusinessRule("CPF already registered".to_string()));
        }
        if self.customers.exists_by_email(&request.email).await? {
            return Err(AppError::BusinessRule(
                "Email already registered".to_string(),
            ));
        }

        let password_hash = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)?;
        self.customers.insert(request, &cpf, &password_hash).await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Customer, AppError> {
        self.customers
            .find_by_id(id)
            .await?
            .ok_or_else(|| customer_not_found(id))
    }

    pub async fn update(
        &self,
        id: i64,
        patch: &CustomerUpdateRequest,
    ) -> Result<Customer, AppError> {
        self.customers
            .update(id, patch)
            .await?
            .ok_or_else(|| customer_not_found(id))
    }

    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        if self.customers.delete(id).await? {
            Ok(())
        } else {
            Err(customer_not_found(id))
        }
    }

    /// Verify login credentials without revealing which of the two failed.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Customer, AppError> {
        let customer = self
            .customers
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

        if !bcrypt::verify(password, &customer.password)? {
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }
        Ok(customer)
    }
}

/// Credit requests and lookups.
pub struct CreditService {
    credits: CreditStorage,
    customers: CustomerStorage,
    clock: Clock,
}

impl CreditService {
    pub fn new(pool: PgPool, clock: Clock) -> Self {
        Self {
            credits: CreditStorage::new(pool.clone()),
            customers: CustomerStorage::new(pool),
            clock,
        }
    }

    /// Create a credit for an existing customer.
    ///
    /// The credit code is a fresh random UUID assigned here; the stored record
    /// always starts with status `Pending`.
    pub async fn create(&self, request: &CreditRequest) -> Result<Credit, AppError> {
        if !self.customers.exists_by_id(request.customer_id).await? {
            return Err(customer_not_found(request.customer_id));
        }
        validate_installment_count(request.number_of_installments)?;
        validate_first_installment_date(request.day_first_installment, self.clock.today())?;

        self.credits.insert(Uuid::new_v4(), request).await
    }

    pub async fn find_all_by_customer(
        &self,
        customer_id: i64,
        page: u32,
        size: u32,
    ) -> Result<Vec<Credit>, AppError> {
        if !self.customers.exists_by_id(customer_id).await? {
            return Err(customer_not_found(customer_id));
        }
        self.credits
            .find_page_by_customer_id(customer_id, page, size)
            .await
    }

    /// Look up a credit by code, enforcing that it belongs to `customer_id`.
    pub async fn find_by_credit_code(
        &self,
        customer_id: i64,
        credit_code: Uuid,
    ) -> Result<Credit, AppError> {
        let credit = self
            .credits
            .find_by_credit_code(credit_code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Creditcode {} not found", credit_code)))?;

        if credit.customer_id != customer_id {
            return Err(AppError::BusinessRule(
                "Credit does not belong to customer".to_string(),
            ));
        }
        Ok(credit)
    }
}

fn customer_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Id {} not found", id))
}

fn validate_installment_count(count: i32) -> Result<(), AppError> {
    if (MIN_INSTALLMENTS..=MAX_INSTALLMENTS).contains(&count) {
        Ok(())
    } else {
        Err(AppError::BusinessRule(format!(
            "numberOfInstallments must be between {} and {}",
            MIN_INSTALLMENTS, MAX_INSTALLMENTS
        )))
    }
}

/// The first installment may fall at most three calendar months ahead;
/// the boundary day itself is allowed. Month arithmetic clamps to the last
/// day of shorter months.
fn validate_first_installment_date(date: NaiveDate, today: NaiveDate) -> Result<(), AppError> {
    let limit = today
        .checked_add_months(Months::new(INSTALLMENT_WINDOW_MONTHS))
        .unwrap_or(NaiveDate::MAX);

    if date > limit {
        Err(AppError::BusinessRule(format!(
            "dayFirstInstallment must be on or before {}",
            limit
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_installment_count_bounds() {
        assert!(validate_installment_count(1).is_ok());
        assert!(validate_installment_count(48).is_ok());
        assert!(validate_installment_count(24).is_ok());

        assert!(validate_installment_count(0).is_err());
        assert!(validate_installment_count(49).is_err());
        assert!(validate_installment_count(-1).is_err());
    }

    #[test]
    fn test_first_installment_exactly_three_months_ahead_is_valid() {
        let today = date(2026, 2, 13);
        assert!(validate_first_installment_date(date(2026, 5, 13), today).is_ok());
    }

    #[test]
    fn test_first_installment_one_day_past_window_is_rejected() {
        let today = date(2026, 2, 13);
        let result = validate_first_installment_date(date(2026, 5, 14), today);
        assert!(matches!(result, Err(AppError::BusinessRule(_))));
    }

    #[test]
    fn test_first_installment_in_the_past_is_within_window() {
        let today = date(2026, 2, 13);
        assert!(validate_first_installment_date(date(2026, 1, 1), today).is_ok());
    }

    #[test]
    fn test_window_limit_clamps_to_month_end() {
        // Aug 31 + 3 months lands on Nov 30.
        let today = date(2025, 8, 31);
        assert!(validate_first_installment_date(date(2025, 11, 30), today).is_ok());
        assert!(validate_first_installment_date(date(2025, 12, 1), today).is_err());
    }

    #[test]
    fn test_fixed_clock_reports_its_date() {
        let clock = Clock::Fixed(date(2026, 2, 13));
        assert_eq!(clock.today(), date(2026, 2, 13));
    }

    #[test]
    fn test_password_hash_verifies_and_rejects() {
        // Low cost keeps the test quick; the hash format is identical.
        let hash = bcrypt::hash("s3cr3tpw", 4).unwrap();
        assert_ne!(hash, "s3cr3tpw");
        assert!(bcrypt::verify("s3cr3tpw", &hash).unwrap());
        assert!(!bcrypt::verify("wrong-password", &hash).unwrap());
    }
}
