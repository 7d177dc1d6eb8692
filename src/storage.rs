use crate::errors::AppError;
use crate::models::{Credit, CreditRequest, Customer, CustomerRequest, CustomerUpdateRequest};
use sqlx::PgPool;
use uuid::Uuid;

/// Storage for customer records.
pub struct CustomerStorage {
    pool: PgPool,
}

impl CustomerStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new customer and return the stored row.
    ///
    /// `cpf` is the normalized 11-digit document and `password_hash` the bcrypt
    /// hash; a unique violation raised by a concurrent writer maps to the same
    /// duplicate-identity error the pre-checks produce.
    pub async fn insert(
        &self,
        request: &CustomerRequest,
        cpf: &str,
        password_hash: &str,
    ) -> Result<Customer, AppError> {
        sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (first_name, last_name, cpf, email, income, password, zip_code, street)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(cpf)
        .bind(&request.email)
        .bind(&request.income)
        .bind(password_hash)
        .bind(&request.zip_code)
        .bind(&request.street)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Customer>, AppError> {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, AppError> {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn exists_by_cpf(&self, cpf: &str) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM customers WHERE cpf = $1)")
            .bind(cpf)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn exists_by_email(&self, email: &str) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM customers WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn exists_by_id(&self, id: i64) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM customers WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    /// Overwrite only the fields present in the patch; returns `None` when the
    /// id is unknown.
    pub async fn update(
        &self,
        id: i64,
        patch: &CustomerUpdateRequest,
    ) -> Result<Option<Customer>, AppError> {
        sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                income = COALESCE($4, income),
                zip_code = COALESCE($5, zip_code),
                street = COALESCE($6, street)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&patch.first_name)
        .bind(&patch.last_name)
        .bind(&patch.income)
        .bind(&patch.zip_code)
        .bind(&patch.street)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    /// Delete a customer, cascading to owned credits. Returns whether a row
    /// was removed.
    pub async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

/// Storage for credit records.
pub struct CreditStorage {
    pool: PgPool,
}

impl CreditStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new credit with the given code; status starts as `PENDING`.
    pub async fn insert(
        &self,
        credit_code: Uuid,
        request: &CreditRequest,
    ) -> Result<Credit, AppError> {
        sqlx::query_as::<_, Credit>(
            r#"
            INSERT INTO credits (credit_code, credit_value, day_first_installment, number_of_installments, customer_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(credit_code)
        .bind(&request.credit_value)
        .bind(request.day_first_installment)
        .bind(request.number_of_installments)
        .bind(request.customer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    /// One page of a customer's credits in primary-key order.
    pub async fn find_page_by_customer_id(
        &self,
        customer_id: i64,
        page: u32,
        size: u32,
    ) -> Result<Vec<Credit>, AppError> {
        sqlx::query_as::<_, Credit>(
            "SELECT * FROM credits WHERE customer_id = $1 ORDER BY id LIMIT $2 OFFSET $3",
        )
        .bind(customer_id)
        .bind(i64::from(size))
        .bind(i64::from(page) * i64::from(size))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_credit_code(&self, credit_code: Uuid) -> Result<Option<Credit>, AppError> {
        sqlx::query_as::<_, Credit>("SELECT * FROM credits WHERE credit_code = $1")
            .bind(credit_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}

fn map_unique_violation(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.constraint() {
            Some("customers_cpf_key") => {
                return AppError::BusinessRule("CPF already registered".to_string())
            }
            Some("customers_email_key") => {
                return AppError::BusinessRule("Email already registered".to_string())
            }
            _ => {}
        }
    }
    AppError::Database(err)
}
