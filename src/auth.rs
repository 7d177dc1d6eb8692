use crate::errors::AppError;
use crate::handlers::AppState;
use crate::storage::CustomerStorage;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Role granted to every registered customer.
pub const ROLE_USER: &str = "USER";

/// Claims carried inside a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject, the customer's email address.
    pub sub: String,
    /// Role claims. A singular string value decodes as a one-element list.
    #[serde(default, deserialize_with = "deserialize_roles")]
    pub roles: Vec<String>,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

fn deserialize_roles<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(role) => vec![role],
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    })
}

/// Issues and verifies HS256 bearer tokens.
///
/// The signing secret is loaded once at startup and never rotated at runtime.
#[derive(Clone)]
pub struct JwtProvider {
    secret: String,
    validity_secs: i64,
}

impl JwtProvider {
    pub fn new(secret: String, validity_secs: i64) -> Self {
        Self {
            secret,
            validity_secs,
        }
    }

    /// Create a signed token binding `subject` and `roles`, valid from now
    /// until the configured validity window elapses.
    pub fn issue(&self, subject: &str, roles: Vec<String>) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            roles,
            iat: now,
            exp: now + self.validity_secs,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token creation failed: {}", e)))
    }

    /// Subject of a verified token.
    pub fn subject(&self, token: &str) -> Result<String, AppError> {
        let claims = self
            .decode_claims(token)
            .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;
        Ok(claims.sub)
    }

    /// Role claims of a verified token.
    pub fn roles(&self, token: &str) -> Result<Vec<String>, AppError> {
        let claims = self
            .decode_claims(token)
            .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;
        Ok(claims.roles)
    }

    /// True iff the signature verifies and the token has not expired.
    /// Verification failures are never propagated.
    pub fn validate(&self, token: &str) -> bool {
        self.decode_claims(token).is_ok()
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        // Expiry is checked against the exact current instant, no leeway.
        let mut validation = Validation::default();
        validation.leeway = 0;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )?;
        Ok(data.claims)
    }
}

/// Strip the `Bearer ` scheme prefix from an Authorization header value.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ")
}

/// The authenticated customer attached to a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub customer_id: i64,
    pub email: String,
    pub roles: Vec<String>,
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Missing or invalid bearer token".to_string()))
    }
}

/// Authentication filter.
///
/// Validates the bearer token, loads the customer named by its subject and
/// installs an [`AuthUser`] into the request extensions. Every failure clears
/// the principal and lets the request continue unauthenticated; protected
/// handlers reject it through the [`AuthUser`] extractor.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(user) = resolve_principal(&state, request.headers()).await {
        request.extensions_mut().insert(user);
    }
    next.run(request).await
}

async fn resolve_principal(state: &AppState, headers: &HeaderMap) -> Option<AuthUser> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = extract_bearer_token(header)?;

    if !state.jwt.validate(token) {
        tracing::warn!("Bearer token failed validation");
        return None;
    }

    let email = state.jwt.subject(token).ok()?;
    let customer = match CustomerStorage::new(state.db.clone())
        .find_by_email(&email)
        .await
    {
        Ok(Some(customer)) => customer,
        Ok(None) => {
            tracing::warn!("Token subject does not match a registered customer");
            return None;
        }
        Err(e) => {
            tracing::error!("Customer lookup failed during authentication: {}", e);
            return None;
        }
    };

    // Stored authorities unioned with whatever the token carries.
    let mut roles = vec![ROLE_USER.to_string()];
    if let Ok(token_roles) = state.jwt.roles(token) {
        for role in token_roles {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
    }

    Some(AuthUser {
        customer_id: customer.id,
        email: customer.email,
        roles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> JwtProvider {
        JwtProvider::new("test-secret-key".to_string(), 3600)
    }

    #[test]
    fn test_issue_and_verify_token() {
        let jwt = provider();
        let roles = vec![ROLE_USER.to_string(), "ADMIN".to_string()];

        let token = jwt.issue("camila@example.com", roles.clone()).unwrap();

        assert!(jwt.validate(&token));
        assert_eq!(jwt.subject(&token).unwrap(), "camila@example.com");
        assert_eq!(jwt.roles(&token).unwrap(), roles);
    }

    #[test]
    fn test_token_signed_with_other_secret_rejected() {
        let jwt = provider();
        let other = JwtProvider::new("another-secret".to_string(), 3600);

        let token = other.issue("camila@example.com", vec![]).unwrap();

        assert!(!jwt.validate(&token));
        assert!(matches!(
            jwt.subject(&token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let jwt = provider();

        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "camila@example.com".to_string(),
            roles: vec![ROLE_USER.to_string()],
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test-secret-key".as_bytes()),
        )
        .unwrap();

        assert!(!jwt.validate(&token));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let jwt = provider();
        assert!(!jwt.validate("not.a.token"));
        assert!(!jwt.validate(""));
    }

    #[test]
    fn test_singular_role_claim_decodes_as_one_element_list() {
        #[derive(Serialize)]
        struct SingularClaims {
            sub: String,
            roles: String,
            iat: i64,
            exp: i64,
        }

        let now = Utc::now().timestamp();
        let claims = SingularClaims {
            sub: "camila@example.com".to_string(),
            roles: "ADMIN".to_string(),
            iat: now,
            exp: now + 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test-secret-key".as_bytes()),
        )
        .unwrap();

        assert_eq!(provider().roles(&token).unwrap(), vec!["ADMIN".to_string()]);
    }

    #[test]
    fn test_absent_roles_claim_decodes_as_empty_list() {
        #[derive(Serialize)]
        struct BareClaims {
            sub: String,
            iat: i64,
            exp: i64,
        }

        let now = Utc::now().timestamp();
        let claims = BareClaims {
            sub: "camila@example.com".to_string(),
            iat: now,
            exp: now + 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test-secret-key".as_bytes()),
        )
        .unwrap();

        assert!(provider().roles(&token).unwrap().is_empty());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(extract_bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(extract_bearer_token("bearer abc"), None);
        assert_eq!(extract_bearer_token(""), None);
    }
}
