//! OpenAPI document assembly.
//!
//! Collects the utoipa-annotated handlers and DTO schemas into one document,
//! served together with Swagger UI by the router. Both stay unauthenticated.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::models::{
    CreditRequest, CreditResponse, CreditStatus, CreditSummary, CreditView, CustomerRequest,
    CustomerResponse, CustomerUpdateRequest, LoginRequest, TokenResponse,
};

/// Registers the bearer token security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Bearer token obtained from POST /api/auth/login.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI document for the whole API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Credit Application API",
        version = "0.1.0",
        description = "Customer registration and credit requests subject to \
                       simple eligibility rules. Authenticate with \
                       `Authorization: Bearer <token>`; registration and login \
                       are public."
    ),
    paths(
        crate::handlers::health,
        crate::handlers::login,
        crate::handlers::create_customer,
        crate::handlers::get_customer,
        crate::handlers::update_customer,
        crate::handlers::delete_customer,
        crate::handlers::create_credit,
        crate::handlers::list_credits,
        crate::handlers::get_credit_by_code,
    ),
    components(schemas(
        CustomerRequest,
        CustomerUpdateRequest,
        CustomerResponse,
        CreditRequest,
        CreditResponse,
        CreditSummary,
        CreditView,
        CreditStatus,
        LoginRequest,
        TokenResponse,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "auth", description = "Token issuance"),
        (name = "customers", description = "Customer registration and profile management"),
        (name = "credits", description = "Credit requests and lookups"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_carries_bearer_scheme_and_paths() {
        let doc = ApiDoc::openapi();

        let components = doc.components.expect("components present");
        assert!(components.security_schemes.contains_key("bearer_auth"));

        let paths = doc.paths.paths;
        assert!(paths.contains_key("/api/customers"));
        assert!(paths.contains_key("/api/customers/{id}"));
        assert!(paths.contains_key("/api/credits"));
        assert!(paths.contains_key("/api/credits/{credit_code}"));
        assert!(paths.contains_key("/api/auth/login"));
        assert!(paths.contains_key("/health"));
    }
}
