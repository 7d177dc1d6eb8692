//! Credit Application API Library
//!
//! This library provides the core functionality for the credit application
//! back office: customer registration, credit requests subject to simple
//! eligibility rules, bearer-token authentication and SQL persistence.
//!
//! # Modules
//!
//! - `auth`: Bearer token issuance, verification and the authentication filter.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types and HTTP translation.
//! - `handlers`: HTTP request handlers and the router.
//! - `models`: Entities, request/response DTOs and validation rules.
//! - `openapi`: OpenAPI document assembly.
//! - `services`: Customer and credit business rules.
//! - `storage`: Per-entity storage over the connection pool.

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod openapi;
pub mod services;
pub mod storage;
