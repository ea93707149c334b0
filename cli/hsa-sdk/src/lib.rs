//! Query resolution for the admin front end.
//!
//! [providers::directory] describes the upstream record directory and
//! implements it on top of [hsa_api::ApiClient] (and as a mock for tests).
//! [models] holds the resolvers that own query state and turn it into
//! pages of records.

pub mod models;
pub mod providers;
