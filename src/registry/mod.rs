//! Registry module for Docker Registry HTTP API v2 interactions
//!
//! Endpoint validation, bearer token acquisition, and the manifest and blob
//! operations the fake push is built from.

pub mod auth;
pub mod endpoint;
pub mod operations;

pub use auth::Auth;
pub use endpoint::{EndpointResolver, Scheme};
pub use operations::{BlobTransferer, ManifestClient};
