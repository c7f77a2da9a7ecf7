//! Registry operations module
//!
//! One type per resource: manifests are loaded, mutated and pushed by
//! [`ManifestClient`], blobs are copied between repositories by
//! [`BlobTransferer`].

pub mod blob_operations;
pub mod manifest_operations;

pub use blob_operations::BlobTransferer;
pub use manifest_operations::ManifestClient;
