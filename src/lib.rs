//! Registry Fake Pusher Library
//!
//! Builds a new tag in a target repository by grafting the top layers of a
//! source image onto an existing target image, without pulling or building
//! anything locally. Only layer blobs and a re-signed schema 1 manifest
//! cross the wire.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod image;
pub mod logging;
pub mod pusher;
pub mod registry;

pub use config::{PushConfig, RegistryLocation};
pub use error::{PusherError, Result};
pub use logging::Logger;
pub use pusher::{FakePusher, PushReport};
