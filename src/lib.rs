//! Client side transfer engine for the FDS object store.
//!
//! Uploads go through the multipart protocol (init, parallel parts,
//! complete or abort), downloads can stream the body or write it to a file
//! and resume with ranged requests. Every request is authenticated by one
//! [`Credential`].

pub mod auth;
mod client;
pub mod config;
mod context;
pub mod error;
pub mod model;
pub mod progress;
pub mod transfer;

pub use auth::{Credential, OAuthParams};
pub use client::FdsClient;
pub use config::FdsClientConfig;
pub use error::{FdsError, FdsResult};
pub use model::{FdsObject, ObjectContent, ObjectMetadata, PutObjectResult, UserParam};
pub use progress::{ProgressListener, ProgressReader};
