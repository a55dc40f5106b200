//! Infinicanvas cloud sync
//!
//! Client for the hosted backend that stores canvases per user: email and
//! password sign-in, canvas rows with version history, and image uploads to
//! a public bucket.

pub mod client;
pub mod config;
pub mod error;
pub mod sync;

pub use client::{
    AuthEvent, AuthSubscription, BackendClient, Canvas, CanvasVersion, IMAGE_BUCKET, Session, User,
};
pub use config::BackendConfig;
pub use error::{CloudError, CloudResult};
pub use sync::CanvasSync;
