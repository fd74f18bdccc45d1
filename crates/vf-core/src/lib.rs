//! verde-forum/crates/vf-core/src/lib.rs
//!
//! The central domain logic and interface definitions for Verde Forum:
//! models, ports, popularity scoring, feed composition and gamification.

pub mod comments;
pub mod error;
pub mod feed;
pub mod gamification;
pub mod models;
pub mod scoring;
pub mod slug;
pub mod traits;
pub mod votes;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;
