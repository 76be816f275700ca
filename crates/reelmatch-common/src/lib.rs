//! Reelmatch-Common: Shared types, identifiers, and errors.
//!
//! This crate provides common functionality used across reelmatch:
//!
//! - **Typed IDs**: Type-safe UUID wrapper for library media items
//! - **Core Types**: Media type and category enums used to route provider lookups
//! - **Error Handling**: The provider error taxonomy and its retry classification
//!
//! # Examples
//!
//! ```
//! use reelmatch_common::{MediaCategory, MediaId, MediaType, ProviderError};
//!
//! let media_id = MediaId::new();
//! let category = MediaCategory::for_media(MediaType::TvShow, true);
//! assert_eq!(category, MediaCategory::Anime);
//!
//! let err = ProviderError::Server { status: 503 };
//! assert!(err.is_retryable());
//! # let _ = media_id;
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{ProviderError, ProviderResult};
pub use ids::*;
pub use types::*;
