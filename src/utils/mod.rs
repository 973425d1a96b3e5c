//! Utility functions shared by the index and the search requests.
//!
//! ## Modules
//!
//! - [`folding`] - Text normalization used for index keys and queries
//! - [`encoding`] - Little-endian integer and C-string helpers
//! - [`cancel`] - Cooperative cancellation flag
//! - [`app_data`] - Application configuration in the app data directory
//!
//! ```
//! use wordex::utils::folding;
//!
//! // Index keys ignore case, diacritics, whitespace and punctuation
//! assert_eq!(folding::apply("Crème Brûlée"), "cremebrulee");
//! ```

pub mod app_data;
pub mod cancel;
pub mod encoding;
pub mod folding;

pub use app_data::*;
pub use cancel::CancelToken;
pub use encoding::*;
