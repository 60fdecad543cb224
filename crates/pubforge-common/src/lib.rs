//! Pubforge-Common: shared types used by every pubforge crate.
//!
//! - **Typed IDs**: UUID wrappers for items, tasks, runs and catalog records
//! - **Values**: the closed [`Value`] variant stored in item properties and
//!   plugin settings
//! - **Path Utilities**: file classification by extension
//! - **Error Handling**: the engine-wide [`Error`] and [`Result`] alias
//!
//! # Examples
//!
//! ```
//! use pubforge_common::{ItemId, Value, Error, Result};
//! use pubforge_common::paths::{classify, FileKind};
//! use std::path::Path;
//!
//! let item_id = ItemId::new();
//! let version = Value::from(3);
//! assert_eq!(version.as_i64(), Some(3));
//!
//! assert_eq!(classify(Path::new("plate.exr")), FileKind::Image);
//!
//! fn example(id: ItemId) -> Result<()> {
//!     Err(Error::invalid_item(id))
//! }
//! assert!(example(item_id).is_err());
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod value;

pub use error::{Error, Result};
pub use ids::*;
pub use value::{BlobRef, Value, BLOB_KEY};
