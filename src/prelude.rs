//! Commonly used items for convenient importing.
//!
//! ```rust
//! use btw::prelude::*;
//!
//! fn read_config(path: &str) -> Result<String, BoxError> {
//!     std::fs::read_to_string(path)
//!         .capture()
//!         .attach(["path", path])
//! }
//!
//! let err = read_config("/no/such/config.toml").unwrap_err();
//! assert!(err.is::<AnnotatedError>());
//! ```

pub use crate::{AnnotatedError, BoxError, ResultExt, attach};
