//! This file is the root of the `nullable_core` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of our library (`types`, `column`, `bridge`,
//!     etc.) so the Rust compiler knows they exist.
//! 2.  Re-exporting the handful of names most callers need, so they do not have to
//!     reach into submodules.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[doc(hidden)]
pub use log as __log;

//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
pub mod observability; // Make macros available throughout the crate

pub mod bridge;
pub mod column;
pub mod config;
pub mod error;
pub mod formats;
pub mod io;
pub mod kernels;
pub mod types;

//==================================================================================
// 2. Re-exports
//==================================================================================
pub use column::{Column, MutableColumn, NullableColumn};
pub use config::{BulkConfig, FormatSettings, NullableConfig, PresenceEncoding};
pub use error::{NullableError, Result};
pub use types::{
    make_nullable, parse_type, remove_nullable, DataType, DataTypePtr, Field, NullableType,
};
