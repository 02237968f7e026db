//! `comptoir-core`: shared client foundation.
//!
//! This crate contains the primitives every comptoir crate agrees on:
//! strongly-typed identifiers and the shared error model. No transport,
//! storage, or UI concerns belong here.

pub mod error;
pub mod id;

pub use error::{CoreError, CoreResult};
pub use id::{OrgId, UserId};
