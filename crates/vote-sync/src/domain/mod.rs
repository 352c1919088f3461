//! # Domain Module
//!
//! Core domain types: election entities, the tally store and the error
//! taxonomy shared by every component.

pub mod entities;
pub mod errors;
pub mod liveness;
pub mod store;

pub use entities::*;
pub use errors::*;
pub use liveness::*;
pub use store::*;
