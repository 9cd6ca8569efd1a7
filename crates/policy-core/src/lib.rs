//! Shared types, ids, and error taxonomy for the policy decision engine.
//!
//! Every other crate in this workspace depends on `policy-core` for its entities
//! (§3 DATA MODEL), its tagged attribute `Value`, and its fixed error taxonomy (§7).
//! Nothing in here performs I/O or makes a decision; it is the vocabulary the rest of
//! the workspace shares.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![allow(missing_docs)] // documented at the item/module level where it adds value

pub mod error;
pub mod ids;
pub mod model;
pub mod selection;
pub mod value;

pub use error::PolicyError;
pub use value::Value;
