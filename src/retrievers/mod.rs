//! Retrievers module
//!
//! Retrievers that wrap other retrievers. All of them implement the
//! `Retriever` trait from `crate::schemas::Retriever`.

mod error;
pub use error::*;

mod query_enhancement;
pub use query_enhancement::*;
