//! Query enhancement retrievers
//!
//! These retrievers rewrite or expand the query before passing it to a base retriever.

mod multi_query_retriever;
pub use multi_query_retriever::*;
