//! Resolvers behind the generated schema: argument pipeline, filters and
//! mutations.

pub mod args;
pub mod filter;
pub mod mutation;

pub use args::{resolve_query_args, Order, QueryArgs};
pub use filter::{filter_selection, reference_keys, resolve_filter};
pub use mutation::{create, update, upsert};
