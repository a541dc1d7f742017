//! Procedural macros for the docmapper project.
//!
//! This crate provides `#[derive(ModelSchema)]`, which builds the explicit schema
//! descriptor of a model type from its attributes:
//!
//! ```ignore
//! #[derive(ModelSchema)]
//! #[model(collection = "users")]
//! #[field(username)]
//! #[field(logincount, default = 0)]
//! #[field(created, default_with = bson::DateTime::now)]
//! pub struct User;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_macros;

mod schema;

use proc_macro::TokenStream;

#[proc_macro_derive(ModelSchema, attributes(model, field))]
pub fn derive_model_schema(input: TokenStream) -> TokenStream {
    schema::derive_model_schema(input.into()).into()
}
