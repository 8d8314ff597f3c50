//! Compile-time dependency injection macros for tablemap.
//!
//! - `#[derive(Context)]` makes every field of a struct extractable
//! - `#[derive(FromContext)]` builds a struct by extracting each field
//!
//! Generated code references `crate::FromRef`. Code outside the defining
//! crate points at it with `krate = "tablemap"`.

use proc_macro::TokenStream;

mod attrs;
mod context;
mod from_context;

/// Derive macro for creating a DI context.
///
/// Generates a `FromRef` implementation for each field type. All fields
/// must implement `Clone`.
///
/// # Example
///
/// ```ignore
/// #[derive(Context, Clone)]
/// pub struct Context {
///     pub store: AppStore,
///     pub config: Arc<Config>,
/// }
///
/// // Generated:
/// // impl FromRef<Context> for AppStore { ... }
/// // impl FromRef<Context> for Arc<Config> { ... }
/// ```
#[proc_macro_derive(Context, attributes(context))]
pub fn derive_context(input: TokenStream) -> TokenStream {
    context::derive_context_impl(input)
}

/// Derive macro for types that can be constructed from a context.
///
/// Generates a `FromRef<Context>` implementation resolving each field with
/// `FromRef::from_ref`.
///
/// # Example
///
/// ```ignore
/// #[derive(FromContext, Clone)]
/// pub struct RepositoryFactory {
///     store: AppStore,
///     config: Arc<Config>,
/// }
/// ```
///
/// # Options
///
/// ```ignore
/// #[derive(FromContext)]
/// #[from_context(Context = "tablemap::context::Context", krate = "tablemap")]
/// pub struct Service {
///     factory: RepositoryFactory,
/// }
/// ```
#[proc_macro_derive(FromContext, attributes(from_context))]
pub fn derive_from_context(input: TokenStream) -> TokenStream {
    from_context::derive_from_context_impl(input)
}
