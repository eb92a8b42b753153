//! Small declarative helpers shared by the HTTP apps.

#[cfg(feature = "actix")]
#[doc(hidden)]
pub use actix_web;

/// Generate a `routes` function registering the listed actix services.
///
/// ```ignore
/// macros_utils::routes! {
///     route health_route,
///     route ping_route,
/// }
/// ```
///
/// expands to `pub fn routes(cfg: &mut ServiceConfig)` calling `cfg.service(..)` once per
/// handler, so every route module exposes the same entry point to `App::configure`.
#[cfg(feature = "actix")]
#[macro_export]
macro_rules! routes {
    ($(route $handler:ident),* $(,)?) => {
        pub fn routes(cfg: &mut $crate::actix_web::web::ServiceConfig) {
            $( cfg.service($handler); )*
        }
    };
}
