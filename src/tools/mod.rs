//! Tool catalog: argument schemas (`schema`), the build-time-constant
//! registry mapping tool name to schema and handler binding (`registry`),
//! and the analytical "advanced business" handlers that compose
//! `DataService` operations (`advanced`).

pub mod advanced;
pub mod registry;
pub mod schema;
