pub mod catalog;
pub mod panel;
pub mod strategy;

pub use catalog::{display_name, matches, type_in, type_is};
pub use panel::{binder, default_schema};
pub use strategy::{DocumentationField, EventDefinitionTypeField};
