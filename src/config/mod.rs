//! Service configuration.

mod getters;
mod methods;
mod types;

pub use types::ServiceConfig;
