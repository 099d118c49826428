pub mod clock;
pub mod config;
pub mod limits;
pub mod mirror;
pub mod model;
pub mod observability;
pub mod registry;
pub mod service;
pub mod store;
