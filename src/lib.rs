pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod service;
pub mod store;
pub mod sweeper;
pub mod wire;
