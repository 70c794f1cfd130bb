pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod opensky;
pub mod output;
pub mod store;
pub mod transform;
pub mod window;
