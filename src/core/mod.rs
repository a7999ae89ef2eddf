pub mod config;
pub mod constants;
pub mod geo;
pub mod manifest;
pub mod month;
pub mod viewport;
