//! HTTP prediction server for precept surrogate models

pub mod api;
pub mod config;
