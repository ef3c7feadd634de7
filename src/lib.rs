//! Container load planning: places rectangular and cylindrical cargo into
//! containers with a free-space anchor model and serves plans over HTTP.

pub mod api;
pub mod config;
pub mod container;
pub mod geometry;
pub mod ids;
pub mod loader;
pub mod model;
pub mod scan;
pub mod selection;
pub mod types;
