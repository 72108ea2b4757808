//! HTTP route handlers

pub mod frame;
pub mod incidents;
pub mod status;
