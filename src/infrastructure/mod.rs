//! Infrastructure layer - store implementations, services, logging

pub mod logging;
pub mod module;
