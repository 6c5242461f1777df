//! Module store implementations and the upsert service

mod in_memory;
mod postgres;
mod resolver;
mod service;

pub use in_memory::InMemoryModuleStore;
pub use postgres::PostgresModuleStore;
pub use resolver::{resolve_authors, resolve_keywords};
pub use service::ModuleService;
