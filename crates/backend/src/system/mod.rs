pub mod handlers;
pub mod importers;
pub mod middleware;
pub mod tracing;
