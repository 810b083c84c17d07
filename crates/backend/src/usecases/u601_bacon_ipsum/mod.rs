pub mod bacon_ipsum_client;
pub mod content_store;
pub mod importer;

pub use content_store::{ContentSink, MemoryContentStore};
pub use importer::{BaconIpsumImporter, IMPORTER_ID};
