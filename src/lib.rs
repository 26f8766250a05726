pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use clients::{ConnectivityEvent, ConnectivityMonitor, OutboundRequest, RawResponse, Transport};
pub use config::Settings;
pub use error::{Error, Result};
pub use models::{
    normalize_services_provided, BulkOperation, BulkOutcome, FormPayload, ListParams, Record, RecordId,
    VendorPayload,
};
pub use services::{DataOrigin, VendorDataService};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
