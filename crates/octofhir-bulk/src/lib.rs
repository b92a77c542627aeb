//! # octofhir-bulk
//!
//! Client side of the FHIR Bulk Data `$export` operation for Group exports.
//!
//! - [`client`] - Kickoff, status and download requests
//! - [`poller`] - Status polling with an attempt and time budget
//! - [`ingest`] - Concurrent NDJSON download into typed records
//! - [`manifest`] - Completion manifest types

pub mod client;
pub mod config;
pub mod error;
pub mod ingest;
pub mod manifest;
pub mod poller;

pub use client::{BulkClient, BulkSession, ExportJob, ExportRequest};
pub use config::ExportConfig;
pub use error::{BulkError, BulkResult};
pub use ingest::{NdjsonSource, ResourceIngester, parse_ndjson};
pub use manifest::{ExportManifest, OutputFileReference};
pub use poller::{ExportPoller, PollPolicy, PollStatus, StatusProbe};
