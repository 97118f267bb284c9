#![doc = "bucket-sync-core: bulk file synchronisation engine for bucket-sync."]

//! This crate holds the transfer engine: the data model and [`contract::FileService`]
//! seam, the HTTP client, the signature cache, retry/backoff, remote listing,
//! local walking and the bounded worker pool that drives uploads and downloads.
//!
//! # Usage
//! Build a [`synchronise::SyncContext`] and pass it to [`upload::upload`] or
//! [`download::download`]. Credentials and configuration files are the
//! caller's concern; see the `bucket-sync` crate.

pub mod client;
pub mod config;
pub mod contract;
pub mod download;
pub mod error;
pub mod lister;
pub mod paths;
pub mod pool;
pub mod retry;
pub mod signature;
pub mod synchronise;
pub mod upload;
pub mod walker;
