#![doc = "octosphere: bridge Octopus publications to the AT Protocol."]

//! This crate synchronises a researcher's Octopus publications into their
//! repository on an AT Protocol PDS (e.g. Bluesky), at most once per
//! publication version.
//!
//! The pipeline is: list publications and versions from Octopus, filter
//! against the durable [`ledger`], map each unmirrored version through the
//! pure [`bridge`] transform, publish via [`atproto`], and commit the result
//! back to the ledger before moving on. Orchestration lives in
//! [`synchronise`]; the boundary traits and shared types live in [`contract`]
//! so every adapter can be mocked in tests.

pub mod atproto;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod contract;
pub mod error;
pub mod ledger;
pub mod octopus;
pub mod synchronise;
