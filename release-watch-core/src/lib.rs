#![doc = "release-watch-core: detect new release manifests on a remote directory and notify about them once."]

//! Pipeline of a polling cycle, leaf-first:
//!
//! - [`ledger`]: the sent-ledger of already notified files
//! - [`select`]: new candidates on the remote directory
//! - [`group`]: candidates by modification day
//! - [`aggregate`]: release records of a group's manifests
//! - [`notify`]: rendering and dispatch of one notification per group
//! - [`cycle`]: one full cycle; [`watch`] repeats it on a fixed period
//!
//! Remote access and delivery go through the traits in [`contract`].

pub mod aggregate;
pub mod config;
pub mod contract;
pub mod cycle;
pub mod error;
pub mod group;
pub mod ledger;
pub mod notify;
pub mod select;
pub mod watch;
