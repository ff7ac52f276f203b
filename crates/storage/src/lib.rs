//! SQLite-backed durable storage for the claim table.
//!
//! The engine never persists incrementally. After every mutation it hands the
//! whole object → owner mapping to [`ResourceStore::write_mapping`], and it
//! reads the mapping back exactly once at startup with
//! [`ResourceStore::read_mapping`]. The table is bounded by the number of live
//! objects, so rewriting it wholesale is cheap.
//!
//! # Core Concepts
//!
//! ## ResourceStore
//!
//! A [`ResourceStore`] is a named-resource key-value store: each resource is a
//! single JSON document stored under a name. Any serializable value can be
//! kept with [`ResourceStore::write`] / [`ResourceStore::read`]; claim
//! mappings have dedicated helpers.
//!
//! ## ClaimMapping
//!
//! A [`ClaimMapping`] maps raw object ids to raw owner ids. It is stored as a
//! JSON object with string keys, for example `{"1017": 76561198000000001}`.
//!
//! # Example
//!
//! ```no_run
//! use storage::{ClaimMapping, RIDABLES, ResourceStore};
//!
//! let store = ResourceStore::open("claims.db")?;
//!
//! let mut mapping = ClaimMapping::new();
//! mapping.insert(1017, 42);
//! store.write_mapping(RIDABLES, &mapping)?;
//!
//! let loaded = store.read_mapping(RIDABLES)?;
//! assert_eq!(loaded.get(&1017), Some(&42));
//! # Ok::<(), storage::Error>(())
//! ```

mod error;
mod store;

pub use error::{Error, Result};
pub use store::{ClaimMapping, RIDABLES, ResourceStore};
