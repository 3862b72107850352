//! Hosts the storage backends of the gunkan fabric.
//!
//! The index plane persists versioned records through a narrow ordered
//! byte-key engine contract with a [`sled`] backed implementation and an
//! in-memory one; the blob plane stores part bodies in a filesystem
//! repository with two naming policies.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(missing_docs)]

/// The ordered byte-key engine contract and its durability policy.
pub mod engine;

/// Filesystem blob repositories (pre-named and post-named policies).
pub mod fs_blob_store;

/// In-memory engine for tests and ephemeral stores.
pub mod memory_engine;

/// The single-node index store semantics over an engine.
pub mod ordered_index;

/// [`sled`] backed persistent engine.
pub mod sled_engine;
