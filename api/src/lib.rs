//! Hosts the wire contract of the gunkan object-storage fabric.
//!
//! Gunkan splits the bodies of multi-part objects from their metadata: blob
//! stores keep the bytes, an index plane of stores and stateless gateways
//! keeps the locator records. This crate carries everything both sides agree
//! on: the ordered versioned key codec, the blob identifiers, the request
//! and reply payloads, the error taxonomy, and the traits the services and
//! clients implement.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(missing_docs)]

/// Identifiers of blob parts and their wire forms.
pub mod blob_id;

/// Service discovery and balancing contracts.
pub mod discovery;

/// Implements the error type ([`error::GkError`]) shared by every service
/// and mapped onto HTTP statuses and [`ErrorResponse`] payloads.
///
/// [`ErrorResponse`]: types::ErrorResponse
pub mod error;

/// Contains the [`index::IndexStore`] interface served by stores and
/// gateways of the index plane.
pub mod index;

/// The ordered, versioned key codec of the index plane.
pub mod keys;

/// Bounds checks for user supplied names.
pub mod sanity;

/// Request and reply payloads of the index calls.
pub mod types;
