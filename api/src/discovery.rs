use crate::error::GkError;
use async_trait::async_trait;

/// Registry tag of the index gateway services.
pub const SRV_INDEX_GATE: &str = "gkindex-gate";
/// Registry tag of the index store services.
pub const SRV_INDEX_STORE: &str = "gkindex-store";
/// Registry tag of the data gateway services.
pub const SRV_DATA_GATE: &str = "gkdata-gate";
/// Registry tag of the blob store services.
pub const SRV_BLOB_STORE: &str = "gkblob-store";

/// Enumerates the live services of each type, as `host:port` addresses.
///
/// An empty list is a successful empty result, not an error. The default
/// implementation periodically asks an external registry, filtering by the
/// tag matching the service type.
#[async_trait]
pub trait Catalog: Send + Sync {
	/// Returns the addresses of all the data gateway services.
	async fn list_data_gate(&self) -> Result<Vec<String>, GkError>;

	/// Returns the addresses of all the index gateway services.
	async fn list_index_gate(&self) -> Result<Vec<String>, GkError>;

	/// Returns the addresses of all the blob store services.
	async fn list_blob_store(&self) -> Result<Vec<String>, GkError>;

	/// Returns the addresses of all the index store services.
	async fn list_index_store(&self) -> Result<Vec<String>, GkError>;
}

/// Picks one endpoint of a type, re-evaluated on every call.
///
/// An empty catalog answer surfaces as `Unavailable`.
#[async_trait]
pub trait Balancer: Send + Sync {
	/// Returns the address of one available data gateway.
	async fn poll_data_gate(&self) -> Result<String, GkError>;

	/// Returns the address of one available index gateway.
	async fn poll_index_gate(&self) -> Result<String, GkError>;

	/// Returns the address of one available blob store.
	async fn poll_blob_store(&self) -> Result<String, GkError>;
}
