use crate::error::GkError;
use crate::types::{
	DeleteReply, DeleteRequest, GetReply, GetRequest, ListReply, ListRequest, PutReply, PutRequest,
};
use async_trait::async_trait;

/// Hard ceiling on the number of keys a single `List` call may return; the
/// requested maximum is clamped to `[1, LIST_HARD_MAX]` before any scan or
/// fan-out happens.
pub const LIST_HARD_MAX: u32 = 10_000;

/// The index contract: point writes, tombstone deletes, latest-or-exact
/// reads and bounded ordered listings over `(base, key)` records.
///
/// Implemented by the single-node store, by the client talking to a remote
/// store, and by the gateway fanning out to every known store, so the same
/// surface serves all three roles.
#[async_trait]
pub trait IndexStore: Send + Sync {
	/// Writes a live record. A zero version is stamped server side with the
	/// current nanoseconds since epoch.
	async fn put(&self, request: PutRequest) -> Result<PutReply, GkError>;

	/// Writes a deletion marker. A zero version is stamped exactly like
	/// `put`, which makes the marker a record at "now" rather than a marker
	/// over the latest live version.
	async fn delete(&self, request: DeleteRequest) -> Result<DeleteReply, GkError>;

	/// Reads the record at the requested version, or the latest one when the
	/// version is zero.
	async fn get(&self, request: GetRequest) -> Result<GetReply, GkError>;

	/// Lists key fields of records in a base, in encoded byte order, from an
	/// exclusive marker position, bounded by the clamped maximum.
	async fn list(&self, request: ListRequest) -> Result<ListReply, GkError>;
}
