use std::time::{SystemTime, UNIX_EPOCH};

use api::error::GkError;
use api::index::{IndexStore, LIST_HARD_MAX};
use api::keys::BaseKeyVersion;
use api::sanity::validate_index_name;
use api::types::{
	DeleteReply, DeleteRequest, GetReply, GetRequest, ListReply, ListRequest, PutReply, PutRequest,
};
use async_trait::async_trait;
use bytes::Bytes;

/// The single-node index store: versioned records persisted through an
/// [`OrderedEngine`](crate::engine::OrderedEngine), resolved newest first by
/// construction of the key encoding.
pub struct OrderedIndex {
	engine: Box<dyn crate::engine::OrderedEngine>,
}

impl OrderedIndex {
	/// Wraps an engine into an index store.
	pub fn new(engine: impl crate::engine::OrderedEngine + 'static) -> Self {
		Self { engine: Box::new(engine) }
	}
}

fn nanos_now() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0)
}

fn stamp(version: u64) -> u64 {
	if version == 0 {
		nanos_now()
	} else {
		version
	}
}

fn check_names(base: &str, key: &str) -> Result<(), GkError> {
	if !validate_index_name(base) {
		return Err(GkError::InvalidArgument("base must be 1..1024 bytes".to_string()));
	}
	if !validate_index_name(key) {
		return Err(GkError::InvalidArgument("key must be 1..1024 bytes".to_string()));
	}
	Ok(())
}

fn decode_stored(raw: &[u8]) -> Result<BaseKeyVersion, GkError> {
	let text = std::str::from_utf8(raw)
		.map_err(|_| GkError::DataLoss("stored key is not valid UTF-8".to_string()))?;
	BaseKeyVersion::decode(text).map_err(|e| GkError::DataLoss(e.to_string()))
}

#[async_trait]
impl IndexStore for OrderedIndex {
	async fn put(&self, request: PutRequest) -> Result<PutReply, GkError> {
		check_names(&request.base, &request.key)?;
		let record = BaseKeyVersion::new(request.base, request.key, stamp(request.version));
		self.engine.put(record.encode().as_bytes(), &request.value)?;
		Ok(PutReply {})
	}

	async fn delete(&self, request: DeleteRequest) -> Result<DeleteReply, GkError> {
		check_names(&request.base, &request.key)?;
		let mut record = BaseKeyVersion::new(request.base, request.key, stamp(request.version));
		record.active = false;
		self.engine.put(record.encode().as_bytes(), &[])?;
		Ok(DeleteReply {})
	}

	async fn get(&self, request: GetRequest) -> Result<GetReply, GkError> {
		check_names(&request.base, &request.key)?;
		let needle = if request.version == 0 {
			BaseKeyVersion::latest(&request.base, &request.key)
		} else {
			BaseKeyVersion::new(&request.base, &request.key, request.version)
		};

		let mut iter = self.engine.seek(needle.encode().as_bytes())?;
		let (raw_key, value) = match iter.next_entry()? {
			Some(entry) => entry,
			None => return Err(GkError::NotFound(format!("no record after {}", request.key))),
		};

		let got = decode_stored(&raw_key)?;
		if got.base != needle.base || got.key != needle.key {
			return Err(GkError::NotFound(format!("no record for {}", request.key)));
		}
		if !got.active {
			return Err(GkError::Deleted(format!("{} deleted at {}", got.key, got.version)));
		}
		Ok(GetReply { version: got.version, value: Bytes::from(value) })
	}

	async fn list(&self, request: ListRequest) -> Result<ListReply, GkError> {
		if !validate_index_name(&request.base) {
			return Err(GkError::InvalidArgument("base must be 1..1024 bytes".to_string()));
		}
		let max = request.max.clamp(1, LIST_HARD_MAX) as usize;

		let needle = if request.marker.is_empty() {
			format!("{},", request.base)
		} else {
			BaseKeyVersion::new(&request.base, &request.marker, request.marker_version).encode()
		};

		let mut keys = Vec::new();
		let mut iter = self.engine.seek(needle.as_bytes())?;
		while let Some((raw_key, _)) = iter.next_entry()? {
			// The marker position itself is excluded.
			if raw_key.as_slice() <= needle.as_bytes() {
				continue;
			}
			let got = decode_stored(&raw_key)?;
			if got.base != request.base {
				break;
			}
			keys.push(got.key);
			if keys.len() >= max {
				break;
			}
		}
		Ok(ListReply { keys })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::memory_engine::MemoryEngine;
	use api::types::{GetRequest, PutRequest};

	#[tokio::test]
	async fn zero_versions_are_stamped_with_the_clock() {
		let index = OrderedIndex::new(MemoryEngine::new());
		let before = nanos_now();
		index
			.put(PutRequest {
				base: "b".to_string(),
				key: "k".to_string(),
				version: 0,
				value: Bytes::from("v"),
			})
			.await
			.unwrap();
		let after = nanos_now();

		let reply = index
			.get(GetRequest { base: "b".to_string(), key: "k".to_string(), version: 0 })
			.await
			.unwrap();
		assert!(reply.version >= before && reply.version <= after);
	}

	#[tokio::test]
	async fn get_does_not_cross_into_the_next_base() {
		let index = OrderedIndex::new(MemoryEngine::new());
		index
			.put(PutRequest {
				base: "bb".to_string(),
				key: "k".to_string(),
				version: 7,
				value: Bytes::from("v"),
			})
			.await
			.unwrap();

		// Same key under another base must stay invisible.
		let result = index
			.get(GetRequest { base: "ba".to_string(), key: "k".to_string(), version: 0 })
			.await;
		assert!(matches!(result, Err(GkError::NotFound(_))));
	}

	#[tokio::test]
	async fn malformed_stored_keys_surface_data_loss() {
		let engine = MemoryEngine::new();
		use crate::engine::OrderedEngine as _;
		engine.put(b"b,k,nothex", b"v").unwrap();

		let index = OrderedIndex::new(engine);
		let result = index
			.get(GetRequest { base: "b".to_string(), key: "k".to_string(), version: 0 })
			.await;
		assert!(matches!(result, Err(GkError::DataLoss(_))));
	}
}
