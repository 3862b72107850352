use std::sync::Arc;

use api::error::GkError;
use api::index::{IndexStore, LIST_HARD_MAX};
use api::types::{
	DeleteReply, DeleteRequest, GetReply, GetRequest, ListReply, ListRequest, PutReply, PutRequest,
};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::conn_map::ConnMap;
use crate::fanout::{fan_out, merge_sorted};

/// The stateless core of the index gateway: every call fans out to the
/// snapshot of live store channels and reconciles the replies.
///
/// Writes need no quorum, one acknowledgement suffices. Reads merge what the
/// reached replicas hold: last-writer-wins by version for `get`, a k-way
/// merge for `list`. Consistency across replicas is eventual.
pub struct IndexGateway {
	conns: Arc<ConnMap>,
}

impl IndexGateway {
	/// Builds the gateway over its connection map.
	pub fn new(conns: Arc<ConnMap>) -> Self {
		Self { conns }
	}

	fn no_backend() -> GkError {
		GkError::Unavailable("No backend replied".to_string())
	}
}

#[async_trait]
impl IndexStore for IndexGateway {
	async fn put(&self, request: PutRequest) -> Result<PutReply, GkError> {
		let targets = self.conns.snapshot().await;
		let replies = fan_out(targets, move |_addr, store| {
			let request = request.clone();
			async move { store.put(request).await }
		})
		.await;

		let mut acknowledged = false;
		for (addr, result) in &replies {
			match result {
				Ok(_) => {
					info!(addr = %addr, "put acknowledged");
					acknowledged = true;
				},
				Err(e) => warn!(addr = %addr, error = %e, "put failed"),
			}
		}
		if acknowledged {
			Ok(PutReply {})
		} else {
			Err(Self::no_backend())
		}
	}

	async fn delete(&self, request: DeleteRequest) -> Result<DeleteReply, GkError> {
		let targets = self.conns.snapshot().await;
		let replies = fan_out(targets, move |_addr, store| {
			let request = request.clone();
			async move { store.delete(request).await }
		})
		.await;

		let mut acknowledged = false;
		for (addr, result) in &replies {
			match result {
				Ok(_) => {
					info!(addr = %addr, "delete acknowledged");
					acknowledged = true;
				},
				Err(e) => warn!(addr = %addr, error = %e, "delete failed"),
			}
		}
		if acknowledged {
			Ok(DeleteReply {})
		} else {
			Err(Self::no_backend())
		}
	}

	async fn get(&self, request: GetRequest) -> Result<GetReply, GkError> {
		let targets = self.conns.snapshot().await;
		let replies = fan_out(targets, move |_addr, store| {
			let request = request.clone();
			async move { store.get(request).await }
		})
		.await;

		// Keep the newest version any reached replica holds.
		let mut newest: Option<GetReply> = None;
		for (addr, result) in replies {
			match result {
				Ok(reply) => {
					if newest.as_ref().map(|best| reply.version > best.version).unwrap_or(true) {
						newest = Some(reply);
					}
				},
				Err(e) => warn!(addr = %addr, error = %e, "get failed"),
			}
		}
		newest.ok_or_else(Self::no_backend)
	}

	async fn list(&self, request: ListRequest) -> Result<ListReply, GkError> {
		let mut request = request;
		// Clamped before the fan-out; every store sees the same bound.
		request.max = request.max.clamp(1, LIST_HARD_MAX);
		let max = request.max as usize;

		let targets = self.conns.snapshot().await;
		let replies = fan_out(targets, move |_addr, store| {
			let request = request.clone();
			async move { store.list(request).await }
		})
		.await;

		let mut slices = Vec::new();
		for (addr, result) in replies {
			match result {
				Ok(reply) => slices.push(reply.keys),
				Err(e) => warn!(addr = %addr, error = %e, "list failed"),
			}
		}
		if slices.is_empty() {
			return Err(Self::no_backend());
		}
		Ok(ListReply { keys: merge_sorted(slices, max) })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bytes::Bytes;
	use impls::memory_engine::MemoryEngine;
	use impls::ordered_index::OrderedIndex;

	async fn gateway_over(stores: &[Arc<dyn IndexStore>]) -> IndexGateway {
		let conns = Arc::new(ConnMap::new());
		for (i, store) in stores.iter().enumerate() {
			conns.insert_live(&format!("127.0.0.1:{}", 7000 + i), Arc::clone(store)).await;
		}
		IndexGateway::new(conns)
	}

	fn store() -> Arc<dyn IndexStore> {
		Arc::new(OrderedIndex::new(MemoryEngine::new()))
	}

	fn put(base: &str, key: &str, version: u64, value: &str) -> PutRequest {
		PutRequest {
			base: base.to_string(),
			key: key.to_string(),
			version,
			value: Bytes::from(value.to_string()),
		}
	}

	fn get(base: &str, key: &str) -> GetRequest {
		GetRequest { base: base.to_string(), key: key.to_string(), version: 0 }
	}

	fn list(base: &str, max: u32) -> ListRequest {
		ListRequest { base: base.to_string(), marker: String::new(), marker_version: 0, max }
	}

	#[tokio::test]
	async fn get_reconciles_the_newer_replica() {
		let s1 = store();
		let s2 = store();
		// The replicas diverged: only s2 saw the newer write.
		s1.put(put("B", "k", 5, "old")).await.unwrap();
		s2.put(put("B", "k", 9, "new")).await.unwrap();

		let gateway = gateway_over(&[s1, s2]).await;
		let reply = gateway.get(get("B", "k")).await.unwrap();
		assert_eq!((reply.version, reply.value.as_ref()), (9, b"new".as_slice()));
	}

	#[tokio::test]
	async fn list_merges_dedupes_and_bounds() {
		let s1 = store();
		let s2 = store();
		for key in ["a", "c", "e"] {
			s1.put(put("B", key, 1, "v")).await.unwrap();
		}
		for key in ["a", "b", "c", "d"] {
			s2.put(put("B", key, 1, "v")).await.unwrap();
		}

		let gateway = gateway_over(&[s1, s2]).await;
		let reply = gateway.list(list("B", 6)).await.unwrap();
		assert_eq!(reply.keys, vec!["a", "b", "c", "d", "e"]);

		let reply = gateway.list(list("B", 2)).await.unwrap();
		assert_eq!(reply.keys, vec!["a", "b"]);
	}

	#[tokio::test]
	async fn writes_reach_every_replica() {
		let s1 = store();
		let s2 = store();
		let gateway = gateway_over(&[Arc::clone(&s1), Arc::clone(&s2)]).await;

		gateway.put(put("B", "k", 3, "v")).await.unwrap();
		for replica in [s1, s2] {
			assert_eq!(replica.get(get("B", "k")).await.unwrap().version, 3);
		}
	}

	#[tokio::test]
	async fn an_empty_map_means_no_backend_replied() {
		let gateway = gateway_over(&[]).await;
		assert!(matches!(gateway.get(get("B", "k")).await, Err(GkError::Unavailable(_))));
		assert!(matches!(
			gateway.put(put("B", "k", 1, "v")).await,
			Err(GkError::Unavailable(_))
		));
		assert!(matches!(gateway.list(list("B", 5)).await, Err(GkError::Unavailable(_))));
	}

	#[tokio::test]
	async fn one_acknowledgement_is_enough() {
		// A replica that fails every call.
		struct Broken;
		#[async_trait]
		impl IndexStore for Broken {
			async fn put(&self, _: PutRequest) -> Result<PutReply, GkError> {
				Err(GkError::Internal("boom".to_string()))
			}
			async fn delete(&self, _: DeleteRequest) -> Result<DeleteReply, GkError> {
				Err(GkError::Internal("boom".to_string()))
			}
			async fn get(&self, _: GetRequest) -> Result<GetReply, GkError> {
				Err(GkError::Internal("boom".to_string()))
			}
			async fn list(&self, _: ListRequest) -> Result<ListReply, GkError> {
				Err(GkError::Internal("boom".to_string()))
			}
		}

		let healthy = store();
		let gateway = gateway_over(&[Arc::clone(&healthy), Arc::new(Broken)]).await;

		gateway.put(put("B", "k", 2, "v")).await.unwrap();
		let reply = gateway.get(get("B", "k")).await.unwrap();
		assert_eq!(reply.version, 2);

		gateway.delete(DeleteRequest { base: "B".into(), key: "k".into(), version: 3 }).await.unwrap();
		assert!(matches!(healthy.get(get("B", "k")).await, Err(GkError::Deleted(_))));

		// Once every replica errors, the aggregate is Unavailable.
		assert!(matches!(gateway.get(get("B", "k")).await, Err(GkError::Unavailable(_))));
	}
}
