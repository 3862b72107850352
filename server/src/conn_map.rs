use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use api::discovery::Catalog;
use api::error::GkError;
use api::index::IndexStore;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::index_client::HttpIndexClient;

/// How often the map is reconciled against the catalog.
const RELOAD_PERIOD: Duration = Duration::from_secs(1);

/// One persistent channel per known index store.
///
/// An address maps to a live client or to a tombstone meaning "known but
/// currently unreachable". Addresses are never dropped on transient failure,
/// only their channel value changes; a stable channel is never re-dialed.
#[derive(Default)]
pub struct ConnMap {
	inner: RwLock<HashMap<String, Option<Arc<dyn IndexStore>>>>,
}

impl ConnMap {
	/// Creates an empty map; [`reload`](Self::reload) fills it.
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshots the live `(address, channel)` pairs for one fan-out. The
	/// read lock is held only while copying the reference-counted handles.
	pub async fn snapshot(&self) -> Vec<(String, Arc<dyn IndexStore>)> {
		let guard = self.inner.read().await;
		guard
			.iter()
			.filter_map(|(addr, slot)| {
				slot.as_ref().map(|client| (addr.clone(), Arc::clone(client)))
			})
			.collect()
	}

	/// One reconciliation tick: fetch the index store addresses, keep the
	/// live channels, dial everything else. A failed dial leaves a tombstone
	/// under the address.
	pub async fn reload(&self, catalog: &dyn Catalog) -> Result<(), GkError> {
		let addrs = catalog.list_index_store().await?;
		let mut guard = self.inner.write().await;
		for addr in addrs {
			if matches!(guard.get(&addr), Some(Some(_))) {
				continue;
			}
			match HttpIndexClient::dial(&addr).await {
				Ok(client) => {
					info!(addr = %addr, "index store connected");
					guard.insert(addr, Some(Arc::new(client)));
				},
				Err(e) => {
					warn!(addr = %addr, error = %e, "index store unreachable");
					guard.insert(addr, None);
				},
			}
		}
		Ok(())
	}

	/// Spawns the background task reconciling the map on a 1-second tick
	/// for the lifetime of the service.
	pub fn spawn_reloader(self: Arc<Self>, catalog: Arc<dyn Catalog>) -> tokio::task::JoinHandle<()> {
		let map = self;
		tokio::spawn(async move {
			let mut tick = tokio::time::interval(RELOAD_PERIOD);
			tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
			loop {
				tick.tick().await;
				if let Err(e) = map.reload(catalog.as_ref()).await {
					warn!(error = %e, "catalog refresh failed");
				}
			}
		})
	}

	/// Registers a live channel directly, bypassing the dial step.
	#[cfg(test)]
	pub(crate) async fn insert_live(&self, addr: &str, store: Arc<dyn IndexStore>) {
		let mut guard = self.inner.write().await;
		guard.insert(addr.to_string(), Some(store));
	}

	#[cfg(test)]
	pub(crate) async fn len(&self) -> usize {
		self.inner.read().await.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::discovery::StaticCatalog;

	async fn listening_addr() -> (tokio::net::TcpListener, String) {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap().to_string();
		(listener, addr)
	}

	fn catalog_of(stores: Vec<String>) -> StaticCatalog {
		StaticCatalog { index_stores: stores, ..StaticCatalog::default() }
	}

	#[tokio::test]
	async fn reload_keeps_stable_channels_and_tombstones_failures() {
		let (_listener, live_addr) = listening_addr().await;
		// Port 1 refuses connections immediately.
		let catalog = catalog_of(vec![live_addr.clone(), "127.0.0.1:1".to_string()]);

		let map = ConnMap::new();
		map.reload(&catalog).await.unwrap();

		assert_eq!(map.len().await, 2, "tombstones count as known addresses");
		let snapshot = map.snapshot().await;
		assert_eq!(snapshot.len(), 1);
		assert_eq!(snapshot[0].0, live_addr);

		// A second tick must not replace the live channel.
		let before = Arc::as_ptr(&snapshot[0].1);
		map.reload(&catalog).await.unwrap();
		let snapshot = map.snapshot().await;
		assert_eq!(Arc::as_ptr(&snapshot[0].1), before);
	}

	#[tokio::test]
	async fn addresses_survive_their_removal_from_the_catalog() {
		let (_listener, live_addr) = listening_addr().await;
		let map = ConnMap::new();

		map.reload(&catalog_of(vec![live_addr.clone()])).await.unwrap();
		assert_eq!(map.snapshot().await.len(), 1);

		// The catalog forgets the address; the channel stays usable until
		// its next failure.
		map.reload(&catalog_of(Vec::new())).await.unwrap();
		assert_eq!(map.snapshot().await.len(), 1);
	}

	#[tokio::test]
	async fn a_tombstone_heals_once_the_peer_listens() {
		let map = ConnMap::new();
		map.reload(&catalog_of(vec!["127.0.0.1:1".to_string()])).await.unwrap();
		assert_eq!(map.snapshot().await.len(), 0);

		let (_listener, live_addr) = listening_addr().await;
		map.reload(&catalog_of(vec![live_addr])).await.unwrap();
		assert_eq!(map.snapshot().await.len(), 1);
		assert_eq!(map.len().await, 2);
	}
}
