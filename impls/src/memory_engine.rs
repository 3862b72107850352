use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use api::error::GkError;

use crate::engine::{EngineIter, OrderedEngine};

/// In-memory engine over a `BTreeMap`, for tests and ephemeral stores.
#[derive(Default)]
pub struct MemoryEngine {
	map: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryEngine {
	/// Creates an empty engine.
	pub fn new() -> Self {
		Self::default()
	}
}

impl OrderedEngine for MemoryEngine {
	fn put(&self, key: &[u8], value: &[u8]) -> Result<(), GkError> {
		let mut guard =
			self.map.lock().map_err(|_| GkError::Internal("engine lock poisoned".to_string()))?;
		guard.insert(key.to_vec(), value.to_vec());
		Ok(())
	}

	fn remove(&self, key: &[u8]) -> Result<(), GkError> {
		let mut guard =
			self.map.lock().map_err(|_| GkError::Internal("engine lock poisoned".to_string()))?;
		guard.remove(key);
		Ok(())
	}

	fn seek(&self, needle: &[u8]) -> Result<Box<dyn EngineIter + '_>, GkError> {
		let guard =
			self.map.lock().map_err(|_| GkError::Internal("engine lock poisoned".to_string()))?;
		// The cursor walks a snapshot of the tail.
		let entries = guard
			.range(needle.to_vec()..)
			.map(|(k, v)| (k.clone(), v.clone()))
			.collect::<VecDeque<_>>();
		Ok(Box::new(MemoryIter { entries }))
	}
}

struct MemoryIter {
	entries: VecDeque<(Vec<u8>, Vec<u8>)>,
}

impl EngineIter for MemoryIter {
	fn next_entry(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>, GkError> {
		Ok(self.entries.pop_front())
	}
}

#[cfg(test)]
mod tests {
	use crate::memory_engine::MemoryEngine;
	use crate::ordered_index::OrderedIndex;

	api::define_index_store_tests!(
		MemoryIndexStoreTest,
		OrderedIndex,
		OrderedIndex::new(MemoryEngine::new())
	);
}
