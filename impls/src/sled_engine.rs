use std::path::Path;

use api::error::GkError;

use crate::engine::{EngineIter, OrderedEngine, SyncPolicy};

/// [`sled`] backed engine, the persistent backend of the index store.
///
/// The tree is opened in create-if-missing mode under the configured base
/// directory. `sled` offers a single flush primitive, so both synchronous
/// policies translate to a flush after every write.
pub struct SledEngine {
	db: sled::Db,
	sync: SyncPolicy,
}

impl SledEngine {
	/// Opens (or creates) the tree under `base_dir`.
	pub fn open(base_dir: impl AsRef<Path>, sync: SyncPolicy) -> Result<Self, GkError> {
		let base_dir = base_dir.as_ref();
		let db = sled::open(base_dir).map_err(|e| GkError::Internal(e.to_string()))?;
		tracing::info!(path = %base_dir.display(), ?sync, "index engine opened");
		Ok(Self { db, sync })
	}

	/// Opens a throwaway tree removed when the engine is dropped.
	#[cfg(test)]
	pub(crate) fn temporary() -> Self {
		let db = sled::Config::new().temporary(true).open().unwrap();
		Self { db, sync: SyncPolicy::None }
	}

	fn flush_if_needed(&self) -> Result<(), GkError> {
		match self.sync {
			SyncPolicy::None => Ok(()),
			SyncPolicy::Data | SyncPolicy::Full => {
				self.db.flush().map(|_| ()).map_err(|e| GkError::Internal(e.to_string()))
			},
		}
	}
}

impl OrderedEngine for SledEngine {
	fn put(&self, key: &[u8], value: &[u8]) -> Result<(), GkError> {
		self.db.insert(key, value).map_err(|e| GkError::Internal(e.to_string()))?;
		self.flush_if_needed()
	}

	fn remove(&self, key: &[u8]) -> Result<(), GkError> {
		self.db.remove(key).map_err(|e| GkError::Internal(e.to_string()))?;
		self.flush_if_needed()
	}

	fn seek(&self, needle: &[u8]) -> Result<Box<dyn EngineIter + '_>, GkError> {
		Ok(Box::new(SledIter { inner: self.db.range(needle.to_vec()..) }))
	}
}

struct SledIter {
	inner: sled::Iter,
}

impl EngineIter for SledIter {
	fn next_entry(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>, GkError> {
		match self.inner.next() {
			None => Ok(None),
			Some(Ok((key, value))) => Ok(Some((key.to_vec(), value.to_vec()))),
			Some(Err(e)) => Err(GkError::Internal(e.to_string())),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ordered_index::OrderedIndex;

	api::define_index_store_tests!(
		SledIndexStoreTest,
		OrderedIndex,
		OrderedIndex::new(SledEngine::temporary())
	);

	#[test]
	fn seek_lands_on_the_first_key_at_or_after_the_needle() {
		let engine = SledEngine::temporary();
		engine.put(b"a", b"1").unwrap();
		engine.put(b"c", b"2").unwrap();
		engine.put(b"e", b"3").unwrap();

		let mut iter = engine.seek(b"b").unwrap();
		assert_eq!(iter.next_entry().unwrap(), Some((b"c".to_vec(), b"2".to_vec())));
		assert_eq!(iter.next_entry().unwrap(), Some((b"e".to_vec(), b"3".to_vec())));
		assert_eq!(iter.next_entry().unwrap(), None);
	}

	#[test]
	fn remove_is_a_physical_delete() {
		let engine = SledEngine::temporary();
		engine.put(b"a", b"1").unwrap();
		engine.remove(b"a").unwrap();
		let mut iter = engine.seek(b"").unwrap();
		assert_eq!(iter.next_entry().unwrap(), None);
	}
}
