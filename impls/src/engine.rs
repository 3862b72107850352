use std::str::FromStr;

use api::error::GkError;

/// Durability requested from the engine after each write.
///
/// The default is asynchronous: the engine persists on its own schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncPolicy {
	/// Let the engine flush on its own schedule.
	#[default]
	None,
	/// Flush file data after every write.
	Data,
	/// Flush file data and metadata after every write.
	Full,
}

impl FromStr for SyncPolicy {
	type Err = GkError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"none" => Ok(SyncPolicy::None),
			"datasync" => Ok(SyncPolicy::Data),
			"fsync" => Ok(SyncPolicy::Full),
			other => Err(GkError::InvalidArgument(format!("unknown sync policy {:?}", other))),
		}
	}
}

/// A forward cursor over the ordered byte keys of an engine.
pub trait EngineIter: Send {
	/// Returns the next `(key, value)` pair in ascending byte order, or
	/// `None` once the keyspace is exhausted.
	fn next_entry(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>, GkError>;
}

/// The narrow contract the index plane requires from an ordered byte-key
/// store: point writes, point deletes, and a seekable forward iterator.
pub trait OrderedEngine: Send + Sync {
	/// Writes one `key -> value` pair, honouring the configured
	/// [`SyncPolicy`].
	fn put(&self, key: &[u8], value: &[u8]) -> Result<(), GkError>;

	/// Physically removes one key. The index plane never calls this on the
	/// request path (deletions are tombstone writes); it exists for
	/// maintenance.
	fn remove(&self, key: &[u8]) -> Result<(), GkError>;

	/// Positions a cursor at the first key greater than or equal to
	/// `needle`.
	fn seek(&self, needle: &[u8]) -> Result<Box<dyn EngineIter + '_>, GkError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sync_policy_parsing() {
		assert_eq!("none".parse::<SyncPolicy>().unwrap(), SyncPolicy::None);
		assert_eq!("datasync".parse::<SyncPolicy>().unwrap(), SyncPolicy::Data);
		assert_eq!("fsync".parse::<SyncPolicy>().unwrap(), SyncPolicy::Full);
		assert!("everything".parse::<SyncPolicy>().is_err());
	}
}
