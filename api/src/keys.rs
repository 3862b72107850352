use std::fmt::Write as _;

use crate::error::GkError;

/// A logical index entry name: a namespace (`base`) plus a caller chosen
/// `key` inside it.
///
/// The wire form is `base "," key`. A key may itself contain commas,
/// everything after the first comma belongs to the key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BaseKey {
	/// Namespace grouping related keys, listable as a unit.
	pub base: String,
	/// Caller chosen identifier inside the base.
	pub key: String,
}

impl BaseKey {
	/// Builds a `BaseKey` from its two components.
	pub fn new(base: impl Into<String>, key: impl Into<String>) -> Self {
		Self { base: base.into(), key: key.into() }
	}

	/// Emits the wire form `base "," key`.
	pub fn encode(&self) -> String {
		format!("{},{}", self.base, self.key)
	}

	/// Parses the wire form. The base must be non-empty and is everything up
	/// to the first comma.
	pub fn decode(packed: &str) -> Result<Self, GkError> {
		let (base, key) = packed
			.split_once(',')
			.ok_or_else(|| GkError::Malformed("base/key separator missing".to_string()))?;
		if base.is_empty() {
			return Err(GkError::Malformed("empty base".to_string()));
		}
		Ok(Self { base: base.to_string(), key: key.to_string() })
	}
}

/// A versioned index entry name, the ordering-critical form persisted in the
/// ordered key/value engine.
///
/// The version is stored inverted (`MAX_U64 - version`, uppercase hex) so
/// that a forward byte-wise scan from any `(base, key)` meets the newest
/// version first. A deletion marker carries a trailing `#`, which sorts it
/// right after the live record of the same version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseKeyVersion {
	/// Namespace grouping related keys.
	pub base: String,
	/// Caller chosen identifier inside the base.
	pub key: String,
	/// Monotonic 64-bit version, nanoseconds since epoch under the default
	/// stamping.
	pub version: u64,
	/// `false` marks a deletion record.
	pub active: bool,
}

impl BaseKeyVersion {
	/// Builds a live record name at an explicit version.
	pub fn new(base: impl Into<String>, key: impl Into<String>, version: u64) -> Self {
		Self { base: base.into(), key: key.into(), version, active: true }
	}

	/// Builds the synthetic name that sorts before every real record of
	/// `(base, key)`: the effective version is `MAX_U64`, so the encoded
	/// version field is `0`.
	pub fn latest(base: impl Into<String>, key: impl Into<String>) -> Self {
		Self::new(base, key, u64::MAX)
	}

	/// Emits `base "," key "," HEX(MAX_U64 - version)`, with a trailing `#`
	/// for deletion markers.
	pub fn encode(&self) -> String {
		let inverted = u64::MAX - self.version;
		let mut out = String::with_capacity(self.base.len() + self.key.len() + 20);
		out.push_str(&self.base);
		out.push(',');
		out.push_str(&self.key);
		out.push(',');
		// write! on a String cannot fail.
		let _ = write!(out, "{:X}", inverted);
		if !self.active {
			out.push('#');
		}
		out
	}

	/// Parses the persisted form back into its components.
	pub fn decode(packed: &str) -> Result<Self, GkError> {
		let (base, rest) = packed
			.split_once(',')
			.ok_or_else(|| GkError::Malformed("base separator missing".to_string()))?;
		if base.is_empty() {
			return Err(GkError::Malformed("empty base".to_string()));
		}
		let (key, version_field) = rest
			.split_once(',')
			.ok_or_else(|| GkError::Malformed("version separator missing".to_string()))?;
		let (hex, active) = match version_field.split_once('#') {
			Some((hex, "")) => (hex, false),
			Some((_, _)) => {
				return Err(GkError::Malformed("content after deletion marker".to_string()))
			},
			None => (version_field, true),
		};
		let inverted = u64::from_str_radix(hex, 16)
			.map_err(|_| GkError::Malformed(format!("bad version field {:?}", hex)))?;
		Ok(Self {
			base: base.to_string(),
			key: key.to_string(),
			version: u64::MAX - inverted,
			active,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn bkv(base: &str, key: &str, version: u64, active: bool) -> BaseKeyVersion {
		BaseKeyVersion { base: base.to_string(), key: key.to_string(), version, active }
	}

	#[test]
	fn encoded_forms_keep_their_order() {
		// Newest versions first, live before deleted, then the next key.
		let sorted = vec![
			bkv("A", "plap", 4, true),
			bkv("A", "plap", 3, true),
			bkv("A", "plip", 3, true),
			bkv("A", "plip", 2, false),
			bkv("A", "plip", 1, true),
			bkv("A", "plip", 0, true),
			bkv("A", "plipA", 1, true),
		];
		let encoded: Vec<String> = sorted.iter().map(|k| k.encode()).collect();
		let mut resorted = encoded.clone();
		resorted.sort();
		assert_eq!(encoded, resorted);
	}

	#[test]
	fn newer_versions_sort_first() {
		let newer = bkv("b", "k", 1_600_000_000_000_000_001, true).encode();
		let older = bkv("b", "k", 1_600_000_000_000_000_000, true).encode();
		assert!(newer < older);
	}

	#[test]
	fn live_record_sorts_before_its_deletion_marker() {
		let live = bkv("b", "k", 77, true).encode();
		let dead = bkv("b", "k", 77, false).encode();
		assert!(live < dead);
	}

	#[test]
	fn latest_sorts_before_every_real_version() {
		let needle = BaseKeyVersion::latest("b", "k").encode();
		assert!(needle.ends_with(",0"));
		for version in [1u64, 42, 1_600_000_000_000_000_000, u64::MAX - 1] {
			assert!(needle < bkv("b", "k", version, true).encode());
			assert!(needle < bkv("b", "k", version, false).encode());
		}
	}

	#[test]
	fn round_trip() {
		for case in [
			bkv("bucket", "object", 1_600_000_000_000_000_000, true),
			bkv("bucket", "object", 3, false),
			bkv("b", "k", u64::MAX, true),
		] {
			assert_eq!(BaseKeyVersion::decode(&case.encode()).unwrap(), case);
		}
	}

	#[test]
	fn malformed_forms_are_rejected() {
		for packed in [
			"",
			"noseparator",
			"base-only,",
			",key,0",
			"b,k,nothex",
			"b,k,0#trailing",
			"b,k,0##",
			"b,k,",
		] {
			assert!(
				matches!(BaseKeyVersion::decode(packed), Err(GkError::Malformed(_))),
				"accepted {:?}",
				packed
			);
		}
	}

	#[test]
	fn base_key_round_trip() {
		let bk = BaseKey::new("bucket", "object,with,commas");
		assert_eq!(bk.encode(), "bucket,object,with,commas");
		assert_eq!(BaseKey::decode(&bk.encode()).unwrap(), bk);
		assert!(matches!(BaseKey::decode("nobase"), Err(GkError::Malformed(_))));
		assert!(matches!(BaseKey::decode(",key"), Err(GkError::Malformed(_))));
	}
}
