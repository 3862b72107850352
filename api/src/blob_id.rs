use crate::error::GkError;

/// Positions are bounded to 31 bits on the wire.
pub const POSITION_MAX: u32 = (1 << 31) - 1;

/// Identifies one part of a multipart object.
///
/// The wire form is `bucket "," content "," partId "," decimal(position)`;
/// a fifth field is rejected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlobId {
	/// Bucket holding the object.
	pub bucket: String,
	/// Object name inside the bucket.
	pub content: String,
	/// Part identifier inside the object.
	pub part_id: String,
	/// Rank of this part, bounded to 31 bits.
	pub position: u32,
}

impl BlobId {
	/// Emits the four-field wire form.
	pub fn encode(&self) -> String {
		format!("{},{},{},{}", self.bucket, self.content, self.part_id, self.position)
	}

	/// Emits the prefix form used as a listing marker:
	/// `bucket[,content[,partId]]`, dropping empty tails.
	pub fn encode_marker(&self) -> String {
		let mut out = String::with_capacity(64);
		out.push_str(&self.bucket);
		if !self.content.is_empty() {
			out.push(',');
			out.push_str(&self.content);
			if !self.part_id.is_empty() {
				out.push(',');
				out.push_str(&self.part_id);
			}
		}
		out
	}

	/// Parses the wire form, rejecting anything but exactly four fields and
	/// a decimal position that fits 31 bits.
	pub fn decode(packed: &str) -> Result<Self, GkError> {
		let mut fields = packed.split(',');
		let (bucket, content, part_id, position) =
			match (fields.next(), fields.next(), fields.next(), fields.next(), fields.next()) {
				(Some(b), Some(c), Some(p), Some(pos), None) => (b, c, p, pos),
				_ => return Err(GkError::Malformed("invalid blob id".to_string())),
			};
		let position: u32 = position
			.parse()
			.map_err(|_| GkError::Malformed(format!("bad blob position {:?}", position)))?;
		if position > POSITION_MAX {
			return Err(GkError::Malformed("blob position beyond 31 bits".to_string()));
		}
		Ok(Self {
			bucket: bucket.to_string(),
			content: content.to_string(),
			part_id: part_id.to_string(),
			position,
		})
	}
}

/// A `BlobId` without its position, used as a listing marker prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartId {
	/// Bucket holding the object.
	pub bucket: String,
	/// Object name inside the bucket.
	pub content: String,
	/// Part identifier inside the object.
	pub part_id: String,
}

impl PartId {
	/// Emits the three-field wire form.
	pub fn encode(&self) -> String {
		format!("{},{},{}", self.bucket, self.content, self.part_id)
	}

	/// Emits the prefix form `bucket[,content[,partId]]`.
	pub fn encode_marker(&self) -> String {
		let mut out = String::with_capacity(64);
		out.push_str(&self.bucket);
		if !self.content.is_empty() {
			out.push(',');
			out.push_str(&self.content);
			if !self.part_id.is_empty() {
				out.push(',');
				out.push_str(&self.part_id);
			}
		}
		out
	}

	/// Parses the wire form, rejecting anything but exactly three fields.
	pub fn decode(packed: &str) -> Result<Self, GkError> {
		let mut fields = packed.split(',');
		match (fields.next(), fields.next(), fields.next(), fields.next()) {
			(Some(b), Some(c), Some(p), None) => Ok(Self {
				bucket: b.to_string(),
				content: c.to_string(),
				part_id: p.to_string(),
			}),
			_ => Err(GkError::Malformed("invalid part id".to_string())),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn blob_id_round_trip() {
		let id = BlobId {
			bucket: "bkt".to_string(),
			content: "obj".to_string(),
			part_id: "p0".to_string(),
			position: 7,
		};
		assert_eq!(id.encode(), "bkt,obj,p0,7");
		assert_eq!(BlobId::decode("bkt,obj,p0,7").unwrap(), id);
	}

	#[test]
	fn blob_id_rejects_a_fifth_field() {
		assert!(matches!(BlobId::decode("a,b,c,d,e"), Err(GkError::Malformed(_))));
	}

	#[test]
	fn blob_id_position_bounds() {
		assert_eq!(BlobId::decode("b,c,p,2147483647").unwrap().position, POSITION_MAX);
		assert!(matches!(BlobId::decode("b,c,p,2147483648"), Err(GkError::Malformed(_))));
		assert!(matches!(BlobId::decode("b,c,p,-1"), Err(GkError::Malformed(_))));
		assert!(matches!(BlobId::decode("b,c,p,x"), Err(GkError::Malformed(_))));
		assert!(matches!(BlobId::decode("b,c,p,"), Err(GkError::Malformed(_))));
	}

	#[test]
	fn marker_form_drops_empty_tails() {
		let mut id = BlobId {
			bucket: "bkt".to_string(),
			content: "obj".to_string(),
			part_id: String::new(),
			position: 0,
		};
		assert_eq!(id.encode_marker(), "bkt,obj");
		id.content.clear();
		assert_eq!(id.encode_marker(), "bkt");
	}

	#[test]
	fn part_id_round_trip() {
		let id = PartId {
			bucket: "bkt".to_string(),
			content: "obj".to_string(),
			part_id: "p1".to_string(),
		};
		assert_eq!(id.encode(), "bkt,obj,p1");
		assert_eq!(PartId::decode("bkt,obj,p1").unwrap(), id);
		assert!(matches!(PartId::decode("a,b,c,d"), Err(GkError::Malformed(_))));
	}
}
