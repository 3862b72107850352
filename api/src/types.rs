/// Request payload for the index `Put` call.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutRequest {
	/// Namespace the record belongs to. Required, `0 < len < 1024`.
	#[prost(string, tag = "1")]
	pub base: ::prost::alloc::string::String,
	/// Caller chosen identifier inside the base. Required, `0 < len < 1024`.
	#[prost(string, tag = "2")]
	pub key: ::prost::alloc::string::String,
	/// Record version. `0` asks the store to stamp the current nanoseconds
	/// since epoch; any other value is written verbatim.
	#[prost(uint64, tag = "3")]
	pub version: u64,
	/// Value bytes stored against the versioned key. For the object planes
	/// this is the blob locator returned by a blob-store commit.
	#[prost(bytes = "bytes", tag = "4")]
	pub value: ::prost::bytes::Bytes,
}
/// Empty reply for a successful index `Put`.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutReply {}
/// Request payload for the index `Delete` call.
///
/// A delete is a tombstone write: the record body is never removed, a
/// deletion marker is written at the requested (or stamped) version.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteRequest {
	/// Namespace the record belongs to.
	#[prost(string, tag = "1")]
	pub base: ::prost::alloc::string::String,
	/// Caller chosen identifier inside the base.
	#[prost(string, tag = "2")]
	pub key: ::prost::alloc::string::String,
	/// Version of the deletion marker. `0` stamps the current nanoseconds,
	/// which creates a marker at "now" rather than over the latest live
	/// record; callers wanting the latter must pass the version they mean.
	#[prost(uint64, tag = "3")]
	pub version: u64,
}
/// Empty reply for a successful index `Delete`.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteReply {}
/// Request payload for the index `Get` call.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetRequest {
	/// Namespace the record belongs to.
	#[prost(string, tag = "1")]
	pub base: ::prost::alloc::string::String,
	/// Caller chosen identifier inside the base.
	#[prost(string, tag = "2")]
	pub key: ::prost::alloc::string::String,
	/// Exact version wanted, or `0` for the latest record.
	#[prost(uint64, tag = "3")]
	pub version: u64,
}
/// Reply for a successful index `Get`.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetReply {
	/// Version of the record found.
	#[prost(uint64, tag = "1")]
	pub version: u64,
	/// Value bytes stored against the record.
	#[prost(bytes = "bytes", tag = "2")]
	pub value: ::prost::bytes::Bytes,
}
/// Request payload for the index `List` call.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListRequest {
	/// Namespace to scan. Required.
	#[prost(string, tag = "1")]
	pub base: ::prost::alloc::string::String,
	/// Resume the scan after this key. Empty starts at the beginning of the
	/// base. The marker position itself is excluded from the results.
	#[prost(string, tag = "2")]
	pub marker: ::prost::alloc::string::String,
	/// Version component of the marker position.
	#[prost(uint64, tag = "3")]
	pub marker_version: u64,
	/// Maximum number of keys returned; clamped server side to
	/// `[1, LIST_HARD_MAX]`.
	#[prost(uint32, tag = "4")]
	pub max: u32,
}
/// Reply for a successful index `List`: the decoded key fields in encoded
/// byte order. Versions are not returned in the bulk listing.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListReply {
	/// Decoded key fields, one per matching record.
	#[prost(string, repeated, tag = "1")]
	pub keys: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}
/// When the HTTP status of an index call is not 2xx, the response body
/// contains a serialized `ErrorResponse` with the relevant `ErrorCode` and
/// a human readable message.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorResponse {
	/// The error code uniquely identifying an error condition, meant to be
	/// read programmatically.
	#[prost(enumeration = "ErrorCode", tag = "1")]
	pub error_code: i32,
	/// Generic description of the error condition, for a human audience and
	/// logging only.
	#[prost(string, tag = "2")]
	pub message: ::prost::alloc::string::String,
}
/// Error codes used in [`ErrorResponse`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ErrorCode {
	/// Default protobuf value; never emitted by a server.
	Unknown = 0,
	/// The request was missing a required argument or an argument was out of
	/// bounds.
	InvalidArgument = 1,
	/// No record matched the requested `(base, key)`.
	NotFound = 2,
	/// The latest record for the requested `(base, key)` is a deletion
	/// marker.
	Deleted = 3,
	/// A persisted record could not be decoded.
	DataLoss = 4,
	/// No backend replied to a fan-out.
	Unavailable = 5,
	/// Any other server side failure.
	Internal = 6,
}
impl ErrorCode {
	/// String value of the enum field names used in the ProtoBuf definition.
	pub fn as_str_name(&self) -> &'static str {
		match self {
			ErrorCode::Unknown => "UNKNOWN",
			ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
			ErrorCode::NotFound => "NOT_FOUND",
			ErrorCode::Deleted => "DELETED",
			ErrorCode::DataLoss => "DATA_LOSS",
			ErrorCode::Unavailable => "UNAVAILABLE",
			ErrorCode::Internal => "INTERNAL",
		}
	}
	/// Creates an enum from field names used in the ProtoBuf definition.
	pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
		match value {
			"UNKNOWN" => Some(Self::Unknown),
			"INVALID_ARGUMENT" => Some(Self::InvalidArgument),
			"NOT_FOUND" => Some(Self::NotFound),
			"DELETED" => Some(Self::Deleted),
			"DATA_LOSS" => Some(Self::DataLoss),
			"UNAVAILABLE" => Some(Self::Unavailable),
			"INTERNAL" => Some(Self::Internal),
			_ => None,
		}
	}
}
