use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

/// Failures surfaced by the gunkan services and clients.
///
/// Every variant carries a human readable message. The variant is the part a
/// caller may dispatch on; the message is for logs and the `X-Error` header
/// only.
#[derive(Debug)]
pub enum GkError {
	/// The requested record or blob does not exist.
	NotFound(String),

	/// The caller is not allowed to touch the target.
	Forbidden(String),

	/// A record or blob with the same name already exists.
	AlreadyExists(String),

	/// A storage backend replied with an error.
	BackendError(String),

	/// The request was missing an argument, or an argument was out of bounds.
	InvalidArgument(String),

	/// The operation did not complete in time.
	Timeout(String),

	/// No backend of the required type is reachable.
	Unavailable(String),

	/// A wire form could not be decoded.
	Malformed(String),

	/// The latest record for the requested key is a deletion marker.
	Deleted(String),

	/// A persisted record could not be decoded.
	DataLoss(String),

	/// Any other failure.
	Internal(String),
}

impl Display for GkError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			GkError::NotFound(message) => write!(f, "Not found: {}", message),
			GkError::Forbidden(message) => write!(f, "Forbidden: {}", message),
			GkError::AlreadyExists(message) => write!(f, "Already exists: {}", message),
			GkError::BackendError(message) => write!(f, "Backend error: {}", message),
			GkError::InvalidArgument(message) => write!(f, "Invalid argument: {}", message),
			GkError::Timeout(message) => write!(f, "Timeout: {}", message),
			GkError::Unavailable(message) => write!(f, "Unavailable: {}", message),
			GkError::Malformed(message) => write!(f, "Malformed: {}", message),
			GkError::Deleted(message) => write!(f, "Deleted: {}", message),
			GkError::DataLoss(message) => write!(f, "Data loss: {}", message),
			GkError::Internal(message) => write!(f, "Internal error: {}", message),
		}
	}
}

impl Error for GkError {}

impl From<io::Error> for GkError {
	fn from(err: io::Error) -> Self {
		match err.kind() {
			io::ErrorKind::NotFound => GkError::NotFound(err.to_string()),
			io::ErrorKind::AlreadyExists => GkError::AlreadyExists(err.to_string()),
			io::ErrorKind::PermissionDenied => GkError::Forbidden(err.to_string()),
			io::ErrorKind::TimedOut => GkError::Timeout(err.to_string()),
			_ => GkError::Internal(err.to_string()),
		}
	}
}

impl GkError {
	/// The HTTP status a service replies with for this error.
	pub fn http_status(&self) -> u16 {
		match self {
			GkError::NotFound(_) => 404,
			GkError::Forbidden(_) => 403,
			GkError::AlreadyExists(_) => 409,
			GkError::BackendError(_) => 502,
			GkError::InvalidArgument(_) => 400,
			GkError::Timeout(_) => 408,
			GkError::Unavailable(_) => 503,
			GkError::Malformed(_) => 500,
			GkError::Deleted(_) => 404,
			GkError::DataLoss(_) => 500,
			GkError::Internal(_) => 500,
		}
	}

	/// Maps an HTTP status received from a peer back to an error.
	///
	/// 200, 201 and 204 mean success and map to `None`; 404, 403 and 409
	/// keep their meaning; every other status is an internal failure of the
	/// peer.
	pub fn from_http_status(code: u16, message: String) -> Option<GkError> {
		match code {
			200 | 201 | 204 => None,
			403 => Some(GkError::Forbidden(message)),
			404 => Some(GkError::NotFound(message)),
			409 => Some(GkError::AlreadyExists(message)),
			_ => Some(GkError::Internal(message)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn every_kind_maps_to_its_status() {
		let cases = [
			(GkError::NotFound("m".into()), 404),
			(GkError::Forbidden("m".into()), 403),
			(GkError::AlreadyExists("m".into()), 409),
			(GkError::BackendError("m".into()), 502),
			(GkError::InvalidArgument("m".into()), 400),
			(GkError::Timeout("m".into()), 408),
			(GkError::Unavailable("m".into()), 503),
			(GkError::Malformed("m".into()), 500),
			(GkError::Deleted("m".into()), 404),
			(GkError::DataLoss("m".into()), 500),
			(GkError::Internal("m".into()), 500),
		];
		for (err, status) in cases {
			assert_eq!(err.http_status(), status, "{}", err);
		}
	}

	#[test]
	fn peer_statuses_decode_to_the_narrow_taxonomy() {
		assert!(matches!(
			GkError::from_http_status(404, "m".into()),
			Some(GkError::NotFound(_))
		));
		assert!(matches!(
			GkError::from_http_status(403, "m".into()),
			Some(GkError::Forbidden(_))
		));
		assert!(matches!(
			GkError::from_http_status(409, "m".into()),
			Some(GkError::AlreadyExists(_))
		));
		// Everything else, timeouts and unavailability included, is the
		// peer's internal failure.
		for code in [400u16, 408, 418, 500, 502, 503] {
			assert!(matches!(
				GkError::from_http_status(code, "m".into()),
				Some(GkError::Internal(_))
			));
		}
	}

	#[test]
	fn success_statuses_are_not_errors() {
		for code in [200u16, 201, 204] {
			assert!(GkError::from_http_status(code, "ok".into()).is_none());
		}
	}

	#[test]
	fn io_error_classifier() {
		let err: GkError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
		assert!(matches!(err, GkError::NotFound(_)));
		let err: GkError = io::Error::new(io::ErrorKind::AlreadyExists, "dup").into();
		assert!(matches!(err, GkError::AlreadyExists(_)));
		let err: GkError = io::Error::new(io::ErrorKind::PermissionDenied, "no").into();
		assert!(matches!(err, GkError::Forbidden(_)));
		let err: GkError = io::Error::new(io::ErrorKind::TimedOut, "late").into();
		assert!(matches!(err, GkError::Timeout(_)));
		let err: GkError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
		assert!(matches!(err, GkError::Internal(_)));
	}
}
