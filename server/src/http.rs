use std::sync::Mutex;
use std::time::{Duration, Instant};

use api::error::GkError;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Response, StatusCode};

use crate::metrics::ServiceMetrics;

/// Route answering the service class and version.
pub const ROUTE_INFO: &str = "/info";
/// Route answering the health probes of the registry.
pub const ROUTE_HEALTH: &str = "/health";
/// Route answering the Prometheus scrapes.
pub const ROUTE_METRICS: &str = "/metrics";

/// Header carrying the human readable error message next to the status.
pub const HEADER_ERROR: &str = "X-Error";

/// Response body type shared by every service: either buffered bytes or a
/// file stream.
pub type ReplyBody = BoxBody<Bytes, std::io::Error>;

/// Wraps buffered bytes into a [`ReplyBody`].
pub fn full_body(bytes: impl Into<Bytes>) -> ReplyBody {
	Full::new(bytes.into()).map_err(|never| match never {}).boxed()
}

/// An empty [`ReplyBody`].
pub fn empty_body() -> ReplyBody {
	full_body(Bytes::new())
}

/// Builds a bare response with the given status.
pub fn status_response(status: StatusCode) -> Response<ReplyBody> {
	// unwrap safety: body only errors when previous chained calls failed.
	Response::builder().status(status).body(empty_body()).unwrap()
}

/// Flattens a message onto one header-safe line. Names under caller control
/// end up in error messages, and a control byte would poison the response
/// builder.
pub fn header_safe(message: &str) -> String {
	message.chars().map(|c| if c.is_control() { ' ' } else { c }).collect()
}

/// Builds an error response with the mapped status and the message in the
/// `X-Error` header.
pub fn error_response(err: &GkError) -> Response<ReplyBody> {
	// unwrap safety: body only errors when previous chained calls failed.
	Response::builder()
		.status(err.http_status())
		.header(HEADER_ERROR, header_safe(&err.to_string()))
		.body(empty_body())
		.unwrap()
}

/// Recent-fault bookkeeping behind the `/health` route.
///
/// Services record the instant of their last I/O fault and last write-full
/// condition; the route degrades while "now" is inside the configured
/// windows.
pub struct HealthState {
	io_window: Duration,
	full_window: Duration,
	last_io_error: Mutex<Option<Instant>>,
	last_full_error: Mutex<Option<Instant>>,
}

impl HealthState {
	/// Creates the state with the two fault windows.
	pub fn new(io_window: Duration, full_window: Duration) -> Self {
		Self {
			io_window,
			full_window,
			last_io_error: Mutex::new(None),
			last_full_error: Mutex::new(None),
		}
	}

	/// Records an I/O fault at "now".
	pub fn note_io_error(&self) {
		if let Ok(mut guard) = self.last_io_error.lock() {
			*guard = Some(Instant::now());
		}
	}

	/// Records a write-full condition at "now".
	pub fn note_full_error(&self) {
		if let Ok(mut guard) = self.last_full_error.lock() {
			*guard = Some(Instant::now());
		}
	}

	fn within(slot: &Mutex<Option<Instant>>, window: Duration) -> bool {
		match slot.lock() {
			Ok(guard) => guard.map(|at| at.elapsed() < window).unwrap_or(false),
			Err(_) => false,
		}
	}

	fn respond(&self) -> Response<ReplyBody> {
		if Self::within(&self.last_full_error, self.full_window) {
			// unwrap safety: body only errors when previous chained calls failed.
			return Response::builder()
				.status(StatusCode::TOO_MANY_REQUESTS)
				.header(HEADER_ERROR, "Full")
				.body(empty_body())
				.unwrap();
		}
		if Self::within(&self.last_io_error, self.io_window) {
			// unwrap safety: body only errors when previous chained calls failed.
			return Response::builder()
				.status(StatusCode::BAD_GATEWAY)
				.header(HEADER_ERROR, "Recent I/O errors")
				.body(empty_body())
				.unwrap();
		}
		status_response(StatusCode::NO_CONTENT)
	}
}

/// The routes and observability every service exposes: `/info`, `/health`,
/// `/metrics`, plus the access log fields.
pub struct Frame {
	info: String,
	announce: String,
	pub health: HealthState,
	pub metrics: ServiceMetrics,
}

impl Frame {
	/// Builds the frame of one service.
	///
	/// `class` names the service in the `/info` body, `metric_label` names
	/// it in the exported histograms, `announce` is the public address put
	/// in access log lines.
	pub fn new(
		class: &str, metric_label: &str, announce: String, health: HealthState,
	) -> Result<Self, GkError> {
		Ok(Self {
			info: format!("gunkan/{}-{}", class, env!("CARGO_PKG_VERSION")),
			announce,
			health,
			metrics: ServiceMetrics::new(metric_label)?,
		})
	}

	/// Serves the shared routes; `None` means the request is for the
	/// service itself.
	pub fn try_handle(&self, method: &Method, path: &str) -> Option<Response<ReplyBody>> {
		match path {
			ROUTE_INFO | ROUTE_HEALTH | ROUTE_METRICS => {},
			_ => return None,
		}
		if method != Method::GET && method != Method::HEAD {
			// unwrap safety: body only errors when previous chained calls failed.
			return Some(
				Response::builder()
					.status(StatusCode::METHOD_NOT_ALLOWED)
					.header(HEADER_ERROR, "Only GET or HEAD")
					.body(empty_body())
					.unwrap(),
			);
		}
		let reply = match path {
			ROUTE_INFO => Response::builder()
				.header("Content-Type", "text/plain")
				.body(full_body(self.info.clone()))
				// unwrap safety: body only errors when previous chained calls failed.
				.unwrap(),
			ROUTE_HEALTH => self.health.respond(),
			_ => Response::builder()
				.header("Content-Type", "text/plain; version=0.0.4")
				.body(full_body(self.metrics.render()))
				// unwrap safety: body only errors when previous chained calls failed.
				.unwrap(),
		};
		Some(reply)
	}

	/// Emits the access log line of one finished request.
	pub fn log_access(&self, method: &Method, path: &str, status: StatusCode) {
		tracing::info!(
			local = %self.announce,
			method = %method,
			path = %path,
			status = status.as_u16(),
			"access"
		);
	}
}
