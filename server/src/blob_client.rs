use api::blob_id::BlobId;
use api::error::GkError;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::BodyExt;
use hyper::{Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::http::HEADER_ERROR;

/// Body type forwarded to a blob store: either a buffered payload or the
/// untouched inbound stream of a part PUT.
pub type ProxyBody = BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Prefix of the blob routes on a blob store.
pub const PREFIX_BLOB: &str = "/v1/blob/";

/// HTTP client of one blob store.
pub struct HttpBlobClient {
	endpoint: String,
	client: Client<HttpConnector, ProxyBody>,
}

impl HttpBlobClient {
	/// Dials `addr` (`host:port`), probing reachability first.
	pub async fn dial(addr: &str) -> Result<Self, GkError> {
		tokio::net::TcpStream::connect(addr)
			.await
			.map_err(|e| GkError::Unavailable(format!("dial {}: {}", addr, e)))?;
		let client = Client::builder(TokioExecutor::new()).build_http();
		Ok(Self { endpoint: addr.to_string(), client })
	}

	/// Streams `body` into the blob named by `id` and returns the real id
	/// the store committed under.
	pub async fn put(&self, id: &BlobId, body: ProxyBody) -> Result<String, GkError> {
		let uri = format!("http://{}{}{}", self.endpoint, PREFIX_BLOB, id.encode());
		let request = Request::builder()
			.method(Method::PUT)
			.uri(uri)
			.body(body)
			.map_err(|e| GkError::Internal(e.to_string()))?;

		let response = self
			.client
			.request(request)
			.await
			.map_err(|e| GkError::BackendError(format!("{}: {}", self.endpoint, e)))?;
		let status = response.status().as_u16();
		let message = response
			.headers()
			.get(HEADER_ERROR)
			.and_then(|v| v.to_str().ok())
			.unwrap_or("blob store error")
			.to_string();
		let location = response
			.headers()
			.get(hyper::header::LOCATION)
			.and_then(|v| v.to_str().ok())
			.map(str::to_string);
		// Drain the reply so the pooled connection is reusable.
		let _ = response.into_body().collect().await;

		if let Some(err) = GkError::from_http_status(status, message) {
			return Err(err);
		}
		location.ok_or_else(|| {
			GkError::BackendError(format!("{} committed without a location", self.endpoint))
		})
	}
}
