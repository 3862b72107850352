use api::error::GkError;
use api::index::IndexStore;
use api::types::{
	DeleteReply, DeleteRequest, ErrorCode, ErrorResponse, GetReply, GetRequest, ListReply,
	ListRequest, PutReply, PutRequest,
};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use prost::Message;

use crate::http::HEADER_ERROR;
use crate::index_http::BASE_PATH_PREFIX;

/// Client side of the protobuf-over-HTTP index transport, one per remote
/// store or gateway. The underlying channel is pooled and survives between
/// calls.
pub struct HttpIndexClient {
	endpoint: String,
	client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpIndexClient {
	/// Dials `addr` (`host:port`). The probe connection proves the peer is
	/// reachable right now; the pooled channel then redials on its own.
	pub async fn dial(addr: &str) -> Result<Self, GkError> {
		tokio::net::TcpStream::connect(addr)
			.await
			.map_err(|e| GkError::Unavailable(format!("dial {}: {}", addr, e)))?;
		let client = Client::builder(TokioExecutor::new()).build_http();
		Ok(Self { endpoint: addr.to_string(), client })
	}

	async fn call<T, R>(&self, route: &str, payload: &T) -> Result<R, GkError>
	where
		T: Message,
		R: Message + Default,
	{
		let uri = format!("http://{}{}{}", self.endpoint, BASE_PATH_PREFIX, route);
		let request = Request::builder()
			.method(Method::POST)
			.uri(uri)
			.body(Full::new(Bytes::from(payload.encode_to_vec())))
			.map_err(|e| GkError::Internal(e.to_string()))?;

		let response = self
			.client
			.request(request)
			.await
			.map_err(|e| GkError::Unavailable(format!("{}: {}", self.endpoint, e)))?;
		let status = response.status();
		let header_message = response
			.headers()
			.get(HEADER_ERROR)
			.and_then(|v| v.to_str().ok())
			.map(str::to_string);
		let body = response
			.into_body()
			.collect()
			.await
			.map_err(|e| GkError::BackendError(format!("{}: {}", self.endpoint, e)))?
			.to_bytes();

		if !status.is_success() {
			return Err(decode_error(status.as_u16(), header_message, &body));
		}
		R::decode(body).map_err(|e| GkError::Malformed(format!("bad index reply: {}", e)))
	}
}

/// Rebuilds the caller-side error from a non-2xx index reply, preferring the
/// machine readable body over the bare status.
fn decode_error(status: u16, header_message: Option<String>, body: &[u8]) -> GkError {
	if let Ok(payload) = ErrorResponse::decode(body) {
		let message =
			if payload.message.is_empty() { format!("status {}", status) } else { payload.message };
		match ErrorCode::from_i32(payload.error_code).unwrap_or(ErrorCode::Unknown) {
			ErrorCode::InvalidArgument => return GkError::InvalidArgument(message),
			ErrorCode::NotFound => return GkError::NotFound(message),
			ErrorCode::Deleted => return GkError::Deleted(message),
			ErrorCode::DataLoss => return GkError::DataLoss(message),
			ErrorCode::Unavailable => return GkError::Unavailable(message),
			ErrorCode::Internal => return GkError::Internal(message),
			ErrorCode::Unknown => {},
		}
	}
	let message = header_message.unwrap_or_else(|| format!("status {}", status));
	GkError::from_http_status(status, message.clone())
		.unwrap_or(GkError::Internal(message))
}

#[async_trait]
impl IndexStore for HttpIndexClient {
	async fn put(&self, request: PutRequest) -> Result<PutReply, GkError> {
		self.call("/put", &request).await
	}

	async fn delete(&self, request: DeleteRequest) -> Result<DeleteReply, GkError> {
		self.call("/delete", &request).await
	}

	async fn get(&self, request: GetRequest) -> Result<GetReply, GkError> {
		self.call("/get", &request).await
	}

	async fn list(&self, request: ListRequest) -> Result<ListReply, GkError> {
		self.call("/list", &request).await
	}
}
