use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use prost::Message;

use api::error::GkError;
use api::index::IndexStore;
use api::types::{
	DeleteReply, DeleteRequest, ErrorCode, ErrorResponse, GetReply, GetRequest, ListReply,
	ListRequest, PutReply, PutRequest,
};
use bytes::Bytes;
use tracing::{debug, trace};

use crate::http::{empty_body, full_body, Frame, ReplyBody, HEADER_ERROR};

/// Prefix of every index RPC route.
pub const BASE_PATH_PREFIX: &str = "/v1/index";

/// Index payloads are small; anything bigger is a broken client.
const MAXIMUM_REQUEST_BODY_SIZE: usize = 4 * 1024 * 1024;

/// Serves the index contract over protobuf-encoded HTTP/1 bodies.
///
/// The same transport fronts both roles of the index plane: the single-node
/// store hands in its [`OrderedIndex`](impls::ordered_index::OrderedIndex),
/// the gateway hands in its fan-out core.
#[derive(Clone)]
pub struct IndexHttpService {
	index: Arc<dyn IndexStore>,
	frame: Arc<Frame>,
}

impl IndexHttpService {
	/// Fronts `index` with the HTTP transport and the shared `frame` routes.
	pub fn new(index: Arc<dyn IndexStore>, frame: Arc<Frame>) -> Self {
		Self { index, frame }
	}
}

impl Service<Request<Incoming>> for IndexHttpService {
	type Response = Response<ReplyBody>;
	type Error = hyper::Error;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

	fn call(&self, req: Request<Incoming>) -> Self::Future {
		let index = Arc::clone(&self.index);
		let frame = Arc::clone(&self.frame);
		let method = req.method().clone();
		let path = req.uri().path().to_owned();

		Box::pin(async move {
			if let Some(reply) = frame.try_handle(&method, &path) {
				return Ok(reply);
			}

			let pre = Instant::now();
			let stripped = path.strip_prefix(BASE_PATH_PREFIX).unwrap_or_default();
			let reply = match stripped {
				"/put" => {
					let reply = handle_request(index, req, handle_put).await?;
					frame.metrics.time_put.observe(pre.elapsed().as_secs_f64());
					reply
				},
				"/delete" => {
					let reply = handle_request(index, req, handle_delete).await?;
					frame.metrics.time_del.observe(pre.elapsed().as_secs_f64());
					reply
				},
				"/get" => {
					let reply = handle_request(index, req, handle_get).await?;
					frame.metrics.time_get.observe(pre.elapsed().as_secs_f64());
					reply
				},
				"/list" => {
					let reply = handle_request(index, req, handle_list).await?;
					frame.metrics.time_list.observe(pre.elapsed().as_secs_f64());
					reply
				},
				_ => Response::builder()
					.status(StatusCode::BAD_REQUEST)
					.body(full_body("Invalid request path."))
					// unwrap safety: body only errors when previous chained calls failed.
					.unwrap(),
			};
			frame.log_access(&method, &path, reply.status());
			Ok(reply)
		})
	}
}

async fn handle_put(
	index: Arc<dyn IndexStore>, request: PutRequest,
) -> Result<PutReply, GkError> {
	let request_id: u64 = rand::random();
	trace!("Handling put {} for {},{}", request_id, request.base, request.key);
	let result = index.put(request).await;
	if let Err(ref e) = result {
		debug!("Put {} failed: {}", request_id, e);
	}
	result
}

async fn handle_delete(
	index: Arc<dyn IndexStore>, request: DeleteRequest,
) -> Result<DeleteReply, GkError> {
	let request_id: u64 = rand::random();
	trace!("Handling delete {} for {},{}", request_id, request.base, request.key);
	let result = index.delete(request).await;
	if let Err(ref e) = result {
		debug!("Delete {} failed: {}", request_id, e);
	}
	result
}

async fn handle_get(
	index: Arc<dyn IndexStore>, request: GetRequest,
) -> Result<GetReply, GkError> {
	let request_id: u64 = rand::random();
	trace!(
		"Handling get {} for {},{} at {}",
		request_id,
		request.base,
		request.key,
		request.version
	);
	let result = index.get(request).await;
	if let Err(ref e) = result {
		debug!("Get {} failed: {}", request_id, e);
	}
	result
}

async fn handle_list(
	index: Arc<dyn IndexStore>, request: ListRequest,
) -> Result<ListReply, GkError> {
	let request_id: u64 = rand::random();
	trace!(
		"Handling list {} for {} marker {:?} max {}",
		request_id,
		request.base,
		request.marker,
		request.max
	);
	let result = index.list(request).await;
	if let Err(ref e) = result {
		debug!("List {} failed: {}", request_id, e);
	}
	result
}

async fn handle_request<T, R, F, Fut>(
	index: Arc<dyn IndexStore>, request: Request<Incoming>, handler: F,
) -> Result<Response<ReplyBody>, hyper::Error>
where
	T: Message + Default,
	R: Message,
	F: FnOnce(Arc<dyn IndexStore>, T) -> Fut + Send + 'static,
	Fut: Future<Output = Result<R, GkError>> + Send,
{
	if request.method() != Method::POST {
		return Ok(Response::builder()
			.status(StatusCode::METHOD_NOT_ALLOWED)
			.header(HEADER_ERROR, "Only POST")
			.body(empty_body())
			// unwrap safety: body only errors when previous chained calls failed.
			.unwrap());
	}

	let limited_body = Limited::new(request.into_body(), MAXIMUM_REQUEST_BODY_SIZE);
	let bytes = match limited_body.collect().await {
		Ok(body) => body.to_bytes(),
		Err(_) => {
			return Ok(Response::builder()
				.status(StatusCode::PAYLOAD_TOO_LARGE)
				.body(full_body("Request body too large"))
				// unwrap safety: body only errors when previous chained calls failed.
				.unwrap());
		},
	};
	match T::decode(bytes) {
		Ok(request) => match handler(index, request).await {
			Ok(response) => Ok(Response::builder()
				.body(full_body(response.encode_to_vec()))
				// unwrap safety: body only errors when previous chained calls failed.
				.unwrap()),
			Err(e) => Ok(build_error_response(&e)),
		},
		Err(_) => Ok(Response::builder()
			.status(StatusCode::BAD_REQUEST)
			.body(full_body(b"Error parsing request".to_vec()))
			// unwrap safety: body only errors when previous chained calls failed.
			.unwrap()),
	}
}

fn error_code(e: &GkError) -> ErrorCode {
	match e {
		GkError::InvalidArgument(_) | GkError::Malformed(_) => ErrorCode::InvalidArgument,
		GkError::NotFound(_) => ErrorCode::NotFound,
		GkError::Deleted(_) => ErrorCode::Deleted,
		GkError::DataLoss(_) => ErrorCode::DataLoss,
		GkError::Unavailable(_) => ErrorCode::Unavailable,
		_ => ErrorCode::Internal,
	}
}

/// Maps an error onto its HTTP status, the `X-Error` header and a protobuf
/// [`ErrorResponse`] body.
pub fn build_error_response(e: &GkError) -> Response<ReplyBody> {
	let payload =
		ErrorResponse { error_code: error_code(e).into(), message: e.to_string() };
	Response::builder()
		.status(e.http_status())
		.header(HEADER_ERROR, crate::http::header_safe(&e.to_string()))
		.body(full_body(Bytes::from(payload.encode_to_vec())))
		// unwrap safety: body only errors when previous chained calls failed.
		.unwrap()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn wire_error_codes_follow_the_taxonomy() {
		assert_eq!(error_code(&GkError::NotFound("x".into())), ErrorCode::NotFound);
		assert_eq!(error_code(&GkError::Deleted("x".into())), ErrorCode::Deleted);
		assert_eq!(error_code(&GkError::DataLoss("x".into())), ErrorCode::DataLoss);
		assert_eq!(error_code(&GkError::Malformed("x".into())), ErrorCode::InvalidArgument);
		assert_eq!(error_code(&GkError::Timeout("x".into())), ErrorCode::Internal);
	}

	#[test]
	fn error_responses_decode_back() {
		let reply = build_error_response(&GkError::Unavailable("No backend replied".into()));
		assert_eq!(reply.status(), StatusCode::SERVICE_UNAVAILABLE);
		assert_eq!(
			reply.headers()[HEADER_ERROR],
			"Unavailable: No backend replied"
		);
	}
}
