use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use api::blob_id::BlobId;
use api::discovery::Balancer;
use api::index::IndexStore as _;
use api::sanity::{validate_bucket_name, validate_content_name};
use api::types::ListRequest;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};

use crate::blob_client::HttpBlobClient;
use crate::http::{empty_body, error_response, full_body, Frame, ReplyBody, HEADER_ERROR};
use crate::index_client::HttpIndexClient;

/// Prefix of the part routes.
pub const PREFIX_PART: &str = "/v1/part/";
/// Route listing the keys of a bucket through the index plane.
pub const ROUTE_LIST: &str = "/v1/list";

/// Header selecting the storage policy of a part PUT.
pub const HEADER_OBJECT_POLICY: &str = "X-gk-obj-policy";
/// Header echoing the real id a part was committed under.
pub const HEADER_PART_READ_ID: &str = "X-gk-part-read-id";

/// The only storage policy the gateway implements.
const POLICY_SINGLE: &str = "single";

/// The data gateway: translates part PUTs into blob-store writes picked by
/// the balancer, and bucket listings into index gateway calls.
#[derive(Clone)]
pub struct DataGateService {
	balancer: Arc<dyn Balancer>,
	frame: Arc<Frame>,
}

impl DataGateService {
	/// Builds the gateway over its balancer.
	pub fn new(balancer: Arc<dyn Balancer>, frame: Arc<Frame>) -> Self {
		Self { balancer, frame }
	}
}

impl Service<Request<Incoming>> for DataGateService {
	type Response = Response<ReplyBody>;
	type Error = hyper::Error;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

	fn call(&self, req: Request<Incoming>) -> Self::Future {
		let balancer = Arc::clone(&self.balancer);
		let frame = Arc::clone(&self.frame);
		let method = req.method().clone();
		let path = req.uri().path().to_owned();

		Box::pin(async move {
			if let Some(reply) = frame.try_handle(&method, &path) {
				return Ok(reply);
			}

			let pre = Instant::now();
			let reply = if let Some(tail) = path.strip_prefix(PREFIX_PART) {
				let tail = tail.to_owned();
				match method {
					Method::PUT => {
						let reply = handle_part_put(balancer, &tail, req).await;
						frame.metrics.time_put.observe(pre.elapsed().as_secs_f64());
						reply
					},
					Method::GET | Method::HEAD => {
						frame.metrics.time_get.observe(pre.elapsed().as_secs_f64());
						status_with_error(StatusCode::NOT_IMPLEMENTED, "part reads go to the blob store")
					},
					Method::DELETE => {
						frame.metrics.time_del.observe(pre.elapsed().as_secs_f64());
						status_with_error(StatusCode::NOT_IMPLEMENTED, "part deletes go to the blob store")
					},
					_ => status_with_error(StatusCode::METHOD_NOT_ALLOWED, "unsupported method"),
				}
			} else if path == ROUTE_LIST {
				match method {
					Method::GET | Method::HEAD => {
						let reply = handle_list(balancer, &frame, req).await;
						frame.metrics.time_list.observe(pre.elapsed().as_secs_f64());
						reply
					},
					_ => status_with_error(StatusCode::METHOD_NOT_ALLOWED, "Only GET or HEAD"),
				}
			} else {
				status_with_error(StatusCode::NOT_FOUND, "no such route")
			};
			frame.log_access(&method, &path, reply.status());
			Ok(reply)
		})
	}
}

fn status_with_error(status: StatusCode, message: &str) -> Response<ReplyBody> {
	// unwrap safety: body only errors when previous chained calls failed.
	Response::builder()
		.status(status)
		.header(HEADER_ERROR, crate::http::header_safe(message))
		.body(empty_body())
		.unwrap()
}

async fn handle_part_put(
	balancer: Arc<dyn Balancer>, tail: &str, req: Request<Incoming>,
) -> Response<ReplyBody> {
	let tokens: Vec<&str> = tail.split('/').collect();
	if tokens.len() != 3 {
		return status_with_error(StatusCode::BAD_REQUEST, "3 path tokens expected");
	}
	let (bucket, content, part_id) = (tokens[0], tokens[1], tokens[2]);
	if !validate_bucket_name(bucket)
		|| !validate_content_name(content)
		|| !validate_content_name(part_id)
	{
		return status_with_error(StatusCode::BAD_REQUEST, "invalid part name");
	}

	let policy = req
		.headers()
		.get(HEADER_OBJECT_POLICY)
		.and_then(|v| v.to_str().ok())
		.unwrap_or(POLICY_SINGLE);
	if policy != POLICY_SINGLE {
		return status_with_error(StatusCode::BAD_REQUEST, "unsupported storage policy");
	}

	let id = BlobId {
		bucket: bucket.to_string(),
		content: content.to_string(),
		part_id: part_id.to_string(),
		position: 0,
	};

	let addr = match balancer.poll_blob_store().await {
		Ok(addr) => addr,
		Err(e) => return error_response(&e),
	};
	let client = match HttpBlobClient::dial(&addr).await {
		Ok(client) => client,
		Err(e) => return status_with_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
	};

	// The inbound body streams through untouched.
	let body = req.into_body().map_err(|e| Box::new(e) as _).boxed();
	match client.put(&id, body).await {
		Ok(real_id) => Response::builder()
			.status(StatusCode::CREATED)
			.header(HEADER_PART_READ_ID, real_id)
			.body(empty_body())
			// unwrap safety: body only errors when previous chained calls failed.
			.unwrap(),
		Err(e) => status_with_error(StatusCode::SERVICE_UNAVAILABLE, &e.to_string()),
	}
}

fn query_param<'q>(query: &'q str, name: &str) -> &'q str {
	query
		.split('&')
		.find_map(|pair| pair.strip_prefix(name).and_then(|rest| rest.strip_prefix('=')))
		.unwrap_or("")
}

async fn handle_list(
	balancer: Arc<dyn Balancer>, frame: &Frame, req: Request<Incoming>,
) -> Response<ReplyBody> {
	let query = req.uri().query().unwrap_or("").to_owned();
	let bucket = query_param(&query, "b");
	let marker = query_param(&query, "m");
	let smax = query_param(&query, "max");

	if !validate_bucket_name(bucket) || !validate_content_name(marker) {
		return status_with_error(StatusCode::BAD_REQUEST, "invalid bucket or marker");
	}
	let max: u32 = match smax.parse() {
		Ok(max) => max,
		Err(_) => return status_with_error(StatusCode::BAD_REQUEST, "invalid max"),
	};

	let addr = match balancer.poll_index_gate().await {
		Ok(addr) => addr,
		Err(e) => return error_response(&e),
	};
	let client = match HttpIndexClient::dial(&addr).await {
		Ok(client) => client,
		Err(e) => return error_response(&e),
	};

	let request = ListRequest {
		base: bucket.to_string(),
		marker: marker.to_string(),
		marker_version: 0,
		max,
	};
	let reply = match client.list(request).await {
		Ok(reply) => reply,
		Err(e) => return error_response(&e),
	};

	if reply.keys.is_empty() {
		return crate::http::status_response(StatusCode::NO_CONTENT);
	}
	let mut body = reply.keys.join("\n");
	body.push('\n');
	frame.metrics.bytes_out.inc_by(body.len() as u64);
	Response::builder()
		.header("Content-Type", "text/plain")
		.body(full_body(body))
		// unwrap safety: body only errors when previous chained calls failed.
		.unwrap()
}


#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn query_parameters_are_plain_pairs() {
		let query = "b=bucket&m=obj,part&max=100";
		assert_eq!(query_param(query, "b"), "bucket");
		assert_eq!(query_param(query, "m"), "obj,part");
		assert_eq!(query_param(query, "max"), "100");
		assert_eq!(query_param(query, "absent"), "");
	}

	#[test]
	fn query_names_do_not_match_prefixes() {
		assert_eq!(query_param("maxi=5&max=2", "max"), "2");
	}
}
