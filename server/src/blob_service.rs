use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use api::blob_id::BlobId;
use api::error::GkError;
use futures::StreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Frame as BodyFrame, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use impls::fs_blob_store::BlobRepo;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::blob_client::PREFIX_BLOB;
use crate::data_gate::ROUTE_LIST;
use crate::http::{
	empty_body, error_response, status_response, Frame, HealthState, ReplyBody, HEADER_ERROR,
};

/// The blob store front-door: streams bodies in and out of the filesystem
/// repository behind it.
#[derive(Clone)]
pub struct BlobStoreService {
	repo: Arc<dyn BlobRepo>,
	frame: Arc<Frame>,
}

impl BlobStoreService {
	/// Fronts `repo` with the HTTP routes.
	pub fn new(repo: Arc<dyn BlobRepo>, frame: Arc<Frame>) -> Self {
		Self { repo, frame }
	}
}

impl Service<Request<Incoming>> for BlobStoreService {
	type Response = Response<ReplyBody>;
	type Error = hyper::Error;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

	fn call(&self, req: Request<Incoming>) -> Self::Future {
		let repo = Arc::clone(&self.repo);
		let frame = Arc::clone(&self.frame);
		let method = req.method().clone();
		let path = req.uri().path().to_owned();

		Box::pin(async move {
			if let Some(reply) = frame.try_handle(&method, &path) {
				return Ok(reply);
			}

			let pre = Instant::now();
			let reply = if let Some(id) = path.strip_prefix(PREFIX_BLOB) {
				let id = id.to_owned();
				match method {
					Method::GET | Method::HEAD => {
						let reply = handle_blob_get(repo, &frame, &id).await;
						frame.metrics.time_get.observe(pre.elapsed().as_secs_f64());
						reply
					},
					Method::PUT => {
						let reply = handle_blob_put(repo, &frame, &id, req).await;
						frame.metrics.time_put.observe(pre.elapsed().as_secs_f64());
						reply
					},
					Method::DELETE => {
						let reply = handle_blob_delete(repo, &frame, &id).await;
						frame.metrics.time_del.observe(pre.elapsed().as_secs_f64());
						reply
					},
					_ => {
						// unwrap safety: body only errors when previous chained calls failed.
						Response::builder()
							.status(StatusCode::METHOD_NOT_ALLOWED)
							.header(HEADER_ERROR, "unsupported method")
							.body(empty_body())
							.unwrap()
					},
				}
			} else if path == ROUTE_LIST {
				frame.metrics.time_list.observe(pre.elapsed().as_secs_f64());
				status_response(StatusCode::NOT_IMPLEMENTED)
			} else {
				// unwrap safety: body only errors when previous chained calls failed.
				Response::builder()
					.status(StatusCode::NOT_FOUND)
					.header(HEADER_ERROR, "no such route")
					.body(empty_body())
					.unwrap()
			};
			frame.log_access(&method, &path, reply.status());
			Ok(reply)
		})
	}
}

/// Feeds the fault windows behind `/health` from a failed repository call.
fn note_faults(health: &HealthState, err: &GkError) {
	match err {
		GkError::BackendError(_) => health.note_full_error(),
		GkError::Internal(_) | GkError::DataLoss(_) => health.note_io_error(),
		_ => {},
	}
}

async fn handle_blob_put(
	repo: Arc<dyn BlobRepo>, frame: &Frame, encoded: &str, req: Request<Incoming>,
) -> Response<ReplyBody> {
	// An undecodable id is the client's fault, whatever the codec calls it.
	let id = match BlobId::decode(encoded) {
		Ok(id) => id,
		Err(e) => {
			// unwrap safety: body only errors when previous chained calls failed.
			return Response::builder()
				.status(StatusCode::BAD_REQUEST)
				.header(HEADER_ERROR, crate::http::header_safe(&e.to_string()))
				.body(empty_body())
				.unwrap();
		},
	};

	let mut builder = match repo.create(&id).await {
		Ok(builder) => builder,
		Err(e) => {
			note_faults(&frame.health, &e);
			return error_response(&e);
		},
	};

	let mut body = req.into_body();
	let mut written: u64 = 0;
	while let Some(piece) = body.frame().await {
		let piece = match piece {
			Ok(piece) => piece,
			Err(e) => {
				let _ = builder.abort().await;
				return error_response(&GkError::Internal(format!("body stream: {}", e)));
			},
		};
		if let Some(data) = piece.data_ref() {
			if let Err(e) = builder.stream().write_all(data).await {
				let err = GkError::from(e);
				note_faults(&frame.health, &err);
				let _ = builder.abort().await;
				return error_response(&err);
			}
			written += data.len() as u64;
		}
	}

	match builder.commit().await {
		Ok(real_id) => {
			frame.metrics.bytes_in.inc_by(written);
			debug!(blob = %real_id, bytes = written, "blob committed");
			Response::builder()
				.status(StatusCode::CREATED)
				.header(hyper::header::LOCATION, real_id)
				.body(empty_body())
				// unwrap safety: body only errors when previous chained calls failed.
				.unwrap()
		},
		Err(e) => {
			note_faults(&frame.health, &e);
			error_response(&e)
		},
	}
}

async fn handle_blob_get(
	repo: Arc<dyn BlobRepo>, frame: &Frame, real_id: &str,
) -> Response<ReplyBody> {
	let reader = match repo.open(real_id).await {
		Ok(reader) => reader,
		Err(e) => {
			note_faults(&frame.health, &e);
			return error_response(&e);
		},
	};

	let size = reader.size();
	if size == 0 {
		// unwrap safety: body only errors when previous chained calls failed.
		return Response::builder()
			.status(StatusCode::NO_CONTENT)
			.header(hyper::header::CONTENT_LENGTH, "0")
			.header(hyper::header::CONTENT_TYPE, "octet/stream")
			.body(empty_body())
			.unwrap();
	}

	frame.metrics.bytes_out.inc_by(size);
	// Stream at most `size` bytes, whatever happens to the file meanwhile.
	let stream = ReaderStream::new(reader.into_file().take(size));
	let body = StreamBody::new(stream.map(|chunk| chunk.map(BodyFrame::data)));
	Response::builder()
		.header(hyper::header::CONTENT_LENGTH, size)
		.header(hyper::header::CONTENT_TYPE, "octet/stream")
		.body(BodyExt::boxed(body))
		// unwrap safety: body only errors when previous chained calls failed.
		.unwrap()
}

async fn handle_blob_delete(
	repo: Arc<dyn BlobRepo>, frame: &Frame, real_id: &str,
) -> Response<ReplyBody> {
	match repo.delete(real_id).await {
		Ok(()) => status_response(StatusCode::NO_CONTENT),
		Err(e) => {
			note_faults(&frame.health, &e);
			error_response(&e)
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use impls::engine::SyncPolicy;
	use impls::fs_blob_store::PostNamedRepo;
	use std::time::Duration;

	fn frame() -> Arc<Frame> {
		let health = HealthState::new(Duration::from_secs(30), Duration::from_secs(30));
		Arc::new(Frame::new("blob-store", "blob", "127.0.0.1:1".to_string(), health).unwrap())
	}

	#[tokio::test]
	async fn get_of_a_missing_blob_is_not_found() {
		let dir = tempfile::TempDir::new().unwrap();
		let repo = Arc::new(PostNamedRepo::new(dir.path(), SyncPolicy::None).unwrap());
		let frame = frame();

		let reply = handle_blob_get(repo, &frame, "AAAA/BBBBB").await;
		assert_eq!(reply.status(), StatusCode::NOT_FOUND);
		assert!(reply.headers().contains_key(HEADER_ERROR));
	}

	#[tokio::test]
	async fn get_of_an_empty_blob_is_no_content() {
		let dir = tempfile::TempDir::new().unwrap();
		let repo = Arc::new(PostNamedRepo::new(dir.path(), SyncPolicy::None).unwrap());
		let frame = frame();

		let builder = repo
			.create(&BlobId {
				bucket: "b".to_string(),
				content: "c".to_string(),
				part_id: "p".to_string(),
				position: 0,
			})
			.await
			.unwrap();
		let real_id = builder.commit().await.unwrap();

		let reply = handle_blob_get(repo, &frame, &real_id).await;
		assert_eq!(reply.status(), StatusCode::NO_CONTENT);
		assert_eq!(reply.headers()[hyper::header::CONTENT_LENGTH], "0");
	}

	#[tokio::test]
	async fn delete_of_a_committed_blob_is_no_content() {
		let dir = tempfile::TempDir::new().unwrap();
		let repo: Arc<dyn BlobRepo> = Arc::new(PostNamedRepo::new(dir.path(), SyncPolicy::None).unwrap());
		let frame = frame();

		let mut builder = repo
			.create(&BlobId {
				bucket: "b".to_string(),
				content: "c".to_string(),
				part_id: "p".to_string(),
				position: 0,
			})
			.await
			.unwrap();
		builder.stream().write_all(b"body").await.unwrap();
		let real_id = builder.commit().await.unwrap();

		let reply = handle_blob_delete(Arc::clone(&repo), &frame, &real_id).await;
		assert_eq!(reply.status(), StatusCode::NO_CONTENT);

		let reply = handle_blob_get(repo, &frame, &real_id).await;
		assert_eq!(reply.status(), StatusCode::NOT_FOUND);
	}
}
