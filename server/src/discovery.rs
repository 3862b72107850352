use std::sync::Arc;

use api::discovery::{
	Balancer, Catalog, SRV_BLOB_STORE, SRV_DATA_GATE, SRV_INDEX_GATE, SRV_INDEX_STORE,
};
use api::error::GkError;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use rand::Rng;
use serde::Deserialize;
use tracing::debug;

/// Catalog answering from fixed address lists, for registry-less
/// deployments and tests.
#[derive(Default)]
pub struct StaticCatalog {
	/// Data gateway addresses.
	pub data_gates: Vec<String>,
	/// Index gateway addresses.
	pub index_gates: Vec<String>,
	/// Blob store addresses.
	pub blob_stores: Vec<String>,
	/// Index store addresses.
	pub index_stores: Vec<String>,
}

#[async_trait]
impl Catalog for StaticCatalog {
	async fn list_data_gate(&self) -> Result<Vec<String>, GkError> {
		Ok(self.data_gates.clone())
	}

	async fn list_index_gate(&self) -> Result<Vec<String>, GkError> {
		Ok(self.index_gates.clone())
	}

	async fn list_blob_store(&self) -> Result<Vec<String>, GkError> {
		Ok(self.blob_stores.clone())
	}

	async fn list_index_store(&self) -> Result<Vec<String>, GkError> {
		Ok(self.index_stores.clone())
	}
}

/// One `{Address, Port}` entry of the registry answer.
#[derive(Deserialize)]
struct RegistryEntry {
	#[serde(rename = "ServiceAddress")]
	address: String,
	#[serde(rename = "ServicePort")]
	port: u16,
}

/// Catalog querying an external service registry over HTTP.
///
/// One `GET <endpoint>/v1/catalog/service/<tag>` per service type; the tag
/// is the type name. An empty answer is a successful empty list.
pub struct HttpCatalog {
	endpoint: String,
	client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpCatalog {
	/// Builds the catalog client against `endpoint` (`host:port`).
	pub fn new(endpoint: String) -> Self {
		let client = Client::builder(TokioExecutor::new()).build_http();
		Self { endpoint, client }
	}

	async fn list_services(&self, tag: &str) -> Result<Vec<String>, GkError> {
		let uri = format!("http://{}/v1/catalog/service/{}", self.endpoint, tag);
		let request = Request::builder()
			.method(Method::GET)
			.uri(uri)
			.body(Full::new(Bytes::new()))
			.map_err(|e| GkError::Internal(e.to_string()))?;

		let response = self
			.client
			.request(request)
			.await
			.map_err(|e| GkError::Unavailable(format!("registry {}: {}", self.endpoint, e)))?;
		if !response.status().is_success() {
			return Err(GkError::BackendError(format!(
				"registry {} replied {}",
				self.endpoint,
				response.status()
			)));
		}
		let body = response
			.into_body()
			.collect()
			.await
			.map_err(|e| GkError::BackendError(e.to_string()))?
			.to_bytes();

		let entries: Vec<RegistryEntry> = serde_json::from_slice(&body)
			.map_err(|e| GkError::Malformed(format!("registry answer: {}", e)))?;
		let addrs: Vec<String> =
			entries.iter().map(|e| format!("{}:{}", e.address, e.port)).collect();
		debug!(tag = tag, count = addrs.len(), "catalog loaded");
		Ok(addrs)
	}
}

#[async_trait]
impl Catalog for HttpCatalog {
	async fn list_data_gate(&self) -> Result<Vec<String>, GkError> {
		self.list_services(SRV_DATA_GATE).await
	}

	async fn list_index_gate(&self) -> Result<Vec<String>, GkError> {
		self.list_services(SRV_INDEX_GATE).await
	}

	async fn list_blob_store(&self) -> Result<Vec<String>, GkError> {
		self.list_services(SRV_BLOB_STORE).await
	}

	async fn list_index_store(&self) -> Result<Vec<String>, GkError> {
		self.list_services(SRV_INDEX_STORE).await
	}
}

/// Uniform random pick over the catalog, re-evaluated on every call.
pub struct SimpleBalancer {
	catalog: Arc<dyn Catalog>,
}

impl SimpleBalancer {
	/// Builds the balancer over any catalog.
	pub fn new(catalog: Arc<dyn Catalog>) -> Self {
		Self { catalog }
	}

	fn pick(addrs: Vec<String>, kind: &str) -> Result<String, GkError> {
		if addrs.is_empty() {
			return Err(GkError::Unavailable(format!("No {} available", kind)));
		}
		let chosen = rand::thread_rng().gen_range(0..addrs.len());
		Ok(addrs[chosen].clone())
	}
}

#[async_trait]
impl Balancer for SimpleBalancer {
	async fn poll_data_gate(&self) -> Result<String, GkError> {
		Self::pick(self.catalog.list_data_gate().await?, "data gateway")
	}

	async fn poll_index_gate(&self) -> Result<String, GkError> {
		Self::pick(self.catalog.list_index_gate().await?, "index gateway")
	}

	async fn poll_blob_store(&self) -> Result<String, GkError> {
		Self::pick(self.catalog.list_blob_store().await?, "blob store")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn an_empty_catalog_is_not_available() {
		let balancer = SimpleBalancer::new(Arc::new(StaticCatalog::default()));
		assert!(matches!(balancer.poll_blob_store().await, Err(GkError::Unavailable(_))));
	}

	#[tokio::test]
	async fn every_pick_comes_from_the_catalog() {
		let catalog = StaticCatalog {
			blob_stores: vec!["127.0.0.1:6010".to_string(), "127.0.0.1:6011".to_string()],
			..StaticCatalog::default()
		};
		let balancer = SimpleBalancer::new(Arc::new(catalog));
		for _ in 0..32 {
			let addr = balancer.poll_blob_store().await.unwrap();
			assert!(addr == "127.0.0.1:6010" || addr == "127.0.0.1:6011");
		}
	}

	#[test]
	fn registry_entries_parse() {
		let body = r#"[
			{"ServiceAddress": "10.0.0.1", "ServicePort": 6021, "ServiceName": "x"},
			{"ServiceAddress": "10.0.0.2", "ServicePort": 6022}
		]"#;
		let entries: Vec<RegistryEntry> = serde_json::from_slice(body.as_bytes()).unwrap();
		let addrs: Vec<String> =
			entries.iter().map(|e| format!("{}:{}", e.address, e.port)).collect();
		assert_eq!(addrs, vec!["10.0.0.1:6021", "10.0.0.2:6022"]);
	}
}
