//! Hosts the gunkan services: the index store, the index gateway, the data
//! gateway and the blob store front-door, one role per process.
//!
//! Gunkan is an object-storage fabric splitting part bodies from their
//! metadata. Stateless gateways discover the stateful stores through a
//! catalog, balance writes across them and fan reads out to every replica.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

use std::sync::Arc;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::signal::unix::SignalKind;

use api::discovery::{Balancer, Catalog};
use api::index::IndexStore;
use impls::fs_blob_store::{BlobRepo, PostNamedRepo, PreNamedRepo};
use impls::ordered_index::OrderedIndex;
use impls::sled_engine::SledEngine;

mod blob_client;
mod blob_service;
mod conn_map;
mod data_gate;
mod discovery;
mod fanout;
mod http;
mod index_client;
mod index_gate;
mod index_http;
mod logging;
mod metrics;
mod util;

use blob_service::BlobStoreService;
use conn_map::ConnMap;
use data_gate::DataGateService;
use discovery::{HttpCatalog, SimpleBalancer, StaticCatalog};
use http::{Frame, HealthState, ReplyBody};
use index_gate::IndexGateway;
use index_http::IndexHttpService;
use util::config::{Configuration, NamingPolicy, Role};

fn main() {
	let args: Vec<String> = std::env::args().collect();
	if args.len() != 2 {
		eprintln!("Usage: {} <config-file-path>", args[0]);
		std::process::exit(1);
	}

	let cfg = match util::config::load_configuration(&args[1]) {
		Ok(cfg) => cfg,
		Err(e) => {
			eprintln!("Failed to load configuration: {}", e);
			std::process::exit(1);
		},
	};

	logging::init(cfg.log_level, cfg.log_json);

	let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
		Ok(runtime) => runtime,
		Err(e) => {
			eprintln!("Failed to setup tokio runtime: {}", e);
			std::process::exit(-1);
		},
	};

	runtime.block_on(async {
		let listener = match TcpListener::bind(&cfg.bind_address).await {
			Ok(listener) => listener,
			Err(e) => {
				eprintln!("Failed to bind {}: {}", cfg.bind_address, e);
				std::process::exit(-1);
			},
		};
		tracing::info!(bind = %cfg.bind_address, announce = %cfg.announce_address, role = ?cfg.role, "listening");

		match cfg.role {
			Role::IndexStore => serve(listener, index_store_service(&cfg)).await,
			Role::IndexGate => serve(listener, index_gate_service(&cfg)).await,
			Role::DataGate => serve(listener, data_gate_service(&cfg)).await,
			Role::BlobStore => serve(listener, blob_store_service(&cfg)).await,
		}
	});
}

fn exit_on<T, E: std::fmt::Display>(result: Result<T, E>, what: &str) -> T {
	match result {
		Ok(value) => value,
		Err(e) => {
			eprintln!("Failed to start {}: {}", what, e);
			std::process::exit(-1);
		},
	}
}

fn frame_for(cfg: &Configuration, class: &str, metric_label: &str) -> Arc<Frame> {
	let health = HealthState::new(cfg.io_error_window, cfg.full_error_window);
	let frame = Frame::new(class, metric_label, cfg.announce_address.clone(), health);
	Arc::new(exit_on(frame, class))
}

fn catalog_for(cfg: &Configuration) -> Arc<dyn Catalog> {
	match &cfg.catalog.endpoint {
		Some(endpoint) => Arc::new(HttpCatalog::new(endpoint.clone())),
		None => Arc::new(StaticCatalog {
			data_gates: cfg.catalog.data_gates.clone(),
			index_gates: cfg.catalog.index_gates.clone(),
			blob_stores: cfg.catalog.blob_stores.clone(),
			index_stores: cfg.catalog.index_stores.clone(),
		}),
	}
}

fn base_dir_for(cfg: &Configuration) -> &std::path::Path {
	match &cfg.base_dir {
		Some(dir) => dir.as_path(),
		None => {
			eprintln!("A base directory is required for the {:?} role", cfg.role);
			std::process::exit(-1);
		},
	}
}

fn index_store_service(cfg: &Configuration) -> IndexHttpService {
	let engine = exit_on(SledEngine::open(base_dir_for(cfg), cfg.sync), "index engine");
	let index: Arc<dyn IndexStore> = Arc::new(OrderedIndex::new(engine));
	IndexHttpService::new(index, frame_for(cfg, "index-store", "index"))
}

fn index_gate_service(cfg: &Configuration) -> IndexHttpService {
	let conns = Arc::new(ConnMap::new());
	Arc::clone(&conns).spawn_reloader(catalog_for(cfg));
	let gateway: Arc<dyn IndexStore> = Arc::new(IndexGateway::new(conns));
	IndexHttpService::new(gateway, frame_for(cfg, "index-gate", "index_gate"))
}

fn data_gate_service(cfg: &Configuration) -> DataGateService {
	let balancer: Arc<dyn Balancer> = Arc::new(SimpleBalancer::new(catalog_for(cfg)));
	DataGateService::new(balancer, frame_for(cfg, "data-gate", "part"))
}

fn blob_store_service(cfg: &Configuration) -> BlobStoreService {
	let base_dir = base_dir_for(cfg);
	let repo: Arc<dyn BlobRepo> = match cfg.naming {
		NamingPolicy::PreNamed => {
			Arc::new(exit_on(PreNamedRepo::new(base_dir, cfg.sync), "blob repository"))
		},
		NamingPolicy::PostNamed => {
			Arc::new(exit_on(PostNamedRepo::new(base_dir, cfg.sync), "blob repository"))
		},
	};
	BlobStoreService::new(repo, frame_for(cfg, "blob-store", "blob"))
}

async fn serve<S>(listener: TcpListener, service: S)
where
	S: hyper::service::Service<
			Request<Incoming>,
			Response = Response<ReplyBody>,
			Error = hyper::Error,
		> + Clone
		+ Send
		+ 'static,
	S::Future: Send,
{
	let mut sigterm_stream = match tokio::signal::unix::signal(SignalKind::terminate()) {
		Ok(stream) => stream,
		Err(e) => {
			eprintln!("Failed to register for SIGTERM stream: {}", e);
			std::process::exit(-1);
		},
	};

	loop {
		tokio::select! {
			res = listener.accept() => {
				match res {
					Ok((stream, _)) => {
						let io_stream = TokioIo::new(stream);
						let service = service.clone();
						tokio::spawn(async move {
							if let Err(err) = http1::Builder::new().serve_connection(io_stream, service).await {
								tracing::debug!(error = %err, "connection closed");
							}
						});
					},
					Err(e) => tracing::warn!(error = %e, "failed to accept connection"),
				}
			}
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("Received CTRL-C, shutting down..");
				break;
			}
			_ = sigterm_stream.recv() => {
				tracing::info!("Received SIGTERM, shutting down..");
				break;
			}
		}
	}
}
