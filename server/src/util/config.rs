use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use impls::engine::SyncPolicy;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;

const ROLE_VAR: &str = "GK_ROLE";
const BIND_ADDR_VAR: &str = "GK_BIND_ADDRESS";
const ANNOUNCE_ADDR_VAR: &str = "GK_ANNOUNCE_ADDRESS";
const LOG_LEVEL_VAR: &str = "GK_LOG_LEVEL";
const CATALOG_ENDPOINT_VAR: &str = "GK_CATALOG_ENDPOINT";
const BASE_DIR_VAR: &str = "GK_BASE_DIR";
const SYNC_VAR: &str = "GK_SYNC";
const NAMING_VAR: &str = "GK_NAMING";

// The structure of the toml config file. Any setting specified therein can be
// overridden by the corresponding environment variable.
#[derive(Deserialize, Default)]
struct TomlConfig {
	server: Option<ServerSection>,
	log: Option<LogSection>,
	catalog: Option<CatalogSection>,
	index_store: Option<StoreSection>,
	blob_store: Option<BlobSection>,
}

#[derive(Deserialize)]
struct ServerSection {
	role: Option<String>,
	bind_address: Option<SocketAddr>,
	announce_address: Option<String>,
	io_error_window_secs: Option<u64>,
	full_error_window_secs: Option<u64>,
}

#[derive(Deserialize)]
struct LogSection {
	level: Option<String>,
	json: Option<bool>,
}

#[derive(Deserialize)]
struct CatalogSection {
	endpoint: Option<String>,
	data_gates: Option<Vec<String>>,
	index_gates: Option<Vec<String>>,
	blob_stores: Option<Vec<String>>,
	index_stores: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct StoreSection {
	base_dir: Option<PathBuf>,
	sync: Option<String>,
}

#[derive(Deserialize)]
struct BlobSection {
	base_dir: Option<PathBuf>,
	sync: Option<String>,
	naming: Option<String>,
}

/// The service hosted by this process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
	/// Single-node index store over the ordered engine.
	IndexStore,
	/// Stateless index gateway fanning out to every store.
	IndexGate,
	/// HTTP data gateway scattering parts to blob stores.
	DataGate,
	/// HTTP blob store front-door over the filesystem repository.
	BlobStore,
}

impl FromStr for Role {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"index-store" => Ok(Role::IndexStore),
			"index-gate" => Ok(Role::IndexGate),
			"data-gate" => Ok(Role::DataGate),
			"blob-store" => Ok(Role::BlobStore),
			other => Err(format!("unknown role {:?}", other)),
		}
	}
}

/// Naming policy of the blob repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NamingPolicy {
	/// The client supplied encoded id is the object name.
	PreNamed,
	/// The server picks the name; the client learns it at commit time.
	PostNamed,
}

impl FromStr for NamingPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pre" => Ok(NamingPolicy::PreNamed),
			"post" => Ok(NamingPolicy::PostNamed),
			other => Err(format!("unknown naming policy {:?}", other)),
		}
	}
}

/// Where the services of the fabric are discovered.
#[derive(Debug)]
pub struct CatalogConfig {
	/// Address of the external registry; when unset the static lists below
	/// are used instead.
	pub endpoint: Option<String>,
	/// Static data gateway addresses.
	pub data_gates: Vec<String>,
	/// Static index gateway addresses.
	pub index_gates: Vec<String>,
	/// Static blob store addresses.
	pub blob_stores: Vec<String>,
	/// Static index store addresses.
	pub index_stores: Vec<String>,
}

// Encapsulates the result of reading both the environment variables and the
// config file.
#[derive(Debug)]
pub struct Configuration {
	pub role: Role,
	pub bind_address: SocketAddr,
	pub announce_address: String,
	pub log_level: LevelFilter,
	pub log_json: bool,
	pub catalog: CatalogConfig,
	pub base_dir: Option<PathBuf>,
	pub sync: SyncPolicy,
	pub naming: NamingPolicy,
	pub io_error_window: Duration,
	pub full_error_window: Duration,
}

#[inline]
fn read_env(env_var: &str) -> Result<Option<String>, String> {
	match std::env::var(env_var) {
		Ok(env) => Ok(Some(env)),
		Err(std::env::VarError::NotPresent) => Ok(None),
		Err(e) => Err(format!("Failed to load the {} environment variable: {}", env_var, e)),
	}
}

#[inline]
fn read_config<T>(env: Option<T>, config: Option<T>, item: &str, var_name: &str) -> Result<T, String> {
	env.or(config).ok_or(format!(
		"{} must be provided in the configuration file or the environment variable {} must be set.",
		item, var_name
	))
}

fn parse_env<T: FromStr>(env_var: &str) -> Result<Option<T>, String>
where
	T::Err: std::fmt::Display,
{
	read_env(env_var)?
		.map(|raw| raw.parse().map_err(|e| format!("Unable to parse {}: {}", env_var, e)))
		.transpose()
}

pub fn load_configuration(config_file_path: &str) -> Result<Configuration, String> {
	let TomlConfig { server, log, catalog, index_store, blob_store } = {
		let config_file = std::fs::read_to_string(config_file_path)
			.map_err(|e| format!("Failed to read configuration file: {}", e))?;
		toml::from_str(&config_file)
			.map_err(|e| format!("Failed to parse configuration file: {}", e))?
	};

	let (role_config, bind_config, announce_config, io_window, full_window) = match server {
		Some(s) => (
			s.role,
			s.bind_address,
			s.announce_address,
			s.io_error_window_secs,
			s.full_error_window_secs,
		),
		None => (None, None, None, None, None),
	};

	let role_env: Option<Role> = parse_env(ROLE_VAR)?;
	let role_config: Option<Role> = role_config
		.map(|raw| raw.parse().map_err(|e| format!("Unable to parse the role: {}", e)))
		.transpose()?;
	let role = read_config(role_env, role_config, "Service role", ROLE_VAR)?;

	let bind_env: Option<SocketAddr> = parse_env(BIND_ADDR_VAR)?;
	let bind_address =
		read_config(bind_env, bind_config, "Service bind address", BIND_ADDR_VAR)?;

	let announce_env = read_env(ANNOUNCE_ADDR_VAR)?;
	let announce_address =
		announce_env.or(announce_config).unwrap_or_else(|| bind_address.to_string());

	let (level_config, json_config) = match log {
		Some(l) => (l.level, l.json),
		None => (None, None),
	};
	let log_level_env: Option<LevelFilter> = parse_env(LOG_LEVEL_VAR)?;
	let log_level_config: Option<LevelFilter> = level_config
		.map(|raw| raw.parse().map_err(|e| format!("Unable to parse the log level: {}", e)))
		.transpose()?;
	let log_level = log_level_env.or(log_level_config).unwrap_or(LevelFilter::DEBUG);
	let log_json = json_config.unwrap_or(false);

	let catalog = match catalog {
		Some(c) => CatalogConfig {
			endpoint: read_env(CATALOG_ENDPOINT_VAR)?.or(c.endpoint),
			data_gates: c.data_gates.unwrap_or_default(),
			index_gates: c.index_gates.unwrap_or_default(),
			blob_stores: c.blob_stores.unwrap_or_default(),
			index_stores: c.index_stores.unwrap_or_default(),
		},
		None => CatalogConfig {
			endpoint: read_env(CATALOG_ENDPOINT_VAR)?,
			data_gates: Vec::new(),
			index_gates: Vec::new(),
			blob_stores: Vec::new(),
			index_stores: Vec::new(),
		},
	};

	// The storage settings come from the section matching the role.
	let (base_config, sync_config, naming_config) = match role {
		Role::IndexStore => match index_store {
			Some(s) => (s.base_dir, s.sync, None),
			None => (None, None, None),
		},
		Role::BlobStore => match blob_store {
			Some(s) => (s.base_dir, s.sync, s.naming),
			None => (None, None, None),
		},
		_ => (None, None, None),
	};

	let base_env: Option<PathBuf> = read_env(BASE_DIR_VAR)?.map(PathBuf::from);
	let base_dir = base_env.or(base_config);

	let sync_env: Option<SyncPolicy> = parse_env(SYNC_VAR)?;
	let sync_config: Option<SyncPolicy> = sync_config
		.map(|raw| raw.parse().map_err(|e| format!("Unable to parse the sync policy: {}", e)))
		.transpose()?;
	let sync = sync_env.or(sync_config).unwrap_or_default();

	let naming_env: Option<NamingPolicy> = parse_env(NAMING_VAR)?;
	let naming_config: Option<NamingPolicy> = naming_config
		.map(|raw| raw.parse().map_err(|e| format!("Unable to parse the naming policy: {}", e)))
		.transpose()?;
	let naming = naming_env.or(naming_config).unwrap_or(NamingPolicy::PostNamed);

	Ok(Configuration {
		role,
		bind_address,
		announce_address,
		log_level,
		log_json,
		catalog,
		base_dir,
		sync,
		naming,
		io_error_window: Duration::from_secs(io_window.unwrap_or(30)),
		full_error_window: Duration::from_secs(full_window.unwrap_or(30)),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write as _;

	fn write_config(body: &str) -> tempfile::NamedTempFile {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(body.as_bytes()).unwrap();
		file
	}

	#[test]
	fn minimal_blob_store_configuration() {
		let file = write_config(
			r#"
[server]
role = "blob-store"
bind_address = "127.0.0.1:6010"

[blob_store]
base_dir = "/tmp/blobs"
naming = "pre"
sync = "fsync"
"#,
		);
		let cfg = load_configuration(file.path().to_str().unwrap()).unwrap();
		assert_eq!(cfg.role, Role::BlobStore);
		assert_eq!(cfg.announce_address, "127.0.0.1:6010");
		assert_eq!(cfg.naming, NamingPolicy::PreNamed);
		assert_eq!(cfg.sync, SyncPolicy::Full);
		assert_eq!(cfg.base_dir, Some(PathBuf::from("/tmp/blobs")));
	}

	#[test]
	fn the_role_is_mandatory() {
		let file = write_config("[server]\nbind_address = \"127.0.0.1:6010\"\n");
		let err = load_configuration(file.path().to_str().unwrap()).unwrap_err();
		assert!(err.contains(ROLE_VAR), "unexpected message: {}", err);
	}

	#[test]
	fn static_catalog_lists_are_read() {
		let file = write_config(
			r#"
[server]
role = "index-gate"
bind_address = "127.0.0.1:6000"

[catalog]
index_stores = ["127.0.0.1:6021", "127.0.0.1:6022"]
"#,
		);
		let cfg = load_configuration(file.path().to_str().unwrap()).unwrap();
		assert_eq!(cfg.catalog.index_stores.len(), 2);
		assert!(cfg.catalog.endpoint.is_none());
	}
}
