use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use api::blob_id::BlobId;
use api::error::GkError;
use async_trait::async_trait;
use rand::Rng;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::engine::SyncPolicy;

/// Directory fan-out of the client-named repository: one level of 3 chars.
pub const PRE_NAMED_HASH_WIDTH: usize = 3;
/// Directory fan-out depth of the client-named repository.
pub const PRE_NAMED_HASH_DEPTH: usize = 1;
/// Directory fan-out of the server-named repository: one level of 4 chars.
pub const POST_NAMED_HASH_WIDTH: usize = 4;

/// A blob repository: creates writable blobs, reopens committed ones,
/// unlinks them.
///
/// Two variants exist. *Pre-named* blobs keep the client supplied encoded
/// [`BlobId`] as their name; *post-named* blobs get a server chosen name the
/// client learns at commit time and records through the index plane.
#[async_trait]
pub trait BlobRepo: Send + Sync {
	/// Starts a new blob. The returned builder owns a file the body streams
	/// into; nothing is visible until `commit`.
	async fn create(&self, id: &BlobId) -> Result<Box<dyn BlobBuilder>, GkError>;

	/// Reopens a committed blob by its real id.
	async fn open(&self, real_id: &str) -> Result<BlobReader, GkError>;

	/// Unlinks a committed blob by its real id.
	async fn delete(&self, real_id: &str) -> Result<(), GkError>;
}

/// A blob under construction, exclusively owned by one request.
#[async_trait]
pub trait BlobBuilder: Send {
	/// The writer the request body streams into.
	fn stream(&mut self) -> &mut File;

	/// Seals the blob and returns its real id (the relative path a reader
	/// uses from now on).
	async fn commit(self: Box<Self>) -> Result<String, GkError>;

	/// Drops the blob under construction and unlinks its file.
	async fn abort(self: Box<Self>) -> Result<(), GkError>;
}

/// A committed blob opened for reading.
pub struct BlobReader {
	file: File,
	size: u64,
}

impl BlobReader {
	/// Size of the blob in bytes, from the file metadata.
	pub fn size(&self) -> u64 {
		self.size
	}

	/// Hands the underlying file over for streaming.
	pub fn into_file(self) -> File {
		self.file
	}
}

fn nanos_now() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0)
}

/// Splits `objname` into `hash_depth` directory segments of `hash_width`
/// chars plus the remainder.
fn hashed_relpath(objname: &str, width: usize, depth: usize) -> Result<String, GkError> {
	if objname.contains('/') {
		return Err(GkError::InvalidArgument("blob name may not contain '/'".to_string()));
	}
	if objname.len() <= width * depth {
		return Err(GkError::InvalidArgument("blob name too short".to_string()));
	}
	let mut out = String::with_capacity(objname.len() + depth);
	for level in 0..depth {
		let start = level * width;
		let segment = objname
			.get(start..start + width)
			.ok_or_else(|| GkError::InvalidArgument("blob name not sliceable".to_string()))?;
		out.push_str(segment);
		out.push('/');
	}
	out.push_str(
		objname
			.get(width * depth..)
			.ok_or_else(|| GkError::InvalidArgument("blob name not sliceable".to_string()))?,
	);
	Ok(out)
}

/// Rejects ids that would escape the repository base directory.
fn safe_relpath(real_id: &str) -> Result<&Path, GkError> {
	let path = Path::new(real_id);
	let sane = !real_id.is_empty()
		&& !path.is_absolute()
		&& path.components().all(|c| matches!(c, Component::Normal(_)));
	if !sane {
		return Err(GkError::InvalidArgument(format!("unsafe blob path {:?}", real_id)));
	}
	Ok(path)
}

/// Creates `path` exclusively, making the missing parent directories on the
/// first failure.
async fn create_exclusive(path: &Path) -> Result<File, GkError> {
	let attempt = OpenOptions::new().write(true).create_new(true).open(path).await;
	match attempt {
		Ok(file) => Ok(file),
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
			if let Some(parent) = path.parent() {
				fs::create_dir_all(parent).await?;
			}
			Ok(OpenOptions::new().write(true).create_new(true).open(path).await?)
		},
		Err(err) => Err(err.into()),
	}
}

async fn sync_file(file: &File, sync: SyncPolicy) -> Result<(), GkError> {
	match sync {
		SyncPolicy::None => Ok(()),
		SyncPolicy::Data => Ok(file.sync_data().await?),
		SyncPolicy::Full => Ok(file.sync_all().await?),
	}
}

async fn open_reader(path: PathBuf) -> Result<BlobReader, GkError> {
	let file = File::open(path).await?;
	let size = file.metadata().await?.len();
	Ok(BlobReader { file, size })
}

/// Repository keeping the client supplied encoded id as the object name.
///
/// The file is built under a temporary name (the first `,` becomes `@`) and
/// atomically renamed at commit time.
pub struct PreNamedRepo {
	base: PathBuf,
	hash_width: usize,
	hash_depth: usize,
	sync: SyncPolicy,
}

impl PreNamedRepo {
	/// Opens the repository rooted at an existing `base_dir`.
	pub fn new(base_dir: impl AsRef<Path>, sync: SyncPolicy) -> Result<Self, GkError> {
		let base = base_dir.as_ref().to_path_buf();
		if !std::fs::metadata(&base)?.is_dir() {
			return Err(GkError::InvalidArgument(format!("{:?} is not a directory", base)));
		}
		Ok(Self {
			base,
			hash_width: PRE_NAMED_HASH_WIDTH,
			hash_depth: PRE_NAMED_HASH_DEPTH,
			sync,
		})
	}

	fn relpath(&self, objname: &str) -> Result<String, GkError> {
		hashed_relpath(objname, self.hash_width, self.hash_depth)
	}
}

#[async_trait]
impl BlobRepo for PreNamedRepo {
	async fn create(&self, id: &BlobId) -> Result<Box<dyn BlobBuilder>, GkError> {
		let final_rel = self.relpath(&id.encode())?;
		let temp_rel = final_rel.replacen(',', "@", 1);
		if temp_rel == final_rel {
			return Err(GkError::Malformed("blob path without a separator".to_string()));
		}
		let temp_abs = self.base.join(&temp_rel);
		let file = create_exclusive(&temp_abs).await?;
		Ok(Box::new(PreNamedBuilder {
			file,
			temp_abs,
			final_abs: self.base.join(&final_rel),
			final_rel,
			sync: self.sync,
		}))
	}

	async fn open(&self, real_id: &str) -> Result<BlobReader, GkError> {
		let rel = self.relpath(real_id)?;
		open_reader(self.base.join(rel)).await
	}

	async fn delete(&self, real_id: &str) -> Result<(), GkError> {
		let rel = self.relpath(real_id)?;
		Ok(fs::remove_file(self.base.join(rel)).await?)
	}
}

struct PreNamedBuilder {
	file: File,
	temp_abs: PathBuf,
	final_abs: PathBuf,
	final_rel: String,
	sync: SyncPolicy,
}

#[async_trait]
impl BlobBuilder for PreNamedBuilder {
	fn stream(&mut self) -> &mut File {
		&mut self.file
	}

	async fn commit(self: Box<Self>) -> Result<String, GkError> {
		let PreNamedBuilder { mut file, temp_abs, final_abs, final_rel, sync } = *self;
		file.flush().await?;
		sync_file(&file, sync).await?;
		drop(file);
		fs::rename(&temp_abs, &final_abs).await?;
		Ok(final_rel)
	}

	async fn abort(self: Box<Self>) -> Result<(), GkError> {
		let PreNamedBuilder { file, temp_abs, .. } = *self;
		drop(file);
		Ok(fs::remove_file(&temp_abs).await?)
	}
}

/// Repository naming blobs itself: a coarse timestamp plus a random field,
/// fanned out under a width-4 prefix. The caller learns the real id at
/// commit time.
pub struct PostNamedRepo {
	base: PathBuf,
	hash_width: usize,
	sync: SyncPolicy,
}

impl PostNamedRepo {
	/// Opens the repository rooted at an existing `base_dir`.
	pub fn new(base_dir: impl AsRef<Path>, sync: SyncPolicy) -> Result<Self, GkError> {
		let base = base_dir.as_ref().to_path_buf();
		if !std::fs::metadata(&base)?.is_dir() {
			return Err(GkError::InvalidArgument(format!("{:?} is not a directory", base)));
		}
		Ok(Self { base, hash_width: POST_NAMED_HASH_WIDTH, sync })
	}

	fn next_id(&self) -> String {
		let coarse = (nanos_now() / (1024 * 1024 * 256)) % 65536;
		let noise: u32 = rand::thread_rng().gen_range(0..(1 << 20));
		format!("{:04X}{:05X}", coarse, noise)
	}
}

#[async_trait]
impl BlobRepo for PostNamedRepo {
	async fn create(&self, _id: &BlobId) -> Result<Box<dyn BlobBuilder>, GkError> {
		let rel = hashed_relpath(&self.next_id(), self.hash_width, 1)?;
		let abs = self.base.join(&rel);
		let file = create_exclusive(&abs).await?;
		Ok(Box::new(PostNamedBuilder { file, abs, rel, sync: self.sync }))
	}

	async fn open(&self, real_id: &str) -> Result<BlobReader, GkError> {
		let rel = safe_relpath(real_id)?;
		open_reader(self.base.join(rel)).await
	}

	async fn delete(&self, real_id: &str) -> Result<(), GkError> {
		let rel = safe_relpath(real_id)?;
		Ok(fs::remove_file(self.base.join(rel)).await?)
	}
}

struct PostNamedBuilder {
	file: File,
	abs: PathBuf,
	rel: String,
	sync: SyncPolicy,
}

#[async_trait]
impl BlobBuilder for PostNamedBuilder {
	fn stream(&mut self) -> &mut File {
		&mut self.file
	}

	async fn commit(self: Box<Self>) -> Result<String, GkError> {
		let PostNamedBuilder { mut file, rel, sync, .. } = *self;
		file.flush().await?;
		sync_file(&file, sync).await?;
		Ok(rel)
	}

	async fn abort(self: Box<Self>) -> Result<(), GkError> {
		let PostNamedBuilder { file, abs, .. } = *self;
		drop(file);
		Ok(fs::remove_file(&abs).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tokio::io::AsyncReadExt;

	fn count_files(dir: &Path) -> usize {
		let mut total = 0;
		for entry in std::fs::read_dir(dir).unwrap() {
			let entry = entry.unwrap();
			if entry.file_type().unwrap().is_dir() {
				total += count_files(&entry.path());
			} else {
				total += 1;
			}
		}
		total
	}

	fn part() -> BlobId {
		BlobId {
			bucket: "bkt".to_string(),
			content: "obj".to_string(),
			part_id: "p0".to_string(),
			position: 0,
		}
	}

	#[tokio::test]
	async fn pre_named_commit_leaves_exactly_one_file() {
		let dir = tempfile::TempDir::new().unwrap();
		let repo = PreNamedRepo::new(dir.path(), SyncPolicy::None).unwrap();

		let mut builder = repo.create(&part()).await.unwrap();
		builder.stream().write_all(b"hello").await.unwrap();
		let real_id = builder.commit().await.unwrap();

		assert_eq!(real_id, "bkt/,obj,p0,0");
		assert_eq!(count_files(dir.path()), 1);
		assert!(dir.path().join(&real_id).is_file());
	}

	#[tokio::test]
	async fn pre_named_abort_leaves_zero_files() {
		let dir = tempfile::TempDir::new().unwrap();
		let repo = PreNamedRepo::new(dir.path(), SyncPolicy::None).unwrap();

		let mut builder = repo.create(&part()).await.unwrap();
		builder.stream().write_all(b"hello").await.unwrap();
		builder.abort().await.unwrap();

		assert_eq!(count_files(dir.path()), 0);
	}

	#[tokio::test]
	async fn pre_named_open_uses_the_encoded_name() {
		let dir = tempfile::TempDir::new().unwrap();
		let repo = PreNamedRepo::new(dir.path(), SyncPolicy::None).unwrap();

		let mut builder = repo.create(&part()).await.unwrap();
		builder.stream().write_all(b"hello").await.unwrap();
		builder.commit().await.unwrap();

		let reader = repo.open(&part().encode()).await.unwrap();
		assert_eq!(reader.size(), 5);
		let mut body = Vec::new();
		reader.into_file().read_to_end(&mut body).await.unwrap();
		assert_eq!(body, b"hello");

		repo.delete(&part().encode()).await.unwrap();
		assert_eq!(count_files(dir.path()), 0);
	}

	#[tokio::test]
	async fn post_named_commit_returns_the_server_chosen_path() {
		let dir = tempfile::TempDir::new().unwrap();
		let repo = PostNamedRepo::new(dir.path(), SyncPolicy::None).unwrap();

		let mut builder = repo.create(&part()).await.unwrap();
		builder.stream().write_all(b"body").await.unwrap();
		let real_id = builder.commit().await.unwrap();

		// 4 hex chars, a separator, then the random field.
		assert_eq!(real_id.chars().nth(POST_NAMED_HASH_WIDTH), Some('/'));
		assert_eq!(count_files(dir.path()), 1);

		let reader = repo.open(&real_id).await.unwrap();
		assert_eq!(reader.size(), 4);

		repo.delete(&real_id).await.unwrap();
		assert!(matches!(repo.open(&real_id).await, Err(GkError::NotFound(_))));
	}

	#[tokio::test]
	async fn post_named_rejects_escaping_paths() {
		let dir = tempfile::TempDir::new().unwrap();
		let repo = PostNamedRepo::new(dir.path(), SyncPolicy::None).unwrap();

		for bad in ["../x", "/etc/passwd", ""] {
			assert!(matches!(repo.open(bad).await, Err(GkError::InvalidArgument(_))));
		}
	}
}
