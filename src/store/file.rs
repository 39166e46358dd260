//! Simple file-backed [`CredentialStore`] for single-node deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{TenantCredential, TenantId},
	store::{CredentialStore, StoreError, StoreFuture},
};

/// Persists tenant credentials to a JSON file after each upsert.
///
/// The snapshot is rewritten through a temporary sibling file that is fsynced and renamed
/// into place while the write lock is held, so a crash leaves either the old or the new
/// snapshot on disk.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<TenantId, TenantCredential>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the JSON snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<TenantId, TenantCredential>, StoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(HashMap::new());
		}

		let entries: Vec<TenantCredential> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries.into_iter().map(|credential| (credential.tenant.clone(), credential)).collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(
		&self,
		contents: &HashMap<TenantId, TenantCredential>,
	) -> Result<(), StoreError> {
		let mut snapshot: Vec<_> = contents.values().collect();

		snapshot.sort_by(|a, b| a.tenant.cmp(&b.tenant));

		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl CredentialStore for FileStore {
	fn fetch<'a>(&'a self, tenant: &'a TenantId) -> StoreFuture<'a, Option<TenantCredential>> {
		Box::pin(async move { Ok(self.inner.read().get(tenant).cloned()) })
	}

	fn upsert(&self, credential: TenantCredential) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let previous = guard.insert(credential.tenant.clone(), credential.clone());

			if let Err(e) = self.persist_locked(&guard) {
				// Keep memory consistent with the last snapshot that reached disk.
				match previous {
					Some(previous) => guard.insert(credential.tenant.clone(), previous),
					None => guard.remove(&credential.tenant),
				};

				return Err(e);
			}

			Ok(())
		})
	}
}
