use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::Utc;
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use super::{Folder, UploadPurpose};

/// Public URL prefix the upload root is mounted under.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// A file received in a multipart request, fully buffered and already type-checked.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub purpose: UploadPurpose,
    pub original_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Where an upload ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
    pub original_name: String,
    /// `/uploads/{folder}/{filename}`
    pub url: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn folder_path(&self, folder: Folder) -> PathBuf {
        self.root.join(folder.as_str())
    }

    pub async fn ensure_dirs(&self) -> io::Result<()> {
        for folder in [Folder::Profiles, Folder::Documents] {
            tokio::fs::create_dir_all(self.folder_path(folder)).await?;
        }
        info!("Upload directories ready under {}", self.root.display());
        Ok(())
    }

    /// Writes the file under a freshly generated name.
    pub async fn save(&self, file: &IncomingFile, owner: Option<Uuid>) -> io::Result<StoredFile> {
        let filename = generate_filename(
            file.purpose,
            owner,
            &file.original_name,
            &file.content_type,
        );
        let folder = file.purpose.folder();
        let path = self.folder_path(folder).join(&filename);
        tokio::fs::write(&path, &file.bytes).await?;

        Ok(StoredFile {
            url: public_url(folder, &filename),
            filename,
            original_name: file.original_name.clone(),
            size: file.bytes.len() as u64,
        })
    }

    /// Maps a public URL back to disk, but only for a file this owner uploaded for
    /// `purpose`: right folder, name starting with `{prefix}-{owner}-`.
    pub fn owned_path(&self, url: &str, purpose: UploadPurpose, owner: Uuid) -> Option<PathBuf> {
        is_owned_by(url, purpose, owner)
            .then(|| local_file(url))
            .flatten()
            .map(|(folder, name)| self.folder_path(folder).join(name))
    }

    /// Deletes a file the owner stored for `purpose`. Never fails the caller: external
    /// URLs are skipped, foreign or malformed local URLs are refused with a warning, a
    /// missing file is ignored and any other error is logged.
    pub async fn remove_best_effort(&self, url: &str, purpose: UploadPurpose, owner: Uuid) {
        if !is_local_url(url) {
            return;
        }
        let Some(path) = self.owned_path(url, purpose, owner) else {
            warn!(url, user_id = %owner, purpose = purpose.field_name(), "Refusing to remove upload not owned by user");
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!(path = %path.display(), user_id = %owner, "Removed stored upload"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %path.display(),
                user_id = %owner,
                error = %e,
                "Failed to remove stored upload"
            ),
        }
    }
}

/// True for anything under the upload mount, well-formed or not.
pub fn is_local_url(url: &str) -> bool {
    url.trim_start().starts_with(&format!("{PUBLIC_PREFIX}/"))
}

/// Splits `/uploads/{folder}/{name}` when `name` is a bare filename in a known folder.
fn local_file(url: &str) -> Option<(Folder, &str)> {
    let rest = url.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
    let (folder, name) = rest.split_once('/')?;
    let folder = [Folder::Profiles, Folder::Documents]
        .into_iter()
        .find(|f| f.as_str() == folder)?;
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\']);
    plain.then_some((folder, name))
}

/// Whether `url` names a file generated by [`generate_filename`] for this owner and purpose.
pub fn is_owned_by(url: &str, purpose: UploadPurpose, owner: Uuid) -> bool {
    match local_file(url) {
        Some((folder, name)) => {
            folder == purpose.folder() && name.starts_with(&format!("{}-{owner}-", purpose.prefix()))
        }
        None => false,
    }
}

pub fn public_url(folder: Folder, filename: &str) -> String {
    format!("{PUBLIC_PREFIX}/{}/{filename}", folder.as_str())
}

/// `{prefix}-{userId|anonymous}-{epochMillis}-{random}{.ext}`
pub fn generate_filename(
    purpose: UploadPurpose,
    owner: Option<Uuid>,
    original_name: &str,
    content_type: &str,
) -> String {
    let owner = owner.map_or_else(|| "anonymous".to_string(), |id| id.to_string());
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    let ext = extension_for(original_name, content_type);
    format!("{}-{owner}-{millis}-{suffix}{ext}", purpose.prefix())
}

/// Extension of the client's filename, or the MIME type's first known extension.
fn extension_for(original_name: &str, content_type: &str) -> String {
    let from_name = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = from_name {
        return format!(".{}", ext.to_ascii_lowercase());
    }
    mime_guess::get_mime_extensions_str(content_type)
        .and_then(|exts| exts.first())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}
