//! External file references with SHA-256 integrity verification

use crate::error::{UnrdfError, UnrdfResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// `{ uri, sha256 }` reference to external content (query text, shapes)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub uri: String,
    pub sha256: String,
}

/// Port for resolving file references. Loads the full contents, computes
/// SHA-256 and compares byte-for-byte; a mismatch is a hard error.
#[async_trait]
pub trait FileResolver: Send + Sync {
    async fn load(&self, reference: &FileRef) -> UnrdfResult<String>;
}

/// Filesystem-backed resolver for `file://` URIs and bare paths
#[derive(Debug, Clone, Default)]
pub struct FsFileResolver {
    /// Base directory for relative paths
    pub root: Option<PathBuf>,
}

impl FsFileResolver {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn resolve_path(&self, uri: &str) -> PathBuf {
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        let path = PathBuf::from(path);
        match (&self.root, path.is_relative()) {
            (Some(root), true) => root.join(path),
            _ => path,
        }
    }
}

#[async_trait]
impl FileResolver for FsFileResolver {
    async fn load(&self, reference: &FileRef) -> UnrdfResult<String> {
        let path = self.resolve_path(&reference.uri);
        let contents = tokio::fs::read(&path).await?;

        let mut hasher = Sha256::new();
        hasher.update(&contents);
        let actual = hex::encode(hasher.finalize());
        if !actual.eq_ignore_ascii_case(&reference.sha256) {
            return Err(UnrdfError::Integrity {
                uri: reference.uri.clone(),
                expected: reference.sha256.clone(),
                actual,
            });
        }

        String::from_utf8(contents)
            .map_err(|e| UnrdfError::Validation(format!("file {} is not UTF-8: {e}", reference.uri)))
    }
}
