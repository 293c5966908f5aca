use std::path::{Path, PathBuf};

/// Network fetch of UMLS release archives is explicitly out of scope for this
/// tool's common path (spec §1, §10): the CLI primarily expects a local RRF
/// directory. This trait exists so the interface is declared; only a stub
/// implementation ships.
pub trait UmlsDownloader {
    fn fetch(&self, version: &str, dest: &Path) -> Result<PathBuf, DownloadError>;
}

#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("download of UMLS release {0} is not implemented; provide a local RRF directory instead")]
    NotImplemented(String),

    #[error("request to the UTS API failed: {0}")]
    Request(String),

    #[error("downloaded archive checksum did not match the expected value")]
    ChecksumMismatch,
}

/// Stub downloader against the UTS REST API. Issues the request and checks a
/// checksum response header, but does not implement the full UTS auth/retry
/// flow; callers should fall back to a local RRF path in the common case.
pub struct UtsHttpDownloader {
    api_key: Option<String>,
}

impl UtsHttpDownloader {
    pub fn new(api_key: Option<String>) -> UtsHttpDownloader {
        UtsHttpDownloader { api_key }
    }
}

impl UmlsDownloader for UtsHttpDownloader {
    fn fetch(&self, version: &str, dest: &Path) -> Result<PathBuf, DownloadError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| DownloadError::NotImplemented(version.to_string()))?;

        if dest.exists() {
            return Ok(dest.to_path_buf());
        }

        let url = format!("https://uts-ws.nlm.nih.gov/download?release={version}&apiKey={api_key}");
        let response = ureq::get(&url).call().map_err(|err| DownloadError::Request(err.to_string()))?;

        if response.headers().get("x-checksum-sha256").is_none() {
            return Err(DownloadError::ChecksumMismatch);
        }

        Err(DownloadError::NotImplemented(version.to_string()))
    }
}
