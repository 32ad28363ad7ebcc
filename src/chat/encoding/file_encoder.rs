//! File encoder: raw file reference in, base64 payload out.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::chat::core::errors::ReadError;
use crate::chat::encoding::media_type::media_type_for;

/// Name sent for files that carry no usable file name.
pub const UNTITLED_FILE_NAME: &str = "Untitled";

/// Boxed future type for file reads.
pub type ReadFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single encode shared between every party interested in its result.
pub type SharedEncode = Shared<BoxFuture<'static, Result<EncodedFile, ReadError>>>;

/// Reference to a file the user picked or dropped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileRef {
    path: PathBuf,
    name: Option<String>,
    media_type: Option<String>,
}

impl FileRef {
    /// Reference a file on disk.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: None,
            media_type: None,
        }
    }

    /// Override the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Declare the media type instead of inferring it.
    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Location of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name shown in the transcript and sent to the ingestion endpoint.
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|name| !name.trim().is_empty()) {
            return name.to_string();
        }
        self.path.file_name().map_or_else(
            || UNTITLED_FILE_NAME.to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }

    /// Declared media type, or one inferred from the extension.
    #[must_use]
    pub fn media_type(&self) -> String {
        self.media_type
            .as_deref()
            .filter(|media_type| !media_type.trim().is_empty())
            .unwrap_or_else(|| media_type_for(&self.path))
            .to_string()
    }
}

/// Transport-ready form of a file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncodedFile {
    /// File name.
    pub name: String,
    /// Declared media type.
    pub media_type: String,
    /// Base64 (standard alphabet, padded) file content.
    pub data: String,
}

impl EncodedFile {
    /// Encode raw bytes.
    #[must_use]
    pub fn from_bytes(name: impl Into<String>, media_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    /// Decode the payload back to the original bytes.
    ///
    /// # Errors
    /// Returns an error if `data` is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.data)
    }
}

/// Source of raw file bytes.
pub trait FileReader: Send + Sync {
    /// Read the whole file.
    ///
    /// # Errors
    /// Returns an error if the file is missing or the read is interrupted.
    fn read<'a>(&'a self, file: &'a FileRef) -> ReadFuture<'a, std::io::Result<Vec<u8>>>;
}

/// Reads files from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsFileReader;

impl FileReader for FsFileReader {
    fn read<'a>(&'a self, file: &'a FileRef) -> ReadFuture<'a, std::io::Result<Vec<u8>>> {
        Box::pin(tokio::fs::read(file.path()))
    }
}

/// Stateless encoder over a [`FileReader`].
#[derive(Clone)]
pub struct FileEncoder {
    reader: Arc<dyn FileReader>,
}

impl FileEncoder {
    /// Create an encoder over the given reader.
    #[must_use]
    pub fn new(reader: Arc<dyn FileReader>) -> Self {
        Self { reader }
    }

    /// Create an encoder reading from the local filesystem.
    #[must_use]
    pub fn filesystem() -> Self {
        Self::new(Arc::new(FsFileReader))
    }

    /// Read and encode a file. The read is the only suspension point.
    ///
    /// # Errors
    /// Returns [`ReadError`] if the file cannot be read.
    pub async fn encode(&self, file: &FileRef) -> Result<EncodedFile, ReadError> {
        let name = file.display_name();
        let bytes = self
            .reader
            .read(file)
            .await
            .map_err(|err| ReadError::new(name.clone(), err))?;
        Ok(EncodedFile::from_bytes(name, file.media_type(), &bytes))
    }

    /// Start an encode whose result can be awaited from several places.
    ///
    /// Nothing is read until the returned future is first polled.
    #[must_use]
    pub fn encode_shared(&self, file: FileRef) -> SharedEncode {
        let encoder = self.clone();
        async move { encoder.encode(&file).await }.boxed().shared()
    }
}
