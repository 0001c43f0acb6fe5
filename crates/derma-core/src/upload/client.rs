use std::path::PathBuf;

use tracing::{debug, error};

use crate::api::{ApiClient, UploadError};
use crate::auth::BearerToken;

use super::{load_jpeg, JpegImage};

/// Multipart field the server reads the image from
pub const FIELD_NAME: &str = "file";

/// Filename sent with every upload
pub const FILENAME: &str = "image.jpg";

pub const JPEG_MIME_TYPE: &str = "image/jpeg";

/// One upload attempt. Built fresh per upload and consumed by sending it.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub payload: Vec<u8>,
    pub mime_type: &'static str,
    pub filename: &'static str,
    pub field_name: &'static str,
    pub token: BearerToken,
}

impl UploadRequest {
    pub fn jpeg(image: &JpegImage, token: &BearerToken) -> Self {
        Self {
            payload: image.bytes.clone(),
            mime_type: JPEG_MIME_TYPE,
            filename: FILENAME,
            field_name: FIELD_NAME,
            token: token.clone(),
        }
    }
}

/// Server response to an accepted upload. The body is not interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAck {
    pub status: u16,
    pub body: String,
}

#[derive(Clone, Debug)]
pub struct UploadClient {
    api: ApiClient,
    quality: u8,
}

impl UploadClient {
    pub fn new(api: ApiClient, quality: u8) -> Self {
        Self { api, quality }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Upload an already-encoded JPEG. Failures are final for this attempt.
    pub async fn upload(&self, image: &JpegImage, token: &BearerToken) -> Result<ServerAck, UploadError> {
        if image.is_empty() {
            return Err(UploadError::Encode("image is empty".to_string()));
        }

        let request = UploadRequest::jpeg(image, token);
        match self.api.upload_image(request).await {
            Ok(ack) => Ok(ack),
            Err(e) => {
                error!(error = %e, "Upload failed");
                Err(e)
            }
        }
    }

    /// Decode the file at `path` and encode it once at the configured
    /// quality. Runs on the blocking pool.
    pub async fn prepare(&self, path: PathBuf) -> Result<JpegImage, UploadError> {
        let quality = self.quality;
        let image = tokio::task::spawn_blocking(move || load_jpeg(&path, quality))
            .await
            .map_err(|e| UploadError::Encode(format!("encoder task failed: {}", e)))??;
        debug!(bytes = image.len(), "Image ready for upload");
        Ok(image)
    }

    /// Encode the file at `path` and upload it
    pub async fn upload_file(&self, path: PathBuf, token: &BearerToken) -> Result<ServerAck, UploadError> {
        let image = self.prepare(path).await?;
        self.upload(&image, token).await
    }
}
