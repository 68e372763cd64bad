use base64::Engine;
use image::ImageFormat;

/// Default upload ceiling: 10 MB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// An uploaded image that passed validation.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub format: ImageFormat,
    pub data: Vec<u8>,
}

impl ImageUpload {
    /// Validate raw upload bytes.
    ///
    /// `content_type` is the client-declared MIME type, if any; it must be an
    /// `image/*` type. The bytes themselves must also sniff as an image.
    pub fn from_parts(
        file_name: Option<&str>,
        content_type: Option<&str>,
        data: Vec<u8>,
        max_bytes: usize,
    ) -> Result<Self, UploadError> {
        if data.is_empty() {
            return Err(UploadError::Empty);
        }
        if data.len() > max_bytes {
            return Err(UploadError::TooLarge {
                size: data.len(),
                max: max_bytes,
            });
        }
        if let Some(ct) = content_type {
            if !ct.starts_with("image/") {
                return Err(UploadError::NotAnImage(ct.to_string()));
            }
        }

        let format = image::guess_format(&data)
            .map_err(|_| UploadError::NotAnImage("unrecognized image data".to_string()))?;

        let file_name = file_name
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload.{}", format.extensions_str().first().unwrap_or(&"img")));

        Ok(Self {
            file_name,
            format,
            data,
        })
    }

    /// Image body as bare base64, without a `data:` URL prefix.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No image data received")]
    Empty,

    #[error("Image is {size} bytes, the limit is {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("Only image files are accepted ({0})")]
    NotAnImage(String),
}
