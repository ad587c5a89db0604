//! Transformation input: plain text or a media attachment
//!
//! Media is not assumed to survive a queue transport, so it has an
//! [`EncodedMedia`] form (type tag + base64 payload + optional mime/title)
//! that decodes back into the exact same [`Media`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Kind of media attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Document,
    Audio,
    Video,
}

impl MediaKind {
    /// Best-effort guess from a file extension
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" => Some(MediaKind::Image),
            "pdf" | "txt" | "md" | "csv" | "html" => Some(MediaKind::Document),
            "mp3" | "wav" | "ogg" | "flac" | "m4a" => Some(MediaKind::Audio),
            "mp4" | "mov" | "webm" | "mkv" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Document => write!(f, "document"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Rich media value passed to a transformer
#[derive(Clone, PartialEq, Eq)]
pub struct Media {
    kind: MediaKind,
    data: Vec<u8>,
    mime_type: Option<String>,
    title: Option<String>,
}

impl fmt::Debug for Media {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Media")
            .field("kind", &self.kind)
            .field("bytes", &self.data.len())
            .field("mime_type", &self.mime_type)
            .field("title", &self.title)
            .finish()
    }
}

/// Options applied when loading media from disk
#[derive(Debug, Clone, Default)]
pub struct MediaOptions {
    /// Overrides the kind guessed from the file extension
    pub kind: Option<MediaKind>,
    pub mime_type: Option<String>,
    /// Defaults to the file name
    pub title: Option<String>,
}

impl Media {
    /// Create media from raw bytes
    pub fn new(kind: MediaKind, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            data: data.into(),
            mime_type: None,
            title: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Read a file eagerly so that I/O failures surface before dispatch
    pub async fn from_path(path: impl AsRef<Path>, options: MediaOptions) -> Result<Self> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

        let kind = match options.kind.or_else(|| MediaKind::from_extension(extension)) {
            Some(kind) => kind,
            None => {
                return Err(Error::media(format!(
                    "Cannot infer media kind for {}; pass an explicit kind",
                    path.display()
                )))
            }
        };

        let data = tokio::fs::read(path).await.map_err(|e| Error::Media {
            message: format!("Failed to read {}: {}", path.display(), e),
            source: Some(e.into()),
        })?;

        let title = options.title.or_else(|| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|s| s.to_string())
        });

        Ok(Self {
            kind,
            data,
            mime_type: options.mime_type.or_else(|| guess_mime_type(extension)),
            title,
        })
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Base64 of the raw bytes
    pub fn base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// Reduce to the transport-safe form
    pub fn encode(&self) -> EncodedMedia {
        EncodedMedia {
            kind: self.kind,
            base64: self.base64(),
            mime_type: self.mime_type.clone(),
            title: self.title.clone(),
        }
    }
}

/// Transport-safe media encoding used in queued job payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedMedia {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub base64: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl EncodedMedia {
    /// Rebuild the rich media value
    pub fn decode(&self) -> Result<Media> {
        let data = STANDARD.decode(self.base64.as_bytes()).map_err(|e| Error::Media {
            message: format!("Invalid base64 payload for {} media: {}", self.kind, e),
            source: Some(e.into()),
        })?;

        Ok(Media {
            kind: self.kind,
            data,
            mime_type: self.mime_type.clone(),
            title: self.title.clone(),
        })
    }
}

fn guess_mime_type(extension: &str) -> Option<String> {
    let mime = match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" => "text/html",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime.to_string())
}

/// Content handed to a transformer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Media(Media),
}

impl Content {
    /// The text, when this is textual content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Media(_) => None,
        }
    }

    /// Short human-readable description for logs and events
    pub fn summary(&self) -> String {
        match self {
            Content::Text(text) => {
                let preview: String = text.chars().take(80).collect();
                if preview.len() < text.len() {
                    format!("{}...", preview)
                } else {
                    preview
                }
            }
            Content::Media(media) => format!(
                "{} media '{}' ({} bytes)",
                media.kind(),
                media.title().unwrap_or("untitled"),
                media.data().len()
            ),
        }
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<Media> for Content {
    fn from(media: Media) -> Self {
        Content::Media(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_encode_decode_preserves_bytes_and_metadata() {
        let bytes: Vec<u8> = (0u8..=255).collect();
        let media = Media::new(MediaKind::Document, bytes.clone())
            .with_mime_type("application/pdf")
            .with_title("Quarterly report");

        let encoded = media.encode();
        assert_eq!(encoded.kind, MediaKind::Document);

        let decoded = encoded.decode().unwrap();
        assert_eq!(decoded.data(), bytes.as_slice());
        assert_eq!(decoded.title(), Some("Quarterly report"));
        assert_eq!(decoded.mime_type(), Some("application/pdf"));
        assert_eq!(decoded, media);
    }

    #[test]
    fn test_encoded_media_wire_shape() {
        let encoded = Media::new(MediaKind::Image, vec![1, 2, 3]).encode();
        let value = serde_json::to_value(&encoded).unwrap();
        assert_eq!(value["type"], "image");
        assert_eq!(value["base64"], "AQID");
        assert!(value.get("title").is_none());
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        let encoded = EncodedMedia {
            kind: MediaKind::Audio,
            base64: "not base64!!".to_string(),
            mime_type: None,
            title: None,
        };
        assert!(matches!(encoded.decode(), Err(Error::Media { .. })));
    }

    #[tokio::test]
    async fn test_from_path_infers_kind_mime_and_title() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&[0x89, b'P', b'N', b'G']).unwrap();

        let media = Media::from_path(file.path(), MediaOptions::default()).await.unwrap();
        assert_eq!(media.kind(), MediaKind::Image);
        assert_eq!(media.mime_type(), Some("image/png"));
        assert_eq!(media.data().len(), 4);
        assert!(media.title().unwrap().ends_with(".png"));
    }

    #[tokio::test]
    async fn test_from_path_missing_file_fails_immediately() {
        let result = Media::from_path("/definitely/not/here.pdf", MediaOptions::default()).await;
        assert!(matches!(result, Err(Error::Media { .. })));
    }

    #[test]
    fn test_content_summary_truncates_long_text() {
        let content = Content::from("x".repeat(200));
        assert_eq!(content.summary().len(), 83);
        assert_eq!(Content::from("short").summary(), "short");
    }
}
