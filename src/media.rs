// 🎬 Media assets - the safer-use video and the sidebar image
//
// The core never decodes these; it only locates them and hands the bytes
// (or the path) to whichever front end is rendering.

use crate::config::MediaSection;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    pub fn title(&self) -> &'static str {
        match self {
            MediaKind::Video => "Video on Safer Use of Cannabis",
            MediaKind::Image => "Sidebar Image",
        }
    }

    /// MIME type guessed from the file extension
    pub fn content_type(&self, path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match (self, ext.as_deref()) {
            (MediaKind::Video, Some("webm")) => "video/webm",
            (MediaKind::Video, _) => "video/mp4",
            (MediaKind::Image, Some("png")) => "image/png",
            (MediaKind::Image, Some("gif")) => "image/gif",
            (MediaKind::Image, _) => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaAsset {
    pub kind: MediaKind,
    pub path: PathBuf,
    /// File size in bytes; `None` when the file is missing
    pub size: Option<u64>,
}

impl MediaAsset {
    pub fn probe(kind: MediaKind, path: &Path) -> Self {
        let size = std::fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len());
        if size.is_none() {
            tracing::warn!(path = %path.display(), kind = ?kind, "Media asset not found");
        }
        Self {
            kind,
            path: path.to_path_buf(),
            size,
        }
    }

    pub fn is_available(&self) -> bool {
        self.size.is_some()
    }

    /// File name used in `/media/...` URLs
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.path)
            .with_context(|| format!("Failed to read media file {}", self.path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaAssets {
    pub video: MediaAsset,
    pub image: MediaAsset,
}

impl MediaAssets {
    pub fn probe(section: &MediaSection) -> Self {
        Self {
            video: MediaAsset::probe(MediaKind::Video, &section.video),
            image: MediaAsset::probe(MediaKind::Image, &section.image),
        }
    }

    /// Look an asset up by the file name a client asked for.
    pub fn by_file_name(&self, name: &str) -> Option<&MediaAsset> {
        [&self.video, &self.image]
            .into_iter()
            .find(|a| a.file_name() == Some(name))
    }
}
