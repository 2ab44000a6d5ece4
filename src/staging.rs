use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::{Result, StudioError};

pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Normalized extension of an uploaded file name, if it is one we accept.
pub fn accepted_extension(file_name: &str) -> Result<&'static str> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    ACCEPTED_EXTENSIONS
        .iter()
        .find(|accepted| **accepted == extension)
        .copied()
        .ok_or_else(|| StudioError::UnsupportedFormat(file_name.to_string()))
}

pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        _ => "image/jpeg",
    }
}

pub struct AssetStager {
    root: PathBuf,
}

impl AssetStager {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn stage(&self, bytes: &[u8], extension: &str) -> Result<StagedAsset> {
        tokio::fs::create_dir_all(&self.root).await?;

        let file = tempfile::Builder::new()
            .prefix("portrait-")
            .suffix(&format!(".{extension}"))
            .tempfile_in(&self.root)?;
        tokio::fs::write(file.path(), bytes).await?;

        debug!(target: "staging", path = %file.path().display(), size = bytes.len(), "已暂存上传图片");

        Ok(StagedAsset {
            file,
            extension: extension.to_string(),
        })
    }

    pub fn unstage(&self, asset: StagedAsset) -> Result<()> {
        asset.remove()
    }
}

/// A staged upload. The file is removed by [`AssetStager::unstage`] or when the
/// guard is dropped, whichever comes first.
pub struct StagedAsset {
    file: NamedTempFile,
    extension: String,
}

impl StagedAsset {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.extension)
    }

    fn remove(self) -> Result<()> {
        let path = self.file.path().to_path_buf();
        self.file.close()?;
        debug!(target: "staging", path = %path.display(), "已删除暂存文件");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_filter_accepts_images_only() {
        assert_eq!(accepted_extension("me.JPG").unwrap(), "jpg");
        assert_eq!(accepted_extension("me.jpeg").unwrap(), "jpeg");
        assert_eq!(accepted_extension("photo.png").unwrap(), "png");

        for rejected in ["me.gif", "me.webp", "noextension", "archive.png.zip"] {
            assert!(matches!(
                accepted_extension(rejected),
                Err(StudioError::UnsupportedFormat(_))
            ));
        }
    }

    #[tokio::test]
    async fn unstage_removes_the_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let stager = AssetStager::new(temp.path().to_path_buf());

        let asset = stager.stage(b"portrait bytes", "png").await?;
        let path = asset.path().to_path_buf();
        assert_eq!(tokio::fs::read(&path).await?, b"portrait bytes");
        assert_eq!(asset.content_type(), "image/png");
        assert!(path.to_string_lossy().ends_with(".png"));

        stager.unstage(asset)?;
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn dropping_the_guard_removes_the_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let stager = AssetStager::new(temp.path().join("nested"));

        let path = {
            let asset = stager.stage(&[0xFF, 0xD8, 0xFF], "jpg").await?;
            asset.path().to_path_buf()
        };

        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn staged_names_are_unique() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let stager = AssetStager::new(temp.path().to_path_buf());

        let first = stager.stage(b"a", "jpg").await?;
        let second = stager.stage(b"b", "jpg").await?;
        assert_ne!(first.path(), second.path());
        Ok(())
    }
}
