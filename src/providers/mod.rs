pub mod fal;

use std::path::Path;

use async_trait::async_trait;

use crate::{credential::FalCredential, errors::Result, orchestrator::GenerationRequest};

/// A hosted image-to-image model. Returns the URL of the first output image.
#[async_trait]
pub trait ImageToImageModel: Send + Sync {
    async fn generate(
        &self,
        credential: &FalCredential,
        request: &GenerationRequest,
    ) -> Result<String>;
}

/// Remote storage that turns a local file into a publicly fetchable URL.
#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload(
        &self,
        credential: &FalCredential,
        path: &Path,
        content_type: &str,
    ) -> Result<String>;
}
