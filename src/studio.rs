use std::sync::Arc;

use bytes::Bytes;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    credential::{CredentialProvider, FalCredential},
    errors::{Result, StudioError},
    orchestrator::{GenerationOrchestrator, GenerationResult, ResultTile},
    providers::{AssetUploader, ImageToImageModel, fal::FalClient},
    staging::{AssetStager, accepted_extension},
    styles::{STYLE_CATALOG, StyleEntry},
    web::{BroadcastSender, broadcast_json},
};

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct StudioOutcome {
    pub run_id: Uuid,
    pub source_url: String,
    pub results: Vec<GenerationResult>,
}

impl StudioOutcome {
    pub fn tiles(&self) -> Vec<ResultTile> {
        self.results.iter().map(GenerationResult::tile).collect()
    }
}

/// The "generate" action: credential gate, stage, upload, fan out.
pub struct PortraitStudio {
    credentials: CredentialProvider,
    stager: AssetStager,
    uploader: Arc<dyn AssetUploader>,
    orchestrator: GenerationOrchestrator,
    catalog: &'static [StyleEntry],
    broadcaster: Option<BroadcastSender>,
}

impl PortraitStudio {
    pub fn new(
        credentials: CredentialProvider,
        stager: AssetStager,
        uploader: Arc<dyn AssetUploader>,
        model: Arc<dyn ImageToImageModel>,
        broadcaster: Option<BroadcastSender>,
    ) -> Self {
        Self {
            credentials,
            stager,
            uploader,
            orchestrator: GenerationOrchestrator::new(model),
            catalog: STYLE_CATALOG,
            broadcaster,
        }
    }

    pub fn from_config(config: &AppConfig, broadcaster: Option<BroadcastSender>) -> Result<Self> {
        let client = Arc::new(FalClient::from_config(&config.fal)?);
        let credentials = CredentialProvider::from_secret_store(config.fal.api_key.as_deref());
        if !credentials.has_secret() {
            info!(target: "studio", "未找到服务端 FAL_KEY，将由页面输入");
        }
        info!(target: "studio", model = client.model(), "fal 客户端已就绪");

        Ok(Self::new(
            credentials,
            AssetStager::new(config.staging_dir.clone()),
            client.clone(),
            client,
            broadcaster,
        ))
    }

    pub fn has_server_key(&self) -> bool {
        self.credentials.has_secret()
    }

    pub fn catalog(&self) -> &'static [StyleEntry] {
        self.catalog
    }

    pub async fn generate(
        &self,
        run_id: Uuid,
        user_key: Option<&str>,
        image: UploadedImage,
    ) -> Result<StudioOutcome> {
        let Some(credential) = self.credentials.resolve(user_key) else {
            warn!(target: "studio", %run_id, "缺少 FAL_KEY，已阻止生成");
            return Err(StudioError::MissingCredential);
        };
        let extension = accepted_extension(&image.file_name)?;

        info!(
            target: "studio",
            %run_id,
            file = %image.file_name,
            size = image.bytes.len(),
            "开始生成写真"
        );
        self.emit(
            "generation.started",
            json!({ "run_id": run_id, "total": self.catalog.len() }),
        );

        let source_url = match self.publish(&credential, &image.bytes, extension).await {
            Ok(url) => url,
            Err(err) => {
                warn!(target: "studio", %run_id, error = %err, "上传原图失败，生成中止");
                self.emit(
                    "generation.failed",
                    json!({ "run_id": run_id, "message": err.to_string() }),
                );
                return Err(err);
            }
        };
        self.emit(
            "generation.uploaded",
            json!({ "run_id": run_id, "source_url": source_url }),
        );

        let results = self
            .orchestrator
            .generate_all_with_progress(
                &credential,
                &source_url,
                self.catalog,
                |completed, total, result| {
                    self.emit(
                        "generation.progress",
                        json!({
                            "run_id": run_id,
                            "completed": completed,
                            "total": total,
                            "tile": result.tile(),
                        }),
                    );
                },
            )
            .await;

        let outcome = StudioOutcome {
            run_id,
            source_url,
            results,
        };
        self.emit(
            "generation.finished",
            json!({ "run_id": run_id, "results": outcome.tiles() }),
        );
        Ok(outcome)
    }

    /// Stages the bytes, uploads them and removes the staged file either way.
    async fn publish(
        &self,
        credential: &FalCredential,
        bytes: &[u8],
        extension: &str,
    ) -> Result<String> {
        let asset = self.stager.stage(bytes, extension).await?;
        let uploaded = self
            .uploader
            .upload(credential, asset.path(), asset.content_type())
            .await;

        if let Err(err) = self.stager.unstage(asset) {
            warn!(target: "staging", error = %err, "删除暂存文件失败");
        }

        uploaded
    }

    fn emit(&self, event: &str, payload: serde_json::Value) {
        if let Some(broadcaster) = &self.broadcaster {
            broadcast_json(broadcaster, event, payload);
        }
    }
}
