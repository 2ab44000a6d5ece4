use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    credential::FalCredential,
    errors::GenerationError,
    providers::ImageToImageModel,
    styles::StyleEntry,
};

pub const STRENGTH: f32 = 0.75;
pub const GUIDANCE_SCALE: f32 = 7.5;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub source_image_url: String,
    pub style: StyleEntry,
    pub strength: f32,
    pub guidance_scale: f32,
}

impl GenerationRequest {
    pub fn new(source_image_url: impl Into<String>, style: StyleEntry) -> Self {
        Self {
            source_image_url: source_image_url.into(),
            style,
            strength: STRENGTH,
            guidance_scale: GUIDANCE_SCALE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub style: String,
    pub output: Result<String, GenerationError>,
}

impl GenerationResult {
    pub fn url(&self) -> Option<&str> {
        self.output.as_deref().ok()
    }

    pub fn is_success(&self) -> bool {
        self.output.is_ok()
    }

    pub fn tile(&self) -> ResultTile {
        ResultTile {
            style: self.style.clone(),
            url: self.url().map(str::to_string),
            error: self.output.as_ref().err().map(|err| err.to_string()),
        }
    }
}

/// Wire form of one grid cell: an image URL or an error message.
#[derive(Debug, Clone, Serialize)]
pub struct ResultTile {
    pub style: String,
    pub url: Option<String>,
    pub error: Option<String>,
}

pub struct GenerationOrchestrator {
    model: Arc<dyn ImageToImageModel>,
}

impl GenerationOrchestrator {
    pub fn new(model: Arc<dyn ImageToImageModel>) -> Self {
        Self { model }
    }

    pub async fn generate_all(
        &self,
        credential: &FalCredential,
        source_image_url: &str,
        catalog: &[StyleEntry],
    ) -> Vec<GenerationResult> {
        self.generate_all_with_progress(credential, source_image_url, catalog, |_, _, _| {})
            .await
    }

    /// Fans out one unit per style, then waits for every unit. `on_finished`
    /// sees `(completed, total, result)` in completion order; the returned
    /// vector is in catalog order.
    pub async fn generate_all_with_progress<F>(
        &self,
        credential: &FalCredential,
        source_image_url: &str,
        catalog: &[StyleEntry],
        mut on_finished: F,
    ) -> Vec<GenerationResult>
    where
        F: FnMut(usize, usize, &GenerationResult),
    {
        let total = catalog.len();
        info!(target: "orchestrator", total, "开始并行生成");

        let mut pending: FuturesUnordered<_> = catalog
            .iter()
            .enumerate()
            .map(|(index, style)| {
                let request = GenerationRequest::new(source_image_url, *style);
                async move { (index, self.run_unit(credential, request).await) }
            })
            .collect();

        let mut slots: Vec<Option<GenerationResult>> = vec![None; total];
        let mut completed = 0;
        while let Some((index, result)) = pending.next().await {
            completed += 1;
            on_finished(completed, total, &result);
            slots[index] = Some(result);
        }

        let results: Vec<GenerationResult> = slots.into_iter().flatten().collect();
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(target: "orchestrator", total, succeeded, "并行生成结束");
        results
    }

    async fn run_unit(
        &self,
        credential: &FalCredential,
        request: GenerationRequest,
    ) -> GenerationResult {
        let style = request.style.id;
        let output = match self.model.generate(credential, &request).await {
            Ok(url) => Ok(url),
            Err(err) => {
                warn!(target: "orchestrator", style, error = %err, "单个风格生成失败");
                Err(GenerationError::new(style, err.to_string()))
            }
        };

        GenerationResult {
            style: style.to_string(),
            output,
        }
    }
}
