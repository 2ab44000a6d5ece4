use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FalClient, ensure_success, request_failed};
use crate::{
    credential::FalCredential,
    errors::{Result, StudioError},
    orchestrator::GenerationRequest,
    providers::ImageToImageModel,
};

#[derive(Serialize)]
struct ImageToImageArguments<'a> {
    image_url: &'a str,
    prompt: &'a str,
    strength: f32,
    guidance_scale: f32,
}

impl<'a> From<&'a GenerationRequest> for ImageToImageArguments<'a> {
    fn from(request: &'a GenerationRequest) -> Self {
        Self {
            image_url: &request.source_image_url,
            prompt: request.style.prompt,
            strength: request.strength,
            guidance_scale: request.guidance_scale,
        }
    }
}

#[derive(Deserialize, Debug)]
struct QueueSubmission {
    request_id: String,
    status_url: String,
    response_url: String,
}

#[derive(Deserialize, Debug)]
struct QueueStatus {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ImageToImageOutput {
    #[serde(default)]
    images: Vec<OutputImage>,
}

#[derive(Deserialize, Debug)]
struct OutputImage {
    url: String,
}

impl ImageToImageOutput {
    fn first_image_url(self) -> Result<String> {
        self.images
            .into_iter()
            .next()
            .map(|image| image.url)
            .ok_or_else(|| StudioError::other("模型返回结果中没有图片"))
    }
}

impl FalClient {
    async fn submit(
        &self,
        credential: &FalCredential,
        request: &GenerationRequest,
    ) -> Result<QueueSubmission> {
        let endpoint = format!("{}/{}", self.queue_base_url, self.model);
        let response = self
            .http
            .post(&endpoint)
            .header(reqwest::header::AUTHORIZATION, credential.authorization()?)
            .json(&ImageToImageArguments::from(request))
            .send()
            .await
            .map_err(|err| StudioError::other(request_failed("提交生成任务", err)))?;

        let response = ensure_success(response, "提交生成任务")
            .await
            .map_err(StudioError::other)?;
        Ok(response.json().await?)
    }

    async fn wait_for_completion(
        &self,
        credential: &FalCredential,
        submission: &QueueSubmission,
    ) -> Result<()> {
        loop {
            let response = self
                .http
                .get(&submission.status_url)
                .header(reqwest::header::AUTHORIZATION, credential.authorization()?)
                .send()
                .await
                .map_err(|err| StudioError::other(request_failed("查询任务状态", err)))?;

            let status: QueueStatus = ensure_success(response, "查询任务状态")
                .await
                .map_err(StudioError::other)?
                .json()
                .await?;

            match status.status.as_str() {
                "COMPLETED" => {
                    return match status.error {
                        Some(error) => Err(StudioError::other(format!("模型执行失败: {error}"))),
                        None => Ok(()),
                    };
                }
                "IN_QUEUE" | "IN_PROGRESS" => {
                    debug!(
                        target: "fal::queue",
                        request_id = %submission.request_id,
                        status = %status.status,
                        "任务尚未完成"
                    );
                    tokio::time::sleep(self.poll_interval).await;
                }
                other => {
                    return Err(StudioError::other(format!("未知的任务状态: {other}")));
                }
            }
        }
    }

    async fn fetch_output(
        &self,
        credential: &FalCredential,
        submission: &QueueSubmission,
    ) -> Result<ImageToImageOutput> {
        let response = self
            .http
            .get(&submission.response_url)
            .header(reqwest::header::AUTHORIZATION, credential.authorization()?)
            .send()
            .await
            .map_err(|err| StudioError::other(request_failed("获取生成结果", err)))?;

        let response = ensure_success(response, "获取生成结果")
            .await
            .map_err(StudioError::other)?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ImageToImageModel for FalClient {
    async fn generate(
        &self,
        credential: &FalCredential,
        request: &GenerationRequest,
    ) -> Result<String> {
        let submission = self.submit(credential, request).await?;
        debug!(
            target: "fal::queue",
            request_id = %submission.request_id,
            style = request.style.id,
            "生成任务已提交"
        );

        self.wait_for_completion(credential, &submission).await?;
        self.fetch_output(credential, &submission)
            .await?
            .first_image_url()
    }
}
