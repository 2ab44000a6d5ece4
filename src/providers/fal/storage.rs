use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FalClient, ensure_success, request_failed};
use crate::{
    credential::FalCredential,
    errors::{Result, StudioError},
    providers::AssetUploader,
};

const STORAGE_TYPE: &str = "fal-cdn-v3";

#[derive(Serialize)]
struct InitiateUpload<'a> {
    content_type: &'a str,
    file_name: &'a str,
}

#[derive(Deserialize, Debug)]
struct InitiatedUpload {
    upload_url: String,
    file_url: String,
}

#[async_trait]
impl AssetUploader for FalClient {
    async fn upload(
        &self,
        credential: &FalCredential,
        path: &Path,
        content_type: &str,
    ) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| StudioError::transfer(format!("读取暂存文件失败: {err}")))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("portrait.jpg");

        let endpoint = format!(
            "{}/storage/upload/initiate?storage_type={STORAGE_TYPE}",
            self.storage_base_url
        );
        let response = self
            .http
            .post(&endpoint)
            .header(AUTHORIZATION, credential.authorization()?)
            .json(&InitiateUpload {
                content_type,
                file_name,
            })
            .send()
            .await
            .map_err(|err| StudioError::transfer(request_failed("申请上传地址", err)))?;

        let initiated: InitiatedUpload = ensure_success(response, "申请上传地址")
            .await
            .map_err(StudioError::transfer)?
            .json()
            .await
            .map_err(|err| StudioError::transfer(format!("解析上传地址失败: {err}")))?;

        let size = bytes.len();
        let response = self
            .http
            .put(&initiated.upload_url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|err| StudioError::transfer(request_failed("上传图片", err)))?;
        ensure_success(response, "上传图片")
            .await
            .map_err(StudioError::transfer)?;

        debug!(target: "fal::storage", file_url = %initiated.file_url, size, "图片已上传");
        Ok(initiated.file_url)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Json, Router,
        body::Bytes,
        extract::State,
        http::StatusCode,
        routing::{post, put},
    };
    use serde_json::{Value, json};

    use super::*;
    use crate::providers::fal::testing::{config_for, spawn_mock};

    #[derive(Clone)]
    struct MockStorage {
        base: String,
        received: Arc<Mutex<Vec<u8>>>,
        accept_put: bool,
    }

    async fn initiate(State(state): State<MockStorage>, Json(body): Json<Value>) -> Json<Value> {
        assert_eq!(body["content_type"], "image/jpeg");
        Json(json!({
            "upload_url": format!("{}/upload/abc", state.base),
            "file_url": "https://v3.fal.media/files/abc.jpg",
        }))
    }

    async fn receive(State(state): State<MockStorage>, body: Bytes) -> StatusCode {
        if !state.accept_put {
            return StatusCode::FORBIDDEN;
        }
        state.received.lock().unwrap().extend_from_slice(&body);
        StatusCode::OK
    }

    async fn mock_storage(accept_put: bool) -> (FalClient, Arc<Mutex<Vec<u8>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let base = spawn_mock(move |base| {
            Router::new()
                .route("/storage/upload/initiate", post(initiate))
                .route("/upload/abc", put(receive))
                .with_state(MockStorage {
                    base,
                    received: sink,
                    accept_put,
                })
        })
        .await;

        (FalClient::from_config(&config_for(&base)).unwrap(), received)
    }

    #[tokio::test]
    async fn uploads_file_and_returns_public_url() -> anyhow::Result<()> {
        let (client, received) = mock_storage(true).await;
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("portrait.jpg");
        tokio::fs::write(&path, b"jpeg-bytes").await?;
        let credential = FalCredential::new("test-key").unwrap();

        let url = client.upload(&credential, &path, "image/jpeg").await?;

        assert_eq!(url, "https://v3.fal.media/files/abc.jpg");
        assert_eq!(received.lock().unwrap().as_slice(), b"jpeg-bytes");
        Ok(())
    }

    #[tokio::test]
    async fn rejected_payload_is_a_transfer_error() -> anyhow::Result<()> {
        let (client, _) = mock_storage(false).await;
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("portrait.jpg");
        tokio::fs::write(&path, b"jpeg-bytes").await?;
        let credential = FalCredential::new("test-key").unwrap();

        let err = client
            .upload(&credential, &path, "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::Transfer(_)));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transfer_error() -> anyhow::Result<()> {
        let client = FalClient::from_config(&config_for("http://127.0.0.1:1"))?;
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("portrait.png");
        tokio::fs::write(&path, b"png-bytes").await?;
        let credential = FalCredential::new("test-key").unwrap();

        let err = client
            .upload(&credential, &path, "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::Transfer(_)));
        Ok(())
    }
}
