use thiserror::Error;

pub type Result<T> = std::result::Result<T, StudioError>;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("请先配置 FAL_KEY 才能开始生成")]
    MissingCredential,

    #[error("不支持的图片格式: {0} (仅支持 jpg / jpeg / png)")]
    UnsupportedFormat(String),

    #[error("图片上传失败: {0}")]
    Transfer(String),

    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("网络请求失败: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("内部错误: {0}")]
    Other(String),
}

impl StudioError {
    pub fn transfer(msg: impl Into<String>) -> Self {
        Self::Transfer(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

impl From<anyhow::Error> for StudioError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}

/// Failure of a single style's generation. Contained to that style's tile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{style} 生成失败: {reason}")]
pub struct GenerationError {
    pub style: String,
    pub reason: String,
}

impl GenerationError {
    pub fn new(style: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            style: style.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plumbing_errors_convert_into_studio_error() {
        let io: StudioError = std::io::Error::other("disk gone").into();
        assert!(matches!(io, StudioError::Io(_)));

        let config: StudioError = anyhow::anyhow!("bad bind address").into();
        assert!(matches!(config, StudioError::Other(ref msg) if msg == "bad bind address"));
    }
}
