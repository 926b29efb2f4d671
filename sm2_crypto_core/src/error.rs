//! 错误类型定义
//!
//! 每个错误变体对应一个独立的失败阶段；整数错误码只在 FFI 边界使用。

use std::fmt;

use thiserror::Error;

/// 曲线/上下文构建的失败阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    /// 按名称查找曲线参数
    CurveLookup,
    /// 创建运算上下文
    Context,
    /// 按方向初始化运算上下文
    Init,
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupStage::CurveLookup => write!(f, "curve lookup"),
            SetupStage::Context => write!(f, "context creation"),
            SetupStage::Init => write!(f, "context init"),
        }
    }
}

/// 错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 输入不是合法的 PEM 文本
    #[error("PEM framing error: {0}")]
    InputFraming(String),

    /// PEM 合法，但内容不是期望类型的 EC 密钥
    #[error("Key parse error: {0}")]
    KeyParse(String),

    /// 曲线参数或运算上下文构建失败
    #[error("Curve setup failed at {stage}: {message}")]
    CurveSetup { stage: SetupStage, message: String },

    /// 无法将密钥标记为 SM2 加密算法
    #[error("Key cannot be used for SM2 encryption: {0}")]
    AlgorithmTag(String),

    /// 两阶段长度协商的第一阶段失败
    #[error("Output size query failed: {0}")]
    SizeQuery(String),

    /// 输出缓冲区分配失败
    #[error("Failed to allocate {requested} byte output buffer")]
    Allocation { requested: usize },

    /// 随机密钥生成失败
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// 签名/加密/解密原语失败
    #[error("Cryptographic operation failed: {0}")]
    Operation(String),

    /// 验签失败（不区分原因）
    #[error("Signature verification failed")]
    VerificationFailed,

    /// 编码错误
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// 配置错误
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn setup(stage: SetupStage, message: impl Into<String>) -> Self {
        Error::CurveSetup {
            stage,
            message: message.into(),
        }
    }

    /// 兼容旧接口的负整数错误码
    pub fn code(&self) -> i32 {
        match self {
            Error::InputFraming(_) => -1,
            Error::KeyParse(_) => -2,
            Error::Operation(_) | Error::VerificationFailed => -3,
            Error::CurveSetup { stage, .. } => match stage {
                SetupStage::CurveLookup => -4,
                SetupStage::Context => -5,
                SetupStage::Init => -6,
            },
            Error::AlgorithmTag(_) => -7,
            Error::SizeQuery(_) => -8,
            Error::Allocation { .. } => -9,
            Error::KeyGeneration(_) => -10,
            Error::Encoding(_) => -11,
            Error::Config(_) => -12,
            Error::Io(_) => -13,
        }
    }

    /// 是否为密钥解码阶段的错误
    pub fn is_key_decode(&self) -> bool {
        matches!(self, Error::InputFraming(_) | Error::KeyParse(_))
    }
}

/// 结果类型
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_per_stage() {
        let errors = [
            Error::InputFraming(String::new()),
            Error::KeyParse(String::new()),
            Error::Operation(String::new()),
            Error::setup(SetupStage::CurveLookup, ""),
            Error::setup(SetupStage::Context, ""),
            Error::setup(SetupStage::Init, ""),
            Error::AlgorithmTag(String::new()),
            Error::SizeQuery(String::new()),
            Error::Allocation { requested: 1 },
            Error::KeyGeneration(String::new()),
            Error::Encoding(String::new()),
            Error::Config(String::new()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(Error::code).collect();
        assert!(codes.iter().all(|c| *c < 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_verification_failure_shares_operation_code() {
        assert_eq!(Error::VerificationFailed.code(), -3);
        assert_eq!(Error::VerificationFailed.to_string(), "Signature verification failed");
    }

    #[test]
    fn test_key_decode_classification() {
        assert!(Error::InputFraming("x".into()).is_key_decode());
        assert!(Error::KeyParse("x".into()).is_key_decode());
        assert!(!Error::VerificationFailed.is_key_decode());
    }
}
