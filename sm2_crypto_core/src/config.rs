//! 运算配置
//!
//! 曲线与算法选择是显式配置项：默认 SM2 曲线 + SM2DSA 签名 + SM2 加密；
//! `prime256v1` 用于兼容旧部署生成的密钥（ECDSA 签名，不支持 SM2 加密）。

use std::path::Path;

use serde::{Deserialize, Serialize};
use sm2::pkcs8::LineEnding;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::CurveId;

/// GM/T 0009 规定的默认用户标识
pub const DEFAULT_DISTID: &str = "1234567812345678";

/// SM2DSA 用户标识的最大长度（ENTL 为 16 位比特长度）
const MAX_DISTID_LEN: usize = (u16::MAX / 8) as usize;

/// SM2 密文的分量顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CiphertextMode {
    /// 新标准顺序 C1 || C3 || C2
    C1C3C2,
    /// 旧标准顺序 C1 || C2 || C3
    C1C2C3,
}

/// PEM 输出的换行符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PemLineEnding {
    Lf,
    Crlf,
}

impl PemLineEnding {
    pub(crate) fn to_pem(self) -> LineEnding {
        match self {
            PemLineEnding::Lf => LineEnding::LF,
            PemLineEnding::Crlf => LineEnding::CRLF,
        }
    }
}

/// 密码运算配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CryptoConfig {
    /// 生成密钥使用的曲线名
    pub curve: String,
    /// SM2DSA 用户标识
    pub distid: String,
    /// SM2 密文分量顺序
    pub ciphertext_mode: CiphertextMode,
    /// PEM 换行符
    pub line_ending: PemLineEnding,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            curve: CurveId::Sm2.name().to_string(),
            distid: DEFAULT_DISTID.to_string(),
            ciphertext_mode: CiphertextMode::C1C3C2,
            line_ending: PemLineEnding::Lf,
        }
    }
}

impl CryptoConfig {
    /// 从 JSON 文本加载并校验
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: CryptoConfig =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件加载并校验
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading crypto config from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// 使用指定曲线的默认配置
    pub fn with_curve(curve: &str) -> Result<Self> {
        let config = Self {
            curve: curve.to_string(),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        CurveId::lookup(&self.curve).map_err(|e| Error::Config(e.to_string()))?;
        if self.distid.len() > MAX_DISTID_LEN {
            return Err(Error::Config(format!(
                "distid is {} bytes, maximum is {}",
                self.distid.len(),
                MAX_DISTID_LEN
            )));
        }
        Ok(())
    }

    /// 查找配置的曲线
    pub fn curve_id(&self) -> Result<CurveId> {
        CurveId::lookup(&self.curve)
    }
}
