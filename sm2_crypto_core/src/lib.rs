//! SM2 密码运算核心库
//!
//! 为嵌入式客户端（MQTT）提供：
//! - 密钥对生成、由私钥推导公钥（PEM 文本）
//! - 签名与验签（DER 签名）
//! - SM2 公钥加密与私钥解密
//!
//! 所有运算同步、无全局状态；中间对象在每条返回路径上随作用域释放。

mod cipher;
pub mod codec;
pub mod config;
pub mod error;
pub mod keygen;
pub mod pke;
pub mod service;
pub mod signing;
pub mod sizing;
pub mod types;

pub use codec::{decode_key, KeyHandle};
pub use config::{CiphertextMode, CryptoConfig, PemLineEnding, DEFAULT_DISTID};
pub use error::{Error, Result, SetupStage};
pub use service::Sm2Crypto;
pub use types::*;
