//! SM2 公钥加密与私钥解密
//!
//! 流程：解码密钥 → 标记为 SM2 加密算法 → 按方向初始化上下文 →
//! 两阶段长度协商。密文视为不透明字节串（C1 为非压缩点，C3 为 SM3 摘要），
//! 方案本身在 `cipher` 模块中实现。

use std::fmt;

use tracing::{debug, warn};

use crate::cipher::{self, Decryptor, Encryptor};
use crate::codec::{decode_key, KeyHandle};
use crate::config::{CiphertextMode, CryptoConfig};
use crate::error::{Error, Result, SetupStage};
use crate::sizing::{run_two_phase, TwoPhaseOperation};
use crate::types::{KeyKind, OutputBuffer};

/// 运算方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Encrypt => write!(f, "SM2 encrypt"),
            Direction::Decrypt => write!(f, "SM2 decrypt"),
        }
    }
}

/// 已标记为 SM2 加密算法的密钥
enum Sm2PkeKey {
    Public(sm2::PublicKey),
    Private(sm2::SecretKey),
}

impl Sm2PkeKey {
    fn tag(handle: KeyHandle) -> Result<Self> {
        match handle {
            KeyHandle::Sm2Public(pk) => Ok(Sm2PkeKey::Public(pk)),
            KeyHandle::Sm2Private(sk) => Ok(Sm2PkeKey::Private(sk)),
            other => Err(Error::AlgorithmTag(format!(
                "{} key is not on the SM2 curve",
                other.curve()
            ))),
        }
    }
}

/// 已初始化的加解密上下文
enum PkeContext {
    Encrypt(Encryptor),
    Decrypt(Decryptor),
}

impl PkeContext {
    fn init(key: Sm2PkeKey, direction: Direction, mode: CiphertextMode) -> Result<Self> {
        match (direction, key) {
            (Direction::Encrypt, Sm2PkeKey::Public(pk)) => {
                Ok(PkeContext::Encrypt(Encryptor::new(pk, mode)))
            }
            (Direction::Decrypt, Sm2PkeKey::Private(sk)) => {
                Ok(PkeContext::Decrypt(Decryptor::new(sk, mode)))
            }
            (direction, _) => Err(Error::setup(
                SetupStage::Init,
                format!("{} cannot be initialized with this key kind", direction),
            )),
        }
    }
}

impl TwoPhaseOperation for PkeContext {
    fn name(&self) -> &'static str {
        match self {
            PkeContext::Encrypt(_) => "SM2 encrypt",
            PkeContext::Decrypt(_) => "SM2 decrypt",
        }
    }

    fn required_len(&self, input: &[u8]) -> Result<usize> {
        match self {
            PkeContext::Encrypt(_) => cipher::ciphertext_len(input.len()),
            PkeContext::Decrypt(_) => cipher::plaintext_len(input),
        }
    }

    fn perform(&self, input: &[u8], out: &mut [u8]) -> Result<usize> {
        match self {
            PkeContext::Encrypt(encryptor) => {
                let bytes = encryptor.encrypt(input)?;
                copy_into(self.name(), &bytes, out)
            }
            PkeContext::Decrypt(decryptor) => {
                let bytes = decryptor.decrypt(input)?;
                copy_into(self.name(), &bytes, out)
            }
        }
    }
}

fn copy_into(name: &str, bytes: &[u8], out: &mut [u8]) -> Result<usize> {
    let capacity = out.len();
    let target = out.get_mut(..bytes.len()).ok_or_else(|| {
        Error::Operation(format!(
            "{} produced {} bytes, {} were queried",
            name,
            bytes.len(),
            capacity
        ))
    })?;
    target.copy_from_slice(bytes);
    Ok(bytes.len())
}

/// 解码密钥 → 标记为 SM2 加密算法 → 按方向初始化上下文
fn prepare(direction: Direction, key_pem: &[u8], kind: KeyKind, config: &CryptoConfig) -> Result<PkeContext> {
    let handle = decode_key(key_pem, kind, config.curve_id()?)?;
    let key = Sm2PkeKey::tag(handle).map_err(|e| {
        warn!("{}: {}", direction, e);
        e
    })?;
    PkeContext::init(key, direction, config.ciphertext_mode)
}

fn query_len(direction: Direction, input: &[u8], key_pem: &[u8], kind: KeyKind, config: &CryptoConfig) -> Result<usize> {
    let context = prepare(direction, key_pem, kind, config)?;
    context.required_len(input)
}

/// 加密输出长度查询，密钥须能完成初始化
pub fn encrypted_len(plaintext: &[u8], public_pem: &[u8], config: &CryptoConfig) -> Result<usize> {
    query_len(Direction::Encrypt, plaintext, public_pem, KeyKind::Public, config)
}

/// 解密输出长度查询，密钥须能完成初始化
pub fn decrypted_len(ciphertext: &[u8], private_pem: &[u8], config: &CryptoConfig) -> Result<usize> {
    query_len(Direction::Decrypt, ciphertext, private_pem, KeyKind::Private, config)
}

fn run(
    direction: Direction,
    input: &[u8],
    key_pem: &[u8],
    kind: KeyKind,
    config: &CryptoConfig,
) -> Result<OutputBuffer> {
    let context = prepare(direction, key_pem, kind, config)?;
    let output = run_two_phase(&context, input)?;
    debug!("{}: {} -> {} bytes", direction, input.len(), output.len());
    Ok(output)
}

/// 用 PEM 公钥加密
pub fn encrypt(plaintext: &[u8], public_pem: &[u8], config: &CryptoConfig) -> Result<OutputBuffer> {
    run(Direction::Encrypt, plaintext, public_pem, KeyKind::Public, config)
}

/// 用 PEM 私钥解密
pub fn decrypt(ciphertext: &[u8], private_pem: &[u8], config: &CryptoConfig) -> Result<OutputBuffer> {
    run(Direction::Decrypt, ciphertext, private_pem, KeyKind::Private, config)
}
