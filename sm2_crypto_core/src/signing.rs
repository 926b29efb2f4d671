//! 签名与验签
//!
//! SM2 曲线使用 SM2DSA（SM3 杂凑，含用户标识 Z_A）；prime256v1 曲线使用
//! ECDSA/SHA-256。签名统一以 ASN.1 DER `SEQUENCE { r, s }` 输出。
//! 本层不单独暴露摘要步骤，消息按原样交给签名算法。

use der::{asn1::UintRef, Decode, Encode, Sequence};
use signature::{Signer, Verifier};
use tracing::{debug, warn};

use crate::codec::{decode_key, KeyHandle};
use crate::config::CryptoConfig;
use crate::error::{Error, Result, SetupStage};
use crate::sizing::{run_two_phase, TwoPhaseOperation};
use crate::types::{KeyKind, OutputBuffer};

/// 256 位曲线标量长度
const SCALAR_LEN: usize = 32;

/// DER 签名最大长度：SEQUENCE 头 2 字节 + 两个 INTEGER（各 2 字节头 + 33 字节）
pub const MAX_SIGNATURE_LEN: usize = 2 + 2 * (2 + SCALAR_LEN + 1);

/// ASN.1 DER 编码的 (r, s)
#[derive(Sequence)]
struct DerSignature<'a> {
    r: UintRef<'a>,
    s: UintRef<'a>,
}

/// 签名上下文
enum SigningContext {
    Sm2(sm2::dsa::SigningKey),
    P256(p256::ecdsa::SigningKey),
}

impl SigningContext {
    fn new(handle: &KeyHandle, distid: &str) -> Result<Self> {
        match handle {
            KeyHandle::Sm2Private(sk) => sm2::dsa::SigningKey::new(distid, sk)
                .map(SigningContext::Sm2)
                .map_err(|e| Error::setup(SetupStage::Context, format!("SM2DSA signing key: {}", e))),
            KeyHandle::P256Private(sk) => Ok(SigningContext::P256(sk.into())),
            KeyHandle::Sm2Public(_) | KeyHandle::P256Public(_) => Err(Error::KeyParse(
                "signing requires a private key".to_string(),
            )),
        }
    }

    fn sign_der(&self, message: &[u8]) -> Result<Vec<u8>> {
        match self {
            SigningContext::Sm2(key) => {
                let sig: sm2::dsa::Signature = key
                    .try_sign(message)
                    .map_err(|e| Error::Operation(format!("SM2DSA sign: {}", e)))?;
                let bytes = sig.to_bytes();
                let (r, s) = bytes.split_at(SCALAR_LEN);
                encode_der(r, s)
            }
            SigningContext::P256(key) => {
                let sig: p256::ecdsa::Signature = key
                    .try_sign(message)
                    .map_err(|e| Error::Operation(format!("ECDSA sign: {}", e)))?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
        }
    }
}

impl TwoPhaseOperation for SigningContext {
    fn name(&self) -> &'static str {
        match self {
            SigningContext::Sm2(_) => "SM2DSA sign",
            SigningContext::P256(_) => "ECDSA sign",
        }
    }

    fn required_len(&self, _message: &[u8]) -> Result<usize> {
        Ok(MAX_SIGNATURE_LEN)
    }

    fn perform(&self, message: &[u8], out: &mut [u8]) -> Result<usize> {
        let der = self.sign_der(message)?;
        let target = out.get_mut(..der.len()).ok_or_else(|| {
            Error::Operation(format!(
                "{} byte signature exceeds {} byte buffer",
                der.len(),
                MAX_SIGNATURE_LEN
            ))
        })?;
        target.copy_from_slice(&der);
        Ok(der.len())
    }
}

/// 用 PEM 私钥对消息签名，返回 DER 签名
pub fn sign(message: &[u8], private_pem: &[u8], config: &CryptoConfig) -> Result<OutputBuffer> {
    let handle = decode_key(private_pem, KeyKind::Private, config.curve_id()?)?;
    let context = SigningContext::new(&handle, &config.distid)?;
    let signature = run_two_phase(&context, message)?;
    debug!(
        "Signed {} byte message, {} byte signature",
        message.len(),
        signature.len()
    );
    Ok(signature)
}

/// 签名输出长度查询，私钥须能完成签名上下文初始化
pub fn signature_len(private_pem: &[u8], config: &CryptoConfig) -> Result<usize> {
    let handle = decode_key(private_pem, KeyKind::Private, config.curve_id()?)?;
    let context = SigningContext::new(&handle, &config.distid)?;
    context.required_len(&[])
}

/// 用 PEM 公钥验证签名
///
/// 任何不匹配都返回同一个 [`Error::VerificationFailed`]，不区分原因；
/// 密钥解析失败单独报告。
pub fn verify(
    message: &[u8],
    signature: &[u8],
    public_pem: &[u8],
    config: &CryptoConfig,
) -> Result<()> {
    let handle = decode_key(public_pem, KeyKind::Public, config.curve_id()?)?;

    let verified = match &handle {
        KeyHandle::Sm2Public(pk) => {
            let key = sm2::dsa::VerifyingKey::new(&config.distid, *pk).map_err(|e| {
                Error::setup(SetupStage::Context, format!("SM2DSA verifying key: {}", e))
            })?;
            decode_der(signature)
                .and_then(|bytes| sm2::dsa::Signature::from_slice(&bytes).ok())
                .map_or(false, |sig| key.verify(message, &sig).is_ok())
        }
        KeyHandle::P256Public(pk) => {
            let key = p256::ecdsa::VerifyingKey::from(pk);
            p256::ecdsa::Signature::from_der(signature)
                .map_or(false, |sig| key.verify(message, &sig).is_ok())
        }
        KeyHandle::Sm2Private(_) | KeyHandle::P256Private(_) => {
            return Err(Error::KeyParse(
                "verification requires a public key".to_string(),
            ))
        }
    };

    if verified {
        debug!("Signature verified on curve {}", handle.curve());
        Ok(())
    } else {
        warn!("Signature verification failed");
        Err(Error::VerificationFailed)
    }
}

fn encode_der(r: &[u8], s: &[u8]) -> Result<Vec<u8>> {
    let der = DerSignature {
        r: UintRef::new(r).map_err(|e| Error::Operation(format!("signature r: {}", e)))?,
        s: UintRef::new(s).map_err(|e| Error::Operation(format!("signature s: {}", e)))?,
    };
    der.to_der()
        .map_err(|e| Error::Operation(format!("signature DER: {}", e)))
}

/// 解析 DER 签名为定长 r || s，尾随数据或超长整数视为无效
fn decode_der(signature: &[u8]) -> Option<[u8; 2 * SCALAR_LEN]> {
    let parsed = DerSignature::from_der(signature).ok()?;
    let (r, s) = (parsed.r.as_bytes(), parsed.s.as_bytes());
    if r.len() > SCALAR_LEN || s.len() > SCALAR_LEN {
        return None;
    }
    let mut bytes = [0u8; 2 * SCALAR_LEN];
    bytes[SCALAR_LEN - r.len()..SCALAR_LEN].copy_from_slice(r);
    bytes[2 * SCALAR_LEN - s.len()..].copy_from_slice(s);
    Some(bytes)
}
