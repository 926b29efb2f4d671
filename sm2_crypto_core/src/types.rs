//! 数据类型定义

use std::fmt;
use std::ops::Deref;

use der::asn1::ObjectIdentifier;
use sm2::pkcs8::AssociatedOid;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Error, Result, SetupStage};

/// 支持的命名曲线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveId {
    /// 国密 SM2 曲线（sm2p256v1）
    Sm2,
    /// NIST P-256（prime256v1），仅用于兼容旧密钥
    P256,
}

impl CurveId {
    /// 按 OpenSSL 风格的曲线名查找
    pub fn lookup(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sm2" | "sm2p256v1" | "sm2-p256" => Ok(CurveId::Sm2),
            "prime256v1" | "p-256" | "p256" | "secp256r1" | "nistp256" => Ok(CurveId::P256),
            other => Err(Error::setup(
                SetupStage::CurveLookup,
                format!("unsupported curve '{}'", other),
            )),
        }
    }

    /// 按 DER 中的命名曲线 OID 查找
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        if *oid == sm2::Sm2::OID {
            Some(CurveId::Sm2)
        } else if *oid == p256::NistP256::OID {
            Some(CurveId::P256)
        } else {
            None
        }
    }

    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            CurveId::Sm2 => sm2::Sm2::OID,
            CurveId::P256 => p256::NistP256::OID,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CurveId::Sm2 => "SM2",
            CurveId::P256 => "prime256v1",
        }
    }
}

impl fmt::Display for CurveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 密钥的解释方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Private,
    Public,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Private => write!(f, "private"),
            KeyKind::Public => write!(f, "public"),
        }
    }
}

/// PEM 格式的密钥对
#[derive(Clone)]
pub struct KeyPair {
    /// SEC1 `EC PRIVATE KEY` 私钥
    pub private_pem: Zeroizing<String>,
    /// SPKI `PUBLIC KEY` 公钥
    pub public_pem: String,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_pem", &"<redacted>")
            .field("public_pem", &self.public_pem)
            .finish()
    }
}

/// 自带长度的输出缓冲区，释放时清零
#[derive(Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    bytes: Vec<u8>,
}

impl OutputBuffer {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        // 截断部分先清零
        if len < self.bytes.len() {
            self.bytes[len..].zeroize();
        }
        self.bytes.truncate(len);
    }

    /// 取出内部字节，调用方负责后续清理
    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }
}

impl Deref for OutputBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl AsRef<[u8]> for OutputBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for OutputBuffer {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputBuffer({} bytes)", self.bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_lookup_aliases() {
        assert_eq!(CurveId::lookup("SM2").unwrap(), CurveId::Sm2);
        assert_eq!(CurveId::lookup("sm2p256v1").unwrap(), CurveId::Sm2);
        assert_eq!(CurveId::lookup("prime256v1").unwrap(), CurveId::P256);
        assert_eq!(CurveId::lookup(" P-256 ").unwrap(), CurveId::P256);
    }

    #[test]
    fn test_curve_lookup_unknown() {
        let err = CurveId::lookup("secp384r1").unwrap_err();
        assert!(matches!(
            err,
            Error::CurveSetup {
                stage: SetupStage::CurveLookup,
                ..
            }
        ));
        assert_eq!(err.code(), -4);
    }

    #[test]
    fn test_curve_oid_round_trip() {
        for curve in [CurveId::Sm2, CurveId::P256] {
            assert_eq!(CurveId::from_oid(&curve.oid()), Some(curve));
        }
        assert_eq!(CurveId::Sm2.oid().to_string(), "1.2.156.10197.1.301");
    }

    #[test]
    fn test_output_buffer_reports_length() {
        let buf = OutputBuffer::new(vec![0, 1, 0, 2]);
        assert_eq!(buf.len(), 4);
        assert_eq!(&buf[..], &[0, 1, 0, 2]);
        assert_eq!(format!("{:?}", buf), "OutputBuffer(4 bytes)");
        assert_eq!(buf.into_vec(), vec![0, 1, 0, 2]);
    }

    #[test]
    fn test_key_pair_debug_redacts_private_key() {
        let pair = KeyPair {
            private_pem: Zeroizing::new("secret".to_string()),
            public_pem: "public".to_string(),
        };
        let shown = format!("{:?}", pair);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("public"));
    }
}
