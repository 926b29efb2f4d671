//! SM2 公钥加密方案（GB/T 32918.4）
//!
//! 在 `sm2` 曲线运算之上实现：C1 = [k]G，(x2, y2) = [k]P，
//! t = KDF(x2 ‖ y2, klen)，C2 = M ⊕ t，C3 = SM3(x2 ‖ M ‖ y2)。
//! 输出按配置排列为 C1‖C3‖C2 或 C1‖C2‖C3，C1 为非压缩点。

use sm2::elliptic_curve::sec1::ToEncodedPoint;
use sm2::elliptic_curve::subtle::ConstantTimeEq;
use sm2::{AffinePoint, NonZeroScalar, ProjectivePoint, PublicKey, SecretKey};
use sm3::{Digest, Sm3};
use zeroize::Zeroizing;

use crate::config::CiphertextMode;
use crate::error::{Error, Result};
use crate::keygen::os_rng;

/// 非压缩 C1 点长度
pub(crate) const C1_UNCOMPRESSED_LEN: usize = 65;
/// 压缩 C1 点长度
pub(crate) const C1_COMPRESSED_LEN: usize = 33;
/// C3（SM3 摘要）长度
pub(crate) const C3_LEN: usize = 32;

/// KDF 计数器为 32 位，可派生的最大密钥流长度
const KDF_MAX_LEN: u64 = u32::MAX as u64 * C3_LEN as u64;

/// 加密方向的 SM2 上下文
pub(crate) struct Encryptor {
    public_key: PublicKey,
    mode: CiphertextMode,
}

impl Encryptor {
    pub(crate) fn new(public_key: PublicKey, mode: CiphertextMode) -> Self {
        Self { public_key, mode }
    }

    pub(crate) fn encrypt(&self, msg: &[u8]) -> Result<Vec<u8>> {
        if msg.is_empty() {
            return Err(encrypt_error("plaintext is empty"));
        }
        if msg.len() as u64 > KDF_MAX_LEN {
            return Err(encrypt_error("plaintext exceeds the KDF output limit"));
        }

        let mut rng = os_rng().map_err(|e| encrypt_error(&e.to_string()))?;
        let mut c2 = Zeroizing::new(vec![0u8; msg.len()]);
        loop {
            let k = NonZeroScalar::random(&mut rng);
            let c1 = (ProjectivePoint::GENERATOR * *k).to_affine();
            let shared = (self.public_key.to_projective() * *k).to_affine();
            let (x2, y2) = coordinates(&shared).ok_or_else(|| encrypt_error("shared point is the identity"))?;

            c2.copy_from_slice(msg);
            // 密钥流全零时重新选取 k
            if !kdf_xor(&x2, &y2, &mut c2) {
                continue;
            }

            let c3 = Sm3::new()
                .chain_update(x2)
                .chain_update(msg)
                .chain_update(y2)
                .finalize();
            let c1 = c1.to_encoded_point(false);
            let c1 = c1.as_bytes();

            return Ok(match self.mode {
                CiphertextMode::C1C3C2 => [c1, c3.as_slice(), c2.as_slice()].concat(),
                CiphertextMode::C1C2C3 => [c1, c2.as_slice(), c3.as_slice()].concat(),
            });
        }
    }
}

/// 解密方向的 SM2 上下文
pub(crate) struct Decryptor {
    secret_key: SecretKey,
    mode: CiphertextMode,
}

impl Decryptor {
    pub(crate) fn new(secret_key: SecretKey, mode: CiphertextMode) -> Self {
        Self { secret_key, mode }
    }

    pub(crate) fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let plaintext_len = plaintext_len(ciphertext).map_err(|e| decrypt_error(&e.to_string()))?;
        let c1_len = ciphertext.len() - plaintext_len - C3_LEN;
        let (c1, rest) = ciphertext.split_at(c1_len);

        // 点必须在曲线上且不为无穷远点
        let c1 = PublicKey::from_sec1_bytes(c1).map_err(|_| decrypt_error("C1 is not a valid curve point"))?;
        let shared = (c1.to_projective() * *self.secret_key.to_nonzero_scalar()).to_affine();
        let (x2, y2) = coordinates(&shared).ok_or_else(|| decrypt_error("shared point is the identity"))?;

        let (c2, c3) = match self.mode {
            CiphertextMode::C1C3C2 => {
                let (c3, c2) = rest.split_at(C3_LEN);
                (c2, c3)
            }
            CiphertextMode::C1C2C3 => rest.split_at(plaintext_len),
        };

        let mut plaintext = Zeroizing::new(c2.to_vec());
        if !kdf_xor(&x2, &y2, &mut plaintext) {
            return Err(decrypt_error("derived key stream is all zero"));
        }

        let u = Sm3::new()
            .chain_update(x2)
            .chain_update(plaintext.as_slice())
            .chain_update(y2)
            .finalize();
        if !bool::from(u.as_slice().ct_eq(c3)) {
            return Err(decrypt_error("C3 digest mismatch"));
        }
        Ok(plaintext)
    }
}

/// 给定明文长度的密文长度（C1 非压缩）
pub(crate) fn ciphertext_len(plaintext_len: usize) -> Result<usize> {
    if plaintext_len == 0 {
        return Err(Error::SizeQuery("plaintext is empty".to_string()));
    }
    plaintext_len
        .checked_add(C1_UNCOMPRESSED_LEN + C3_LEN)
        .ok_or_else(|| Error::SizeQuery("plaintext too long".to_string()))
}

/// 由密文首字节判断 C1 编码，得出明文长度
pub(crate) fn plaintext_len(ciphertext: &[u8]) -> Result<usize> {
    let c1_len = match ciphertext.first() {
        Some(0x04) => C1_UNCOMPRESSED_LEN,
        Some(0x02) | Some(0x03) => C1_COMPRESSED_LEN,
        Some(tag) => return Err(Error::SizeQuery(format!("unknown C1 point tag {:#04x}", tag))),
        None => return Err(Error::SizeQuery("ciphertext is empty".to_string())),
    };
    match ciphertext.len().checked_sub(c1_len + C3_LEN) {
        Some(len) if len > 0 => Ok(len),
        _ => Err(Error::SizeQuery(format!(
            "{} byte ciphertext is shorter than the SM2 overhead",
            ciphertext.len()
        ))),
    }
}

fn coordinates(point: &AffinePoint) -> Option<(Vec<u8>, Vec<u8>)> {
    let encoded = point.to_encoded_point(false);
    Some((encoded.x()?.to_vec(), encoded.y()?.to_vec()))
}

/// 以 KDF(x2 ‖ y2) 的输出异或 `buf`，返回密钥流是否含非零字节
fn kdf_xor(x2: &[u8], y2: &[u8], buf: &mut [u8]) -> bool {
    let mut nonzero = 0u8;
    for (block, ct) in buf.chunks_mut(C3_LEN).zip(1u32..) {
        let t = Sm3::new()
            .chain_update(x2)
            .chain_update(y2)
            .chain_update(ct.to_be_bytes())
            .finalize();
        for (b, k) in block.iter_mut().zip(t.iter()) {
            nonzero |= k;
            *b ^= k;
        }
    }
    nonzero != 0
}

fn encrypt_error(msg: &str) -> Error {
    Error::Operation(format!("SM2 encrypt: {}", msg))
}

fn decrypt_error(msg: &str) -> Error {
    Error::Operation(format!("SM2 decrypt: {}", msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn key_pair() -> (SecretKey, PublicKey) {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        (secret, public)
    }

    #[test]
    fn test_round_trip_both_layouts() {
        let (secret, public) = key_pair();
        let message = b"sensor reading 0042, seventy bytes or so to span more than one block..";
        for mode in [CiphertextMode::C1C3C2, CiphertextMode::C1C2C3] {
            let cipher = Encryptor::new(public, mode).encrypt(message).unwrap();
            assert_eq!(cipher.len(), ciphertext_len(message.len()).unwrap());
            assert_eq!(cipher[0], 0x04);
            let plain = Decryptor::new(secret.clone(), mode).decrypt(&cipher).unwrap();
            assert_eq!(plain.as_slice(), &message[..]);
        }
    }

    #[test]
    fn test_layouts_place_digest_differently() {
        let (secret, public) = key_pair();
        let cipher = Encryptor::new(public, CiphertextMode::C1C3C2)
            .encrypt(b"hello")
            .unwrap();
        // 按另一种排列解析时摘要校验失败
        let err = Decryptor::new(secret, CiphertextMode::C1C2C3)
            .decrypt(&cipher)
            .unwrap_err();
        assert!(matches!(err, Error::Operation(_)));
    }

    #[test]
    fn test_compressed_c1_accepted() {
        let (secret, public) = key_pair();
        let cipher = Encryptor::new(public, CiphertextMode::C1C3C2)
            .encrypt(b"hello")
            .unwrap();
        let c1 = PublicKey::from_sec1_bytes(&cipher[..C1_UNCOMPRESSED_LEN]).unwrap();
        let compressed = [
            c1.to_encoded_point(true).as_bytes(),
            &cipher[C1_UNCOMPRESSED_LEN..],
        ]
        .concat();
        assert_eq!(compressed.len(), cipher.len() - 32);
        assert_eq!(plaintext_len(&compressed).unwrap(), 5);

        let plain = Decryptor::new(secret, CiphertextMode::C1C3C2)
            .decrypt(&compressed)
            .unwrap();
        assert_eq!(plain.as_slice(), b"hello");
    }

    #[test]
    fn test_tampered_digest_rejected() {
        let (secret, public) = key_pair();
        let mut cipher = Encryptor::new(public, CiphertextMode::C1C3C2)
            .encrypt(b"hello")
            .unwrap();
        cipher[C1_UNCOMPRESSED_LEN] ^= 0x80;
        let err = Decryptor::new(secret, CiphertextMode::C1C3C2)
            .decrypt(&cipher)
            .unwrap_err();
        assert!(matches!(err, Error::Operation(_)));
    }

    #[test]
    fn test_off_curve_c1_rejected() {
        let (secret, public) = key_pair();
        let mut cipher = Encryptor::new(public, CiphertextMode::C1C3C2)
            .encrypt(b"hello")
            .unwrap();
        cipher[64] ^= 0x01;
        let err = Decryptor::new(secret, CiphertextMode::C1C3C2)
            .decrypt(&cipher)
            .unwrap_err();
        assert!(err.to_string().contains("C1"), "{}", err);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let (_, public) = key_pair();
        let (other, _) = key_pair();
        let cipher = Encryptor::new(public, CiphertextMode::C1C3C2)
            .encrypt(b"hello")
            .unwrap();
        assert!(Decryptor::new(other, CiphertextMode::C1C3C2)
            .decrypt(&cipher)
            .is_err());
    }

    #[test]
    fn test_fresh_randomness_per_encryption() {
        let (_, public) = key_pair();
        let encryptor = Encryptor::new(public, CiphertextMode::C1C3C2);
        let a = encryptor.encrypt(b"hello").unwrap();
        let b = encryptor.encrypt(b"hello").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_kdf_counter_blocks() {
        let x2 = [0x11u8; 32];
        let y2 = [0x22u8; 32];
        let mut stream = [0u8; 40];
        assert!(kdf_xor(&x2, &y2, &mut stream));

        let block = |ct: u32| {
            Sm3::new()
                .chain_update(x2)
                .chain_update(y2)
                .chain_update(ct.to_be_bytes())
                .finalize()
        };
        assert_eq!(&stream[..32], block(1).as_slice());
        assert_eq!(&stream[32..], &block(2)[..8]);
    }

    #[test]
    fn test_length_helpers() {
        assert_eq!(ciphertext_len(5).unwrap(), 102);
        assert!(ciphertext_len(0).is_err());
        assert!(ciphertext_len(usize::MAX).is_err());
        let mut cipher = vec![0x04; 102];
        assert_eq!(plaintext_len(&cipher).unwrap(), 5);
        cipher[0] = 0x02;
        assert_eq!(plaintext_len(&cipher).unwrap(), 37);
        assert!(plaintext_len(&[0x04; 97]).is_err());
        assert!(plaintext_len(&[0x05; 120]).is_err());
    }
}
