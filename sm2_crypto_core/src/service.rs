//! SM2 密码服务
//!
//! 持有一份只读配置，所有运算互相独立、无跨调用状态，可在多线程间共享。

use tracing::info;

use crate::config::CryptoConfig;
use crate::error::Result;
use crate::types::{KeyPair, OutputBuffer};
use crate::{keygen, pke, signing};

/// SM2 密码服务
#[derive(Debug, Clone, Default)]
pub struct Sm2Crypto {
    config: CryptoConfig,
}

impl Sm2Crypto {
    /// 使用给定配置创建服务
    pub fn new(config: CryptoConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "SM2 crypto service ready (curve {}, ciphertext {:?})",
            config.curve, config.ciphertext_mode
        );
        Ok(Self { config })
    }

    /// 使用指定曲线的默认配置创建服务
    pub fn with_curve(curve: &str) -> Result<Self> {
        Self::new(CryptoConfig::with_curve(curve)?)
    }

    pub fn config(&self) -> &CryptoConfig {
        &self.config
    }

    /// 生成密钥对
    pub fn generate_key_pair(&self) -> Result<KeyPair> {
        keygen::generate_key_pair(&self.config)
    }

    /// 由私钥推导公钥
    pub fn derive_public_key(&self, private_pem: &[u8]) -> Result<String> {
        keygen::derive_public_key(private_pem, &self.config)
    }

    /// 签名
    pub fn sign(&self, message: &[u8], private_pem: &[u8]) -> Result<OutputBuffer> {
        signing::sign(message, private_pem, &self.config)
    }

    /// 签名输出长度上界，会先完成私钥解码与上下文初始化
    pub fn signature_len(&self, private_pem: &[u8]) -> Result<usize> {
        signing::signature_len(private_pem, &self.config)
    }

    /// 验签
    pub fn verify(&self, message: &[u8], signature: &[u8], public_pem: &[u8]) -> Result<()> {
        signing::verify(message, signature, public_pem, &self.config)
    }

    /// 公钥加密
    pub fn encrypt(&self, plaintext: &[u8], public_pem: &[u8]) -> Result<OutputBuffer> {
        pke::encrypt(plaintext, public_pem, &self.config)
    }

    /// 加密输出长度
    pub fn encrypted_len(&self, plaintext: &[u8], public_pem: &[u8]) -> Result<usize> {
        pke::encrypted_len(plaintext, public_pem, &self.config)
    }

    /// 解密输出长度
    pub fn decrypted_len(&self, ciphertext: &[u8], private_pem: &[u8]) -> Result<usize> {
        pke::decrypted_len(ciphertext, private_pem, &self.config)
    }

    /// 私钥解密
    pub fn decrypt(&self, ciphertext: &[u8], private_pem: &[u8]) -> Result<OutputBuffer> {
        pke::decrypt(ciphertext, private_pem, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_service_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Sm2Crypto>();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CryptoConfig {
            curve: "ed25519".to_string(),
            ..CryptoConfig::default()
        };
        assert!(matches!(Sm2Crypto::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_concurrent_operations() {
        let crypto = std::sync::Arc::new(Sm2Crypto::default());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let crypto = crypto.clone();
                std::thread::spawn(move || {
                    let pair = crypto.generate_key_pair().unwrap();
                    let message = format!("message {}", i);
                    let sig = crypto.sign(message.as_bytes(), pair.private_pem.as_bytes()).unwrap();
                    crypto
                        .verify(message.as_bytes(), &sig, pair.public_pem.as_bytes())
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
