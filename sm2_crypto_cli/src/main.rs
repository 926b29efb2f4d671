//! SM2 密码运算 CLI 工具

use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::Engine;
use clap::{Parser, Subcommand, ValueEnum};
use sm2_crypto_core::{CryptoConfig, Error, Sm2Crypto};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sm2-crypto")]
#[command(about = "SM2 密钥生成、签名与加解密工具", long_about = None)]
struct Cli {
    /// JSON 配置文件路径
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 曲线名，覆盖配置文件（SM2 / prime256v1）
    #[arg(long, global = true)]
    curve: Option<String>,

    /// 二进制数据在终端上的编码
    #[arg(long, value_enum, default_value_t = TextEncoding::Hex, global = true)]
    encoding: TextEncoding,

    /// 日志级别（RUST_LOG 优先）
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum TextEncoding {
    Hex,
    Base64,
}

impl TextEncoding {
    fn encode(self, data: &[u8]) -> String {
        match self {
            TextEncoding::Hex => hex::encode(data),
            TextEncoding::Base64 => base64::engine::general_purpose::STANDARD.encode(data),
        }
    }

    fn decode(self, text: &str) -> anyhow::Result<Vec<u8>> {
        let text = text.trim();
        let data = match self {
            TextEncoding::Hex => hex::decode(text)?,
            TextEncoding::Base64 => base64::engine::general_purpose::STANDARD.decode(text)?,
        };
        Ok(data)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// 生成密钥对
    Keygen {
        /// 私钥输出路径
        #[arg(long)]
        private_out: Option<PathBuf>,
        /// 公钥输出路径
        #[arg(long)]
        public_out: Option<PathBuf>,
    },
    /// 由私钥推导公钥
    Pubkey {
        /// 私钥 PEM 文件路径
        #[arg(short, long)]
        key: PathBuf,
        /// 公钥输出路径
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 签名
    Sign {
        /// 私钥 PEM 文件路径
        #[arg(short, long)]
        key: PathBuf,
        /// 消息文件路径
        #[arg(short, long)]
        message: PathBuf,
        /// 输出签名文件路径（原始 DER）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 验签
    Verify {
        /// 公钥 PEM 文件路径
        #[arg(short, long)]
        key: PathBuf,
        /// 消息文件路径
        #[arg(short, long)]
        message: PathBuf,
        /// 签名文件路径
        #[arg(short, long)]
        signature: PathBuf,
        /// 签名文件为 --encoding 编码的文本
        #[arg(long)]
        encoded: bool,
    },
    /// 公钥加密
    Encrypt {
        /// 公钥 PEM 文件路径
        #[arg(short, long)]
        key: PathBuf,
        /// 明文文件路径
        #[arg(short, long)]
        input: PathBuf,
        /// 输出密文文件路径（原始字节）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 私钥解密
    Decrypt {
        /// 私钥 PEM 文件路径
        #[arg(short, long)]
        key: PathBuf,
        /// 密文文件路径
        #[arg(short, long)]
        input: PathBuf,
        /// 密文文件为 --encoding 编码的文本
        #[arg(long)]
        encoded: bool,
        /// 输出明文文件路径
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let crypto = build_service(cli.config.as_deref(), cli.curve.as_deref())?;
    let encoding = cli.encoding;

    match cli.command {
        Commands::Keygen { private_out, public_out } => {
            do_keygen(&crypto, private_out.as_deref(), public_out.as_deref())?;
        }
        Commands::Pubkey { key, output } => {
            do_pubkey(&crypto, &key, output.as_deref())?;
        }
        Commands::Sign { key, message, output } => {
            do_sign(&crypto, encoding, &key, &message, output.as_deref())?;
        }
        Commands::Verify { key, message, signature, encoded } => {
            let signature = read_binary(&signature, encoded.then_some(encoding))?;
            if !do_verify(&crypto, &key, &message, &signature)? {
                std::process::exit(1);
            }
        }
        Commands::Encrypt { key, input, output } => {
            do_encrypt(&crypto, encoding, &key, &input, output.as_deref())?;
        }
        Commands::Decrypt { key, input, encoded, output } => {
            let ciphertext = read_binary(&input, encoded.then_some(encoding))?;
            do_decrypt(&crypto, encoding, &key, &ciphertext, output.as_deref())?;
        }
    }

    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_service(config_path: Option<&Path>, curve: Option<&str>) -> anyhow::Result<Sm2Crypto> {
    let mut config = match config_path {
        Some(path) => CryptoConfig::from_file(path)
            .with_context(|| format!("无法加载配置文件 {}", path.display()))?,
        None => CryptoConfig::default(),
    };
    if let Some(curve) = curve {
        config.curve = curve.to_string();
    }
    debug!("Using config: {:?}", config);
    Ok(Sm2Crypto::new(config)?)
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("无法读取文件 {}", path.display()))
}

fn read_binary(path: &Path, encoding: Option<TextEncoding>) -> anyhow::Result<Vec<u8>> {
    let data = read_file(path)?;
    match encoding {
        Some(encoding) => encoding
            .decode(&String::from_utf8_lossy(&data))
            .with_context(|| format!("{} 不是有效的编码文本", path.display())),
        None => Ok(data),
    }
}

fn write_file(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, data).with_context(|| format!("无法写入文件 {}", path.display()))
}

fn do_keygen(crypto: &Sm2Crypto, private_out: Option<&Path>, public_out: Option<&Path>) -> anyhow::Result<()> {
    let key_pair = crypto.generate_key_pair()?;

    match private_out {
        Some(path) => {
            write_file(path, key_pair.private_pem.as_bytes())?;
            println!("私钥已保存到: {}", path.display());
        }
        None => print!("{}", key_pair.private_pem.as_str()),
    }
    match public_out {
        Some(path) => {
            write_file(path, key_pair.public_pem.as_bytes())?;
            println!("公钥已保存到: {}", path.display());
        }
        None => print!("{}", key_pair.public_pem),
    }

    Ok(())
}

fn do_pubkey(crypto: &Sm2Crypto, key: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let private_pem = zeroize::Zeroizing::new(read_file(key)?);
    let public_pem = crypto.derive_public_key(&private_pem)?;

    if let Some(path) = output {
        write_file(path, public_pem.as_bytes())?;
        println!("公钥已保存到: {}", path.display());
    } else {
        print!("{}", public_pem);
    }

    Ok(())
}

fn do_sign(
    crypto: &Sm2Crypto,
    encoding: TextEncoding,
    key: &Path,
    message: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let private_pem = zeroize::Zeroizing::new(read_file(key)?);
    let message = read_file(message)?;
    let signature = crypto.sign(&message, &private_pem)?;

    if let Some(path) = output {
        write_file(path, &signature)?;
        println!("签名已保存到: {}", path.display());
    } else {
        println!("{}", encoding.encode(&signature));
    }

    Ok(())
}

fn do_verify(crypto: &Sm2Crypto, key: &Path, message: &Path, signature: &[u8]) -> anyhow::Result<bool> {
    let public_pem = read_file(key)?;
    let message = read_file(message)?;

    match crypto.verify(&message, signature, &public_pem) {
        Ok(()) => {
            println!("验签成功");
            Ok(true)
        }
        Err(Error::VerificationFailed) => {
            println!("验签失败");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn do_encrypt(
    crypto: &Sm2Crypto,
    encoding: TextEncoding,
    key: &Path,
    input: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let public_pem = read_file(key)?;
    let plaintext = zeroize::Zeroizing::new(read_file(input)?);
    let ciphertext = crypto.encrypt(&plaintext, &public_pem)?;

    if let Some(path) = output {
        write_file(path, &ciphertext)?;
        println!("密文已保存到: {}", path.display());
    } else {
        println!("{}", encoding.encode(&ciphertext));
    }

    Ok(())
}

fn do_decrypt(
    crypto: &Sm2Crypto,
    encoding: TextEncoding,
    key: &Path,
    ciphertext: &[u8],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let private_pem = zeroize::Zeroizing::new(read_file(key)?);
    let plaintext = crypto.decrypt(ciphertext, &private_pem)?;

    if let Some(path) = output {
        write_file(path, &plaintext)?;
        println!("明文已保存到: {}", path.display());
    } else {
        // 明文可能是任意二进制，按 --encoding 输出
        println!("{}", zeroize::Zeroizing::new(encoding.encode(&plaintext)).as_str());
    }

    Ok(())
}
