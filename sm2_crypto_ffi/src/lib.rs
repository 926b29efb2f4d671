//! SM2 密码运算 FFI 绑定
//!
//! 提供 C ABI 兼容的接口，供嵌入式客户端调用。
//!
//! 输出约定（两阶段）：输出指针为 NULL 时，仅在 `*out_len` 写入所需长度；
//! 否则 `*out_len` 传入缓冲区容量，成功后写回实际长度。
//! PEM 输出以 NUL 结尾，所需长度含 NUL，写回长度不含 NUL；二进制输出不加 NUL。
//! 签名与密钥生成带随机性，查询阶段返回上界。
//! 查询阶段同样完成密钥解码、算法标记与上下文初始化，坏密钥在此即报错。

use std::ffi::{c_char, c_int, c_uchar, c_ulong, CStr};
use std::ptr;
use std::slice;

use sm2_crypto_core::{CryptoConfig, Error, Result, Sm2Crypto};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// 错误码定义
pub const SM2C_OK: c_int = 0;
pub const SM2C_ERR_PEM_FRAMING: c_int = -1;
pub const SM2C_ERR_KEY_PARSE: c_int = -2;
pub const SM2C_ERR_OPERATION: c_int = -3;
pub const SM2C_ERR_CURVE_LOOKUP: c_int = -4;
pub const SM2C_ERR_CONTEXT: c_int = -5;
pub const SM2C_ERR_INIT: c_int = -6;
pub const SM2C_ERR_ALGORITHM_TAG: c_int = -7;
pub const SM2C_ERR_SIZE_QUERY: c_int = -8;
pub const SM2C_ERR_ALLOCATION: c_int = -9;
pub const SM2C_ERR_KEY_GENERATION: c_int = -10;
pub const SM2C_ERR_ENCODING: c_int = -11;
pub const SM2C_ERR_CONFIG: c_int = -12;
pub const SM2C_ERR_IO: c_int = -13;
pub const SM2C_ERR_NULL_PTR: c_int = -20;
pub const SM2C_ERR_BUFFER_TOO_SMALL: c_int = -21;

/// PEM 输出缓冲区上界（含 NUL）
pub const SM2C_PEM_MAX_LEN: c_ulong = 512;

/// 运算上下文
pub struct Sm2cContext {
    crypto: Sm2Crypto,
}

fn error_code(err: &Error) -> c_int {
    err.code()
}

/// 读取 NUL 结尾的 PEM 文本
unsafe fn pem_input<'a>(pem: *const c_char) -> &'a [u8] {
    CStr::from_ptr(pem).to_bytes()
}

/// 读取字节输入，长度为 0 时允许 NULL
unsafe fn bytes_input<'a>(data: *const c_uchar, len: c_ulong) -> Option<&'a [u8]> {
    if len == 0 {
        Some(&[])
    } else if data.is_null() {
        None
    } else {
        Some(slice::from_raw_parts(data, len as usize))
    }
}

/// 按两阶段约定写出结果
unsafe fn write_output(data: &[u8], nul_terminated: bool, out: *mut c_uchar, out_len: *mut c_ulong) -> c_int {
    let required = data.len() + usize::from(nul_terminated);
    if out.is_null() {
        *out_len = required as c_ulong;
        return SM2C_OK;
    }
    if (*out_len as usize) < required {
        *out_len = required as c_ulong;
        return SM2C_ERR_BUFFER_TOO_SMALL;
    }
    ptr::copy_nonoverlapping(data.as_ptr(), out, data.len());
    if nul_terminated {
        *out.add(data.len()) = 0;
    }
    *out_len = data.len() as c_ulong;
    SM2C_OK
}

/// 长度查询阶段：密钥已完成解码与初始化后才写回长度
unsafe fn write_required_len(required: Result<usize>, out_len: *mut c_ulong) -> c_int {
    match required {
        Ok(len) => {
            *out_len = len as c_ulong;
            SM2C_OK
        }
        Err(e) => error_code(&e),
    }
}

/// 创建默认配置（SM2）的上下文
#[no_mangle]
pub extern "C" fn sm2c_context_new() -> *mut Sm2cContext {
    Box::into_raw(Box::new(Sm2cContext {
        crypto: Sm2Crypto::default(),
    }))
}

/// 使用 JSON 配置创建上下文，失败返回 NULL
#[no_mangle]
pub extern "C" fn sm2c_context_new_with_config(json: *const c_char) -> *mut Sm2cContext {
    if json.is_null() {
        return ptr::null_mut();
    }

    let json = unsafe { CStr::from_ptr(json) };
    let json = match json.to_str() {
        Ok(s) => s,
        Err(_) => return ptr::null_mut(),
    };

    match CryptoConfig::from_json_str(json).and_then(Sm2Crypto::new) {
        Ok(crypto) => Box::into_raw(Box::new(Sm2cContext { crypto })),
        Err(e) => {
            warn!("Failed to create context: {}", e);
            ptr::null_mut()
        }
    }
}

/// 销毁上下文
#[no_mangle]
pub extern "C" fn sm2c_context_free(ctx: *mut Sm2cContext) {
    if !ctx.is_null() {
        unsafe {
            drop(Box::from_raw(ctx));
        }
    }
}

/// 生成密钥对
///
/// 任一输出指针为 NULL 时，两个长度均写入 `SM2C_PEM_MAX_LEN`。
#[no_mangle]
pub extern "C" fn sm2c_generate_key_pair(
    ctx: *const Sm2cContext,
    out_private: *mut c_char,
    private_len: *mut c_ulong,
    out_public: *mut c_char,
    public_len: *mut c_ulong,
) -> c_int {
    if ctx.is_null() || private_len.is_null() || public_len.is_null() {
        return SM2C_ERR_NULL_PTR;
    }

    if out_private.is_null() || out_public.is_null() {
        unsafe {
            *private_len = SM2C_PEM_MAX_LEN;
            *public_len = SM2C_PEM_MAX_LEN;
        }
        return SM2C_OK;
    }

    let ctx = unsafe { &*ctx };
    let key_pair = match ctx.crypto.generate_key_pair() {
        Ok(pair) => pair,
        Err(e) => return error_code(&e),
    };

    unsafe {
        let private_capacity = *private_len;
        let rc = write_output(key_pair.private_pem.as_bytes(), true, out_private as *mut c_uchar, private_len);
        if rc != SM2C_OK {
            *public_len = (key_pair.public_pem.len() + 1) as c_ulong;
            return rc;
        }
        let rc = write_output(key_pair.public_pem.as_bytes(), true, out_public as *mut c_uchar, public_len);
        if rc != SM2C_OK {
            // 私钥不能与公钥分离返回
            ptr::write_bytes(out_private, 0, private_capacity as usize);
            *private_len = (key_pair.private_pem.len() + 1) as c_ulong;
            return rc;
        }
    }

    SM2C_OK
}

/// 由私钥推导公钥
#[no_mangle]
pub extern "C" fn sm2c_derive_public_key(
    ctx: *const Sm2cContext,
    private_pem: *const c_char,
    out_public: *mut c_char,
    out_len: *mut c_ulong,
) -> bool {
    if ctx.is_null() || private_pem.is_null() || out_len.is_null() {
        return false;
    }

    let ctx = unsafe { &*ctx };
    let private_pem = unsafe { pem_input(private_pem) };

    match ctx.crypto.derive_public_key(private_pem) {
        Ok(public_pem) => unsafe {
            write_output(public_pem.as_bytes(), true, out_public as *mut c_uchar, out_len) == SM2C_OK
        },
        Err(_) => false,
    }
}

/// 签名，输出 DER 编码签名
#[no_mangle]
pub extern "C" fn sm2c_sign(
    ctx: *const Sm2cContext,
    message: *const c_uchar,
    message_len: c_ulong,
    private_pem: *const c_char,
    out_signature: *mut c_uchar,
    out_len: *mut c_ulong,
) -> c_int {
    if ctx.is_null() || private_pem.is_null() || out_len.is_null() {
        return SM2C_ERR_NULL_PTR;
    }

    let ctx = unsafe { &*ctx };
    let private_pem = unsafe { pem_input(private_pem) };

    if out_signature.is_null() {
        return unsafe { write_required_len(ctx.crypto.signature_len(private_pem), out_len) };
    }

    let message = match unsafe { bytes_input(message, message_len) } {
        Some(m) => m,
        None => return SM2C_ERR_NULL_PTR,
    };

    match ctx.crypto.sign(message, private_pem) {
        Ok(signature) => unsafe { write_output(&signature, false, out_signature, out_len) },
        Err(e) => error_code(&e),
    }
}

/// 验签，通过返回 `SM2C_OK`
#[no_mangle]
pub extern "C" fn sm2c_verify(
    ctx: *const Sm2cContext,
    message: *const c_uchar,
    message_len: c_ulong,
    signature: *const c_uchar,
    signature_len: c_ulong,
    public_pem: *const c_char,
) -> c_int {
    if ctx.is_null() || public_pem.is_null() {
        return SM2C_ERR_NULL_PTR;
    }

    let ctx = unsafe { &*ctx };
    let (message, signature) = match unsafe {
        (bytes_input(message, message_len), bytes_input(signature, signature_len))
    } {
        (Some(m), Some(s)) => (m, s),
        _ => return SM2C_ERR_NULL_PTR,
    };
    let public_pem = unsafe { pem_input(public_pem) };

    match ctx.crypto.verify(message, signature, public_pem) {
        Ok(()) => SM2C_OK,
        Err(e) => error_code(&e),
    }
}

/// 公钥加密
#[no_mangle]
pub extern "C" fn sm2c_encrypt(
    ctx: *const Sm2cContext,
    plaintext: *const c_uchar,
    plaintext_len: c_ulong,
    public_pem: *const c_char,
    out_ciphertext: *mut c_uchar,
    out_len: *mut c_ulong,
) -> c_int {
    if ctx.is_null() || public_pem.is_null() || out_len.is_null() {
        return SM2C_ERR_NULL_PTR;
    }

    let ctx = unsafe { &*ctx };
    let plaintext = match unsafe { bytes_input(plaintext, plaintext_len) } {
        Some(p) => p,
        None => return SM2C_ERR_NULL_PTR,
    };
    let public_pem = unsafe { pem_input(public_pem) };

    if out_ciphertext.is_null() {
        return unsafe { write_required_len(ctx.crypto.encrypted_len(plaintext, public_pem), out_len) };
    }

    match ctx.crypto.encrypt(plaintext, public_pem) {
        Ok(ciphertext) => unsafe { write_output(&ciphertext, false, out_ciphertext, out_len) },
        Err(e) => error_code(&e),
    }
}

/// 私钥解密
#[no_mangle]
pub extern "C" fn sm2c_decrypt(
    ctx: *const Sm2cContext,
    ciphertext: *const c_uchar,
    ciphertext_len: c_ulong,
    private_pem: *const c_char,
    out_plaintext: *mut c_uchar,
    out_len: *mut c_ulong,
) -> c_int {
    if ctx.is_null() || private_pem.is_null() || out_len.is_null() {
        return SM2C_ERR_NULL_PTR;
    }

    let ciphertext = match unsafe { bytes_input(ciphertext, ciphertext_len) } {
        Some(c) => c,
        None => return SM2C_ERR_NULL_PTR,
    };

    let ctx = unsafe { &*ctx };
    let private_pem = unsafe { pem_input(private_pem) };

    if out_plaintext.is_null() {
        return unsafe { write_required_len(ctx.crypto.decrypted_len(ciphertext, private_pem), out_len) };
    }

    match ctx.crypto.decrypt(ciphertext, private_pem) {
        Ok(plaintext) => unsafe { write_output(&plaintext, false, out_plaintext, out_len) },
        Err(e) => error_code(&e),
    }
}

/// 安装日志订阅器
///
/// `filter` 为 NULL 时读取 `RUST_LOG`，缺省为 `warn`。重复调用返回 `SM2C_OK`。
#[no_mangle]
pub extern "C" fn sm2c_init_logging(filter: *const c_char) -> c_int {
    let filter = if filter.is_null() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    } else {
        let directives = match unsafe { CStr::from_ptr(filter) }.to_str() {
            Ok(s) => s,
            Err(_) => return SM2C_ERR_CONFIG,
        };
        match EnvFilter::try_new(directives) {
            Ok(f) => f,
            Err(_) => return SM2C_ERR_CONFIG,
        }
    };

    // 已有全局订阅器时忽略
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    SM2C_OK
}
