//! 两阶段输出长度协商
//!
//! 先查询所需长度，再按该长度精确分配缓冲区，最后执行真正的运算；
//! 第二阶段返回的长度为准，可能小于第一阶段的长度。

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::OutputBuffer;

/// 支持两阶段长度协商的运算
#[cfg_attr(test, mockall::automock)]
pub trait TwoPhaseOperation {
    /// 运算名称，用于日志
    fn name(&self) -> &'static str;

    /// 第一阶段：返回输出所需的字节数
    fn required_len(&self, input: &[u8]) -> Result<usize>;

    /// 第二阶段：写入 `out`，返回实际写入的字节数
    fn perform(&self, input: &[u8], out: &mut [u8]) -> Result<usize>;
}

/// 执行完整的 查询长度 → 分配 → 运算 流程
pub fn run_two_phase<O>(op: &O, input: &[u8]) -> Result<OutputBuffer>
where
    O: TwoPhaseOperation + ?Sized,
{
    let required = op.required_len(input).map_err(|e| {
        warn!("{}: size query failed: {}", op.name(), e);
        match e {
            Error::SizeQuery(_) => e,
            other => Error::SizeQuery(other.to_string()),
        }
    })?;

    let mut bytes = Vec::new();
    bytes.try_reserve_exact(required).map_err(|_| {
        warn!("{}: cannot allocate {} bytes", op.name(), required);
        Error::Allocation {
            requested: required,
        }
    })?;
    bytes.resize(required, 0);
    // 失败路径上缓冲区随 OutputBuffer 一起清零释放
    let mut out = OutputBuffer::new(bytes);

    let written = op.perform(input, out.as_mut_slice()).map_err(|e| {
        warn!("{} failed: {}", op.name(), e);
        e
    })?;
    if written > required {
        return Err(Error::Operation(format!(
            "{} reported {} bytes for a {} byte buffer",
            op.name(),
            written,
            required
        )));
    }
    out.truncate(written);

    debug!("{}: {} of {} queried bytes used", op.name(), written, required);
    Ok(out)
}
