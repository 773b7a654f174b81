//! 32 位扩展中断寄存器解码
//!
//! 寄存器低 8 位每位对应一个端口的中断挂起标志，端口 `p` 的 3 位中断类型
//! 位于 `8 + 3 * p`。

use super::registers::{ExtendedInterrupt, NEO_MAX_PORTS};

const POLL_PENDING_MASK: u32 = 0xff;
const POLL_TYPE_SHIFT: u32 = 8;
const POLL_TYPE_BITS: u32 = 3;
const POLL_TYPE_MASK: u32 = 0x7;

/// 一次读取到的扩展中断状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollStatus(u32);

impl PollStatus {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    /// 全零表示中断不属于本板卡
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_pending(&self, port: usize) -> bool {
        port < NEO_MAX_PORTS && self.0 & (1 << port) != 0
    }

    /// 端口的原始 3 位类型码，端口号越界时为 0
    pub fn cause_code(&self, port: usize) -> u8 {
        if port >= NEO_MAX_PORTS {
            return 0;
        }
        ((self.0 >> (POLL_TYPE_SHIFT + POLL_TYPE_BITS * port as u32)) & POLL_TYPE_MASK) as u8
    }

    /// 端口的中断类型，类型码为 0 或未定义时返回 `None`（芯片在高负载下偶尔会给出伪中断）
    pub fn cause(&self, port: usize) -> Option<ExtendedInterrupt> {
        ExtendedInterrupt::from_code(self.cause_code(port))
    }

    /// 按端口号升序遍历所有挂起的端口
    pub fn pending(&self) -> impl Iterator<Item = (usize, Option<ExtendedInterrupt>)> + '_ {
        (0..NEO_MAX_PORTS)
            .filter(move |&port| self.0 & POLL_PENDING_MASK & (1 << port) != 0)
            .map(move |port| (port, self.cause(port)))
    }
}
