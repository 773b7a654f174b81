//! Exar XR17C158 / XR17D158 / XR17E158（Digi Neo）驱动模块
//!
//! 芯片为内存映射的 8 端口 UART，每个端口的寄存器窗口间隔 0x200 字节，
//! 板级配置寄存器（扩展中断轮询、DVID、EEPROM 控制）位于通道 0 窗口内。

// 每通道寄存器块与芯片专用常量
pub mod registers;

// 16550 兼容寄存器位定义
pub mod serial_reg;

// 板级 MMIO 访问
pub mod mmio;

pub mod board;
pub mod channel;
pub mod eeprom;
pub mod poll;

pub use board::*;
pub use channel::*;
pub use mmio::*;

#[cfg(test)]
pub(crate) mod test_util;
