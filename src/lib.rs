#![cfg_attr(not(test), no_std)]

//! Exar XR17C158 系列（Digi "Neo"）多端口 UART 驱动
//!
//! - [`neo::registers`]: 每通道寄存器块布局与芯片专用常量
//! - [`neo::channel`]: 单通道驱动，实现 [`ChannelOps`]
//! - [`neo::board`]: 板级操作（扩展中断轮询、VPD），实现 [`BoardOps`]

use bitflags::bitflags;
use thiserror::Error;

pub mod neo;

pub use neo::{NeoBoard, NeoChannel};

// ============================================================================
// 错误类型定义
// ============================================================================

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// 无效的波特率（除数超出 16 位范围）
    #[error("invalid baudrate {0}")]
    InvalidBaudrate(u32),
}

/// FIFO 方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoDirection {
    Tx,
    Rx,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeoError {
    /// 芯片在轮询次数内没有完成 FIFO 清空
    #[error("timed out flushing the {0:?} FIFO")]
    FlushTimeout(FifoDirection),
    /// 端口数量不在 1..=8 之内
    #[error("invalid port count {0}")]
    InvalidPortCount(usize),
    /// 端口号超出板卡端口数
    #[error("port {0} out of range")]
    PortOutOfRange(usize),
}

// ============================================================================
// 配置枚举类型
// ============================================================================

/// 数据位配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataBits {
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
}

/// 停止位配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StopBits {
    One = 1,
    Two = 2,
}

/// 奇偶校验配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
    Mark,
    Space,
}

/// 流控配置
///
/// `start_char`/`stop_char` 为 `None` 表示字符被禁用，此时软件流控即使打开
/// 也会退化为无流控。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowControl {
    /// 输出方向硬件流控（CTS/DSR）
    pub cts: bool,
    /// 输入方向硬件流控（RTS/DTR）
    pub rts: bool,
    /// 输出方向软件流控：收到 XOFF 时暂停发送
    pub ixon: bool,
    /// 输入方向软件流控：由芯片发送 XON/XOFF
    pub ixoff: bool,
    pub start_char: Option<u8>,
    pub stop_char: Option<u8>,
}

impl FlowControl {
    /// RTS/CTS 双向硬件流控
    pub fn hardware() -> Self {
        Self {
            cts: true,
            rts: true,
            ..Default::default()
        }
    }

    /// XON/XOFF 双向软件流控
    pub fn software(start_char: u8, stop_char: u8) -> Self {
        Self {
            ixon: true,
            ixoff: true,
            start_char: Some(start_char),
            stop_char: Some(stop_char),
            ..Default::default()
        }
    }

    fn chars_enabled(&self) -> bool {
        self.start_char.is_some() && self.stop_char.is_some()
    }

    pub(crate) fn xon_active(&self) -> bool {
        !self.cts && self.ixon && self.chars_enabled()
    }

    pub(crate) fn xoff_active(&self) -> bool {
        !self.rts && self.ixoff && self.chars_enabled()
    }
}

/// 串口配置，未设置的字段保持当前值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    pub baudrate: Option<u32>,
    pub data_bits: Option<DataBits>,
    pub stop_bits: Option<StopBits>,
    pub parity: Option<Parity>,
    pub flow_control: Option<FlowControl>,
    /// 命中这些状态位的接收字节会被直接丢弃
    pub ignore_errors: Option<LineStatus>,
    /// 是否使能接收
    pub receiver: Option<bool>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn baudrate(mut self, baudrate: u32) -> Self {
        self.baudrate = Some(baudrate);
        self
    }

    pub fn data_bits(mut self, bits: DataBits) -> Self {
        self.data_bits = Some(bits);
        self
    }

    pub fn stop_bits(mut self, bits: StopBits) -> Self {
        self.stop_bits = Some(bits);
        self
    }

    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = Some(parity);
        self
    }

    pub fn flow_control(mut self, flow: FlowControl) -> Self {
        self.flow_control = Some(flow);
        self
    }

    pub fn ignore_errors(mut self, mask: LineStatus) -> Self {
        self.ignore_errors = Some(mask);
        self
    }

    pub fn receiver(mut self, enable: bool) -> Self {
        self.receiver = Some(enable);
        self
    }
}

// ============================================================================
// 状态标志类型
// ============================================================================

bitflags! {
    /// 线路状态标志（与 LSR 位一一对应）
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineStatus: u8 {
        const DATA_READY = 0x01;
        const OVERRUN_ERROR = 0x02;
        const PARITY_ERROR = 0x04;
        const FRAMING_ERROR = 0x08;
        const BREAK_INTERRUPT = 0x10;
        const TX_HOLDING_EMPTY = 0x20;
        const TX_EMPTY = 0x40;
        const FIFO_ERROR = 0x80;
    }
}

impl LineStatus {
    pub fn can_read(&self) -> bool {
        self.contains(LineStatus::DATA_READY)
    }

    pub fn can_write(&self) -> bool {
        self.contains(LineStatus::TX_HOLDING_EMPTY)
    }

    /// 是否带有接收错误（奇偶、帧、中止）
    pub fn has_rx_error(&self) -> bool {
        self.intersects(
            LineStatus::PARITY_ERROR | LineStatus::FRAMING_ERROR | LineStatus::BREAK_INTERRUPT,
        )
    }
}

bitflags! {
    /// 调制解调器输入信号（MSR 高半字节）
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModemStatus: u8 {
        const CTS = 0x10;
        const DSR = 0x20;
        const RI = 0x40;
        const DCD = 0x80;
    }
}

// ============================================================================
// 板卡操作接口
// ============================================================================

/// 单通道操作集
///
/// 对应驱动中按芯片家族提供的 board ops 函数表里作用于单个端口的部分。
/// 所有方法都需要 `&mut self`，并发访问由调用者串行化。
pub trait ChannelOps {
    /// 复位 FIFO、打开增强功能并输出当前的 MCR 影子值
    fn uart_init(&mut self);
    /// 关闭增强功能与全部中断
    fn uart_off(&mut self);
    /// 应用线路参数与流控配置
    fn param(&mut self, config: &Config) -> Result<(), ConfigError>;
    /// 把 MCR 影子值写入芯片
    fn assert_modem_signals(&mut self);

    fn flush_uart_write(&mut self) -> Result<(), crate::NeoError>;
    fn flush_uart_read(&mut self) -> Result<(), crate::NeoError>;

    fn disable_receiver(&mut self);
    fn enable_receiver(&mut self);

    fn send_break(&mut self);
    fn clear_break(&mut self, force: bool);

    fn send_start_character(&mut self);
    fn send_stop_character(&mut self);
    fn send_immediate_char(&mut self, c: u8);

    /// 把写队列中的数据搬到发送 FIFO
    fn copy_data_from_queue_to_uart(&mut self);
    /// 发送器中尚未发出的字节数（0 或 1，芯片只报告是否为空）
    fn get_uart_bytes_left(&mut self) -> usize;
}

/// 板级操作集
pub trait BoardOps {
    type Channel: ChannelOps;

    /// 服务一次板卡中断，返回中断是否属于本板卡
    fn intr(&mut self, channels: &mut [Self::Channel]) -> bool;
    /// 读取并缓存 VPD 映像
    fn vpd(&mut self) -> &neo::eeprom::Vpd;
}
