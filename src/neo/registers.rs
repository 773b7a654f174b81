//! XR17C158 系列每通道寄存器块与芯片专用常量
//!
//! 常量名与 Exar 数据手册及原有驱动保持一致，数值即硬件协议值，不可重新编号。
//! 同一个数值可能在不同寄存器中表示不同含义（例如 0x40 同时是 EFR.RTSDTR、
//! IER.RTSDTR、FCTR.TRGB 以及 XR17E158 的 DVID），因此每组常量另有按寄存器
//! 划分的类型，比较时只在同一寄存器的类型内进行。

use bitflags::bitflags;
use static_assertions::const_assert_eq;
use tock_registers::{register_structs, registers::*};

register_structs! {
    pub NeoUartRegisters {
        (0x000 => pub txrx: ReadWrite<u8>),      // 收发保持寄存器
        (0x001 => pub ier: ReadWrite<u8>),       // 中断使能寄存器
        (0x002 => pub isr_fcr: ReadWrite<u8>),   // 读：中断状态，写：FIFO 控制
        (0x003 => pub lcr: ReadWrite<u8>),       // 线路控制寄存器
        (0x004 => pub mcr: ReadWrite<u8>),       // 调制解调器控制寄存器
        (0x005 => pub lsr: ReadWrite<u8>),       // 线路状态寄存器
        (0x006 => pub msr: ReadWrite<u8>),       // 调制解调器状态寄存器
        (0x007 => pub spr: ReadWrite<u8>),       // 临时寄存器
        (0x008 => pub fctr: ReadWrite<u8>),      // 特性控制寄存器
        (0x009 => pub efr: ReadWrite<u8>),       // 增强功能寄存器
        (0x00a => pub tfifo: ReadWrite<u8>),     // 发送 FIFO（触发级别 / 计数）
        (0x00b => pub rfifo: ReadWrite<u8>),     // 接收 FIFO（触发级别 / 计数）
        (0x00c => pub xoffchar1: ReadWrite<u8>), // XOFF 字符 1，读回 XON/XOFF 检测状态
        (0x00d => pub xoffchar2: ReadWrite<u8>), // XOFF 字符 2
        (0x00e => pub xonchar1: ReadWrite<u8>),  // XON 字符 1
        (0x00f => pub xonchar2: ReadWrite<u8>),  // XON 字符 2
        (0x010 => _window),                      // 通道窗口其余部分（通道 0 上为设备配置寄存器）
        (0x200 => _reserved1),                   // Exar 保留，0x2ff - 0x200 字节
        (0x2ff => _gap1),
        (0x300 => pub txrxburst: [ReadWrite<u8>; 64]),         // 64 字节收发 FIFO 数据
        (0x340 => _reserved2),                   // Exar 保留，0x37f - 0x340 字节
        (0x37f => _gap2),
        (0x380 => pub rxburst_with_errors: [ReadOnly<u8>; 64]), // 接收 FIFO 数据 + LSR
        (0x3c0 => @END),
    }
}

const_assert_eq!(core::mem::size_of::<NeoUartRegisters>(), 0x3c0);
const_assert_eq!(core::mem::align_of::<NeoUartRegisters>(), 1);

/// reserved1 的字节数
pub const NEO_RESERVED1_SPAN: usize = 0x2ff - 0x200;
/// reserved2 的字节数
pub const NEO_RESERVED2_SPAN: usize = 0x37f - 0x340;

/// 相邻通道寄存器窗口的间隔
pub const NEO_CHANNEL_STRIDE: usize = 0x200;
/// 单块芯片的最大端口数
pub const NEO_MAX_PORTS: usize = 8;

// ============================================================================
// 设备配置寄存器（相对板卡基地址）
// ============================================================================

/// 扩展中断寄存器位置（32 位，而非 8 位的 ISR）
pub const UART_17158_POLL_ADDR_OFFSET: usize = 0x80;

/// DVID 寄存器，读它同时用于冲刷 PCI posted write
pub const NEO_DVID_REG: usize = 0x8D;

// 当前 Neo 板卡的 DVID
pub const UART_XR17C158_DVID: u8 = 0x20;
pub const UART_XR17D158_DVID: u8 = 0x20;
pub const UART_XR17E158_DVID: u8 = 0x40;

pub const NEO_EECK: u8 = 0x10; // Clock
pub const NEO_EECS: u8 = 0x20; // Chip Select
pub const NEO_EEDI: u8 = 0x40; // Data In 对芯片来说是输出引脚
pub const NEO_EEDO: u8 = 0x80; // Data Out 对芯片来说是输入引脚
pub const NEO_EEREG: usize = 0x8E; // EEPROM 控制寄存器偏移

/// 从 EEPROM 读取的映像大小（16 位字）
pub const NEO_VPD_IMAGESIZE: usize = 0x40;
pub const NEO_VPD_IMAGEBYTES: usize = NEO_VPD_IMAGESIZE * 2;

/// Neo 板卡波特率除数的被除数
pub const NEO_BAUD_DIVIDEND: u32 = 921_600;

// ============================================================================
// FCTR：XR17C158 上的重新定义（与 XR16C854 不同）
// ============================================================================

// 仅在选择触发表 D 时有效
pub const UART_17158_FCTR_RTS_NODELAY: u8 = 0x00;
pub const UART_17158_FCTR_RTS_4DELAY: u8 = 0x01;
pub const UART_17158_FCTR_RTS_6DELAY: u8 = 0x02;
pub const UART_17158_FCTR_RTS_8DELAY: u8 = 0x03;
pub const UART_17158_FCTR_RTS_12DELAY: u8 = 0x12;
pub const UART_17158_FCTR_RTS_16DELAY: u8 = 0x05;
pub const UART_17158_FCTR_RTS_20DELAY: u8 = 0x13;
pub const UART_17158_FCTR_RTS_24DELAY: u8 = 0x06;
pub const UART_17158_FCTR_RTS_28DELAY: u8 = 0x14;
pub const UART_17158_FCTR_RTS_32DELAY: u8 = 0x07;
pub const UART_17158_FCTR_RTS_36DELAY: u8 = 0x16;
pub const UART_17158_FCTR_RTS_40DELAY: u8 = 0x08;
pub const UART_17158_FCTR_RTS_44DELAY: u8 = 0x09;
pub const UART_17158_FCTR_RTS_48DELAY: u8 = 0x10;
pub const UART_17158_FCTR_RTS_52DELAY: u8 = 0x11;

// 与 RTS_48DELAY 同值：0x10 在 RTS 延迟字段外表示 IrDA 模式
pub const UART_17158_FCTR_RTS_IRDA: u8 = 0x10;
pub const UART_17158_FCTR_RS485: u8 = 0x20;
pub const UART_17158_FCTR_TRGA: u8 = 0x00;
pub const UART_17158_FCTR_TRGB: u8 = 0x40;
pub const UART_17158_FCTR_TRGC: u8 = 0x80;
pub const UART_17158_FCTR_TRGD: u8 = 0xC0;

// 触发表选择位
pub const UART_17158_FCTR_BIT6: u8 = 0x40;
pub const UART_17158_FCTR_BIT7: u8 = 0x80;

// 内存映射收发缓冲大小
pub const UART_17158_RX_FIFOSIZE: usize = 64;
pub const UART_17158_TX_FIFOSIZE: usize = 64;

// ============================================================================
// 扩展 IIR
// ============================================================================

pub const UART_17158_IIR_RDI_TIMEOUT: u8 = 0x0C; // Receiver data TIMEOUT
pub const UART_17158_IIR_XONXOFF: u8 = 0x10; // Received an XON/XOFF char
pub const UART_17158_IIR_HWFLOW_STATE_CHANGE: u8 = 0x20; // CTS/DSR or RTS/DTR state change
pub const UART_17158_IIR_FIFO_ENABLED: u8 = 0xC0; // 16550 FIFOs are Enabled

// ============================================================================
// 32 位扩展中断寄存器返回的中断类型
// ============================================================================

pub const UART_17158_RX_LINE_STATUS: u8 = 0x1; // RX Ready
pub const UART_17158_RXRDY_TIMEOUT: u8 = 0x2; // RX Ready Timeout
pub const UART_17158_TXRDY: u8 = 0x3; // TX Ready
pub const UART_17158_MSR: u8 = 0x4; // Modem State Change
// 以下两个是 LSR 中的复合标志位
pub const UART_17158_TX_AND_FIFO_CLR: u8 = 0x40; // Transmitter Holding Reg Empty
pub const UART_17158_RX_FIFO_DATA_ERROR: u8 = 0x80; // UART detected an RX FIFO Data error

// ============================================================================
// EFR / IER 扩展位
// ============================================================================

pub const UART_17158_EFR_ECB: u8 = 0x10; // Enhanced control bit
pub const UART_17158_EFR_IXON: u8 = 0x2; // Receiver compares Xon1/Xoff1
pub const UART_17158_EFR_IXOFF: u8 = 0x8; // Transmit Xon1/Xoff1
pub const UART_17158_EFR_RTSDTR: u8 = 0x40; // Auto RTS/DTR Flow Control Enable
pub const UART_17158_EFR_CTSDSR: u8 = 0x80; // Auto CTS/DSR Flow Control Enable

pub const UART_17158_XOFF_DETECT: u8 = 0x1; // 芯片收到了 XOFF
pub const UART_17158_XON_DETECT: u8 = 0x2; // 芯片收到了 XON

pub const UART_17158_IER_RSVD1: u8 = 0x10; // Reserved by Exar
pub const UART_17158_IER_XOFF: u8 = 0x20; // Xoff Interrupt Enable
pub const UART_17158_IER_RTSDTR: u8 = 0x40; // Output Interrupt Enable
pub const UART_17158_IER_CTSDSR: u8 = 0x80; // Input Interrupt Enable

// ============================================================================
// 按寄存器划分的类型
// ============================================================================

bitflags! {
    /// 增强功能寄存器 EFR
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Efr: u8 {
        const IXON = UART_17158_EFR_IXON;
        const IXOFF = UART_17158_EFR_IXOFF;
        const ECB = UART_17158_EFR_ECB;
        const RTSDTR = UART_17158_EFR_RTSDTR;
        const CTSDSR = UART_17158_EFR_CTSDSR;
    }
}

bitflags! {
    /// 中断使能寄存器 IER：低 4 位为 16550 标准位，高 4 位为 17158 扩展位
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ier: u8 {
        const RDI = super::serial_reg::UART_IER_RDI;
        const THRI = super::serial_reg::UART_IER_THRI;
        const RLSI = super::serial_reg::UART_IER_RLSI;
        const MSI = super::serial_reg::UART_IER_MSI;
        const RSVD1 = UART_17158_IER_RSVD1;
        const XOFF = UART_17158_IER_XOFF;
        const RTSDTR = UART_17158_IER_RTSDTR;
        const CTSDSR = UART_17158_IER_CTSDSR;
    }
}

/// FCTR 中的 RTS 延迟（以字符时间计），仅触发表 D 下有效
///
/// 编码不是单调的（例如 12 字符为 0x12，16 字符为 0x05），按芯片定义原样保留。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RtsDelay {
    NoDelay = UART_17158_FCTR_RTS_NODELAY,
    Chars4 = UART_17158_FCTR_RTS_4DELAY,
    Chars6 = UART_17158_FCTR_RTS_6DELAY,
    Chars8 = UART_17158_FCTR_RTS_8DELAY,
    Chars12 = UART_17158_FCTR_RTS_12DELAY,
    Chars16 = UART_17158_FCTR_RTS_16DELAY,
    Chars20 = UART_17158_FCTR_RTS_20DELAY,
    Chars24 = UART_17158_FCTR_RTS_24DELAY,
    Chars28 = UART_17158_FCTR_RTS_28DELAY,
    Chars32 = UART_17158_FCTR_RTS_32DELAY,
    Chars36 = UART_17158_FCTR_RTS_36DELAY,
    Chars40 = UART_17158_FCTR_RTS_40DELAY,
    Chars44 = UART_17158_FCTR_RTS_44DELAY,
    Chars48 = UART_17158_FCTR_RTS_48DELAY,
    Chars52 = UART_17158_FCTR_RTS_52DELAY,
}

impl RtsDelay {
    pub const ALL: [RtsDelay; 15] = [
        RtsDelay::NoDelay,
        RtsDelay::Chars4,
        RtsDelay::Chars6,
        RtsDelay::Chars8,
        RtsDelay::Chars12,
        RtsDelay::Chars16,
        RtsDelay::Chars20,
        RtsDelay::Chars24,
        RtsDelay::Chars28,
        RtsDelay::Chars32,
        RtsDelay::Chars36,
        RtsDelay::Chars40,
        RtsDelay::Chars44,
        RtsDelay::Chars48,
        RtsDelay::Chars52,
    ];

    /// 延迟的字符数
    pub fn chars(self) -> u8 {
        match self {
            RtsDelay::NoDelay => 0,
            RtsDelay::Chars4 => 4,
            RtsDelay::Chars6 => 6,
            RtsDelay::Chars8 => 8,
            RtsDelay::Chars12 => 12,
            RtsDelay::Chars16 => 16,
            RtsDelay::Chars20 => 20,
            RtsDelay::Chars24 => 24,
            RtsDelay::Chars28 => 28,
            RtsDelay::Chars32 => 32,
            RtsDelay::Chars36 => 36,
            RtsDelay::Chars40 => 40,
            RtsDelay::Chars44 => 44,
            RtsDelay::Chars48 => 48,
            RtsDelay::Chars52 => 52,
        }
    }
}

/// FCTR 触发表选择（bit 6/7）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TriggerTable {
    A = UART_17158_FCTR_TRGA,
    B = UART_17158_FCTR_TRGB,
    C = UART_17158_FCTR_TRGC,
    D = UART_17158_FCTR_TRGD,
}

/// 组合 FCTR 的值
pub const fn fctr(table: TriggerTable, delay: RtsDelay) -> u8 {
    table as u8 | delay as u8
}

/// 32 位扩展中断寄存器中每个端口的 3 位中断类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExtendedInterrupt {
    RxLineStatus = UART_17158_RX_LINE_STATUS,
    RxRdyTimeout = UART_17158_RXRDY_TIMEOUT,
    TxRdy = UART_17158_TXRDY,
    ModemStatus = UART_17158_MSR,
}

impl ExtendedInterrupt {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            UART_17158_RX_LINE_STATUS => Some(Self::RxLineStatus),
            UART_17158_RXRDY_TIMEOUT => Some(Self::RxRdyTimeout),
            UART_17158_TXRDY => Some(Self::TxRdy),
            UART_17158_MSR => Some(Self::ModemStatus),
            _ => None,
        }
    }
}

/// 读 xoffchar1 得到的 XON/XOFF 检测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum XonXoffDetect {
    Xoff = UART_17158_XOFF_DETECT,
    Xon = UART_17158_XON_DETECT,
}

impl XonXoffDetect {
    /// 按位判断，两位同时置位时 XON 优先
    pub fn from_status(status: u8) -> Option<Self> {
        if status & UART_17158_XON_DETECT != 0 {
            Some(Self::Xon)
        } else if status & UART_17158_XOFF_DETECT != 0 {
            Some(Self::Xoff)
        } else {
            None
        }
    }
}

/// 芯片版本，由 DVID 高半字节区分；XR17D158 与 XR17C158 报告相同的 DVID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revision {
    Xr17c158,
    Xr17e158,
}

impl Revision {
    pub fn from_dvid(dvid: u8) -> Self {
        if dvid & 0xf0 >= UART_XR17E158_DVID {
            Revision::Xr17e158
        } else {
            Revision::Xr17c158
        }
    }

    /// 早期版本的 FIFO 计数寄存器不可靠，读回的 RX 计数可能多出最多 3 字节
    pub fn rx_count_fudge(self) -> u8 {
        match self {
            Revision::Xr17e158 => 1,
            Revision::Xr17c158 => 3,
        }
    }

    /// TX FIFO 计数是否可直接用来计算剩余空间
    pub fn tx_count_reliable(self) -> bool {
        self == Revision::Xr17e158
    }
}
