//! 16550 兼容寄存器位定义
//!
//! 参考 Linux 内核 include/uapi/linux/serial_reg.h。
//! Neo 通道的前 8 个寄存器与 16550 完全兼容，驱动在这些位之上叠加
//! [`super::registers`] 中的 17158 扩展位。

// IER (Interrupt Enable Register) 位定义
pub const UART_IER_RDI: u8 = 0x01; // Enable Received Data Available Interrupt
pub const UART_IER_THRI: u8 = 0x02; // Enable Transmitter Holding Register Empty Interrupt
pub const UART_IER_RLSI: u8 = 0x04; // Enable Receiver Line Status Interrupt
pub const UART_IER_MSI: u8 = 0x08; // Enable Modem Status Interrupt

// IIR (Interrupt Identification Register) 位定义
pub const UART_IIR_NO_INT: u8 = 0x01; // No interrupts pending
pub const UART_IIR_THRI: u8 = 0x02; // Transmitter Holding Register Empty Interrupt
pub const UART_IIR_RDI: u8 = 0x04; // Received Data Available Interrupt

// FCR (FIFO Control Register) 位定义
pub const UART_FCR_ENABLE_FIFO: u8 = 0x01; // Enable FIFO
pub const UART_FCR_CLEAR_RCVR: u8 = 0x02; // Clear receiver FIFO
pub const UART_FCR_CLEAR_XMIT: u8 = 0x04; // Clear transmitter FIFO

// LCR (Line Control Register) 位定义
pub const UART_LCR_WLEN5: u8 = 0x00; // 5 bits
pub const UART_LCR_WLEN6: u8 = 0x01; // 6 bits
pub const UART_LCR_WLEN7: u8 = 0x02; // 7 bits
pub const UART_LCR_WLEN8: u8 = 0x03; // 8 bits
pub const UART_LCR_STOP: u8 = 0x04; // Stop bits: 0=1 bit, 1=2 bits
pub const UART_LCR_PARITY: u8 = 0x08; // Parity enable
pub const UART_LCR_EPAR: u8 = 0x10; // Even parity
pub const UART_LCR_SPAR: u8 = 0x20; // Stick parity
pub const UART_LCR_SBRK: u8 = 0x40; // Set Break
pub const UART_LCR_DLAB: u8 = 0x80; // Divisor latch access bit

// MCR (Modem Control Register) 位定义
pub const UART_MCR_DTR: u8 = 0x01; // Data Terminal Ready
pub const UART_MCR_RTS: u8 = 0x02; // Request to Send
pub const UART_MCR_OUT1: u8 = 0x04; // Out 1，自动流控时指示由 DTR 而非 RTS 承担
pub const UART_MCR_LOOP: u8 = 0x10; // Enable loopback test mode

// LSR (Line Status Register) 位定义
pub const UART_LSR_DR: u8 = 0x01; // Data ready
pub const UART_LSR_OE: u8 = 0x02; // Overrun error
pub const UART_LSR_PE: u8 = 0x04; // Parity error
pub const UART_LSR_FE: u8 = 0x08; // Framing error
pub const UART_LSR_BI: u8 = 0x10; // Break interrupt
pub const UART_LSR_THRE: u8 = 0x20; // Transmitter holding register empty
pub const UART_LSR_TEMT: u8 = 0x40; // Transmitter empty

// MSR (Modem Status Register) 状态位掩码，低半字节为变化量
pub const UART_MSR_STATUS_MASK: u8 = 0xF0;
