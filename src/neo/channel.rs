//! Neo 单通道驱动
//!
//! 寄存器写入顺序与取值沿用 Exar 数据手册要求：修改 EFR 前先写 0，
//! 自动 RTS/DTR 流控打开后需要在 MCR 中拉高 RTS 才会开始工作。

use core::ptr::NonNull;

use bitflags::bitflags;
use heapless::Deque;
use tock_registers::interfaces::{Readable, Writeable};

use super::mmio::{BoardIo, Mmio};
use super::registers::*;
use super::serial_reg::*;
use crate::{
    ChannelOps, Config, ConfigError, DataBits, FifoDirection, FlowControl, LineStatus,
    ModemStatus, NeoError, Parity, StopBits,
};

/// 接收队列容量
pub const RQUEUE_SIZE: usize = 8192;
/// 发送队列容量
pub const WQUEUE_SIZE: usize = 4096;

/// 单次批量拷贝的最大字节数
const RX_BURST_MAX: usize = 12;
/// FIFO 清空的最大轮询次数
const FLUSH_RETRIES: usize = 10;
/// 单次中断中解析 ISR 的最大轮数
const ISR_PASSES_MAX: usize = 8;

const DEFAULT_BAUDRATE: u32 = 9600;
const DEFAULT_TRIGGER_LEVEL: u8 = 16;

bitflags! {
    /// 通道软件状态
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChannelFlags: u16 {
        /// FIFO 已使能
        const FIFO_ENABLED = 0x01;
        /// 发送 FIFO 为空
        const TX_FIFO_EMPTY = 0x02;
        /// 发送 FIFO 低于低水位
        const TX_FIFO_LWM = 0x04;
        /// 对端发来 XOFF，暂停输出
        const STOP = 0x08;
        /// 正在发送 break
        const BREAK_SENDING = 0x10;
        /// 内部环回
        const LOOPBACK = 0x20;
    }
}

/// 收发与错误计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub rx: u64,
    pub tx: u64,
    pub xon_sends: u32,
    pub xoff_sends: u32,
    pub err_parity: u32,
    pub err_frame: u32,
    pub err_break: u32,
    pub err_overrun: u32,
}

/// 接收到的字节及其线路状态（仅保留 BI/PE/FE）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxByte {
    pub data: u8,
    pub status: LineStatus,
}

/// 轮询 FCR 清空位，芯片完成清空后自动清除该位
fn wait_fifo_clear(mut read: impl FnMut() -> u8, bit: u8) -> bool {
    for _ in 0..FLUSH_RETRIES {
        if read() & bit == 0 {
            return true;
        }
        core::hint::spin_loop();
    }
    false
}

/// 由波特率计算除数
pub fn baud_divisor(baudrate: u32) -> Result<u16, ConfigError> {
    if baudrate == 0 {
        return Err(ConfigError::InvalidBaudrate(baudrate));
    }
    let divisor = NEO_BAUD_DIVIDEND / baudrate;
    if divisor == 0 || divisor > 0xFFFF {
        return Err(ConfigError::InvalidBaudrate(baudrate));
    }
    Ok(divisor as u16)
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct Reg(NonNull<NeoUartRegisters>);

unsafe impl Send for Reg {}

impl Reg {
    fn registers(&self) -> &NeoUartRegisters {
        unsafe { self.0.as_ref() }
    }
}

/// Neo 芯片上的一个 UART 通道
pub struct NeoChannel {
    port: usize,
    base: Reg,
    board: Mmio,
    revision: Revision,

    flags: ChannelFlags,
    /// MCR 影子值
    mostat: u8,
    mistat: ModemStatus,
    cached_lsr: LineStatus,
    error_mask: LineStatus,

    baudrate: u32,
    data_bits: DataBits,
    stop_bits: StopBits,
    parity: Parity,
    flow: FlowControl,
    receiver_enabled: bool,

    t_tlevel: u8,
    r_tlevel: u8,
    r_watermark: u8,

    stats: ChannelStats,
    rqueue: Deque<RxByte, RQUEUE_SIZE>,
    wqueue: Deque<u8, WQUEUE_SIZE>,
}

impl NeoChannel {
    pub(crate) fn new(port: usize, board: Mmio, revision: Revision) -> Self {
        // SAFETY: 板卡构造时已保证 port 在映射范围内
        let base = unsafe {
            NonNull::new_unchecked(board.ptr().as_ptr().add(port * NEO_CHANNEL_STRIDE))
        };

        Self {
            port,
            base: Reg(base.cast()),
            board,
            revision,
            flags: ChannelFlags::empty(),
            mostat: 0,
            mistat: ModemStatus::empty(),
            cached_lsr: LineStatus::empty(),
            error_mask: LineStatus::empty(),
            baudrate: DEFAULT_BAUDRATE,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow: FlowControl::default(),
            receiver_enabled: true,
            t_tlevel: DEFAULT_TRIGGER_LEVEL,
            r_tlevel: DEFAULT_TRIGGER_LEVEL,
            r_watermark: 0,
            stats: ChannelStats::default(),
            rqueue: Deque::new(),
            wqueue: Deque::new(),
        }
    }

    pub fn port(&self) -> usize {
        self.port
    }

    pub fn registers(&self) -> &NeoUartRegisters {
        self.base.registers()
    }

    pub fn flags(&self) -> ChannelFlags {
        self.flags
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    pub fn modem_status(&self) -> ModemStatus {
        self.mistat
    }

    /// MCR 影子值
    pub fn modem_control(&self) -> u8 {
        self.mostat
    }

    pub fn baudrate(&self) -> u32 {
        self.baudrate
    }

    pub fn tx_trigger_level(&self) -> u8 {
        self.t_tlevel
    }

    pub fn rx_trigger_level(&self) -> u8 {
        self.r_tlevel
    }

    pub fn rx_watermark(&self) -> u8 {
        self.r_watermark
    }

    /// 接收队列中的字节数
    pub fn rx_pending(&self) -> usize {
        self.rqueue.len()
    }

    /// 发送队列中尚未进入 FIFO 的字节数
    pub fn tx_pending(&self) -> usize {
        self.wqueue.len()
    }

    /// 写入发送队列并尝试立即搬到 FIFO，返回入队字节数
    pub fn write(&mut self, data: &[u8]) -> usize {
        let mut count = 0;
        for &b in data {
            if self.wqueue.push_back(b).is_err() {
                break;
            }
            count += 1;
        }
        self.copy_data_from_queue_to_uart();
        count
    }

    pub fn read_byte(&mut self) -> Option<RxByte> {
        self.rqueue.pop_front()
    }

    /// 设置 DTR/RTS 输出
    pub fn set_modem_control(&mut self, dtr: bool, rts: bool) {
        self.mostat &= !(UART_MCR_DTR | UART_MCR_RTS);
        if dtr {
            self.mostat |= UART_MCR_DTR;
        }
        if rts {
            self.mostat |= UART_MCR_RTS;
        }
        self.assert_modem_signals();
    }

    pub fn enable_loopback(&mut self) {
        self.flags |= ChannelFlags::LOOPBACK;
        self.assert_modem_signals();
    }

    pub fn disable_loopback(&mut self) {
        self.flags -= ChannelFlags::LOOPBACK;
        self.assert_modem_signals();
    }

    pub fn is_loopback_enabled(&self) -> bool {
        self.flags.contains(ChannelFlags::LOOPBACK)
    }

    /// 处理扩展中断寄存器报告的本通道中断
    pub fn service(&mut self, cause: ExtendedInterrupt) {
        match cause {
            // RXRDY 超时在 RX FIFO 低于触发级别后自动清除
            ExtendedInterrupt::RxRdyTimeout => self.copy_data_from_uart_to_queue(),
            ExtendedInterrupt::RxLineStatus => self.parse_lsr(),
            // TXRDY 有时并不准确，统一通过 ISR 判断真实原因
            ExtendedInterrupt::TxRdy | ExtendedInterrupt::ModemStatus => self.parse_isr(),
        }
    }

    /// 冲刷 PCI posted write
    fn posting_flush(&self) {
        mbarrier::wmb();
        let _ = self.board.read_reg(NEO_DVID_REG);
    }

    fn mark_tx_empty(&mut self) {
        self.flags |= ChannelFlags::TX_FIFO_EMPTY | ChannelFlags::TX_FIFO_LWM;
    }

    fn line_control(&self) -> u8 {
        let mut lcr = match self.data_bits {
            DataBits::Five => UART_LCR_WLEN5,
            DataBits::Six => UART_LCR_WLEN6,
            DataBits::Seven => UART_LCR_WLEN7,
            DataBits::Eight => UART_LCR_WLEN8,
        };

        if self.stop_bits == StopBits::Two {
            lcr |= UART_LCR_STOP;
        }

        lcr |= match self.parity {
            Parity::None => 0,
            Parity::Odd => UART_LCR_PARITY,
            Parity::Even => UART_LCR_PARITY | UART_LCR_EPAR,
            // 固定校验位：EPAR 为 0 时校验位恒为 1
            Parity::Mark => UART_LCR_PARITY | UART_LCR_SPAR,
            Parity::Space => UART_LCR_PARITY | UART_LCR_SPAR | UART_LCR_EPAR,
        };

        lcr
    }

    fn load_start_stop_chars(&self) {
        let base = self.base;
        let regs = base.registers();
        if let (Some(start), Some(stop)) = (self.flow.start_char, self.flow.stop_char) {
            regs.xonchar1.set(start);
            regs.xonchar2.set(0);
            regs.xoffchar1.set(stop);
            regs.xoffchar2.set(0);
        }
    }

    /// 先清零再写入 EFR
    fn write_efr(&self, efr: Efr) {
        let base = self.base;
        let regs = base.registers();
        regs.efr.set(0);
        regs.efr.set(efr.bits());
    }

    fn read_ier_efr(&self) -> (Ier, Efr) {
        let base = self.base;
        let regs = base.registers();
        (
            Ier::from_bits_retain(regs.ier.get()),
            Efr::from_bits_retain(regs.efr.get()),
        )
    }

    // ==================== 流控 ====================

    fn set_cts_flow_control(&mut self) {
        let base = self.base;
        let regs = base.registers();
        let (mut ier, mut efr) = self.read_ier_efr();

        // 打开自动 CTS 流控，关闭自动 XON 流控
        ier |= Ier::CTSDSR;
        efr |= Efr::ECB | Efr::CTSDSR;
        efr -= Efr::IXON;
        self.write_efr(efr);

        // 触发表 D，8 字符高低水位
        regs.fctr.set(fctr(TriggerTable::D, RtsDelay::Chars4));
        regs.tfifo.set(8);
        self.t_tlevel = 8;

        regs.ier.set(ier.bits());
        self.posting_flush();
    }

    fn set_rts_flow_control(&mut self) {
        let base = self.base;
        let regs = base.registers();
        let (mut ier, mut efr) = self.read_ier_efr();

        ier |= Ier::RTSDTR;
        efr |= Efr::ECB | Efr::RTSDTR;
        efr -= Efr::IXOFF;
        self.write_efr(efr);

        regs.fctr.set(fctr(TriggerTable::D, RtsDelay::Chars4));
        self.r_watermark = 4;
        regs.rfifo.set(32);
        self.r_tlevel = 32;

        regs.ier.set(ier.bits());

        // 自动 RTS/DTR 需要在使能后将 MCR 中的 RTS 置 1 才会启动
        self.mostat |= UART_MCR_RTS;
        self.posting_flush();
    }

    fn set_ixon_flow_control(&mut self) {
        let base = self.base;
        let regs = base.registers();
        let (mut ier, mut efr) = self.read_ier_efr();

        ier -= Ier::CTSDSR;
        efr -= Efr::CTSDSR;
        efr |= Efr::ECB | Efr::IXON;
        self.write_efr(efr);

        regs.fctr.set(fctr(TriggerTable::D, RtsDelay::Chars8));
        self.r_watermark = 4;
        regs.rfifo.set(32);
        self.r_tlevel = 32;

        self.load_start_stop_chars();
        regs.ier.set(ier.bits());
        self.posting_flush();
    }

    fn set_ixoff_flow_control(&mut self) {
        let base = self.base;
        let regs = base.registers();
        let (mut ier, mut efr) = self.read_ier_efr();

        ier -= Ier::RTSDTR;
        efr -= Efr::RTSDTR;
        efr |= Efr::ECB | Efr::IXOFF;
        self.write_efr(efr);

        regs.fctr.set(fctr(TriggerTable::D, RtsDelay::Chars8));
        regs.tfifo.set(8);
        self.t_tlevel = 8;

        self.load_start_stop_chars();
        regs.ier.set(ier.bits());
        self.posting_flush();
    }

    fn set_no_input_flow_control(&mut self) {
        let (mut ier, mut efr) = self.read_ier_efr();

        ier -= Ier::RTSDTR | Ier::XOFF;
        efr -= Efr::RTSDTR | Efr::IXOFF;
        self.finish_no_flow_control(ier, efr);
    }

    fn set_no_output_flow_control(&mut self) {
        let (mut ier, mut efr) = self.read_ier_efr();

        ier -= Ier::CTSDSR | Ier::XOFF;
        efr -= Efr::CTSDSR | Efr::IXON;
        self.finish_no_flow_control(ier, efr);
    }

    fn finish_no_flow_control(&mut self, ier: Ier, mut efr: Efr) {
        let base = self.base;
        let regs = base.registers();

        // 没有任何增强功能时关闭 ECB
        if !efr.intersects(Efr::IXON | Efr::IXOFF | Efr::RTSDTR | Efr::CTSDSR) {
            efr -= Efr::ECB;
        }
        self.write_efr(efr);

        regs.fctr.set(fctr(TriggerTable::D, RtsDelay::Chars8));
        self.r_watermark = 0;
        regs.tfifo.set(16);
        self.t_tlevel = 16;
        regs.rfifo.set(16);
        self.r_tlevel = 16;

        regs.ier.set(ier.bits());
        self.posting_flush();
    }

    fn apply_flow_control(&mut self) {
        let flow = self.flow;

        if flow.cts {
            self.set_cts_flow_control();
        } else if flow.xon_active() {
            self.set_ixon_flow_control();
        } else {
            self.set_no_output_flow_control();
        }

        if flow.rts {
            self.set_rts_flow_control();
        } else if flow.xoff_active() {
            self.set_ixoff_flow_control();
        } else {
            self.set_no_input_flow_control();
        }
    }

    // ==================== 中断解析 ====================

    /// 只保留 CTS/DSR/RI/DCD，忽略变化量位
    fn parse_modem(&mut self, msr: u8) {
        self.mistat = ModemStatus::from_bits_truncate(msr & UART_MSR_STATUS_MASK);
    }

    /// 根据通道 ISR 找出真实的中断原因
    pub fn parse_isr(&mut self) {
        let base = self.base;
        let regs = base.registers();

        for _ in 0..ISR_PASSES_MAX {
            let mut isr = regs.isr_fcr.get();
            if isr & UART_IIR_NO_INT != 0 {
                return;
            }

            // 高两位只表示 FIFO 已使能
            isr &= !UART_17158_IIR_FIFO_ENABLED;

            if isr & (UART_17158_IIR_RDI_TIMEOUT | UART_IIR_RDI) != 0 {
                self.copy_data_from_uart_to_queue();
            }

            if isr & UART_IIR_THRI != 0 {
                self.mark_tx_empty();
                self.copy_data_from_queue_to_uart();
            }

            if isr & UART_17158_IIR_XONXOFF != 0 {
                match XonXoffDetect::from_status(regs.xoffchar1.get()) {
                    Some(XonXoffDetect::Xon) => {
                        if self.flags.contains(ChannelFlags::STOP) {
                            log::trace!("port {}: XON received, resuming output", self.port);
                            self.flags -= ChannelFlags::STOP;
                        }
                    }
                    Some(XonXoffDetect::Xoff) => {
                        if !self.flags.contains(ChannelFlags::STOP) {
                            log::trace!("port {}: XOFF received, stopping output", self.port);
                            self.flags |= ChannelFlags::STOP;
                        }
                    }
                    None => {}
                }
            }

            if isr & UART_17158_IIR_HWFLOW_STATE_CHANGE != 0 {
                // 芯片正在做自动流控，OUT1 为 0 时由 RTS 承担，否则由 DTR 承担
                let cause = regs.mcr.get();
                let pin = if cause & UART_MCR_OUT1 == 0 {
                    UART_MCR_RTS
                } else {
                    UART_MCR_DTR
                };
                if cause & pin != 0 {
                    self.mostat |= pin;
                } else {
                    self.mostat &= !pin;
                }
            }

            self.parse_modem(regs.msr.get());
        }

        log::warn!(
            "port {}: interrupt still pending after {} passes",
            self.port,
            ISR_PASSES_MAX
        );
    }

    /// 处理接收线路状态中断
    pub fn parse_lsr(&mut self) {
        let base = self.base;
        let regs = base.registers();

        let lsr = LineStatus::from_bits_retain(regs.lsr.get());
        self.cached_lsr |= lsr;

        if self.cached_lsr.contains(LineStatus::DATA_READY) {
            self.copy_data_from_uart_to_queue();
        }

        // 正常情况下错误字节已在上面入队，这里仅计数
        if lsr.contains(LineStatus::PARITY_ERROR) {
            self.stats.err_parity += 1;
        }
        if lsr.contains(LineStatus::FRAMING_ERROR) {
            self.stats.err_frame += 1;
        }
        if lsr.contains(LineStatus::BREAK_INTERRUPT) {
            self.stats.err_break += 1;
        }
        // 溢出不会破坏 FIFO，只是保持寄存器被新字节覆盖
        if lsr.contains(LineStatus::OVERRUN_ERROR) {
            self.stats.err_overrun += 1;
        }

        if lsr.bits() & (UART_LSR_THRE | UART_17158_TX_AND_FIFO_CLR) != 0 {
            self.mark_tx_empty();
            self.copy_data_from_queue_to_uart();
        }
    }

    /// 把接收 FIFO 中的数据搬到接收队列
    pub fn copy_data_from_uart_to_queue(&mut self) {
        let base = self.base;
        let regs = base.registers();

        let mut linestatus = core::mem::replace(&mut self.cached_lsr, LineStatus::empty());
        let mut qleft = RQUEUE_SIZE - self.rqueue.len();

        // FIFO 计数不可靠，需要减去修正量
        let mut total = if self.flags.contains(ChannelFlags::FIFO_ENABLED) {
            regs.rfifo
                .get()
                .saturating_sub(self.revision.rx_count_fudge()) as usize
        } else {
            0
        };
        total = total.min(qleft);

        while total > 0 {
            let lsr = regs.lsr.get();
            linestatus = LineStatus::from_bits_retain(lsr);

            // FIFO 中有错误字节，交给下面逐字节处理
            if lsr & UART_17158_RX_FIFO_DATA_ERROR != 0 {
                break;
            }

            if lsr & (UART_LSR_THRE | UART_17158_TX_AND_FIFO_CLR) != 0 {
                self.mark_tx_empty();
            }
            linestatus = LineStatus::empty();

            let n = total.min(RX_BURST_MAX);
            for cell in &regs.txrxburst[..n] {
                let _ = self.rqueue.push_back(RxByte {
                    data: cell.get(),
                    status: LineStatus::empty(),
                });
            }

            total -= n;
            qleft -= n;
            self.stats.rx += n as u64;
        }

        // 逐字节读取，每次最多一个 FIFO 深度
        for _ in 0..UART_17158_RX_FIFOSIZE {
            linestatus |= LineStatus::from_bits_retain(regs.lsr.get());

            // 读 LSR 会清掉发送空状态，这里必须记下
            let tx_empty =
                LineStatus::from_bits_retain(UART_LSR_THRE | UART_17158_TX_AND_FIFO_CLR);
            if linestatus.intersects(tx_empty) {
                self.mark_tx_empty();
                linestatus -= tx_empty;
            }

            if !linestatus.contains(LineStatus::DATA_READY) {
                self.cached_lsr = linestatus;
                return;
            }

            if linestatus.intersects(self.error_mask) {
                let _ = regs.txrxburst[0].get();
                linestatus = LineStatus::empty();
                continue;
            }

            // 队列已满时丢弃最旧的数据
            if qleft == 0 {
                let _ = self.rqueue.pop_front();
                self.stats.err_overrun += 1;
                qleft += 1;
            }

            let status = linestatus
                & (LineStatus::BREAK_INTERRUPT
                    | LineStatus::PARITY_ERROR
                    | LineStatus::FRAMING_ERROR);
            if status.contains(LineStatus::PARITY_ERROR) {
                self.stats.err_parity += 1;
            }
            if status.contains(LineStatus::BREAK_INTERRUPT) {
                self.stats.err_break += 1;
            }
            if status.contains(LineStatus::FRAMING_ERROR) {
                self.stats.err_frame += 1;
            }

            let _ = self.rqueue.push_back(RxByte {
                data: regs.txrxburst[0].get(),
                status,
            });
            qleft -= 1;
            self.stats.rx += 1;
            linestatus = LineStatus::empty();
        }
    }
}

impl ChannelOps for NeoChannel {
    fn uart_init(&mut self) {
        let base = self.base;
        let regs = base.registers();

        regs.ier.set(0);
        regs.efr.set(0);
        regs.efr.set(Efr::ECB.bits());

        // 清空 UART 与 FIFO
        let _ = regs.txrx.get();
        regs.isr_fcr
            .set(UART_FCR_ENABLE_FIFO | UART_FCR_CLEAR_RCVR | UART_FCR_CLEAR_XMIT);
        let _ = regs.lsr.get();
        let _ = regs.msr.get();

        self.flags |= ChannelFlags::FIFO_ENABLED;
        self.mark_tx_empty();

        regs.mcr.set(self.mostat);
        self.posting_flush();

        log::debug!("port {}: uart initialized ({:?})", self.port, self.revision);
    }

    fn uart_off(&mut self) {
        let base = self.base;
        let regs = base.registers();
        regs.efr.set(0);
        regs.ier.set(0);
    }

    fn param(&mut self, config: &Config) -> Result<(), ConfigError> {
        let baudrate = config.baudrate.unwrap_or(self.baudrate);

        // 波特率 0 表示挂断
        if baudrate == 0 {
            self.baudrate = 0;
            self.rqueue.clear();
            self.wqueue.clear();
            // 挂断时 FIFO 中残留的数据一并丢弃，超时已在 flush 中记录
            let _ = self.flush_uart_write();
            let _ = self.flush_uart_read();
            self.mostat &= !(UART_MCR_RTS | UART_MCR_DTR);
            self.assert_modem_signals();
            return Ok(());
        }
        let divisor = baud_divisor(baudrate)?;

        self.baudrate = baudrate;
        if let Some(bits) = config.data_bits {
            self.data_bits = bits;
        }
        if let Some(bits) = config.stop_bits {
            self.stop_bits = bits;
        }
        if let Some(parity) = config.parity {
            self.parity = parity;
        }
        if let Some(flow) = config.flow_control {
            self.flow = flow;
        }
        if let Some(mask) = config.ignore_errors {
            self.error_mask = mask
                & (LineStatus::BREAK_INTERRUPT
                    | LineStatus::PARITY_ERROR
                    | LineStatus::FRAMING_ERROR
                    | LineStatus::OVERRUN_ERROR);
        }
        if let Some(enable) = config.receiver {
            self.receiver_enabled = enable;
        }

        let base = self.base;
        let regs = base.registers();

        let mut ier = Ier::from_bits_retain(regs.ier.get());
        ier -= Ier::RDI | Ier::RLSI;
        ier |= Ier::THRI | Ier::MSI;
        if self.receiver_enabled {
            ier |= Ier::RDI | Ier::RLSI;
        }

        let lcr = self.line_control();

        // DLAB 置位时 txrx/ier 分别访问除数低/高字节
        regs.lcr.set(UART_LCR_DLAB);
        regs.txrx.set((divisor & 0xff) as u8);
        regs.ier.set((divisor >> 8) as u8);
        regs.lcr.set(lcr);
        regs.ier.set(ier.bits());

        self.apply_flow_control();

        // 低波特率时每个字节都触发接收中断
        if baudrate < 9600 {
            regs.rfifo.set(1);
            self.r_tlevel = 1;
        }

        self.mostat |= UART_MCR_RTS | UART_MCR_DTR;
        self.assert_modem_signals();
        self.parse_modem(regs.msr.get());

        log::debug!(
            "port {}: {} baud (divisor {}), lcr 0x{:02x}, ier 0x{:02x}, flow {:?}",
            self.port,
            baudrate,
            divisor,
            lcr,
            regs.ier.get(),
            self.flow
        );

        Ok(())
    }

    fn assert_modem_signals(&mut self) {
        let mut out = self.mostat;
        if self.flags.contains(ChannelFlags::LOOPBACK) {
            out |= UART_MCR_LOOP;
        }
        self.base.registers().mcr.set(out);
        self.posting_flush();
    }

    fn flush_uart_write(&mut self) -> Result<(), NeoError> {
        let base = self.base;
        let regs = base.registers();
        regs.isr_fcr.set(UART_FCR_ENABLE_FIFO | UART_FCR_CLEAR_XMIT);
        self.posting_flush();

        let done = wait_fifo_clear(|| regs.isr_fcr.get(), UART_FCR_CLEAR_XMIT);
        self.mark_tx_empty();
        if done {
            Ok(())
        } else {
            log::warn!("port {}: TX FIFO flush did not complete", self.port);
            Err(NeoError::FlushTimeout(FifoDirection::Tx))
        }
    }

    fn flush_uart_read(&mut self) -> Result<(), NeoError> {
        let base = self.base;
        let regs = base.registers();
        regs.isr_fcr.set(UART_FCR_ENABLE_FIFO | UART_FCR_CLEAR_RCVR);
        self.posting_flush();

        if wait_fifo_clear(|| regs.isr_fcr.get(), UART_FCR_CLEAR_RCVR) {
            Ok(())
        } else {
            log::warn!("port {}: RX FIFO flush did not complete", self.port);
            Err(NeoError::FlushTimeout(FifoDirection::Rx))
        }
    }

    fn disable_receiver(&mut self) {
        let base = self.base;
        let regs = base.registers();
        let ier = Ier::from_bits_retain(regs.ier.get()) - Ier::RDI;
        regs.ier.set(ier.bits());
        self.posting_flush();
    }

    fn enable_receiver(&mut self) {
        let base = self.base;
        let regs = base.registers();
        let ier = Ier::from_bits_retain(regs.ier.get()) | Ier::RDI;
        regs.ier.set(ier.bits());
        self.posting_flush();
    }

    fn send_break(&mut self) {
        if self.flags.contains(ChannelFlags::BREAK_SENDING) {
            return;
        }
        let base = self.base;
        let regs = base.registers();
        regs.lcr.set(regs.lcr.get() | UART_LCR_SBRK);
        self.flags |= ChannelFlags::BREAK_SENDING;
        self.posting_flush();
    }

    fn clear_break(&mut self, force: bool) {
        if !force && !self.flags.contains(ChannelFlags::BREAK_SENDING) {
            return;
        }
        let base = self.base;
        let regs = base.registers();
        regs.lcr.set(regs.lcr.get() & !UART_LCR_SBRK);
        self.flags -= ChannelFlags::BREAK_SENDING;
        self.posting_flush();
    }

    fn send_start_character(&mut self) {
        if let Some(c) = self.flow.start_char {
            self.stats.xon_sends += 1;
            self.base.registers().txrx.set(c);
            self.posting_flush();
        }
    }

    fn send_stop_character(&mut self) {
        if let Some(c) = self.flow.stop_char {
            self.stats.xoff_sends += 1;
            self.base.registers().txrx.set(c);
            self.posting_flush();
        }
    }

    fn send_immediate_char(&mut self, c: u8) {
        self.base.registers().txrx.set(c);
        self.posting_flush();
    }

    fn copy_data_from_queue_to_uart(&mut self) {
        if self.wqueue.is_empty() {
            return;
        }
        if self
            .flags
            .intersects(ChannelFlags::STOP | ChannelFlags::BREAK_SENDING)
        {
            return;
        }

        let base = self.base;
        let regs = base.registers();

        // FIFO 未使能时直接写保持寄存器
        if !self.flags.contains(ChannelFlags::FIFO_ENABLED) {
            if self.flags.contains(ChannelFlags::TX_FIFO_EMPTY) {
                if let Some(b) = self.wqueue.pop_front() {
                    regs.txrx.set(b);
                    self.stats.tx += 1;
                    self.flags -= ChannelFlags::TX_FIFO_EMPTY | ChannelFlags::TX_FIFO_LWM;
                    self.posting_flush();
                }
            }
            return;
        }

        // 早期版本 TX FIFO 计数有误，只能在低于触发级别时按触发级别估算空间
        let room = if self.revision.tx_count_reliable() {
            UART_17158_TX_FIFOSIZE.saturating_sub(regs.tfifo.get() as usize)
        } else {
            if !self
                .flags
                .intersects(ChannelFlags::TX_FIFO_EMPTY | ChannelFlags::TX_FIFO_LWM)
            {
                return;
            }
            if regs.tfifo.get() > self.t_tlevel {
                return;
            }
            UART_17158_TX_FIFOSIZE - self.t_tlevel as usize
        };

        let n = room.min(self.wqueue.len());
        let mut written = 0;
        for cell in &regs.txrxburst[..n] {
            match self.wqueue.pop_front() {
                Some(b) => cell.set(b),
                None => break,
            }
            written += 1;
        }

        if written > 0 {
            self.stats.tx += written as u64;
            self.posting_flush();
            self.flags -= ChannelFlags::TX_FIFO_EMPTY | ChannelFlags::TX_FIFO_LWM;
        }
    }

    fn get_uart_bytes_left(&mut self) -> usize {
        let lsr = LineStatus::from_bits_retain(self.base.registers().lsr.get());

        // 部分位读后即清，需要缓存
        self.cached_lsr |= lsr;

        if lsr.contains(LineStatus::TX_EMPTY) {
            self.mark_tx_empty();
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neo::test_util::FakeBoard;

    fn channel(board: &FakeBoard, dvid: u8) -> NeoChannel {
        NeoChannel::new(0, board.mmio(), Revision::from_dvid(dvid))
    }

    #[test]
    fn test_baud_divisor() {
        assert_eq!(baud_divisor(115200), Ok(8));
        assert_eq!(baud_divisor(921600), Ok(1));
        assert_eq!(baud_divisor(9600), Ok(96));
        assert_eq!(baud_divisor(50), Ok(18432));
        assert_eq!(baud_divisor(0), Err(ConfigError::InvalidBaudrate(0)));
        assert_eq!(baud_divisor(1_000_000), Err(ConfigError::InvalidBaudrate(1_000_000)));
        assert_eq!(baud_divisor(14), Err(ConfigError::InvalidBaudrate(14)));
    }

    #[test]
    fn test_uart_init() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        let regs = board.regs(0);
        regs.ier.set(0xff);

        ch.uart_init();

        let regs = board.regs(0);
        assert_eq!(regs.ier.get(), 0);
        assert_eq!(regs.efr.get(), UART_17158_EFR_ECB);
        assert_eq!(regs.isr_fcr.get(), 0x07);
        assert!(ch.flags().contains(ChannelFlags::FIFO_ENABLED));
        assert!(ch.flags().contains(ChannelFlags::TX_FIFO_EMPTY));
    }

    #[test]
    fn test_cts_rts_flow_control() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.uart_init();

        let config = Config::new()
            .baudrate(115200)
            .flow_control(FlowControl::hardware());
        ch.param(&config).unwrap();

        let regs = board.regs(0);
        assert_eq!(
            regs.efr.get(),
            UART_17158_EFR_ECB | UART_17158_EFR_CTSDSR | UART_17158_EFR_RTSDTR
        );
        let ier = regs.ier.get();
        assert_eq!(ier & UART_17158_IER_CTSDSR, UART_17158_IER_CTSDSR);
        assert_eq!(ier & UART_17158_IER_RTSDTR, UART_17158_IER_RTSDTR);
        assert_eq!(
            regs.fctr.get(),
            UART_17158_FCTR_TRGD | UART_17158_FCTR_RTS_4DELAY
        );
        assert_eq!(regs.tfifo.get(), 8);
        assert_eq!(regs.rfifo.get(), 32);
        assert_eq!(ch.tx_trigger_level(), 8);
        assert_eq!(ch.rx_trigger_level(), 32);
        assert_eq!(ch.rx_watermark(), 4);
        assert_eq!(regs.mcr.get() & UART_MCR_RTS, UART_MCR_RTS);
    }

    #[test]
    fn test_software_flow_control() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.uart_init();

        let config = Config::new()
            .baudrate(38400)
            .flow_control(FlowControl::software(0x11, 0x13));
        ch.param(&config).unwrap();

        let regs = board.regs(0);
        assert_eq!(
            regs.efr.get(),
            UART_17158_EFR_ECB | UART_17158_EFR_IXON | UART_17158_EFR_IXOFF
        );
        assert_eq!(
            regs.fctr.get(),
            UART_17158_FCTR_TRGD | UART_17158_FCTR_RTS_8DELAY
        );
        assert_eq!(regs.xonchar1.get(), 0x11);
        assert_eq!(regs.xonchar2.get(), 0);
        assert_eq!(regs.xoffchar1.get(), 0x13);
        assert_eq!(regs.xoffchar2.get(), 0);
        assert_eq!(regs.ier.get() & UART_17158_IER_CTSDSR, 0);
        assert_eq!(regs.ier.get() & UART_17158_IER_RTSDTR, 0);
    }

    #[test]
    fn test_disabled_chars_fall_back_to_no_flow() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.uart_init();

        let flow = FlowControl {
            ixon: true,
            ixoff: true,
            start_char: Some(0x11),
            stop_char: None,
            ..Default::default()
        };
        ch.param(&Config::new().baudrate(9600).flow_control(flow))
            .unwrap();

        let regs = board.regs(0);
        assert_eq!(regs.efr.get(), 0);
        assert_eq!(regs.tfifo.get(), 16);
        assert_eq!(regs.rfifo.get(), 16);
        assert_eq!(ch.rx_watermark(), 0);
    }

    #[test]
    fn test_param_line_control() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.uart_init();

        let config = Config::new()
            .baudrate(115200)
            .data_bits(DataBits::Seven)
            .stop_bits(StopBits::Two)
            .parity(Parity::Even);
        ch.param(&config).unwrap();
        assert_eq!(
            board.regs(0).lcr.get(),
            UART_LCR_WLEN7 | UART_LCR_STOP | UART_LCR_PARITY | UART_LCR_EPAR
        );

        ch.param(&Config::new().parity(Parity::Mark)).unwrap();
        assert_eq!(
            board.regs(0).lcr.get(),
            UART_LCR_WLEN7 | UART_LCR_STOP | UART_LCR_PARITY | UART_LCR_SPAR
        );
        assert_eq!(ch.baudrate(), 115200);

        let ier = board.regs(0).ier.get();
        assert_eq!(
            ier & 0x0f,
            UART_IER_RDI | UART_IER_THRI | UART_IER_RLSI | UART_IER_MSI
        );
    }

    #[test]
    fn test_low_baudrate_trigger() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.param(&Config::new().baudrate(2400)).unwrap();
        assert_eq!(board.regs(0).rfifo.get(), 1);
        assert_eq!(ch.rx_trigger_level(), 1);
    }

    #[test]
    fn test_hangup_drops_signals() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.param(&Config::new().baudrate(9600)).unwrap();
        assert_eq!(
            ch.modem_control() & (UART_MCR_DTR | UART_MCR_RTS),
            UART_MCR_DTR | UART_MCR_RTS
        );

        ch.param(&Config::new().baudrate(0)).unwrap();
        assert_eq!(ch.modem_control() & (UART_MCR_DTR | UART_MCR_RTS), 0);
        assert_eq!(board.regs(0).mcr.get() & (UART_MCR_DTR | UART_MCR_RTS), 0);
    }

    #[test]
    fn test_hangup_discards_pending_data() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.uart_init();

        // 接收队列中有数据，发送因 break 滞留在队列
        let regs = board.regs(0);
        regs.rfifo.set(5);
        regs.lsr.set(0);
        ch.copy_data_from_uart_to_queue();
        ch.send_break();
        ch.write(b"pending");
        assert_eq!(ch.rx_pending(), 4);
        assert_eq!(ch.tx_pending(), 7);

        ch.param(&Config::new().baudrate(0)).unwrap();

        assert_eq!(ch.rx_pending(), 0);
        assert_eq!(ch.tx_pending(), 0);
        assert_eq!(ch.baudrate(), 0);
        // 最后一次 FCR 写入是清空接收 FIFO
        assert_eq!(regs.isr_fcr.get(), UART_FCR_ENABLE_FIFO | UART_FCR_CLEAR_RCVR);
        assert!(ch.flags().contains(ChannelFlags::TX_FIFO_EMPTY));
    }

    #[test]
    fn test_invalid_baudrate_leaves_state() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        assert_eq!(
            ch.param(&Config::new().baudrate(2_000_000)),
            Err(ConfigError::InvalidBaudrate(2_000_000))
        );
        assert_eq!(ch.baudrate(), DEFAULT_BAUDRATE);
    }

    #[test]
    fn test_loopback() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.set_modem_control(true, false);
        ch.enable_loopback();
        assert!(ch.is_loopback_enabled());
        assert_eq!(board.regs(0).mcr.get(), UART_MCR_DTR | UART_MCR_LOOP);
        ch.disable_loopback();
        assert_eq!(board.regs(0).mcr.get(), UART_MCR_DTR);
    }

    #[test]
    fn test_queue_to_uart_reliable_count() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.uart_init();
        // FIFO 中已有 60 字节
        board.regs(0).tfifo.set(60);

        let data: Vec<u8> = (0..10).collect();
        assert_eq!(ch.write(&data), 10);

        let regs = board.regs(0);
        let sent: Vec<u8> = regs.txrxburst[..4].iter().map(|c| c.get()).collect();
        assert_eq!(sent, [0, 1, 2, 3]);
        assert_eq!(ch.tx_pending(), 6);
        assert_eq!(ch.stats().tx, 4);
        assert!(!ch.flags().contains(ChannelFlags::TX_FIFO_EMPTY));
    }

    #[test]
    fn test_queue_to_uart_early_revision() {
        let board = FakeBoard::new(UART_XR17C158_DVID);
        let mut ch = channel(&board, UART_XR17C158_DVID);
        ch.uart_init();
        board.regs(0).tfifo.set(0);

        let data = [0x55u8; 100];
        assert_eq!(ch.write(&data), 100);
        // 64 - 触发级别 16
        assert_eq!(ch.tx_pending(), 52);

        // TX 空标志被清除后不会继续发送
        ch.copy_data_from_queue_to_uart();
        assert_eq!(ch.tx_pending(), 52);

        // 收到 THRE 后继续
        board.regs(0).lsr.set(UART_LSR_THRE);
        ch.parse_lsr();
        assert_eq!(ch.tx_pending(), 4);
    }

    #[test]
    fn test_queue_held_while_stopped_or_break() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.uart_init();
        ch.send_break();
        assert_eq!(board.regs(0).lcr.get() & UART_LCR_SBRK, UART_LCR_SBRK);

        ch.write(b"abc");
        assert_eq!(ch.tx_pending(), 3);

        ch.clear_break(false);
        assert_eq!(board.regs(0).lcr.get() & UART_LCR_SBRK, 0);
        ch.copy_data_from_queue_to_uart();
        assert_eq!(ch.tx_pending(), 0);
    }

    #[test]
    fn test_fifo_disabled_single_byte() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.flags |= ChannelFlags::TX_FIFO_EMPTY;

        ch.write(b"xy");
        assert_eq!(board.regs(0).txrx.get(), b'x');
        assert_eq!(ch.tx_pending(), 1);
    }

    #[test]
    fn test_uart_to_queue_bulk() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.uart_init();

        let regs = board.regs(0);
        for (i, cell) in regs.txrxburst.iter().enumerate() {
            cell.set(i as u8);
        }
        // 计数 21，减去修正量 1 后读取 20 字节
        regs.rfifo.set(21);
        regs.lsr.set(0);

        ch.copy_data_from_uart_to_queue();

        assert_eq!(ch.rx_pending(), 20);
        assert_eq!(ch.stats().rx, 20);
        let first: Vec<u8> = (0..12).map(|_| ch.read_byte().unwrap().data).collect();
        assert_eq!(first, (0..12).collect::<Vec<u8>>());
        // 第二批从窗口起始处重新读取
        assert_eq!(ch.read_byte().unwrap().data, 0);
    }

    #[test]
    fn test_uart_to_queue_early_revision_fudge() {
        let board = FakeBoard::new(UART_XR17C158_DVID);
        let mut ch = channel(&board, UART_XR17C158_DVID);
        ch.uart_init();

        let regs = board.regs(0);
        regs.rfifo.set(2);
        regs.lsr.set(0);
        ch.copy_data_from_uart_to_queue();
        assert_eq!(ch.rx_pending(), 0);

        regs.rfifo.set(10);
        ch.copy_data_from_uart_to_queue();
        assert_eq!(ch.rx_pending(), 7);
    }

    #[test]
    fn test_uart_to_queue_byte_phase_notes_tx_empty() {
        let board = FakeBoard::new(UART_XR17C158_DVID);
        let mut ch = channel(&board, UART_XR17C158_DVID);
        assert!(!ch
            .flags()
            .intersects(ChannelFlags::TX_FIFO_EMPTY | ChannelFlags::TX_FIFO_LWM));

        let regs = board.regs(0);
        regs.rfifo.set(0);
        regs.txrxburst[0].set(0x42);
        regs.lsr.set(UART_LSR_DR | UART_LSR_THRE);

        ch.copy_data_from_uart_to_queue();

        assert_eq!(ch.rx_pending(), UART_17158_RX_FIFOSIZE);
        assert!(ch.flags().contains(ChannelFlags::TX_FIFO_EMPTY));
        assert!(ch.flags().contains(ChannelFlags::TX_FIFO_LWM));
        // 发送空状态不会混入接收字节的状态
        assert_eq!(ch.read_byte().map(|b| b.status), Some(LineStatus::empty()));

        // 早期版本依赖该标志才会继续发送
        ch.flags |= ChannelFlags::FIFO_ENABLED;
        regs.tfifo.set(0);
        ch.write(b"ok");
        assert_eq!(ch.tx_pending(), 0);
    }

    #[test]
    fn test_uart_to_queue_error_bytes() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.uart_init();

        let regs = board.regs(0);
        regs.rfifo.set(0);
        regs.txrxburst[0].set(0x41);
        // LSR 始终报告带奇偶错误的数据，逐字节阶段读满一个 FIFO 深度后返回
        regs.lsr.set(UART_LSR_DR | UART_LSR_PE);

        ch.copy_data_from_uart_to_queue();

        assert_eq!(ch.rx_pending(), UART_17158_RX_FIFOSIZE);
        assert_eq!(ch.stats().err_parity, UART_17158_RX_FIFOSIZE as u32);
        let b = ch.read_byte().unwrap();
        assert_eq!(b.data, 0x41);
        assert_eq!(b.status, LineStatus::PARITY_ERROR);
        assert!(b.status.has_rx_error());
    }

    #[test]
    fn test_uart_to_queue_ignored_errors() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.uart_init();
        ch.param(
            &Config::new()
                .baudrate(9600)
                .ignore_errors(LineStatus::PARITY_ERROR | LineStatus::DATA_READY),
        )
        .unwrap();

        let regs = board.regs(0);
        regs.rfifo.set(0);
        regs.lsr.set(UART_LSR_DR | UART_LSR_PE);
        ch.copy_data_from_uart_to_queue();

        assert_eq!(ch.rx_pending(), 0);
        assert_eq!(ch.stats().err_parity, 0);
    }

    #[test]
    fn test_uart_to_queue_fifo_error_skips_bulk() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.uart_init();

        let regs = board.regs(0);
        regs.rfifo.set(30);
        regs.lsr.set(UART_17158_RX_FIFO_DATA_ERROR);
        ch.copy_data_from_uart_to_queue();

        // 没有 DR，逐字节阶段也不读取
        assert_eq!(ch.rx_pending(), 0);
    }

    #[test]
    fn test_xon_xoff_detection() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.uart_init();

        let regs = board.regs(0);
        regs.isr_fcr.set(UART_17158_IIR_FIFO_ENABLED | UART_17158_IIR_XONXOFF);
        regs.xoffchar1.set(UART_17158_XOFF_DETECT);
        ch.service(ExtendedInterrupt::ModemStatus);
        assert!(ch.flags().contains(ChannelFlags::STOP));

        ch.write(b"held");
        assert_eq!(ch.tx_pending(), 4);

        regs.xoffchar1.set(UART_17158_XON_DETECT);
        ch.service(ExtendedInterrupt::ModemStatus);
        assert!(!ch.flags().contains(ChannelFlags::STOP));
    }

    #[test]
    fn test_xon_xoff_status_bits() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.uart_init();

        let regs = board.regs(0);
        regs.isr_fcr.set(UART_17158_IIR_XONXOFF);

        // 检测位与其他位一起读出时仍然生效
        regs.xoffchar1.set(0x80 | UART_17158_XOFF_DETECT);
        ch.parse_isr();
        assert!(ch.flags().contains(ChannelFlags::STOP));

        // 两位同时置位时按 XON 处理，输出不会卡住
        regs.xoffchar1.set(UART_17158_XON_DETECT | UART_17158_XOFF_DETECT);
        ch.parse_isr();
        assert!(!ch.flags().contains(ChannelFlags::STOP));

        ch.write(b"go");
        assert_eq!(ch.tx_pending(), 0);
    }

    #[test]
    fn test_hw_flow_state_change() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.set_modem_control(true, true);

        let regs = board.regs(0);
        regs.isr_fcr.set(UART_17158_IIR_HWFLOW_STATE_CHANGE);
        // 由 RTS 承担流控且 RTS 已被芯片拉低
        regs.mcr.set(UART_MCR_DTR);
        regs.msr.set(0x10 | 0x80 | 0x01);
        ch.parse_isr();

        assert_eq!(ch.modem_control() & UART_MCR_RTS, 0);
        assert_eq!(ch.modem_control() & UART_MCR_DTR, UART_MCR_DTR);
        assert_eq!(ch.modem_status(), ModemStatus::CTS | ModemStatus::DCD);

        // 由 DTR 承担流控
        regs.mcr.set(UART_MCR_OUT1);
        ch.parse_isr();
        assert_eq!(ch.modem_control() & UART_MCR_DTR, 0);
    }

    #[test]
    fn test_no_pending_isr() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        let regs = board.regs(0);
        regs.isr_fcr.set(UART_IIR_NO_INT | UART_17158_IIR_XONXOFF);
        regs.xoffchar1.set(UART_17158_XOFF_DETECT);
        ch.parse_isr();
        assert!(!ch.flags().contains(ChannelFlags::STOP));
    }

    #[test]
    fn test_parse_lsr_counts_errors() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.uart_init();
        board.regs(0)
            .lsr
            .set(UART_LSR_OE | UART_LSR_FE | UART_LSR_BI);
        ch.service(ExtendedInterrupt::RxLineStatus);

        let stats = ch.stats();
        assert_eq!(stats.err_overrun, 1);
        assert_eq!(stats.err_frame, 1);
        assert_eq!(stats.err_break, 1);
        assert_eq!(stats.err_parity, 0);
    }

    #[test]
    fn test_receiver_enable_disable() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        board.regs(0).ier.set(UART_IER_RDI | UART_IER_THRI);
        ch.disable_receiver();
        assert_eq!(board.regs(0).ier.get(), UART_IER_THRI);
        ch.enable_receiver();
        assert_eq!(board.regs(0).ier.get(), UART_IER_RDI | UART_IER_THRI);
    }

    #[test]
    fn test_start_stop_characters() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);

        // 未配置字符时什么也不发送
        board.regs(0).txrx.set(0);
        ch.send_start_character();
        assert_eq!(board.regs(0).txrx.get(), 0);
        assert_eq!(ch.stats().xon_sends, 0);

        ch.param(
            &Config::new()
                .baudrate(9600)
                .flow_control(FlowControl::software(0x11, 0x13)),
        )
        .unwrap();
        ch.send_stop_character();
        assert_eq!(board.regs(0).txrx.get(), 0x13);
        ch.send_start_character();
        assert_eq!(board.regs(0).txrx.get(), 0x11);
        assert_eq!(ch.stats().xon_sends, 1);
        assert_eq!(ch.stats().xoff_sends, 1);

        ch.send_immediate_char(b'!');
        assert_eq!(board.regs(0).txrx.get(), b'!');
    }

    #[test]
    fn test_bytes_left() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        board.regs(0).lsr.set(0);
        assert_eq!(ch.get_uart_bytes_left(), 1);
        board.regs(0).lsr.set(UART_LSR_TEMT);
        assert_eq!(ch.get_uart_bytes_left(), 0);
        assert!(ch.flags().contains(ChannelFlags::TX_FIFO_LWM));
    }

    #[test]
    fn test_flush_timeout() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        // 内存中的寄存器不会自动清除清空位
        assert_eq!(
            ch.flush_uart_write(),
            Err(NeoError::FlushTimeout(FifoDirection::Tx))
        );
        assert_eq!(
            ch.flush_uart_read(),
            Err(NeoError::FlushTimeout(FifoDirection::Rx))
        );
        assert!(ch.flags().contains(ChannelFlags::TX_FIFO_EMPTY));
    }

    #[test]
    fn test_wait_fifo_clear() {
        use core::cell::Cell;

        // 芯片在第 3 次读取时清除清空位
        let reads = Cell::new(0);
        let done = wait_fifo_clear(
            || {
                reads.set(reads.get() + 1);
                if reads.get() < 3 {
                    UART_FCR_ENABLE_FIFO | UART_FCR_CLEAR_XMIT
                } else {
                    UART_FCR_ENABLE_FIFO
                }
            },
            UART_FCR_CLEAR_XMIT,
        );
        assert!(done);
        assert_eq!(reads.get(), 3);

        // 只看指定的位
        assert!(wait_fifo_clear(|| UART_FCR_CLEAR_XMIT, UART_FCR_CLEAR_RCVR));

        let reads = Cell::new(0);
        let done = wait_fifo_clear(
            || {
                reads.set(reads.get() + 1);
                UART_FCR_CLEAR_RCVR
            },
            UART_FCR_CLEAR_RCVR,
        );
        assert!(!done);
        assert_eq!(reads.get(), FLUSH_RETRIES);
    }

    #[test]
    fn test_uart_off() {
        let board = FakeBoard::new(UART_XR17E158_DVID);
        let mut ch = channel(&board, UART_XR17E158_DVID);
        ch.param(&Config::new().flow_control(FlowControl::hardware()))
            .unwrap();
        ch.uart_off();
        assert_eq!(board.regs(0).efr.get(), 0);
        assert_eq!(board.regs(0).ier.get(), 0);
    }
}
