//! 板级操作：端口枚举、扩展中断分发、VPD

use core::ptr::NonNull;

use super::channel::NeoChannel;
use super::eeprom::Vpd;
use super::mmio::{BoardIo, Mmio};
use super::poll::PollStatus;
use super::registers::*;
use crate::{BoardOps, NeoError};

/// 一块 Neo 板卡（一颗 XR17x158 芯片）
pub struct NeoBoard {
    io: Mmio,
    nports: usize,
    dvid: u8,
    vpd: Option<Vpd>,
}

impl NeoBoard {
    /// # Safety
    ///
    /// `base` 必须指向已映射的板卡寄存器空间，至少覆盖 `nports` 个通道窗口，
    /// 且在板卡及其通道存活期间保持有效。
    pub unsafe fn new(base: NonNull<u8>, nports: usize) -> Result<Self, NeoError> {
        if nports == 0 || nports > NEO_MAX_PORTS {
            return Err(NeoError::InvalidPortCount(nports));
        }

        let io = Mmio::new(base);
        let dvid = io.read_reg(NEO_DVID_REG);
        log::debug!(
            "neo board at {:#x}: {} ports, dvid {:#04x} ({:?})",
            io.get_base(),
            nports,
            dvid,
            Revision::from_dvid(dvid)
        );

        Ok(Self {
            io,
            nports,
            dvid,
            vpd: None,
        })
    }

    pub fn nports(&self) -> usize {
        self.nports
    }

    pub fn dvid(&self) -> u8 {
        self.dvid
    }

    pub fn revision(&self) -> Revision {
        Revision::from_dvid(self.dvid)
    }

    /// 创建端口 `port` 的通道驱动
    ///
    /// 同一端口只应存在一个通道实例，否则影子状态会互相覆盖。
    pub fn channel(&self, port: usize) -> Result<NeoChannel, NeoError> {
        if port >= self.nports {
            return Err(NeoError::PortOutOfRange(port));
        }
        Ok(NeoChannel::new(port, self.io, self.revision()))
    }

    /// 读取 32 位扩展中断寄存器
    pub fn poll(&self) -> PollStatus {
        PollStatus::new(self.io.read_reg32(UART_17158_POLL_ADDR_OFFSET))
    }
}

impl BoardOps for NeoBoard {
    type Channel = NeoChannel;

    fn intr(&mut self, channels: &mut [NeoChannel]) -> bool {
        let poll = self.poll();

        // 共享中断线上的其他设备
        if poll.is_empty() {
            return false;
        }

        for (port, cause) in poll.pending() {
            let Some(cause) = cause else {
                log::trace!("port {port}: pending without cause, poll {:#x}", poll.raw());
                continue;
            };

            if port >= self.nports {
                log::warn!("port {port}: interrupt from unpopulated port");
                continue;
            }

            match channels.iter_mut().find(|ch| ch.port() == port) {
                Some(ch) => ch.service(cause),
                None => log::trace!("port {port}: {cause:?} with no open channel"),
            }
        }

        true
    }

    fn vpd(&mut self) -> &Vpd {
        let io = self.io;
        self.vpd.get_or_insert_with(|| Vpd::read(&io))
    }
}
