//! Neo 板级 MMIO 访问
//!
//! 设备配置寄存器（扩展中断轮询、DVID、EEPROM 控制）不属于任何通道的寄存器块，
//! 按相对板卡基地址的字节偏移访问。

use core::ptr::NonNull;

/// 板级寄存器访问方式
pub trait BoardIo {
    fn read_reg(&self, offset: usize) -> u8;
    fn write_reg(&self, offset: usize, val: u8);
    /// 32 位读取，`offset` 需 4 字节对齐
    fn read_reg32(&self, offset: usize) -> u32;
    fn get_base(&self) -> usize;
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Mmio {
    base: NonNull<u8>,
}

// SAFETY: 只保存设备内存地址，访问均为 volatile
unsafe impl Send for Mmio {}

impl Mmio {
    /// # Safety
    ///
    /// `base` 必须指向已映射的 Neo 板卡寄存器空间，且在 `Mmio` 存活期间保持有效。
    pub unsafe fn new(base: NonNull<u8>) -> Self {
        Self { base }
    }

    pub(crate) fn ptr(&self) -> NonNull<u8> {
        self.base
    }
}

impl BoardIo for Mmio {
    fn read_reg(&self, offset: usize) -> u8 {
        unsafe { core::ptr::read_volatile(self.base.as_ptr().add(offset)) }
    }

    fn write_reg(&self, offset: usize, val: u8) {
        unsafe {
            core::ptr::write_volatile(self.base.as_ptr().add(offset), val);
        }
    }

    fn read_reg32(&self, offset: usize) -> u32 {
        unsafe {
            let addr = self.base.as_ptr().add(offset) as *const u32;
            u32::from_le(core::ptr::read_volatile(addr))
        }
    }

    fn get_base(&self) -> usize {
        self.base.as_ptr() as usize
    }
}
