//! 单元测试用的内存板卡：寄存器窗口由普通内存模拟，读写不会产生硬件副作用

use core::ptr::NonNull;

use super::mmio::Mmio;
use super::registers::*;

const WINDOW_SIZE: usize = NEO_CHANNEL_STRIDE * (NEO_MAX_PORTS - 1) + 0x3c0;

pub(crate) struct FakeBoard {
    _mem: Box<[u32]>,
    ptr: NonNull<u8>,
}

impl FakeBoard {
    pub(crate) fn new(dvid: u8) -> Self {
        let mut mem = vec![0u32; WINDOW_SIZE / 4].into_boxed_slice();
        let ptr = NonNull::new(mem.as_mut_ptr() as *mut u8).unwrap();
        let board = Self { _mem: mem, ptr };
        board.write(NEO_DVID_REG, dvid);
        board
    }

    pub(crate) fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    pub(crate) fn mmio(&self) -> Mmio {
        unsafe { Mmio::new(self.ptr) }
    }

    pub(crate) fn regs(&self, port: usize) -> &NeoUartRegisters {
        unsafe { &*(self.ptr.as_ptr().add(port * NEO_CHANNEL_STRIDE) as *const NeoUartRegisters) }
    }

    pub(crate) fn read(&self, offset: usize) -> u8 {
        unsafe { core::ptr::read_volatile(self.ptr.as_ptr().add(offset)) }
    }

    pub(crate) fn write(&self, offset: usize, val: u8) {
        unsafe { core::ptr::write_volatile(self.ptr.as_ptr().add(offset), val) }
    }

    pub(crate) fn set_poll(&self, raw: u32) {
        unsafe {
            let addr = self.ptr.as_ptr().add(UART_17158_POLL_ADDR_OFFSET) as *mut u32;
            core::ptr::write_volatile(addr, raw.to_le());
        }
    }
}
