//! 板载串行 EEPROM 中的 VPD（Vital Product Data）读取
//!
//! EEPROM 挂在设备配置寄存器 [`NEO_EEREG`] 上，通过 CK/CS/DI/DO 四个引脚位
//! 逐位模拟 93C46 风格的读时序。

use heapless::String;

use super::mmio::BoardIo;
use super::registers::*;

/// READ 命令：起始位 1 + 操作码 10，后接 6 位地址
const EEPROM_READ: u16 = 0x180;
/// 命令位数
const EEPROM_CMD_BITS: u32 = 9;
/// 读回位数：1 位哑元 0 + 16 位数据
const EEPROM_DATA_BITS: u32 = 17;

/// VPD 中的 PCI 大资源名称标签
const VPD_LARGE_RESOURCE_TAG: u8 = 0x82;
/// VPD 小资源结束标签
const VPD_END_TAG: u8 = 0x78;
/// 序列号最大长度
pub const VPD_SERIAL_LEN: usize = 9;

/// 读取 EEPROM 中的一个 16 位字
pub fn read_eeprom_word(io: &impl BoardIo, address: u8) -> u16 {
    // 使能片选
    io.write_reg(NEO_EEREG, NEO_EECS);

    let cmd = EEPROM_READ | (address as u16 & 0x3f);
    for bit in (0..EEPROM_CMD_BITS).rev() {
        let databit = if cmd & (1 << bit) != 0 { NEO_EEDI } else { 0 };
        io.write_reg(NEO_EEREG, databit | NEO_EECS);
        io.write_reg(NEO_EEREG, databit | NEO_EECS | NEO_EECK);
    }

    let mut val: u32 = 0;
    for _ in 0..EEPROM_DATA_BITS {
        io.write_reg(NEO_EEREG, NEO_EECS);
        io.write_reg(NEO_EEREG, NEO_EECS | NEO_EECK);
        val <<= 1;
        if io.read_reg(NEO_EEREG) & NEO_EEDO != 0 {
            val |= 1;
        }
    }

    // 时钟下降沿，然后撤销片选
    io.write_reg(NEO_EEREG, NEO_EECS);
    io.write_reg(NEO_EEREG, 0);

    val as u16
}

/// 板卡 VPD 映像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vpd {
    image: [u8; NEO_VPD_IMAGEBYTES],
    valid: bool,
}

impl Default for Vpd {
    fn default() -> Self {
        Self {
            image: [0; NEO_VPD_IMAGEBYTES],
            valid: false,
        }
    }
}

impl Vpd {
    /// 从 EEPROM 读出完整映像并校验
    pub fn read(io: &impl BoardIo) -> Self {
        let mut image = [0u8; NEO_VPD_IMAGEBYTES];
        for i in 0..NEO_VPD_IMAGESIZE {
            let word = read_eeprom_word(io, i as u8);
            image[i * 2] = (word & 0xff) as u8;
            image[i * 2 + 1] = (word >> 8) as u8;
        }
        Self::from_image(image)
    }

    /// 校验映像，不合法的映像被清零
    pub fn from_image(image: [u8; NEO_VPD_IMAGEBYTES]) -> Self {
        // 0x08：长资源名称标签；0x10：PCI-66 板卡上的长资源名称标签；0x7F：结束标签
        let valid = (image[0x08] == VPD_LARGE_RESOURCE_TAG
            || image[0x10] == VPD_LARGE_RESOURCE_TAG)
            && image[0x7F] == VPD_END_TAG;

        if valid {
            Self { image, valid }
        } else {
            log::debug!("VPD image has no valid resource tags, discarding");
            Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn image(&self) -> &[u8; NEO_VPD_IMAGEBYTES] {
        &self.image
    }

    /// 序列号：取最后一个 "SN" 关键字后的内容（跳过长度字节），最多 9 个字符
    pub fn serial_number(&self) -> Option<String<VPD_SERIAL_LEN>> {
        if !self.valid {
            return None;
        }

        let start = (0..NEO_VPD_IMAGEBYTES - 3)
            .rev()
            .find(|&i| self.image[i] == b'S' && self.image[i + 1] == b'N')?
            + 3;

        let mut serial = String::new();
        for &b in self.image[start..].iter().take(VPD_SERIAL_LEN) {
            // 遇到 NUL 或非 ASCII 字节即截断
            if b == 0 || !b.is_ascii() || serial.push(b as char).is_err() {
                break;
            }
        }
        Some(serial)
    }
}
