//! GPIO banks. Most ports are plain storage; ports B, D and E have
//! computed bits wired to the media-card slot, the button inputs and the
//! codec L3 control lines.

use crate::bits::{bit, combine};
use crate::card::CardSlot;
use crate::iis::{IisBus, L3Line};

// Word offsets into the 0x60-byte window.
const PBCON: usize = 0x08 / 4;
const PBDAT: usize = 0x0C / 4;
const PDDAT: usize = 0x24 / 4;
const PEDAT: usize = 0x30 / 4;

pub struct Gpio {
    regs: [u32; 24],
    /// Button lines on port B, active low.
    in0: u8,
    /// Button lines on port E, active low.
    in1: u8,
}

impl Gpio {
    pub fn new() -> Self {
        Gpio {
            regs: [0; 24],
            in0: 0xFF,
            in1: 0xFF,
        }
    }

    /// Raw input port lines (active low).
    pub fn set_input_lines(&mut self, in0: u8, in1: u8) {
        self.in0 = in0;
        self.in1 = in1;
    }

    pub fn read(&self, offset: usize, slot: &CardSlot) -> u32 {
        let data = self.regs.get(offset).copied().unwrap_or(0);
        match offset {
            PBCON => {
                let mut data = data & !1;
                if !slot.read {
                    data |= 1;
                }
                data
            }
            PBDAT => {
                (data & !0xFFFF) | (u32::from(self.in0) << 8) | u32::from(slot.datarx)
            }
            PDDAT => {
                let mut data = data & !0x3C0;
                if !slot.card().busy() {
                    data |= 0x200;
                }
                if !slot.do_read {
                    data |= 0x100;
                }
                if !slot.chip {
                    data |= 0x080;
                }
                if !slot.card().write_protected() {
                    data |= 0x040;
                }
                data
            }
            PEDAT => {
                let mut data = data & !0xFC;
                if slot.cmd_latch {
                    data |= 0x20;
                }
                if slot.add_latch {
                    data |= 0x10;
                }
                if !slot.do_write {
                    data |= 0x08;
                }
                if !slot.card().present() {
                    data |= 0x04;
                }
                data | (u32::from(self.in1) & 0xC0)
            }
            _ => data,
        }
    }

    pub fn write(
        &mut self,
        offset: usize,
        data: u32,
        mask: u32,
        slot: &mut CardSlot,
        iis: &mut IisBus,
    ) {
        let Some(reg) = self.regs.get_mut(offset) else {
            return;
        };
        combine(reg, data, mask);
        let value = *reg;
        match offset {
            PBCON => {
                slot.read = bit(value, 0) == 0;
                slot.update();
            }
            PBDAT => {
                slot.datatx = (value & 0xFF) as u8;
                slot.update();
            }
            PDDAT => {
                slot.do_read = value & 0x100 == 0;
                slot.chip = value & 0x080 == 0;
                slot.update();
            }
            PEDAT => {
                slot.cmd_latch = value & 0x20 != 0;
                slot.add_latch = value & 0x10 != 0;
                slot.do_write = value & 0x08 == 0;
                slot.update();
                iis.set_l3_line(L3Line::Data, bit(value, 11));
                iis.set_l3_line(L3Line::Mode, bit(value, 10));
                iis.set_l3_line(L3Line::Clock, bit(value, 9));
            }
            _ => {}
        }
    }
}

impl Default for Gpio {
    fn default() -> Self {
        Self::new()
    }
}
