//! DMA controller register bank: four channels, each a 0x20-byte window
//! of DISRC/DIDST/DCON/current-state/DMASKTRIG registers. The transfer
//! engine itself lives in the machine facade, which owns the bus; this
//! module owns register state and field decode.

use crate::bits::{bit, bits, combine};

pub const CHANNELS: usize = 4;

// Per-channel word offsets.
const DISRC: usize = 0;
const DIDST: usize = 1;
const DCON: usize = 2;
const DSTAT: usize = 3;
const DCSRC: usize = 4;
const DCDST: usize = 5;
const DMASKTRIG: usize = 6;

/// Side effect of a register write the facade must act on.
pub enum DmaWrite {
    None,
    /// DMASKTRIG on/off bit toggled for this channel.
    Recalc(usize),
}

pub struct DmaController {
    regs: [u32; 31],
}

impl DmaController {
    pub fn new() -> Self {
        DmaController { regs: [0; 31] }
    }

    fn reg(&self, ch: usize, which: usize) -> u32 {
        self.regs[ch * 8 + which]
    }

    fn reg_mut(&mut self, ch: usize, which: usize) -> &mut u32 {
        &mut self.regs[ch * 8 + which]
    }

    pub fn read(&self, offset: usize) -> u32 {
        self.regs.get(offset).copied().unwrap_or(0)
    }

    pub fn write(&mut self, offset: usize, data: u32, mask: u32) -> DmaWrite {
        let Some(reg) = self.regs.get_mut(offset) else {
            return DmaWrite::None;
        };
        let old = *reg;
        combine(reg, data, mask);
        let new = *reg;

        let ch = offset / 8;
        match offset % 8 {
            // Setting the no-auto-reload bit also clears the channel's
            // on/off flag.
            DCON if bit(new, 22) != 0 => {
                *self.reg_mut(ch, DMASKTRIG) &= !2;
                DmaWrite::None
            }
            DMASKTRIG if bit(old, 1) != bit(new, 1) => DmaWrite::Recalc(ch),
            _ => DmaWrite::None,
        }
    }

    /// DMASKTRIG on/off bit.
    pub fn enabled(&self, ch: usize) -> bool {
        bit(self.reg(ch, DMASKTRIG), 1) != 0
    }

    pub fn clear_enable(&mut self, ch: usize) {
        *self.reg_mut(ch, DMASKTRIG) &= !2;
    }

    /// Copy programmed transfer count and addresses into the current-state
    /// registers.
    pub fn reload(&mut self, ch: usize) {
        let tc = bits(self.reg(ch, DCON), 19, 0);
        let src = bits(self.reg(ch, DISRC), 28, 0);
        let dst = bits(self.reg(ch, DIDST), 28, 0);
        let stat = self.reg_mut(ch, DSTAT);
        *stat = (*stat & !0x000F_FFFF) | tc;
        let csrc = self.reg_mut(ch, DCSRC);
        *csrc = (*csrc & !0x1FFF_FFFF) | src;
        let cdst = self.reg_mut(ch, DCDST);
        *cdst = (*cdst & !0x1FFF_FFFF) | dst;
    }

    pub fn current_count(&self, ch: usize) -> u32 {
        bits(self.reg(ch, DSTAT), 19, 0)
    }

    pub fn set_current_count(&mut self, ch: usize, tc: u32) {
        let stat = self.reg_mut(ch, DSTAT);
        *stat = (*stat & !0x000F_FFFF) | (tc & 0x000F_FFFF);
    }

    pub fn current_src(&self, ch: usize) -> u32 {
        bits(self.reg(ch, DCSRC), 28, 0)
    }

    pub fn set_current_src(&mut self, ch: usize, addr: u32) {
        let csrc = self.reg_mut(ch, DCSRC);
        *csrc = (*csrc & !0x1FFF_FFFF) | (addr & 0x1FFF_FFFF);
    }

    pub fn current_dst(&self, ch: usize) -> u32 {
        bits(self.reg(ch, DCDST), 28, 0)
    }

    pub fn set_current_dst(&mut self, ch: usize, addr: u32) {
        let cdst = self.reg_mut(ch, DCDST);
        *cdst = (*cdst & !0x1FFF_FFFF) | (addr & 0x1FFF_FFFF);
    }

    /// Transfer unit in bytes (1, 2 or 4). The reserved encoding logs and
    /// falls back to bytes.
    pub fn unit_size(&self, ch: usize) -> u32 {
        match bits(self.reg(ch, DCON), 21, 20) {
            0 => 1,
            1 => 2,
            2 => 4,
            _ => {
                log::warn!("dma: channel {ch} uses reserved data size, assuming bytes");
                1
            }
        }
    }

    /// Address step per unit; the inc/fixed select bit set means fixed.
    pub fn src_fixed(&self, ch: usize) -> bool {
        bit(self.reg(ch, DISRC), 29) != 0
    }

    pub fn dst_fixed(&self, ch: usize) -> bool {
        bit(self.reg(ch, DIDST), 29) != 0
    }

    /// Whole-service mode: drain the full count per trigger. Clear means
    /// single service, one unit per trigger.
    pub fn whole_block(&self, ch: usize) -> bool {
        bit(self.reg(ch, DCON), 26) != 0
    }

    /// Software-triggered channel (hardware request select clear).
    pub fn software_start(&self, ch: usize) -> bool {
        bit(self.reg(ch, DCON), 23) == 0
    }

    /// Hardware request source field.
    pub fn hw_source(&self, ch: usize) -> u32 {
        bits(self.reg(ch, DCON), 25, 24)
    }

    pub fn reload_disabled(&self, ch: usize) -> bool {
        bit(self.reg(ch, DCON), 22) != 0
    }

    pub fn interrupt_enabled(&self, ch: usize) -> bool {
        bit(self.reg(ch, DCON), 28) != 0
    }
}

impl Default for DmaController {
    fn default() -> Self {
        Self::new()
    }
}
