//! IIS (audio serial) unit: a sample-rate timer derived from PCLK, a
//! halfword FIFO whose pairs become stereo frames, and the L3 control
//! lines driven from GPIO. The sample strobe can also raise a hardware
//! DMA request on channel 2.

use crate::bits::{bit, bits, combine};
use crate::sample_queue::SampleProducer;

const IISCON: usize = 0;
const IISMOD: usize = 1;
const IISPSR: usize = 2;
const IISFIF: usize = 4;

const CODECLK_TABLE: [u32; 2] = [256, 384];

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum L3Line {
    Data,
    Mode,
    Clock,
}

pub struct IisBus {
    regs: [u32; 5],
    fifo: [u16; 8],
    fifo_index: usize,
    l3_data: u32,
    l3_mode: u32,
    l3_clock: u32,
}

impl IisBus {
    pub fn new() -> Self {
        IisBus {
            regs: [0; 5],
            fifo: [0; 8],
            fifo_index: 0,
            l3_data: 0,
            l3_mode: 0,
            l3_clock: 0,
        }
    }

    pub fn enabled(&self) -> bool {
        bit(self.regs[IISCON], 0) != 0
    }

    /// Codec sample rate from the prescaler and the codec clock select.
    pub fn sample_rate_hz(&self, pclk: u32) -> f64 {
        let prescaler_a = bits(self.regs[IISPSR], 9, 5);
        let codeclk = bit(self.regs[IISMOD], 2);
        pclk as f64 / (prescaler_a + 1) as f64 / CODECLK_TABLE[codeclk as usize] as f64 * 2.0
    }

    pub fn read(&self, offset: usize) -> u32 {
        self.regs.get(offset).copied().unwrap_or(0)
    }

    /// Merge a register write; true means the enable bit toggled.
    /// FIFO halfwords that complete a left/right pair are pushed to `dac`.
    pub fn write(&mut self, offset: usize, data: u32, mask: u32, dac: &SampleProducer) -> bool {
        if offset == IISFIF {
            // Each enabled half of the access pushes one halfword.
            if mask & 0xFFFF_0000 != 0 {
                self.push_halfword(bits(data, 31, 16) as u16, dac);
            }
            if mask & 0x0000_FFFF != 0 {
                self.push_halfword(bits(data, 15, 0) as u16, dac);
            }
            return false;
        }
        let Some(reg) = self.regs.get_mut(offset) else {
            return false;
        };
        let old = *reg;
        combine(reg, data, mask);
        offset == IISCON && bit(old, 0) != bit(*reg, 0)
    }

    fn push_halfword(&mut self, value: u16, dac: &SampleProducer) {
        self.fifo[self.fifo_index & 7] = value;
        self.fifo_index += 1;
        if self.fifo_index == 2 {
            self.fifo_index = 0;
            dac.push_stereo(self.fifo[0] as i16, self.fifo[1] as i16);
        }
    }

    /// L3 bus lines come in from the GPIO block; codec register traffic
    /// is logged, not modeled.
    pub fn set_l3_line(&mut self, line: L3Line, state: u32) {
        let slot = match line {
            L3Line::Data => &mut self.l3_data,
            L3Line::Mode => &mut self.l3_mode,
            L3Line::Clock => &mut self.l3_clock,
        };
        if *slot != state {
            log::trace!("iis: L3 {} -> {state}", match line {
                L3Line::Data => "data",
                L3Line::Mode => "mode",
                L3Line::Clock => "clock",
            });
        }
        *slot = state;
    }
}

impl Default for IisBus {
    fn default() -> Self {
        Self::new()
    }
}
