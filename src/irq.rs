//! Interrupt controller: SRCPND/INTPND/INTOFFSET with lowest-bit-wins
//! arbitration. The mask and mode registers are storage only; arbitration
//! scans raw source bits, matching the hardware's observed behavior under
//! this firmware.

use crate::bits::combine;

/// Interrupt source numbers.
pub mod sources {
    pub const EINT0: u32 = 0;
    pub const TICK: u32 = 8;
    pub const WDT: u32 = 9;
    pub const TIMER0: u32 = 10;
    pub const TIMER1: u32 = 11;
    pub const TIMER2: u32 = 12;
    pub const TIMER3: u32 = 13;
    pub const TIMER4: u32 = 14;
    pub const DMA0: u32 = 17;
    pub const DMA1: u32 = 18;
    pub const DMA2: u32 = 19;
    pub const DMA3: u32 = 20;
    pub const MMC: u32 = 21;
    pub const SPI: u32 = 22;
    pub const IIC: u32 = 27;
    pub const RTC: u32 = 30;
    pub const ADC: u32 = 31;
}

const SRCPND: usize = 0;
const INTPND: usize = 4;
const INTOFFSET: usize = 5;

pub struct IrqController {
    // SRCPND, INTMOD, INTMSK, PRIORITY, INTPND, INTOFFSET
    regs: [u32; 6],
    line: bool,
}

impl IrqController {
    pub fn new() -> Self {
        IrqController {
            regs: [0; 6],
            line: false,
        }
    }

    /// State of the CPU IRQ line.
    pub fn line_asserted(&self) -> bool {
        self.line
    }

    /// Raise `source`. If nothing was pending the source wins outright;
    /// otherwise pending sources are re-arbitrated lowest bit first.
    pub fn request(&mut self, source: u32) {
        let bit = 1u32 << source;
        if self.regs[SRCPND] == 0 {
            self.regs[SRCPND] |= bit;
            self.regs[INTPND] |= bit;
            self.regs[INTOFFSET] = source;
            self.line = true;
            log::trace!("irq: source {source} asserted");
        } else {
            self.regs[SRCPND] |= bit;
            self.rescan();
        }
    }

    fn rescan(&mut self) {
        if self.regs[SRCPND] != 0 {
            let winner = self.regs[SRCPND].trailing_zeros();
            self.regs[INTPND] |= 1 << winner;
            self.regs[INTOFFSET] = winner;
            self.line = true;
        } else {
            self.line = false;
        }
    }

    pub fn read(&self, offset: usize) -> u32 {
        self.regs.get(offset).copied().unwrap_or(0)
    }

    pub fn write(&mut self, offset: usize, data: u32, mask: u32) {
        let Some(reg) = self.regs.get_mut(offset) else {
            return;
        };
        let old = *reg;
        combine(reg, data, mask);
        match offset {
            // Write-one-to-clear, then re-arbitrate what remains.
            SRCPND => {
                self.regs[SRCPND] = old & !data;
                self.rescan();
            }
            INTPND => {
                self.regs[INTPND] = old & !data;
            }
            _ => {}
        }
    }
}

impl Default for IrqController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_pending_source_wins() {
        let mut irq = IrqController::new();
        irq.request(3);
        assert_eq!(irq.read(INTOFFSET), 3);
        assert!(irq.line_asserted());
        // A lower source arriving while 3 is pending takes over.
        irq.request(1);
        assert_eq!(irq.read(INTOFFSET), 1);
        assert_eq!(irq.read(SRCPND), 0b1010);
        assert_eq!(irq.read(INTPND), 0b1010);
    }

    #[test]
    fn acknowledge_rescans_and_deasserts() {
        let mut irq = IrqController::new();
        irq.request(1);
        irq.request(3);
        // Clear source 1: source 3 must win the re-scan.
        irq.write(SRCPND, 1 << 1, 0xFFFF_FFFF);
        assert_eq!(irq.read(INTOFFSET), 3);
        assert!(irq.line_asserted());
        // Clear source 3: line drops, INTOFFSET holds its last value.
        irq.write(SRCPND, 1 << 3, 0xFFFF_FFFF);
        assert!(!irq.line_asserted());
        assert_eq!(irq.read(INTOFFSET), 3);
    }

    #[test]
    fn intpnd_clear_does_not_rearbitrate() {
        let mut irq = IrqController::new();
        irq.request(2);
        irq.write(INTPND, 1 << 2, 0xFFFF_FFFF);
        assert_eq!(irq.read(INTPND), 0);
        assert_eq!(irq.read(SRCPND), 1 << 2);
        assert!(irq.line_asserted());
    }
}
