//! Clock and power management block: PLL configuration registers and the
//! FCLK/HCLK/PCLK derivation used by every rate calculation in the SoC.

use crate::bits::{bits, combine};

/// Crystal feeding both PLLs.
const XTAL_HZ: u32 = 12_000_000;

const MPLLCON: usize = 1;
const UPLLCON: usize = 2;
const CLKDIVN: usize = 5;

#[derive(Clone, Copy)]
pub enum Pll {
    Mpll,
    Upll,
}

pub struct ClockPower {
    regs: [u32; 6],
}

impl ClockPower {
    pub fn new() -> Self {
        ClockPower { regs: [0; 6] }
    }

    pub fn read(&self, offset: usize) -> u32 {
        self.regs.get(offset).copied().unwrap_or(0)
    }

    pub fn write(&mut self, offset: usize, data: u32, mask: u32) {
        let Some(reg) = self.regs.get_mut(offset) else {
            return;
        };
        combine(reg, data, mask);
        if offset == MPLLCON {
            log::debug!("clkpow: MPLLCON set, fclk now {} Hz", self.fclk(Pll::Mpll));
        }
    }

    /// `(mdiv + 8) * 12MHz / ((pdiv + 2) << sdiv)`
    pub fn fclk(&self, pll: Pll) -> u32 {
        let data = match pll {
            Pll::Mpll => self.regs[MPLLCON],
            Pll::Upll => self.regs[UPLLCON],
        };
        let mdiv = bits(data, 19, 12);
        let pdiv = bits(data, 9, 4);
        let sdiv = bits(data, 1, 0);
        let num = (mdiv + 8) as u64 * XTAL_HZ as u64;
        let den = ((pdiv + 2) as u64) << sdiv;
        (num / den) as u32
    }

    pub fn hclk(&self) -> u32 {
        const DIV: [u32; 4] = [1, 1, 2, 2];
        self.fclk(Pll::Mpll) / DIV[(self.regs[CLKDIVN] & 3) as usize]
    }

    pub fn pclk(&self) -> u32 {
        const DIV: [u32; 4] = [1, 2, 2, 4];
        self.fclk(Pll::Mpll) / DIV[(self.regs[CLKDIVN] & 3) as usize]
    }
}

impl Default for ClockPower {
    fn default() -> Self {
        Self::new()
    }
}
