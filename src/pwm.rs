//! PWM timer block: five down-counters clocked from PCLK through a
//! per-pair prescaler and a per-timer mux divider. Expiry raises the
//! timer's interrupt; auto-reload makes it periodic.

use crate::bits::{bit, bits, combine};

pub const TIMERS: usize = 5;

const TCFG0: usize = 0;
const TCFG1: usize = 1;
const TCON: usize = 2;

/// TCFG0 prescaler field shift per timer (timers share in pairs).
const PRESCALER_SHIFT: [u32; TIMERS] = [0, 0, 8, 8, 8];
/// TCFG1 mux nibble shift per timer.
const MUX_SHIFT: [u32; TIMERS] = [0, 4, 8, 12, 16];
/// TCON start-bit shift per timer.
const TCON_SHIFT: [u32; TIMERS] = [0, 8, 12, 16, 20];

const MUX_TABLE: [u32; 4] = [2, 4, 8, 16];

pub struct PwmTimers {
    regs: [u32; 17],
}

impl PwmTimers {
    pub fn new() -> Self {
        PwmTimers { regs: [0; 17] }
    }

    pub fn read(&self, offset: usize) -> u32 {
        self.regs.get(offset).copied().unwrap_or(0)
    }

    /// Merge a register write; returns the timers whose TCON start bit
    /// changed and therefore need rescheduling.
    pub fn write(&mut self, offset: usize, data: u32, mask: u32) -> Vec<usize> {
        let Some(reg) = self.regs.get_mut(offset) else {
            return Vec::new();
        };
        let old = *reg;
        combine(reg, data, mask);
        let new = *reg;
        let mut changed = Vec::new();
        if offset == TCON {
            for (ch, &shift) in TCON_SHIFT.iter().enumerate() {
                if bit(old, shift) != bit(new, shift) {
                    changed.push(ch);
                }
            }
        }
        changed
    }

    pub fn running(&self, ch: usize) -> bool {
        bit(self.regs[TCON], TCON_SHIFT[ch]) != 0
    }

    pub fn auto_reload(&self, ch: usize) -> bool {
        // Timer 4 has no output compare; its reload bit sits one lower.
        let shift = TCON_SHIFT[ch] + if ch == 4 { 2 } else { 3 };
        bit(self.regs[TCON], shift) != 0
    }

    fn count(&self, ch: usize) -> u32 {
        self.regs[3 + ch * 3] & 0xFFFF
    }

    fn compare(&self, ch: usize) -> u32 {
        if ch == 4 {
            0
        } else {
            self.regs[4 + ch * 3] & 0xFFFF
        }
    }

    /// Expiry rate in Hz, or `None` when the configuration is not
    /// internally clocked (mux >= 4 selects the external TCLK pin) or
    /// the count window is empty.
    pub fn rate_hz(&self, ch: usize, pclk: u32) -> Option<f64> {
        let prescaler = bits(self.regs[TCFG0], PRESCALER_SHIFT[ch] + 7, PRESCALER_SHIFT[ch]);
        let mux = bits(self.regs[TCFG1], MUX_SHIFT[ch] + 3, MUX_SHIFT[ch]);
        let Some(&div) = MUX_TABLE.get(mux as usize) else {
            log::warn!("pwm: timer {ch} clocked from TCLK (mux {mux}), not emulated");
            return None;
        };
        let window = self.count(ch) as i64 - self.compare(ch) as i64 + 1;
        if window <= 0 {
            log::warn!("pwm: timer {ch} has an empty count window");
            return None;
        }
        let freq = pclk as f64 / (prescaler + 1) as f64 / div as f64;
        Some(freq / window as f64)
    }
}

impl Default for PwmTimers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_math() {
        let mut pwm = PwmTimers::new();
        pwm.write(TCFG0, 0x0000_0003, 0xFFFF_FFFF); // prescaler 3 for timers 0/1
        pwm.write(TCFG1, 0x0000_0001, 0xFFFF_FFFF); // timer 0 mux /4
        pwm.write(3, 999, 0xFFFF_FFFF); // TCNTB0
        pwm.write(4, 0, 0xFFFF_FFFF); // TCMPB0
        // 16MHz / 4 / 4 / 1000 = 1kHz
        let hz = pwm.rate_hz(0, 16_000_000).unwrap();
        assert!((hz - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn tcon_edges_reported() {
        let mut pwm = PwmTimers::new();
        let changed = pwm.write(TCON, (1 << 0) | (1 << 12), 0xFFFF_FFFF);
        assert_eq!(changed, vec![0, 2]);
        assert!(pwm.running(0));
        assert!(pwm.running(2));
        // Re-writing the same value reports nothing.
        assert!(pwm.write(TCON, (1 << 0) | (1 << 12), 0xFFFF_FFFF).is_empty());
    }

    #[test]
    fn timer4_reload_bit_position() {
        let mut pwm = PwmTimers::new();
        pwm.write(TCON, 1 << 22, 0xFFFF_FFFF);
        assert!(pwm.auto_reload(4));
        assert!(!pwm.auto_reload(3));
    }

    #[test]
    fn external_clock_mux_rejected() {
        let mut pwm = PwmTimers::new();
        pwm.write(TCFG1, 0x5, 0xFFFF_FFFF); // timer 0 mux nibble = 5
        pwm.write(3, 100, 0xFFFF_FFFF);
        assert!(pwm.rate_hz(0, 16_000_000).is_none());
    }
}
