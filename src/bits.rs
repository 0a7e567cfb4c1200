//! Bitfield helpers shared by the register banks.

/// Extract bit `n` of `x`.
#[inline]
pub const fn bit(x: u32, n: u32) -> u32 {
    (x >> n) & 1
}

/// Extract bits `hi..=lo` of `x`, right-aligned.
#[inline]
pub const fn bits(x: u32, hi: u32, lo: u32) -> u32 {
    (x >> lo) & (u32::MAX >> (31 - (hi - lo)))
}

/// Merge `data` into `reg` under `mask`. Bus accesses narrower than a full
/// word arrive with a partial mask.
#[inline]
pub fn combine(reg: &mut u32, data: u32, mask: u32) {
    *reg = (*reg & !mask) | (data & mask);
}
