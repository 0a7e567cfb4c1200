//! LCD controller: timing registers, frame DMA out of system RAM, render
//! paths for 1/4/8/16 bpp TFT modes, and the palette window.
//!
//! The frame event renders a whole frame at scan origin; the live line
//! counter readable through LCDCON1 is derived from time within the
//! current frame.

use crate::bits::{bit, bits, combine};
use crate::scheduler::TICKS_PER_SEC;

const RAM_BASE: u32 = 0x0C00_0000;

const BLACK: u32 = 0x0000_0000;
const WHITE: u32 = 0x00FF_FFFF;

// LCDCON1 bppmode values (TFT).
const BPP_01: u32 = 0x08;
const BPP_04: u32 = 0x0A;
const BPP_08: u32 = 0x0B;
const BPP_16: u32 = 0x0C;

const LCDCON1: usize = 0;

pub struct LcdController {
    regs: [u32; 256],
    palette_regs: [u32; 256],
    palette: [u32; 256],

    // Frame DMA cursor.
    vramaddr_cur: u32,
    vramaddr_max: u32,
    offsize: u32,
    pagewidth_cur: u32,
    pagewidth_max: u32,
    bppmode: u32,
    bswp: u32,
    hwswp: u32,
    lineval: u32,
    hozval: u32,
    vpos: u32,
    hpos: u32,

    pub framebuffer: Vec<u32>,
    frame_period_ns: u64,
    frame_origin_ns: u64,
}

impl LcdController {
    pub fn new() -> Self {
        LcdController {
            regs: [0; 256],
            palette_regs: [0; 256],
            palette: [0; 256],
            vramaddr_cur: 0,
            vramaddr_max: 0,
            offsize: 0,
            pagewidth_cur: 0,
            pagewidth_max: 0,
            bppmode: 0,
            bswp: 0,
            hwswp: 0,
            lineval: 0,
            hozval: 0,
            vpos: 0,
            hpos: 0,
            framebuffer: Vec::new(),
            frame_period_ns: 0,
            frame_origin_ns: 0,
        }
    }

    pub fn enabled(&self) -> bool {
        bit(self.regs[LCDCON1], 0) != 0
    }

    pub fn frame_size(&self) -> (usize, usize) {
        ((self.hozval + 1) as usize, (self.lineval + 1) as usize)
    }

    pub fn frame_rate_hz(&self) -> f64 {
        if self.frame_period_ns == 0 {
            0.0
        } else {
            TICKS_PER_SEC as f64 / self.frame_period_ns as f64
        }
    }

    /// Current scan line, derived from time within the frame.
    pub fn scan_vpos(&self, now_ns: u64) -> u32 {
        if self.frame_period_ns == 0 {
            return 0;
        }
        let in_frame = now_ns.wrapping_sub(self.frame_origin_ns) % self.frame_period_ns;
        let lines = u64::from(self.lineval) + 1;
        ((in_frame * lines) / self.frame_period_ns) as u32
    }

    pub fn set_frame_origin(&mut self, now_ns: u64) {
        self.frame_origin_ns = now_ns;
    }

    pub fn read(&self, offset: usize, vpos: u32) -> u32 {
        let data = self.regs.get(offset).copied().unwrap_or(0);
        match offset {
            LCDCON1 => {
                let lineval = bits(self.regs[1], 23, 14);
                (data & !0xFFFC_0000) | (lineval.wrapping_sub(vpos) << 18)
            }
            _ => data,
        }
    }

    /// Merge a register write; true means the enable bit toggled and the
    /// facade must reconfigure.
    pub fn write(&mut self, offset: usize, data: u32, mask: u32) -> bool {
        let Some(reg) = self.regs.get_mut(offset) else {
            return false;
        };
        let old = *reg;
        combine(reg, data, mask);
        offset == LCDCON1 && bit(old, 0) != bit(*reg, 0)
    }

    pub fn read_palette(&self, offset: usize) -> u32 {
        self.palette_regs.get(offset).copied().unwrap_or(0)
    }

    /// 5-bit RGB fields at bits 15..11 / 10..6 / 5..1, expanded to 8-bit.
    pub fn write_palette(&mut self, offset: usize, data: u32, mask: u32) {
        let Some(reg) = self.palette_regs.get_mut(offset) else {
            return;
        };
        combine(reg, data, mask);
        let entry = *reg;
        let r = bits(entry, 15, 11) << 3;
        let g = bits(entry, 10, 6) << 3;
        let b = bits(entry, 5, 1) << 3;
        self.palette[offset] = (r << 16) | (g << 8) | b;
    }

    pub fn palette_color(&self, index: usize) -> u32 {
        self.palette[index & 0xFF]
    }

    /// Recompute geometry and frame rate from the timing registers and
    /// size the framebuffer. Returns (width, height, frame rate).
    pub fn configure(&mut self, hclk: u32) -> (usize, usize, f64) {
        let vspw = bits(self.regs[1], 5, 0);
        let vbpd = bits(self.regs[1], 31, 24);
        let lineval = bits(self.regs[1], 23, 14);
        let vfpd = bits(self.regs[1], 13, 6);
        let hspw = bits(self.regs[3], 7, 0);
        let hbpd = bits(self.regs[2], 25, 19);
        let hfpd = bits(self.regs[2], 7, 0);
        let hozval = bits(self.regs[2], 18, 8);
        let clkval = bits(self.regs[0], 17, 8);

        self.lineval = lineval;
        self.hozval = hozval;

        let vclk = hclk as f64 / ((clkval + 1) * 2) as f64;
        let frame_clocks = ((vspw + 1) + (vbpd + 1) + (lineval + 1) + (vfpd + 1)) as f64
            * ((hspw + 1) + (hbpd + 1) + (hfpd + 1) + (hozval + 1)) as f64;
        let framerate = vclk / frame_clocks;

        let width = (hozval + 1) as usize;
        let height = (lineval + 1) as usize;
        self.framebuffer = vec![0; width * height];
        self.frame_period_ns = if framerate > 0.0 {
            ((TICKS_PER_SEC as f64 / framerate).round() as u64).max(1)
        } else {
            0
        };
        log::debug!("lcd: configured {width}x{height} @ {framerate:.2} Hz");
        (width, height, framerate)
    }

    pub fn dma_init(&mut self) {
        self.dma_reload();
        self.bppmode = bits(self.regs[0], 4, 1);
        self.bswp = bit(self.regs[4], 1);
        self.hwswp = bit(self.regs[4], 0);
        self.lineval = bits(self.regs[1], 23, 14);
        self.hozval = bits(self.regs[2], 18, 8);
    }

    fn dma_reload(&mut self) {
        self.vramaddr_cur = self.regs[5] << 1;
        self.vramaddr_max = ((self.regs[5] & 0xFFE0_0000) | self.regs[6]) << 1;
        self.offsize = bits(self.regs[7], 21, 11);
        self.pagewidth_cur = 0;
        self.pagewidth_max = bits(self.regs[7], 10, 0);
    }

    /// Fetch the next 32-bit word of frame data, honoring the halfword
    /// and byte swap bits and the inter-line offset.
    fn dma_read(&mut self, ram: &[u8]) -> u32 {
        let mut data = [0u8; 4];
        for pair in data.chunks_exact_mut(2) {
            let base = self.vramaddr_cur.wrapping_sub(RAM_BASE) as usize;
            pair[0] = ram.get(base).copied().unwrap_or(0);
            pair[1] = ram.get(base + 1).copied().unwrap_or(0);
            self.vramaddr_cur = self.vramaddr_cur.wrapping_add(2);
            self.pagewidth_cur += 1;
            if self.pagewidth_cur >= self.pagewidth_max {
                self.pagewidth_cur = 0;
                self.vramaddr_cur = self.vramaddr_cur.wrapping_add(self.offsize << 1);
            }
        }
        let [d0, d1, d2, d3] = data.map(u32::from);
        match (self.hwswp, self.bswp) {
            (0, 0) => (d3 << 24) | (d2 << 16) | (d1 << 8) | d0,
            (0, _) => (d0 << 24) | (d1 << 16) | (d2 << 8) | d3,
            (_, 0) => (d1 << 24) | (d0 << 16) | (d3 << 8) | d2,
            (_, _) => (d2 << 24) | (d3 << 16) | (d0 << 8) | d1,
        }
    }

    fn put_pixel(&mut self, color: u32) {
        let width = (self.hozval + 1) as usize;
        let x = self.hpos as usize;
        let y = self.vpos as usize;
        if x < width {
            if let Some(slot) = self.framebuffer.get_mut(y * width + x) {
                *slot = color;
            }
        }
    }

    fn advance_hpos(&mut self, wrap_at: u32) {
        self.hpos += 1;
        if self.hpos >= wrap_at {
            self.hpos = 0;
            self.vpos = (self.vpos + 1) % (self.lineval + 1);
        }
    }

    fn render_01(&mut self, ram: &[u8]) {
        for _ in 0..4 {
            let mut data = self.dma_read(ram);
            for _ in 0..32 {
                let color = if data & 0x8000_0000 != 0 { BLACK } else { WHITE };
                self.put_pixel(color);
                data <<= 1;
                self.advance_hpos(self.pagewidth_max << 4);
            }
        }
    }

    fn render_04(&mut self, ram: &[u8]) {
        for _ in 0..4 {
            let mut data = self.dma_read(ram);
            for _ in 0..8 {
                self.put_pixel(self.palette[(data >> 28) as usize & 0xFF]);
                data <<= 4;
                self.advance_hpos(self.pagewidth_max << 2);
            }
        }
    }

    fn render_08(&mut self, ram: &[u8]) {
        for _ in 0..4 {
            let mut data = self.dma_read(ram);
            for _ in 0..4 {
                self.put_pixel(self.palette[(data >> 24) as usize & 0xFF]);
                data <<= 8;
                self.advance_hpos(self.pagewidth_max << 1);
            }
        }
    }

    fn render_16(&mut self, ram: &[u8]) {
        for _ in 0..4 {
            let mut data = self.dma_read(ram);
            for _ in 0..2 {
                let r = bits(data, 31, 27) << 3;
                let g = bits(data, 26, 22) << 3;
                let b = bits(data, 21, 17) << 3;
                self.put_pixel((r << 16) | (g << 8) | b);
                data <<= 16;
                self.advance_hpos(self.pagewidth_max);
            }
        }
    }

    /// Render one full frame starting at scan origin.
    pub fn render_frame(&mut self, ram: &[u8]) {
        if self.vramaddr_cur >= self.vramaddr_max {
            self.dma_reload();
        }
        if self.pagewidth_max == 0 {
            log::warn!("lcd: zero page width, skipping frame");
            return;
        }
        self.vpos = 0;
        self.hpos = 0;
        loop {
            match self.bppmode {
                BPP_01 => self.render_01(ram),
                BPP_04 => self.render_04(ram),
                BPP_08 => self.render_08(ram),
                BPP_16 => self.render_16(ram),
                mode => {
                    log::warn!("lcd: unsupported bpp mode {mode:#x}, skipping frame");
                    return;
                }
            }
            if self.vpos == 0 && self.hpos == 0 {
                break;
            }
            if self.vramaddr_cur >= self.vramaddr_max {
                break;
            }
        }
    }
}

impl Default for LcdController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_expands_5bit_fields() {
        let mut lcd = LcdController::new();
        lcd.write_palette(3, 0xFFFF, 0xFFFF_FFFF);
        assert_eq!(lcd.palette_color(3), 0x00F8F8F8);
        lcd.write_palette(4, 0b11111_00000_00000_0, 0xFFFF_FFFF);
        assert_eq!(lcd.palette_color(4), 0x00F80000);
    }

    #[test]
    fn word_assembly_swap_variants() {
        let ram = [0x11, 0x22, 0x33, 0x44];
        let mut lcd = LcdController::new();
        for (hwswp, bswp, expect) in [
            (0, 0, 0x44332211u32),
            (0, 1, 0x11223344),
            (1, 0, 0x22114433),
            (1, 1, 0x33441122),
        ] {
            lcd.regs[5] = RAM_BASE >> 1;
            lcd.regs[6] = (RAM_BASE + 0x100) & 0x1F_FFFF;
            lcd.regs[7] = 0x100; // pagewidth far from wrap
            lcd.dma_reload();
            lcd.hwswp = hwswp;
            lcd.bswp = bswp;
            assert_eq!(lcd.dma_read(&ram), expect, "hwswp={hwswp} bswp={bswp}");
        }
    }
}
