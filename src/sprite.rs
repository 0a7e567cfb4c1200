//! Sprite generator: attribute decode, zoomed/flipped tile compositing
//! with per-pixel priority masking, and the attribute-list traversal
//! variants the hardware's board families use.
//!
//! Sprites are grids of 16x16 4bpp tiles. Coordinates live on a 512x512
//! wrapping playfield; every sprite is drawn at four candidate offsets
//! (0 and -512 on each axis) and the clip rectangle keeps whichever one
//! lands on screen.

use crate::bits::bits;

pub const TILE_SIZE: u32 = 16;

/// Playfield extent on each axis.
const WRAP: i32 = 0x200;

/// One sprite, decoded from four attribute words.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpriteAttributes {
    pub oy: i32,
    /// Tile rows minus one.
    pub ysize: u32,
    pub zoomy: u32,
    pub ox: i32,
    /// Tile columns minus one.
    pub xsize: u32,
    pub zoomx: u32,
    pub flipx: bool,
    pub flipy: bool,
    pub color: u32,
    pub pri: u32,
    /// 17-bit starting tile map index.
    pub map: u32,
}

impl SpriteAttributes {
    pub fn decode(words: [u16; 4]) -> Self {
        let w0 = u32::from(words[0]);
        let w1 = u32::from(words[1]);
        let w2 = u32::from(words[2]);
        let w3 = u32::from(words[3]);
        SpriteAttributes {
            oy: (w0 & 0x1ff) as i32,
            ysize: bits(w0, 11, 9),
            zoomy: bits(w0, 15, 12),
            ox: (w1 & 0x1ff) as i32,
            xsize: bits(w1, 11, 9),
            zoomx: bits(w1, 15, 12),
            flipx: w2 & 0x4000 != 0,
            flipy: w2 & 0x8000 != 0,
            color: bits(w2, 13, 8),
            pri: bits(w2, 13, 12),
            map: ((w2 & 1) << 16) | w3,
        }
    }
}

/// Indexed-color destination surface.
pub struct Bitmap {
    width: usize,
    height: usize,
    pub pixels: Vec<u16>,
}

impl Bitmap {
    pub fn new(width: usize, height: usize) -> Self {
        Bitmap {
            width,
            height,
            pixels: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn fill(&mut self, pen: u16) {
        self.pixels.fill(pen);
    }

    pub fn pixel(&self, x: i32, y: i32) -> u16 {
        self.pixels[y as usize * self.width + x as usize]
    }
}

/// Per-pixel priority markers, parallel to a `Bitmap`.
pub struct PriorityBitmap {
    width: usize,
    pub pixels: Vec<u8>,
}

impl PriorityBitmap {
    pub fn new(width: usize, height: usize) -> Self {
        PriorityBitmap {
            width,
            pixels: vec![0; width * height],
        }
    }

    pub fn fill(&mut self, value: u8) {
        self.pixels.fill(value);
    }

    pub fn pixel(&self, x: i32, y: i32) -> u8 {
        self.pixels[y as usize * self.width + x as usize]
    }
}

/// Inclusive clip rectangle.
#[derive(Clone, Copy, Debug)]
pub struct Rect {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Rect {
    pub fn new(min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> Self {
        Rect {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub fn covering(bitmap: &Bitmap) -> Self {
        Rect::new(0, bitmap.width as i32 - 1, 0, bitmap.height as i32 - 1)
    }

    fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Source of 4bpp tile pixels.
pub trait TileGfx {
    /// Pen at (`x`, `y`) of tile `code`; both in 0..16.
    fn pixel(&self, code: u32, x: u32, y: u32) -> u8;
    /// Number of tiles available; codes are taken modulo this.
    fn tile_count(&self) -> u32;
}

/// Tiles stored packed, two pixels per byte, high nibble first,
/// 128 bytes per 16x16 tile.
pub struct PackedTiles<'a> {
    pub data: &'a [u8],
}

impl TileGfx for PackedTiles<'_> {
    fn pixel(&self, code: u32, x: u32, y: u32) -> u8 {
        let offset = (code * 128 + y * 8 + x / 2) as usize;
        let byte = self.data.get(offset).copied().unwrap_or(0);
        if x & 1 == 0 { byte >> 4 } else { byte & 0x0f }
    }

    fn tile_count(&self) -> u32 {
        (self.data.len() / 128) as u32
    }
}

/// Screens drawn over lower-priority layers use these masks: a sprite may
/// only paint where `(mask >> priority_marker) & 1` is clear.
const PRI_MASKS: [u32; 4] = [0x00, 0xf0, 0xfc, 0xfe];

pub struct SpriteChip {
    xoffs: i32,
    yoffs: i32,
    pal_base: u32,
    transpen: u8,
    pdraw: bool,
    tile_cb: Box<dyn Fn(u32) -> u32>,
}

impl SpriteChip {
    pub fn new() -> Self {
        SpriteChip {
            xoffs: 0,
            yoffs: 0,
            pal_base: 0,
            transpen: 15,
            pdraw: false,
            tile_cb: Box::new(|map| map),
        }
    }

    pub fn set_offsets(&mut self, xoffs: i32, yoffs: i32) {
        self.xoffs = xoffs;
        self.yoffs = yoffs;
    }

    pub fn set_pal_base(&mut self, pal_base: u32) {
        self.pal_base = pal_base;
    }

    pub fn set_transpen(&mut self, transpen: u8) {
        self.transpen = transpen;
    }

    /// Enable per-pixel priority masking against a `PriorityBitmap`.
    pub fn set_pdraw(&mut self, pdraw: bool) {
        self.pdraw = pdraw;
    }

    /// Board-specific remap from map index to tile code.
    pub fn set_tile_indirection(&mut self, cb: Box<dyn Fn(u32) -> u32>) {
        self.tile_cb = cb;
    }

    /// Draw one decoded sprite at its four wraparound candidates.
    pub fn draw_sprite(
        &self,
        gfx: &dyn TileGfx,
        attrs: &SpriteAttributes,
        bitmap: &mut Bitmap,
        pri: &mut PriorityBitmap,
        clip: &Rect,
    ) {
        let ox = attrs.ox + self.xoffs;
        let oy = attrs.oy + self.yoffs;
        let pmask = PRI_MASKS[(attrs.pri & 3) as usize];

        // Zoom attribute is inverted: 0 means full size (32/32).
        let zoomx = 32 - attrs.zoomx as i32;
        let zoomy = 32 - attrs.zoomy as i32;

        let mut map = attrs.map;
        let rows = attrs.ysize as i32 + 1;
        let cols = attrs.xsize as i32 + 1;

        for ycnt in 0..rows {
            let ytile = if attrs.flipy { rows - 1 - ycnt } else { ycnt };
            for xcnt in 0..cols {
                let xtile = if attrs.flipx { cols - 1 - xcnt } else { xcnt };
                let code = (self.tile_cb)(map) % gfx.tile_count().max(1);
                map += 1;

                let sx = ox + xtile * zoomx / 2;
                let sy = oy + ytile * zoomy / 2;
                for (dx, dy) in [(0, 0), (-WRAP, 0), (0, -WRAP), (-WRAP, -WRAP)] {
                    self.draw_tile_zoom(
                        gfx,
                        code,
                        attrs.color,
                        attrs.flipx,
                        attrs.flipy,
                        sx + dx,
                        sy + dy,
                        (zoomx as u32) << 11,
                        (zoomy as u32) << 11,
                        pmask,
                        bitmap,
                        pri,
                        clip,
                    );
                }
            }
        }
    }

    /// Scaled tile blit. `scalex`/`scaley` are 16.16 fixed point with
    /// 0x10000 meaning 1:1.
    #[allow(clippy::too_many_arguments)]
    fn draw_tile_zoom(
        &self,
        gfx: &dyn TileGfx,
        code: u32,
        color: u32,
        flipx: bool,
        flipy: bool,
        sx: i32,
        sy: i32,
        scalex: u32,
        scaley: u32,
        pmask: u32,
        bitmap: &mut Bitmap,
        pri: &mut PriorityBitmap,
        clip: &Rect,
    ) {
        let dest_w = ((TILE_SIZE * scalex) >> 16) as i32;
        let dest_h = ((TILE_SIZE * scaley) >> 16) as i32;
        if dest_w <= 0 || dest_h <= 0 {
            return;
        }
        let inc_x = ((TILE_SIZE as i64) << 16) as i32 / dest_w;
        let inc_y = ((TILE_SIZE as i64) << 16) as i32 / dest_h;
        let color_base = ((self.pal_base + color) << 4) as u16;

        for dy in 0..dest_h {
            let y = sy + dy;
            if y < clip.min_y || y > clip.max_y {
                continue;
            }
            let mut src_y = ((dy * inc_y) >> 16) as u32 & (TILE_SIZE - 1);
            if flipy {
                src_y = TILE_SIZE - 1 - src_y;
            }
            for dx in 0..dest_w {
                let x = sx + dx;
                if !clip.contains(x, y) {
                    continue;
                }
                if x < 0
                    || y < 0
                    || x as usize >= bitmap.width
                    || y as usize >= bitmap.height
                {
                    continue;
                }
                let mut src_x = ((dx * inc_x) >> 16) as u32 & (TILE_SIZE - 1);
                if flipx {
                    src_x = TILE_SIZE - 1 - src_x;
                }
                let pen = gfx.pixel(code, src_x, src_y);
                if pen == self.transpen {
                    continue;
                }
                let pos = y as usize * bitmap.width + x as usize;
                if self.pdraw {
                    let marker = pri.pixels[pos] & 0x1f;
                    if (pmask >> marker) & 1 == 0 {
                        bitmap.pixels[pos] = color_base | u16::from(pen);
                    }
                    pri.pixels[pos] = 0x1f;
                } else {
                    bitmap.pixels[pos] = color_base | u16::from(pen);
                }
            }
        }
    }

    /// Forward list walk: stops at the first entry with the end bit
    /// (0x4000) set. Used by boards that pre-sort their lists.
    pub fn draw_list(
        &self,
        gfx: &dyn TileGfx,
        list: &[u16],
        vram: &[u16],
        bitmap: &mut Bitmap,
        pri: &mut PriorityBitmap,
        clip: &Rect,
    ) {
        for &entry in list.iter().take(0x400) {
            if entry & 0x4000 != 0 {
                break;
            }
            if let Some(mut attrs) = fetch_attrs(vram, u32::from(entry & 0x3ff)) {
                attrs.map &= 0x7fff;
                attrs.color &= 0x1f;
                self.draw_sprite(gfx, &attrs, bitmap, pri, clip);
            }
        }
    }

    /// Backward list walk: finds the end sentinel, then draws from it back
    /// to the start, skipping entries with the disable bit (0x8000) set.
    /// Earlier entries end up on top.
    pub fn draw_list_reverse(
        &self,
        gfx: &dyn TileGfx,
        list: &[u16],
        vram: &[u16],
        bitmap: &mut Bitmap,
        pri: &mut PriorityBitmap,
        clip: &Rect,
    ) {
        let end = list
            .iter()
            .position(|&entry| entry & 0x4000 != 0)
            .unwrap_or(list.len());
        for &entry in list[..end].iter().rev() {
            if entry & 0x8000 != 0 {
                continue;
            }
            if let Some(mut attrs) = fetch_attrs(vram, u32::from(entry & 0x3ff)) {
                attrs.map &= 0x7fff;
                self.draw_sprite(gfx, &attrs, bitmap, pri, clip);
            }
        }
    }

    /// Forward walk with a layer filter: only sprites whose priority
    /// attribute (halved) equals `drawpri` are drawn. Disable-bit entries
    /// are skipped, the end bit terminates.
    pub fn draw_list_priority(
        &self,
        gfx: &dyn TileGfx,
        list: &[u16],
        vram: &[u16],
        drawpri: u32,
        bitmap: &mut Bitmap,
        pri: &mut PriorityBitmap,
        clip: &Rect,
    ) {
        for &entry in list.iter().take(0x400) {
            if entry & 0x4000 != 0 {
                break;
            }
            if entry & 0x8000 != 0 {
                continue;
            }
            if let Some(mut attrs) = fetch_attrs(vram, u32::from(entry & 0x3ff)) {
                attrs.color &= 0x1f;
                if attrs.pri >> 1 != drawpri {
                    continue;
                }
                self.draw_sprite(gfx, &attrs, bitmap, pri, clip);
            }
        }
    }
}

impl Default for SpriteChip {
    fn default() -> Self {
        Self::new()
    }
}

fn fetch_attrs(vram: &[u16], index: u32) -> Option<SpriteAttributes> {
    let base = index as usize * 4;
    let words = vram.get(base..base + 4)?;
    Some(SpriteAttributes::decode([
        words[0], words[1], words[2], words[3],
    ]))
}
