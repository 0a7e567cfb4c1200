//! ADPCM sample player: a Dialogic-style 4-bit decoder core plus an
//! 8-voice command chip driven through a TMP latch register.
//!
//! Commands address voices either as a bitmask held in TMP (START, STOP,
//! LOOP) or by the low 3 bits of the command byte itself (FADR, CVOL).

use std::sync::OnceLock;

#[cfg(feature = "adpcm-trace")]
macro_rules! adpcm_trace {
    ($($arg:tt)*) => {
        println!($($arg)*)
    };
}
#[cfg(not(feature = "adpcm-trace"))]
macro_rules! adpcm_trace {
    ($($arg:tt)*) => {};
}

pub const VOICES: usize = 8;

const SIGNAL_MIN: i32 = -2048;
const SIGNAL_MAX: i32 = 2047;
const STEP_MAX: i32 = 48;

const INDEX_SHIFT: [i32; 8] = [-1, -1, -1, -1, 2, 4, 6, 8];

/// 49 step sizes x 16 nibbles, built once on first use.
fn diff_lookup() -> &'static [i32; 49 * 16] {
    static TABLE: OnceLock<[i32; 49 * 16]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0i32; 49 * 16];
        for step in 0..49 {
            let stepval = (16.0 * 1.1f64.powi(step)).floor() as i32;
            for nibble in 0..16usize {
                let sign = if nibble & 8 != 0 { -1 } else { 1 };
                let b2 = (nibble as i32 >> 2) & 1;
                let b1 = (nibble as i32 >> 1) & 1;
                let b0 = nibble as i32 & 1;
                table[step as usize * 16 + nibble] =
                    sign * (stepval * b2 + (stepval / 2) * b1 + (stepval / 4) * b0 + stepval / 8);
            }
        }
        table
    })
}

/// Decoder state for one ADPCM stream.
#[derive(Clone, Copy, Debug)]
pub struct AdpcmState {
    signal: i32,
    step: i32,
}

impl AdpcmState {
    pub fn new() -> Self {
        let mut state = AdpcmState { signal: 0, step: 0 };
        state.reset();
        state
    }

    pub fn reset(&mut self) {
        self.signal = -2;
        self.step = 0;
    }

    /// Decode one nibble, returning the new 12-bit signal.
    pub fn clock(&mut self, nibble: u8) -> i16 {
        self.signal += diff_lookup()[(self.step * 16 + (nibble as i32 & 15)) as usize];
        self.signal = self.signal.clamp(SIGNAL_MIN, SIGNAL_MAX);
        self.step += INDEX_SHIFT[(nibble & 7) as usize];
        self.step = self.step.clamp(0, STEP_MAX);
        self.signal as i16
    }
}

impl Default for AdpcmState {
    fn default() -> Self {
        Self::new()
    }
}

/// Backing store the chip fetches sample data from. Out-of-range reads
/// must return open-bus (0xFF) or zero rather than fail.
pub trait SampleRom {
    fn read(&self, offset: u32) -> u8;
}

impl SampleRom for [u8] {
    fn read(&self, offset: u32) -> u8 {
        self.get(offset as usize).copied().unwrap_or(0)
    }
}

impl SampleRom for Vec<u8> {
    fn read(&self, offset: u32) -> u8 {
        self.as_slice().read(offset)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Voice {
    pub playing: bool,
    pub looping: bool,
    pub start_flags: u8,
    pub end_flags: u8,
    /// Byte offset of the phrase's first sample byte.
    pub base_offset: u32,
    /// Nibble cursor within the phrase.
    pub sample: u32,
    /// Total nibble count of the phrase.
    pub count: u32,
    /// Latched by CVOL; attenuation is not applied to output.
    pub volume: u8,
    pub adpcm: AdpcmState,
}

impl Voice {
    /// Mix this voice into `out`. Stops (or rewinds, when looping) at the
    /// end of the phrase and leaves the rest of the batch untouched.
    fn generate(&mut self, rom: &dyn SampleRom, out: &mut [i32]) {
        if !self.playing {
            return;
        }
        for slot in out.iter_mut() {
            let byte = rom.read(self.base_offset + self.sample / 2);
            // Even cursor positions take the high nibble.
            let nibble = byte >> (((self.sample & 1) << 2) ^ 4);
            *slot += self.adpcm.clock(nibble) as i32;

            self.sample += 1;
            if self.sample >= self.count {
                if !self.looping {
                    self.playing = false;
                } else {
                    self.sample = 0;
                }
                break;
            }
        }
    }
}

// Command opcodes, i.e. bits 7..3 of a command write.
const CMD_START: u8 = 0x00;
const CMD_STOP: u8 = 0x01;
const CMD_LOOP: u8 = 0x02;
const CMD_OPT: u8 = 0x03;
const CMD_MUON: u8 = 0x04;
const CMD_FADR: u8 = 0x05;
const CMD_DADR: u8 = 0x06;
const CMD_CVOL: u8 = 0x07;
const CMD_PAN: u8 = 0x08;

pub struct AdpcmChip {
    tmp: u8,
    voices: [Voice; VOICES],
}

impl AdpcmChip {
    pub fn new() -> Self {
        AdpcmChip {
            tmp: 0,
            voices: [Voice::default(); VOICES],
        }
    }

    pub fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.playing = false;
        }
    }

    pub fn voice(&self, channel: usize) -> &Voice {
        &self.voices[channel & (VOICES - 1)]
    }

    /// Latch the TMP register. START/STOP/LOOP read it as a channel
    /// bitmask; FADR reads it as a phrase index.
    pub fn write_tmp(&mut self, data: u8) {
        self.tmp = data;
    }

    pub fn tmp(&self) -> u8 {
        self.tmp
    }

    pub fn write_command(&mut self, rom: &dyn SampleRom, data: u8) {
        let cmd = (data & 0xf8) >> 3;
        let channel = (data & 0x07) as usize;

        match cmd {
            CMD_START => {
                for (ch, voice) in self.voices.iter_mut().enumerate() {
                    if self.tmp & (1 << ch) != 0 {
                        adpcm_trace!("cmd START ch{ch}");
                        voice.playing = true;
                    }
                }
            }
            CMD_STOP => {
                for (ch, voice) in self.voices.iter_mut().enumerate() {
                    if self.tmp & (1 << ch) != 0 {
                        adpcm_trace!("cmd STOP ch{ch}");
                        voice.playing = false;
                    }
                }
            }
            CMD_LOOP => {
                for (ch, voice) in self.voices.iter_mut().enumerate() {
                    voice.looping = self.tmp & (1 << ch) != 0;
                    adpcm_trace!("cmd LOOP ch{ch} = {}", voice.looping);
                }
            }
            CMD_FADR => {
                let base = u32::from(self.tmp) * 8;
                let voice = &mut self.voices[channel];
                voice.start_flags = rom.read(base);
                let start = (u32::from(rom.read(base + 1)) << 16)
                    | (u32::from(rom.read(base + 2)) << 8)
                    | u32::from(rom.read(base + 3));
                voice.end_flags = rom.read(base + 4);
                let end = (u32::from(rom.read(base + 5)) << 16)
                    | (u32::from(rom.read(base + 6)) << 8)
                    | u32::from(rom.read(base + 7));
                voice.base_offset = start;
                voice.sample = 0;
                voice.count = 2 * (end.wrapping_sub(start).wrapping_add(1));
                voice.adpcm.reset();
                adpcm_trace!(
                    "cmd FADR ch{channel} phrase {} start {start:06x} end {end:06x}",
                    self.tmp
                );
            }
            CMD_CVOL => {
                // Latched only; attenuation is not applied on output.
                self.voices[channel].volume = self.tmp;
                adpcm_trace!("cmd CVOL ch{channel} = {:02x}", self.tmp);
            }
            CMD_OPT | CMD_MUON | CMD_DADR | CMD_PAN => {
                log::warn!("adpcm: unimplemented command {cmd:02x} ch{channel}");
            }
            _ => {
                log::warn!("adpcm: unknown command {cmd:02x} ch{channel}");
            }
        }
    }

    /// Mix all playing voices into `out` (cleared first).
    pub fn generate(&mut self, rom: &dyn SampleRom, out: &mut [i32]) {
        out.fill(0);
        for voice in &mut self.voices {
            voice.generate(rom, out);
        }
    }
}

impl Default for AdpcmChip {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_table_matches_closed_form() {
        let table = diff_lookup();
        for step in 0..49i32 {
            let stepval = (16.0 * 1.1f64.powi(step)).floor() as i32;
            for nibble in 0..16i32 {
                let sign = if nibble & 8 != 0 { -1 } else { 1 };
                let expected = sign
                    * (stepval * ((nibble >> 2) & 1)
                        + stepval / 2 * ((nibble >> 1) & 1)
                        + stepval / 4 * (nibble & 1)
                        + stepval / 8);
                assert_eq!(
                    table[(step * 16 + nibble) as usize],
                    expected,
                    "step {step} nibble {nibble}"
                );
            }
        }
        // Spot values: step 0 has stepval 16.
        assert_eq!(table[0], 2); // +16/8
        assert_eq!(table[7], 16 + 8 + 4 + 2);
        assert_eq!(table[8], -2);
    }

    #[test]
    fn diff_table_is_stable_across_calls() {
        let a = diff_lookup() as *const _;
        let b = diff_lookup() as *const _;
        assert_eq!(a, b);
        assert_eq!(diff_lookup()[100], diff_lookup()[100]);
    }

    #[test]
    fn reset_state() {
        let mut state = AdpcmState::new();
        state.clock(0x7);
        state.reset();
        assert_eq!(state.clock(0x0), 0); // -2 + 2
    }

    #[test]
    fn signal_clamps_high_and_low() {
        let mut state = AdpcmState::new();
        for _ in 0..200 {
            state.clock(0x7);
        }
        assert_eq!(state.clock(0x7), 2047);

        for _ in 0..400 {
            state.clock(0xf);
        }
        assert_eq!(state.clock(0xf), -2048);
    }

    #[test]
    fn step_index_clamps() {
        let mut state = AdpcmState::new();
        // Nibble 0 shifts the index by -1; it must stay pinned at 0.
        state.clock(0x0);
        state.clock(0x0);
        assert_eq!(state.step, 0);
        for _ in 0..100 {
            state.clock(0x4); // +2 per clock
        }
        assert_eq!(state.step, STEP_MAX);
    }
}
