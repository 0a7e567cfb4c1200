//! Device cores for a vintage handheld platform.
//!
//! This crate contains platform-agnostic emulation of the machine's three
//! custom chips: the SoC peripheral block (interrupts, DMA, timers, LCD,
//! IIC/IIS, GPIO), an ADPCM sample player and a zooming sprite generator.
//! Frontends drive the machine via the [`soc`] facade; the sound and
//! sprite chips are free-standing and can be used on their own.

#![allow(dead_code)]

/// ADPCM decoder core and the 8-voice command chip around it.
pub mod adpcm;

/// Bitfield extraction and masked register merge helpers.
pub mod bits;

/// Removable media card trait and the GPIO-facing latch state.
pub mod card;

/// Clock and power management (PLLs, bus clock dividers).
pub mod clk;

/// Four-channel DMA controller register bank.
pub mod dma;

/// GPIO ports with card, button and codec control lines.
pub mod gpio;

/// IIC master and its serial EEPROM.
pub mod iic;

/// IIS audio unit feeding the DAC sample queue.
pub mod iis;

/// Interrupt controller with lowest-bit-wins arbitration.
pub mod irq;

/// LCD controller: timing, frame DMA and render paths.
pub mod lcd;

/// Five PWM timers.
pub mod pwm;

/// Lock-free stereo frame queue between emulation and audio threads.
pub mod sample_queue;

/// Nanosecond-resolution timer event scheduler.
pub mod scheduler;

/// High-level facade that wires RAM, the banks and the scheduler into a
/// single machine.
pub mod soc;

/// Sprite attribute decode and zoomed tile compositing.
pub mod sprite;
