//! IIC master talking to an 8KB serial EEPROM. Each byte is strobed by a
//! one-shot millisecond timer; the next byte goes out when firmware clears
//! the interrupt-pending flag in IICCON.

use crate::bits::{bit, bits, combine};

pub const EEPROM_SIZE: usize = 0x2000;

const IICCON: usize = 0;
const IICSTAT: usize = 1;
const IICDS: usize = 3;

// EEPROM device address byte for a write transaction.
const EEPROM_WRITE_ADDR: u8 = 0xA0;

/// What the facade must do after a register write.
#[derive(PartialEq, Eq, Debug)]
pub enum IicWrite {
    None,
    /// Start condition: arm the byte timer.
    Start,
    /// Stop condition: cancel it.
    Stop,
    /// Interrupt acknowledged mid-transfer: re-arm for the next byte.
    Resume,
}

pub struct IicBus {
    regs: [u32; 4],
    data: [u8; 4],
    data_index: usize,
    address: u16,
    eeprom: Vec<u8>,
}

impl IicBus {
    pub fn new() -> Self {
        IicBus {
            regs: [0; 4],
            data: [0; 4],
            data_index: 0,
            address: 0,
            eeprom: vec![0xFF; EEPROM_SIZE],
        }
    }

    /// Clear the register and transfer state. EEPROM contents persist
    /// across reset like the real part.
    pub fn reset(&mut self) {
        self.regs = [0; 4];
        self.data = [0; 4];
        self.data_index = 0;
        self.address = 0;
    }

    pub fn eeprom(&self) -> &[u8] {
        &self.eeprom
    }

    pub fn load_eeprom(&mut self, data: &[u8]) {
        let n = data.len().min(self.eeprom.len());
        self.eeprom[..n].copy_from_slice(&data[..n]);
    }

    pub fn read(&self, offset: usize) -> u32 {
        let data = self.regs.get(offset).copied().unwrap_or(0);
        match offset {
            // Status bits in the low nibble always read clear.
            IICSTAT => data & !0x0000_000F,
            _ => data,
        }
    }

    pub fn write(&mut self, offset: usize, data: u32, mask: u32) -> IicWrite {
        let Some(reg) = self.regs.get_mut(offset) else {
            return IicWrite::None;
        };
        combine(reg, data, mask);
        match offset {
            IICCON => {
                let pending = bit(data, 4);
                let busy = bit(self.regs[IICSTAT], 5);
                if pending == 0 && busy != 0 {
                    IicWrite::Resume
                } else {
                    IicWrite::None
                }
            }
            IICSTAT => {
                if bit(data, 5) != 0 {
                    self.data_index = 0;
                    IicWrite::Start
                } else {
                    IicWrite::Stop
                }
            }
            _ => IicWrite::None,
        }
    }

    /// One byte strobe. Returns true when INT_IIC should be raised.
    pub fn timer_tick(&mut self) -> bool {
        let mode = bits(self.regs[IICSTAT], 7, 6);
        match mode {
            // Master receive: first strobe clocks out the device address,
            // later ones fetch the EEPROM byte at the latched word address.
            // The address does not advance; sequential reads re-latch it.
            2 => {
                if self.data_index == 0 {
                    log::trace!("iic: rx address byte {:02X}", self.regs[IICDS] & 0xFF);
                } else {
                    let value = self.eeprom_read(self.address);
                    self.regs[IICDS] = (self.regs[IICDS] & !0xFF) | u32::from(value);
                }
                self.data_index += 1;
            }
            // Master transmit: collect device address, word address, data.
            3 => {
                let byte = (self.regs[IICDS] & 0xFF) as u8;
                if self.data_index < self.data.len() {
                    self.data[self.data_index] = byte;
                }
                self.data_index += 1;
                if self.data_index == 3 {
                    self.address = (u16::from(self.data[1]) << 8) | u16::from(self.data[2]);
                }
                if self.data_index == 4 && self.data[0] == EEPROM_WRITE_ADDR {
                    self.eeprom_write(self.address, byte);
                }
            }
            _ => {
                log::warn!("iic: unsupported mode {mode}");
            }
        }
        bit(self.regs[IICCON], 5) != 0
    }

    fn eeprom_read(&self, address: u16) -> u8 {
        self.eeprom[address as usize & (EEPROM_SIZE - 1)]
    }

    fn eeprom_write(&mut self, address: u16, value: u8) {
        self.eeprom[address as usize & (EEPROM_SIZE - 1)] = value;
    }
}

impl Default for IicBus {
    fn default() -> Self {
        Self::new()
    }
}
