//! Removable media card behind the GPIO latch interface.
//!
//! The SoC drives a NAND-style card through chip select, command latch,
//! address latch and read/write strobes, all active low on the port pins.
//! The card itself sits behind a capability trait so tests and frontends
//! can plug in anything from a fake to a full flash model.

pub trait MediaCard {
    fn data_read(&mut self) -> u8 {
        0xFF
    }
    fn data_write(&mut self, _data: u8) {}
    fn command_write(&mut self, _cmd: u8) {}
    fn address_write(&mut self, _addr: u8) {}
    fn present(&self) -> bool {
        false
    }
    fn write_protected(&self) -> bool {
        false
    }
    fn busy(&self) -> bool {
        false
    }
}

/// Empty slot.
pub struct NoCard;

impl MediaCard for NoCard {}

/// Latch state between the GPIO pins and the card.
pub struct CardSlot {
    pub(crate) chip: bool,
    pub(crate) cmd_latch: bool,
    pub(crate) add_latch: bool,
    pub(crate) do_read: bool,
    pub(crate) do_write: bool,
    pub(crate) read: bool,
    pub(crate) datarx: u8,
    pub(crate) datatx: u8,
    card: Box<dyn MediaCard>,
}

impl CardSlot {
    pub fn new(card: Box<dyn MediaCard>) -> Self {
        CardSlot {
            chip: false,
            cmd_latch: false,
            add_latch: false,
            do_read: false,
            do_write: false,
            read: false,
            datarx: 0,
            datatx: 0,
            card,
        }
    }

    pub fn reset(&mut self) {
        self.chip = false;
        self.cmd_latch = false;
        self.add_latch = false;
        self.do_read = false;
        self.do_write = false;
        self.read = false;
        self.datarx = 0;
        self.datatx = 0;
    }

    pub fn card(&self) -> &dyn MediaCard {
        &*self.card
    }

    pub fn set_card(&mut self, card: Box<dyn MediaCard>) {
        self.card = card;
    }

    /// Re-evaluate the latches after a pin change. With the chip
    /// deselected everything resets; otherwise a write strobe routes the
    /// latched byte to command, address or data space, and a read strobe
    /// with the port in read direction fetches the next data byte.
    pub(crate) fn update(&mut self) {
        if !self.chip {
            self.reset();
            return;
        }
        if self.do_write && !self.read {
            if self.cmd_latch {
                self.card.command_write(self.datatx);
                log::trace!("card: command {:02X}", self.datatx);
            } else if self.add_latch {
                self.card.address_write(self.datatx);
                log::trace!("card: address {:02X}", self.datatx);
            } else {
                self.card.data_write(self.datatx);
                log::trace!("card: data {:02X}", self.datatx);
            }
        } else if !self.do_write
            && self.do_read
            && self.read
            && !self.cmd_latch
            && !self.add_latch
        {
            self.datarx = self.card.data_read();
            log::trace!("card: read {:02X}", self.datarx);
        }
    }
}
