use retro_emu_core::card::MediaCard;
use retro_emu_core::soc::Soc;

const RAM_BASE: u32 = 0x0C00_0000;
const RTC_BASE: u32 = 0x1570_0040;
const SPI_BASE: u32 = 0x1590_0000;
const UART0_UTRSTAT: u32 = 0x1500_0010;
const GPIO_BASE: u32 = 0x1560_0000;
const IIC_BASE: u32 = 0x1540_0000;
const IICCON: u32 = IIC_BASE + 0x00;
const IICSTAT: u32 = IIC_BASE + 0x04;
const IICDS: u32 = IIC_BASE + 0x0C;
const SRCPND: u32 = 0x1440_0000;
const ALL: u32 = 0xFFFF_FFFF;

const MS: u64 = 1_000_000;

#[test]
fn ram_round_trips_all_access_widths() {
    let mut soc = Soc::default();
    soc.write32(RAM_BASE + 0x100, 0x1122_3344, ALL);
    assert_eq!(soc.read32(RAM_BASE + 0x100), 0x1122_3344);
    assert_eq!(soc.read8(RAM_BASE + 0x100), 0x44); // little endian
    assert_eq!(soc.read8(RAM_BASE + 0x103), 0x11);
    assert_eq!(soc.read16(RAM_BASE + 0x102), 0x1122);

    soc.write8(RAM_BASE + 0x101, 0xAB);
    assert_eq!(soc.read32(RAM_BASE + 0x100), 0x1122_AB44);
    soc.write16(RAM_BASE + 0x102, 0xCDEF);
    assert_eq!(soc.read32(RAM_BASE + 0x100), 0xCDEF_AB44);
}

#[test]
fn stub_banks_store_under_access_mask() {
    let mut soc = Soc::default();
    soc.write32(RTC_BASE + 8, 0xAABB_CCDD, ALL);
    assert_eq!(soc.read32(RTC_BASE + 8), 0xAABB_CCDD);
    soc.write32(RTC_BASE + 8, 0x1111_1111, 0x0000_FF00);
    assert_eq!(soc.read32(RTC_BASE + 8), 0xAABB_11DD);

    soc.write32(SPI_BASE, 0x5A5A_5A5A, ALL);
    assert_eq!(soc.read32(SPI_BASE), 0x5A5A_5A5A);
}

#[test]
fn uart_status_reports_transmitter_empty() {
    let soc = Soc::default();
    assert_eq!(soc.read32(UART0_UTRSTAT) & 6, 6);
}

#[test]
fn unmapped_addresses_read_zero_and_ignore_writes() {
    let mut soc = Soc::default();
    assert_eq!(soc.read32(0x1330_0000), 0);
    soc.write32(0x1330_0000, 0xDEAD_BEEF, ALL);
    assert_eq!(soc.read32(0x1330_0000), 0);
}

#[test]
fn bios_shadows_low_addresses() {
    let mut soc = Soc::default();
    assert_eq!(soc.read32(0), 0);
    soc.load_bios(&[0x78, 0x56, 0x34, 0x12, 0xFF, 0xFF, 0xFF, 0xEA]);
    assert_eq!(soc.read32(0), 0x1234_5678);
    assert_eq!(soc.read32(4), 0xEAFF_FFFF);
}

#[test]
fn empty_card_slot_reads_absent_on_gpio() {
    let soc = Soc::default();
    let pedat = soc.read32(GPIO_BASE + 0x30);
    assert_ne!(pedat & 0x04, 0); // present line high = no card
    let pddat = soc.read32(GPIO_BASE + 0x24);
    assert_ne!(pddat & 0x040, 0); // write protect line high = unprotected
}

#[test]
fn inserted_card_changes_the_computed_bits() {
    struct PresentCard;
    impl MediaCard for PresentCard {
        fn present(&self) -> bool {
            true
        }
        fn write_protected(&self) -> bool {
            true
        }
    }
    let mut soc = Soc::default();
    soc.set_card(Box::new(PresentCard));
    assert_eq!(soc.read32(GPIO_BASE + 0x30) & 0x04, 0);
    assert_eq!(soc.read32(GPIO_BASE + 0x24) & 0x040, 0);
}

#[test]
fn buttons_read_back_through_gpio() {
    let mut soc = Soc::default();
    soc.set_input_lines(0x3C, 0xC0);
    assert_eq!(soc.read32(GPIO_BASE + 0x0C) >> 8 & 0xFF, 0x3C);
    assert_eq!(soc.read32(GPIO_BASE + 0x30) & 0xC0, 0xC0);
}

/// Full EEPROM write transaction over the register map: device address,
/// 16-bit word address, then a data byte, each strobed by the 1ms timer.
#[test]
fn eeprom_write_transaction_over_iic() {
    let mut soc = Soc::default();
    // Master transmit + start condition, interrupt enabled in IICCON.
    soc.write32(IICCON, 1 << 5, ALL);
    soc.write32(IICSTAT, (3 << 6) | (1 << 5), ALL);

    for byte in [0xA0u32, 0x01, 0x23, 0x5A] {
        soc.write32(IICDS, byte, ALL);
        soc.advance(MS);
        // Each byte raises INT_IIC; acknowledge and resume.
        assert_eq!(soc.read32(SRCPND), 1 << 27);
        soc.write32(SRCPND, 1 << 27, ALL);
        soc.write32(IICCON, 1 << 5, ALL); // pending cleared: next byte
    }
    soc.write32(IICSTAT, 3 << 6, ALL); // stop

    assert_eq!(soc.eeprom()[0x0123], 0x5A);
}

#[test]
fn eeprom_read_back_over_iic() {
    let mut soc = Soc::default();
    let mut image = vec![0xFFu8; 0x2000];
    image[0x0040] = 0x99;
    soc.load_eeprom(&image);

    // Latch the word address with a transmit transaction.
    soc.write32(IICCON, 1 << 5, ALL);
    soc.write32(IICSTAT, (3 << 6) | (1 << 5), ALL);
    for byte in [0xA1u32, 0x00, 0x40] {
        soc.write32(IICDS, byte, ALL);
        soc.advance(MS);
        soc.write32(SRCPND, 1 << 27, ALL);
        soc.write32(IICCON, 1 << 5, ALL);
    }
    // Switch to master receive: first strobe clocks the address byte,
    // the next returns the EEPROM data.
    soc.write32(IICSTAT, (2 << 6) | (1 << 5), ALL);
    soc.advance(MS);
    soc.write32(SRCPND, 1 << 27, ALL);
    soc.write32(IICCON, 1 << 5, ALL);
    soc.advance(MS);
    assert_eq!(soc.read32(IICDS) & 0xFF, 0x99);
}

#[test]
fn reset_clears_registers_but_keeps_eeprom() {
    let mut soc = Soc::default();
    soc.write32(RTC_BASE + 8, 0x1234_5678, ALL);
    let mut image = vec![0u8; 16];
    image[3] = 0x42;
    soc.load_eeprom(&image);

    soc.reset();
    assert_eq!(soc.read32(RTC_BASE + 8), 0);
    assert_eq!(soc.eeprom()[3], 0x42);
    assert!(!soc.irq_asserted());
}

#[test]
fn cpu_clock_follows_the_pll() {
    let mut soc = Soc::default();
    assert_eq!(soc.cpu_clock_hz(), 48_000_000);
    // mdiv=0x52, pdiv=1, sdiv=1 -> 180MHz.
    soc.write32(0x1480_0004, (0x52 << 12) | (1 << 4) | 1, ALL);
    assert_eq!(soc.cpu_clock_hz(), 180_000_000);
}
