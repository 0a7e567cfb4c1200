use retro_emu_core::soc::Soc;

const PWM_BASE: u32 = 0x1510_0000;
const IRQ_BASE: u32 = 0x1440_0000;
const SRCPND: u32 = IRQ_BASE;
const INTOFFSET: u32 = IRQ_BASE + 0x14;
const ALL: u32 = 0xFFFF_FFFF;

const MS: u64 = 1_000_000;

/// Program a timer for 1kHz expiry off the reset-default 48MHz PCLK:
/// 48MHz / 1 / 2 / 24000 = 1kHz.
fn arm_timer(soc: &mut Soc, ch: u32, auto_reload: bool) {
    let cnt_addr = PWM_BASE + 0x0C + ch * 0x0C;
    soc.write32(cnt_addr, 23_999, ALL);
    if ch < 4 {
        soc.write32(cnt_addr + 4, 0, ALL);
    }
    let start_shift = [0, 8, 12, 16, 20][ch as usize];
    let reload_shift = start_shift + if ch == 4 { 2 } else { 3 };
    let mut tcon = soc.read32(PWM_BASE + 0x08);
    tcon |= 1 << start_shift;
    if auto_reload {
        tcon |= 1 << reload_shift;
    }
    soc.write32(PWM_BASE + 0x08, tcon, ALL);
}

#[test]
fn periodic_timer_raises_its_interrupt() {
    let mut soc = Soc::default();
    arm_timer(&mut soc, 0, true);
    assert!(!soc.irq_asserted());

    soc.advance(MS + MS / 2);
    assert!(soc.irq_asserted());
    assert_eq!(soc.read32(INTOFFSET), 10); // INT_TIMER0
    assert_eq!(soc.read32(SRCPND), 1 << 10);
}

#[test]
fn one_shot_timer_fires_once() {
    let mut soc = Soc::default();
    arm_timer(&mut soc, 1, false);
    soc.advance(5 * MS);
    assert_eq!(soc.read32(SRCPND), 1 << 11);
    // Acknowledge; nothing further arrives.
    soc.write32(SRCPND, 1 << 11, ALL);
    soc.advance(5 * MS);
    assert_eq!(soc.read32(SRCPND), 0);
    assert!(!soc.irq_asserted());
}

#[test]
fn lowest_pending_source_wins_across_timers() {
    let mut soc = Soc::default();
    // Timer 1 expires at 1ms, timer 0 at 2ms (half-rate count).
    arm_timer(&mut soc, 1, true);
    let cnt0 = PWM_BASE + 0x0C;
    soc.write32(cnt0, 47_999, ALL);
    soc.write32(cnt0 + 4, 0, ALL);
    let tcon = soc.read32(PWM_BASE + 0x08);
    soc.write32(PWM_BASE + 0x08, tcon | (1 << 0) | (1 << 3), ALL);

    soc.advance(MS + MS / 4);
    assert_eq!(soc.read32(INTOFFSET), 11); // timer 1 alone
    soc.advance(MS);
    // Timer 0 joined; the lower source takes over.
    assert_eq!(soc.read32(SRCPND), (1 << 10) | (1 << 11));
    assert_eq!(soc.read32(INTOFFSET), 10);

    // Acknowledging timer 0 re-arbitrates to timer 1.
    soc.write32(SRCPND, 1 << 10, ALL);
    assert_eq!(soc.read32(INTOFFSET), 11);
    soc.write32(SRCPND, 1 << 11, ALL);
    assert!(!soc.irq_asserted());
    // INTOFFSET holds its last value once everything clears.
    assert_eq!(soc.read32(INTOFFSET), 11);
}

#[test]
fn stopping_a_timer_cancels_its_event() {
    let mut soc = Soc::default();
    arm_timer(&mut soc, 2, true);
    soc.advance(MS + MS / 2);
    assert_eq!(soc.read32(SRCPND), 1 << 12);
    soc.write32(SRCPND, 1 << 12, ALL);

    // Clear the start bit; no further expiries.
    let tcon = soc.read32(PWM_BASE + 0x08);
    soc.write32(PWM_BASE + 0x08, tcon & !(1 << 12), ALL);
    soc.advance(10 * MS);
    assert_eq!(soc.read32(SRCPND), 0);
}
