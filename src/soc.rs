//! Machine facade: system RAM, every peripheral bank, the event
//! scheduler and the physical address decode. Peripherals that need the
//! bus (DMA, LCD frame fetch) run here, where both sides are owned.

use crate::bits::combine;
use crate::card::{CardSlot, MediaCard, NoCard};
use crate::clk::{ClockPower, Pll};
use crate::dma::{DmaController, DmaWrite};
use crate::gpio::Gpio;
use crate::iic::{IicBus, IicWrite};
use crate::iis::IisBus;
use crate::irq::{IrqController, sources};
use crate::lcd::LcdController;
use crate::pwm::PwmTimers;
use crate::sample_queue::{SampleConsumer, SampleProducer, sample_queue};
use crate::scheduler::{Event, Scheduler, TICKS_PER_SEC};

pub const RAM_BASE: u32 = 0x0C00_0000;
pub const RAM_SIZE: usize = 0x0080_0000;

const MEMCON_BASE: u32 = 0x1400_0000;
const USBHOST_BASE: u32 = 0x1420_0000;
const IRQ_BASE: u32 = 0x1440_0000;
const DMA_BASE: u32 = 0x1460_0000;
const CLKPOW_BASE: u32 = 0x1480_0000;
const LCD_BASE: u32 = 0x14A0_0000;
const LCD_PALETTE_BASE: u32 = 0x14A0_0400;
const UART0_BASE: u32 = 0x1500_0000;
const UART1_BASE: u32 = 0x1500_4000;
const PWM_BASE: u32 = 0x1510_0000;
const USBDEV_BASE: u32 = 0x1520_0140;
const WATCHDOG_BASE: u32 = 0x1530_0000;
const IIC_BASE: u32 = 0x1540_0000;
const IIS_BASE: u32 = 0x1550_8000;
const GPIO_BASE: u32 = 0x1560_0000;
const RTC_BASE: u32 = 0x1570_0040;
const ADC_BASE: u32 = 0x1580_0000;
const SPI_BASE: u32 = 0x1590_0000;
const MMC_BASE: u32 = 0x15A0_0000;

/// UTRSTAT word offset within a UART window.
const UART_UTRSTAT: usize = 0x10 / 4;

const IIC_BYTE_NS: u64 = 1_000_000;

const ALL: u32 = 0xFFFF_FFFF;

#[inline]
fn window(addr: u32, base: u32, words: usize) -> Option<usize> {
    if addr >= base && addr < base + (words as u32) * 4 {
        Some(((addr - base) / 4) as usize)
    } else {
        None
    }
}

fn uart_read(regs: &[u32; 11], offset: usize) -> u32 {
    let data = regs[offset];
    if offset == UART_UTRSTAT {
        // Transmitter always empty.
        data | 6
    } else {
        data
    }
}

pub struct Soc {
    pub ram: Vec<u8>,
    bios: Vec<u8>,

    clk: ClockPower,
    irq: IrqController,
    dma: DmaController,
    pwm: PwmTimers,
    lcd: LcdController,
    iic: IicBus,
    iis: IisBus,
    gpio: Gpio,
    slot: CardSlot,

    // Storage-only banks.
    memcon: [u32; 15],
    usb_host: [u32; 23],
    uart0: [u32; 11],
    uart1: [u32; 11],
    usb_device: [u32; 47],
    watchdog: [u32; 3],
    rtc: [u32; 19],
    adc: [u32; 2],
    spi: [u32; 6],
    mmc: [u32; 16],

    sched: Scheduler,
    dac: SampleProducer,
    dac_consumer: Option<SampleConsumer>,
}

impl Soc {
    pub fn new(card: Box<dyn MediaCard>) -> Self {
        let (dac, dac_consumer) = sample_queue(4096);
        Soc {
            ram: vec![0; RAM_SIZE],
            bios: Vec::new(),
            clk: ClockPower::new(),
            irq: IrqController::new(),
            dma: DmaController::new(),
            pwm: PwmTimers::new(),
            lcd: LcdController::new(),
            iic: IicBus::new(),
            iis: IisBus::new(),
            gpio: Gpio::new(),
            slot: CardSlot::new(card),
            memcon: [0; 15],
            usb_host: [0; 23],
            uart0: [0; 11],
            uart1: [0; 11],
            usb_device: [0; 47],
            watchdog: [0; 3],
            rtc: [0; 19],
            adc: [0; 2],
            spi: [0; 6],
            mmc: [0; 16],
            sched: Scheduler::new(),
            dac,
            dac_consumer: Some(dac_consumer),
        }
    }

    pub fn reset(&mut self) {
        self.clk = ClockPower::new();
        self.irq = IrqController::new();
        self.dma = DmaController::new();
        self.pwm = PwmTimers::new();
        self.lcd = LcdController::new();
        self.iic.reset();
        self.iis = IisBus::new();
        self.gpio = Gpio::new();
        self.slot.reset();
        self.memcon = [0; 15];
        self.usb_host = [0; 23];
        self.uart0 = [0; 11];
        self.uart1 = [0; 11];
        self.usb_device = [0; 47];
        self.watchdog = [0; 3];
        self.rtc = [0; 19];
        self.adc = [0; 2];
        self.spi = [0; 6];
        self.mmc = [0; 16];
        self.sched = Scheduler::new();
    }

    pub fn load_bios(&mut self, data: &[u8]) {
        self.bios = data.to_vec();
    }

    pub fn load_eeprom(&mut self, data: &[u8]) {
        self.iic.load_eeprom(data);
    }

    pub fn eeprom(&self) -> &[u8] {
        self.iic.eeprom()
    }

    pub fn set_card(&mut self, card: Box<dyn MediaCard>) {
        self.slot.set_card(card);
    }

    /// Consumer end of the DAC sample queue, for an audio thread.
    pub fn take_audio_consumer(&mut self) -> Option<SampleConsumer> {
        self.dac_consumer.take()
    }

    /// Raw button lines, active low.
    pub fn set_input_lines(&mut self, in0: u8, in1: u8) {
        self.gpio.set_input_lines(in0, in1);
    }

    pub fn irq_asserted(&self) -> bool {
        self.irq.line_asserted()
    }

    pub fn cpu_clock_hz(&self) -> u32 {
        self.clk.fclk(Pll::Mpll)
    }

    pub fn now_ns(&self) -> u64 {
        self.sched.now()
    }

    pub fn framebuffer(&self) -> &[u32] {
        &self.lcd.framebuffer
    }

    pub fn frame_size(&self) -> (usize, usize) {
        self.lcd.frame_size()
    }

    /// 32-bit physical read. Unmapped addresses read as zero.
    pub fn read32(&self, addr: u32) -> u32 {
        let addr = addr & !3;
        if (addr as usize) + 4 <= self.bios.len() {
            let base = addr as usize;
            return u32::from_le_bytes([
                self.bios[base],
                self.bios[base + 1],
                self.bios[base + 2],
                self.bios[base + 3],
            ]);
        }
        if addr >= RAM_BASE && addr < RAM_BASE + RAM_SIZE as u32 {
            let base = (addr - RAM_BASE) as usize;
            return u32::from_le_bytes([
                self.ram[base],
                self.ram[base + 1],
                self.ram[base + 2],
                self.ram[base + 3],
            ]);
        }
        if let Some(i) = window(addr, MEMCON_BASE, 15) {
            return self.memcon[i];
        }
        if let Some(i) = window(addr, USBHOST_BASE, 23) {
            return self.usb_host[i];
        }
        if let Some(i) = window(addr, IRQ_BASE, 6) {
            return self.irq.read(i);
        }
        if let Some(i) = window(addr, DMA_BASE, 31) {
            return self.dma.read(i);
        }
        if let Some(i) = window(addr, CLKPOW_BASE, 6) {
            return self.clk.read(i);
        }
        if let Some(i) = window(addr, LCD_BASE, 256) {
            return self.lcd.read(i, self.lcd.scan_vpos(self.sched.now()));
        }
        if let Some(i) = window(addr, LCD_PALETTE_BASE, 256) {
            return self.lcd.read_palette(i);
        }
        if let Some(i) = window(addr, UART0_BASE, 11) {
            return uart_read(&self.uart0, i);
        }
        if let Some(i) = window(addr, UART1_BASE, 11) {
            return uart_read(&self.uart1, i);
        }
        if let Some(i) = window(addr, PWM_BASE, 17) {
            return self.pwm.read(i);
        }
        if let Some(i) = window(addr, USBDEV_BASE, 47) {
            return self.usb_device[i];
        }
        if let Some(i) = window(addr, WATCHDOG_BASE, 3) {
            return self.watchdog[i];
        }
        if let Some(i) = window(addr, IIC_BASE, 4) {
            return self.iic.read(i);
        }
        if let Some(i) = window(addr, IIS_BASE, 5) {
            return self.iis.read(i);
        }
        if let Some(i) = window(addr, GPIO_BASE, 24) {
            return self.gpio.read(i, &self.slot);
        }
        if let Some(i) = window(addr, RTC_BASE, 19) {
            return self.rtc[i];
        }
        if let Some(i) = window(addr, ADC_BASE, 2) {
            return self.adc[i];
        }
        if let Some(i) = window(addr, SPI_BASE, 6) {
            return self.spi[i];
        }
        if let Some(i) = window(addr, MMC_BASE, 16) {
            return self.mmc[i];
        }
        log::debug!("bus: read from unmapped {addr:08X}");
        0
    }

    /// 32-bit physical write under an access mask (partial masks carry
    /// byte and halfword accesses).
    pub fn write32(&mut self, addr: u32, data: u32, mask: u32) {
        let addr = addr & !3;
        log::trace!("bus: write {addr:08X} <- {data:08X} & {mask:08X}");
        if addr >= RAM_BASE && addr < RAM_BASE + RAM_SIZE as u32 {
            let base = (addr - RAM_BASE) as usize;
            let old = u32::from_le_bytes([
                self.ram[base],
                self.ram[base + 1],
                self.ram[base + 2],
                self.ram[base + 3],
            ]);
            let new = (old & !mask) | (data & mask);
            self.ram[base..base + 4].copy_from_slice(&new.to_le_bytes());
            return;
        }
        if let Some(i) = window(addr, MEMCON_BASE, 15) {
            combine(&mut self.memcon[i], data, mask);
            return;
        }
        if let Some(i) = window(addr, USBHOST_BASE, 23) {
            combine(&mut self.usb_host[i], data, mask);
            return;
        }
        if let Some(i) = window(addr, IRQ_BASE, 6) {
            self.irq.write(i, data, mask);
            return;
        }
        if let Some(i) = window(addr, DMA_BASE, 31) {
            if let DmaWrite::Recalc(ch) = self.dma.write(i, data, mask) {
                self.dma_recalc(ch);
            }
            return;
        }
        if let Some(i) = window(addr, CLKPOW_BASE, 6) {
            self.clk.write(i, data, mask);
            return;
        }
        if let Some(i) = window(addr, LCD_BASE, 256) {
            if self.lcd.write(i, data, mask) {
                self.lcd_recalc();
            }
            return;
        }
        if let Some(i) = window(addr, LCD_PALETTE_BASE, 256) {
            self.lcd.write_palette(i, data, mask);
            return;
        }
        if let Some(i) = window(addr, UART0_BASE, 11) {
            combine(&mut self.uart0[i], data, mask);
            return;
        }
        if let Some(i) = window(addr, UART1_BASE, 11) {
            combine(&mut self.uart1[i], data, mask);
            return;
        }
        if let Some(i) = window(addr, PWM_BASE, 17) {
            for ch in self.pwm.write(i, data, mask) {
                self.pwm_recalc(ch);
            }
            return;
        }
        if let Some(i) = window(addr, USBDEV_BASE, 47) {
            combine(&mut self.usb_device[i], data, mask);
            return;
        }
        if let Some(i) = window(addr, WATCHDOG_BASE, 3) {
            combine(&mut self.watchdog[i], data, mask);
            return;
        }
        if let Some(i) = window(addr, IIC_BASE, 4) {
            match self.iic.write(i, data, mask) {
                IicWrite::Start | IicWrite::Resume => {
                    self.sched.schedule_oneshot_ns(Event::Iic, IIC_BYTE_NS);
                }
                IicWrite::Stop => self.sched.cancel(Event::Iic),
                IicWrite::None => {}
            }
            return;
        }
        if let Some(i) = window(addr, IIS_BASE, 5) {
            if self.iis.write(i, data, mask, &self.dac) {
                self.iis_recalc();
            }
            return;
        }
        if let Some(i) = window(addr, GPIO_BASE, 24) {
            self.gpio.write(i, data, mask, &mut self.slot, &mut self.iis);
            return;
        }
        if let Some(i) = window(addr, RTC_BASE, 19) {
            combine(&mut self.rtc[i], data, mask);
            return;
        }
        if let Some(i) = window(addr, ADC_BASE, 2) {
            combine(&mut self.adc[i], data, mask);
            return;
        }
        if let Some(i) = window(addr, SPI_BASE, 6) {
            combine(&mut self.spi[i], data, mask);
            return;
        }
        if let Some(i) = window(addr, MMC_BASE, 16) {
            combine(&mut self.mmc[i], data, mask);
            return;
        }
        log::debug!("bus: write to unmapped {addr:08X}");
    }

    pub fn read8(&self, addr: u32) -> u8 {
        (self.read32(addr) >> ((addr & 3) * 8)) as u8
    }

    pub fn write8(&mut self, addr: u32, value: u8) {
        let shift = (addr & 3) * 8;
        self.write32(addr, u32::from(value) << shift, 0xFF << shift);
    }

    pub fn read16(&self, addr: u32) -> u16 {
        (self.read32(addr) >> ((addr & 2) * 8)) as u16
    }

    pub fn write16(&mut self, addr: u32, value: u16) {
        let shift = (addr & 2) * 8;
        self.write32(addr, u32::from(value) << shift, 0xFFFF << shift);
    }

    /// Run the machine forward by `ns` nanoseconds, firing due timer
    /// events in timestamp order.
    pub fn advance(&mut self, ns: u64) {
        let target = self.sched.now() + ns;
        while let Some(event) = self.sched.run_until(target) {
            self.dispatch(event);
        }
    }

    fn dispatch(&mut self, event: Event) {
        match event {
            Event::Lcd => {
                self.lcd.set_frame_origin(self.sched.now());
                self.lcd.render_frame(&self.ram);
            }
            Event::Pwm(ch) => {
                self.irq.request(sources::TIMER0 + u32::from(ch));
            }
            Event::Iic => {
                if self.iic.timer_tick() {
                    self.irq.request(sources::IIC);
                }
            }
            Event::Iis => {
                // The sample strobe doubles as the hardware DMA request
                // for channel 2.
                const IIS_DMA_CH: usize = 2;
                if !self.dma.software_start(IIS_DMA_CH)
                    && self.dma.hw_source(IIS_DMA_CH) == 0
                    && self.dma.enabled(IIS_DMA_CH)
                {
                    self.dma_trigger(IIS_DMA_CH);
                }
            }
        }
    }

    fn lcd_recalc(&mut self) {
        if self.lcd.enabled() {
            self.lcd.configure(self.clk.hclk());
            self.lcd.dma_init();
            self.lcd.set_frame_origin(self.sched.now());
            self.sched.schedule_hz(Event::Lcd, self.lcd.frame_rate_hz());
        } else {
            log::debug!("lcd: disabled");
            self.sched.cancel(Event::Lcd);
        }
    }

    fn pwm_recalc(&mut self, ch: usize) {
        let event = Event::Pwm(ch as u8);
        if !self.pwm.running(ch) {
            log::debug!("pwm: timer {ch} stopped");
            self.sched.cancel(event);
            return;
        }
        match self.pwm.rate_hz(ch, self.clk.pclk()) {
            Some(hz) if self.pwm.auto_reload(ch) => {
                log::debug!("pwm: timer {ch} periodic at {hz:.2} Hz");
                self.sched.schedule_hz(event, hz);
            }
            Some(hz) => {
                log::debug!("pwm: timer {ch} one-shot at {hz:.2} Hz");
                let ns = ((TICKS_PER_SEC as f64 / hz).round() as u64).max(1);
                self.sched.schedule_oneshot_ns(event, ns);
            }
            None => self.sched.cancel(event),
        }
    }

    fn iis_recalc(&mut self) {
        if self.iis.enabled() {
            let hz = self.iis.sample_rate_hz(self.clk.pclk());
            log::debug!("iis: sample strobe at {hz:.2} Hz");
            self.sched.schedule_hz(Event::Iis, hz);
        } else {
            self.sched.cancel(Event::Iis);
        }
    }

    fn dma_recalc(&mut self, ch: usize) {
        if self.dma.enabled(ch) {
            self.dma_start(ch);
        }
    }

    fn dma_start(&mut self, ch: usize) {
        log::debug!("dma: channel {ch} armed");
        self.dma.reload(ch);
        if self.dma.software_start(ch) {
            self.dma_trigger(ch);
        }
    }

    /// Service one DMA request: one unit in single mode, the full count
    /// in whole-block mode.
    fn dma_trigger(&mut self, ch: usize) {
        let unit = self.dma.unit_size(ch);
        let whole = self.dma.whole_block(ch);
        let src_fixed = self.dma.src_fixed(ch);
        let dst_fixed = self.dma.dst_fixed(ch);
        let mut count = self.dma.current_count(ch);
        let mut src = self.dma.current_src(ch);
        let mut dst = self.dma.current_dst(ch);

        while count > 0 {
            count -= 1;
            match unit {
                1 => {
                    let value = self.read8(src);
                    self.write8(dst, value);
                }
                2 => {
                    let value = self.read16(src);
                    self.write16(dst, value);
                }
                _ => {
                    let value = self.read32(src);
                    self.write32(dst, value, ALL);
                }
            }
            if !src_fixed {
                src = src.wrapping_add(unit);
            }
            if !dst_fixed {
                dst = dst.wrapping_add(unit);
            }
            if !whole {
                break;
            }
        }

        self.dma.set_current_count(ch, count);
        self.dma.set_current_src(ch, src);
        self.dma.set_current_dst(ch, dst);

        if count == 0 {
            if !self.dma.reload_disabled(ch) {
                self.dma.reload(ch);
            } else {
                self.dma.clear_enable(ch);
            }
            if self.dma.interrupt_enabled(ch) {
                self.irq.request(sources::DMA0 + ch as u32);
            }
        }
    }
}

impl Default for Soc {
    fn default() -> Self {
        Self::new(Box::new(NoCard))
    }
}
