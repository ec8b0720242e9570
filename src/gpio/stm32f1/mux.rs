//! Register side of the STM32F1 pin multiplexer

use crate::gpio::{
    AltFunction, ElectricalMode, OutputType, PinCapability, PinConfig, PinId, PinMux, Port,
};
use crate::pac::{self, gpioa::RegisterBlock};

use super::{supports_mode, NSS_PINS};

/// Alternate function output, push pull, max speed 50 MHz
const AF_PUSH_PULL: u32 = 0b1011;
/// Alternate function output, open drain, max speed 50 MHz
const AF_OPEN_DRAIN: u32 = 0b1111;
/// Floating input
const INPUT_FLOATING: u32 = 0b0100;

/// JTAG-DP disabled, SW-DP enabled. Frees PA15, PB3 and PB4.
const SWJ_NO_JTAG: u8 = 0b010;

/// Owns the ports carrying SPI chip-select pins
pub struct GpioMux {
    gpioa: pac::GPIOA,
    gpiob: pac::GPIOB,
    afio: pac::AFIO,
    jtag_enabled: bool,
}

impl GpioMux {
    /// Takes the ports and enables their clocks
    pub fn new(gpioa: pac::GPIOA, gpiob: pac::GPIOB, afio: pac::AFIO, rcc: &pac::RCC) -> Self {
        rcc.apb2enr().modify(|_, w| {
            w.iopaen()
                .set_bit()
                .iopben()
                .set_bit()
                .afioen()
                .set_bit()
        });
        // Stall the pipeline to work around erratum 2.1.13 (DM00037591)
        cortex_m::asm::dsb();

        Self {
            gpioa,
            gpiob,
            afio,
            jtag_enabled: true,
        }
    }

    fn port(&self, port: Port) -> &RegisterBlock {
        match port {
            Port::B => &self.gpiob,
            _ => &self.gpioa,
        }
    }

    fn set_cnf(&mut self, pin: PinId, bits: u32) {
        let port = self.port(pin.port());
        let offset = u32::from(pin.number() % 8) * 4;
        let mask = !(0b1111 << offset);
        if pin.number() < 8 {
            port.crl()
                .modify(|r, w| unsafe { w.bits((r.bits() & mask) | (bits << offset)) });
        } else {
            port.crh()
                .modify(|r, w| unsafe { w.bits((r.bits() & mask) | (bits << offset)) });
        }
    }

    fn remap_spi1(&mut self, remap: bool) {
        if remap {
            self.jtag_enabled = false;
        }
        let debug_bits = if self.jtag_enabled { 0b000 } else { SWJ_NO_JTAG };
        // SWJ_CFG is write only and has to be written back on every modification
        self.afio
            .mapr()
            .modify(|_, w| unsafe { w.spi1_remap().bit(remap).swj_cfg().bits(debug_bits) });
    }

    /// Routes SCK, MISO and MOSI of SPI1
    ///
    /// PA5, PA6, PA7 or with `remap` PB3, PB4, PB5. Must agree with the NSS pin chosen.
    pub fn spi1_data_lines(&mut self, remap: bool) {
        let (sck, miso, mosi) = if remap {
            (pin(Port::B, 3), pin(Port::B, 4), pin(Port::B, 5))
        } else {
            (pin(Port::A, 5), pin(Port::A, 6), pin(Port::A, 7))
        };
        self.remap_spi1(remap);
        self.set_cnf(sck, AF_PUSH_PULL);
        self.set_cnf(miso, INPUT_FLOATING);
        self.set_cnf(mosi, AF_PUSH_PULL);
    }

    /// Routes SCK, MISO and MOSI of SPI2 to PB13, PB14, PB15
    pub fn spi2_data_lines(&mut self) {
        self.set_cnf(pin(Port::B, 13), AF_PUSH_PULL);
        self.set_cnf(pin(Port::B, 14), INPUT_FLOATING);
        self.set_cnf(pin(Port::B, 15), AF_PUSH_PULL);
    }

    /// Gives the ports back
    pub fn release(self) -> (pac::GPIOA, pac::GPIOB, pac::AFIO) {
        (self.gpioa, self.gpiob, self.afio)
    }
}

fn pin(port: Port, number: u8) -> PinId {
    PinId { port, number }
}

impl PinMux for GpioMux {
    fn capabilities(&self) -> &[PinCapability] {
        &NSS_PINS
    }

    fn supports_mode(&self, pin: PinId, mode: ElectricalMode) -> bool {
        supports_mode(pin, mode)
    }

    fn apply(&mut self, config: &PinConfig) {
        let pin = config.pin;
        if pin.port() == Port::A {
            self.remap_spi1(config.function == AltFunction::AF1);
        }

        match config.mode.output() {
            Some(OutputType::OpenDrain) => self.set_cnf(pin, AF_OPEN_DRAIN),
            _ => self.set_cnf(pin, AF_PUSH_PULL),
        }
    }
}
