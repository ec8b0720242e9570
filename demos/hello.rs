//! Sends "HELLO!" every millisecond on SPI1, NSS driven by the peripheral on PA4
//!
//! Runs from the 8 MHz internal oscillator. Diagnostics go to the debugger console over
//! semihosting. PA4 needs an external pull-up, the F1 cannot pull an alternate function output.

#![allow(clippy::empty_loop)]
#![no_std]
#![no_main]

use cortex_m_rt::entry;
use cortex_m_semihosting::hprintln;
use panic_halt as _;

use stm32f1_nss_spi::{
    control::{ControlLoop, Event, LoopConfig, Reporter},
    delay::SysDelay,
    gpio::{stm32f1::GpioMux, ElectricalMode, PinConfig, PinId},
    pac,
    prelude::*,
    spi::{stm32f1::Spi, Registry},
};

struct Semihosting;

impl Reporter for Semihosting {
    fn report(&mut self, event: Event<'_>) {
        match event {
            Event::Starting { board } => hprintln!("Starting nss-spi on {}", board),
            Event::PinFailed(e) => hprintln!("Could not configure chip-select pin: {:?}", e),
            Event::LookupFailed { bus, error } => {
                hprintln!("Could not find SPI driver {}: {:?}", bus, error)
            }
            Event::SendFailed(e) => hprintln!("SPI send error {:?}", e),
            Event::Retrying { error, attempt } => {
                hprintln!("SPI send error {:?}, retry {}", error, attempt)
            }
        }
    }
}

#[entry]
fn main() -> ! {
    let dp = pac::Peripherals::take().unwrap();
    let cp = cortex_m::Peripherals::take().unwrap();

    let mut cs_pins = GpioMux::new(dp.GPIOA, dp.GPIOB, dp.AFIO, &dp.RCC);
    cs_pins.spi1_data_lines(false);

    let spi1 = Spi::spi1(dp.SPI1, &dp.RCC, 8.MHz());
    let registry = Registry::new([("SPI_1", PinId::PA4, spi1)]);
    let delay = SysDelay::new(cp.SYST, 8.MHz());

    let defaults = LoopConfig::default();
    let config = LoopConfig {
        chip_select: PinConfig {
            mode: ElectricalMode::PUSH_PULL,
            ..defaults.chip_select
        },
        ..defaults
    };

    let mut app = ControlLoop::new(
        config,
        cs_pins,
        registry,
        delay,
        Semihosting,
    );
    app.run();

    loop {
        cortex_m::asm::wfi();
    }
}
