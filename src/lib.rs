//! # SPI master transmit with hardware chip select
//!
//! A small driver layer for one SPI master peripheral whose NSS line is driven by the peripheral
//! itself. It configures the chip-select pin, binds a named SPI instance and transmits a payload
//! periodically until something goes wrong.
//!
//! The pieces:
//!
//! - [`gpio`]: validates a chip-select [`PinConfig`](gpio::PinConfig) and applies it through a
//!   platform [`PinMux`](gpio::PinMux)
//! - [`spi`]: the [`Registry`](spi::Registry) of named peripherals and the blocking
//!   [`BusHandle::send`](spi::BusHandle::send)
//! - [`control`]: the start-up sequence and the periodic transfer as a state machine
//!
//! The core above is target independent. Select a device to get the register backends:
//!
//! ```toml
//! [dependencies.stm32f1-nss-spi]
//! version = "0.1.0"
//! features = ["stm32f103"]
//! ```
//!
//! - stm32f100
//! - stm32f101
//! - stm32f103
//!
//! # Usage example
//!
//! The `hello` demo in the `demos` folder sends `"HELLO!"` every millisecond on SPI1 with NSS on
//! PA4:
//!
//! ```rust,ignore
//! let cs_pins = GpioMux::new(dp.GPIOA, dp.GPIOB, dp.AFIO, &dp.RCC);
//! let spi1 = Spi::spi1(dp.SPI1, &dp.RCC, 8.MHz());
//! let registry = Registry::new([("SPI_1", PinId::PA4, spi1)]);
//!
//! let mut app = ControlLoop::new(LoopConfig::default(), cs_pins, registry, delay, reporter);
//! app.run();
//! ```

#![no_std]
#![deny(rustdoc::broken_intra_doc_links)]

#[cfg(feature = "stm32f100")]
pub use stm32f1::stm32f100 as pac;

#[cfg(feature = "stm32f101")]
pub use stm32f1::stm32f101 as pac;

#[cfg(feature = "stm32f103")]
pub use stm32f1::stm32f103 as pac;

/// Name of the device the crate was built for, `"host"` without a device feature
pub const CHIP: &str = env!("NSS_SPI_CHIP");

pub mod control;
#[cfg(feature = "device")]
pub mod delay;
pub mod gpio;
pub mod prelude;
pub mod spi;
pub mod time;

#[cfg(test)]
mod mock;
