//! Host-side fakes for the hardware seams

extern crate std;

use core::convert::Infallible;
use std::collections::BTreeMap;
use std::string::{String, ToString};
use std::vec;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

use crate::control::{Event, Reporter};
use crate::gpio::{AltFunction, ElectricalMode, PinCapability, PinConfig, PinId, PinMux};
use crate::spi::{BitOrder, Instance, TransferConfig, TransferError};

/// Pin mux with SPI1 NSS on PA4 and PA15 (AF5), remembering what was written
pub struct MockMux {
    caps: Vec<PinCapability>,
    pins: BTreeMap<PinId, (AltFunction, ElectricalMode)>,
    pull_down: bool,
    pub applied: usize,
}

impl MockMux {
    pub fn new() -> Self {
        Self {
            caps: vec![
                PinCapability {
                    pin: PinId::PA4,
                    function: AltFunction::AF5,
                },
                PinCapability {
                    pin: PinId::PA15,
                    function: AltFunction::AF5,
                },
            ],
            pins: BTreeMap::new(),
            pull_down: true,
            applied: 0,
        }
    }

    pub fn without_pull_down(mut self) -> Self {
        self.pull_down = false;
        self
    }

    pub fn state(&self, pin: PinId) -> Option<(AltFunction, ElectricalMode)> {
        self.pins.get(&pin).copied()
    }

    pub fn configured_pins(&self) -> usize {
        self.pins.len()
    }
}

impl PinMux for MockMux {
    fn capabilities(&self) -> &[PinCapability] {
        &self.caps
    }

    fn supports_mode(&self, _pin: PinId, mode: ElectricalMode) -> bool {
        self.pull_down || !mode.contains(ElectricalMode::PULL_DOWN)
    }

    fn apply(&mut self, config: &PinConfig) {
        self.applied += 1;
        self.pins.insert(config.pin, (config.function, config.mode));
    }
}

/// SPI peripheral whose MOSI is looped back into a receiver
///
/// The wire records every bit in the order it is shifted out.
pub struct LoopbackSpi {
    config: Option<TransferConfig>,
    word_sizes: Vec<u8>,
    stall: bool,
    stalled: bool,
    in_transfer: bool,
    failures: Vec<(usize, TransferError)>,
    pub frames: Vec<u16>,
    pub wire: Vec<u8>,
    pub applies: usize,
    pub attempts: usize,
    pub transfers: usize,
    pub polls: usize,
}

impl LoopbackSpi {
    pub fn new() -> Self {
        Self {
            config: None,
            word_sizes: vec![8],
            stall: false,
            stalled: false,
            in_transfer: false,
            failures: Vec::new(),
            frames: Vec::new(),
            wire: Vec::new(),
            applies: 0,
            attempts: 0,
            transfers: 0,
            polls: 0,
        }
    }

    pub fn with_word_sizes(mut self, sizes: &[u8]) -> Self {
        self.word_sizes = sizes.to_vec();
        self
    }

    /// Every frame and flush reports `WouldBlock` once before succeeding
    pub fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }

    /// The `attempt`-th transfer (counting from 0) fails on its first frame
    ///
    /// May be called several times to fail several transfers.
    pub fn fail_on_transfer(mut self, attempt: usize, error: TransferError) -> Self {
        self.failures.push((attempt, error));
        self
    }

    fn would_block(&mut self) -> bool {
        self.polls += 1;
        if self.stall {
            self.stalled = !self.stalled;
            self.stalled
        } else {
            false
        }
    }

    /// What the receiver on the other end decoded, using the same wire parameters
    pub fn received(&self) -> Vec<u8> {
        let config = match self.config {
            Some(config) => config,
            None => return Vec::new(),
        };
        let bits = usize::from(config.word_size);
        let mut bytes = Vec::new();
        for frame_bits in self.wire.chunks(bits) {
            let mut frame = 0u16;
            for (i, bit) in frame_bits.iter().enumerate() {
                let shift = match config.bit_order {
                    BitOrder::MsbFirst => bits - 1 - i,
                    BitOrder::LsbFirst => i,
                };
                frame |= u16::from(*bit) << shift;
            }
            if config.frame_bytes() == 2 {
                bytes.extend_from_slice(&frame.to_le_bytes());
            } else {
                bytes.push(frame as u8);
            }
        }
        bytes
    }
}

impl Instance for LoopbackSpi {
    fn supports_word_size(&self, bits: u8) -> bool {
        self.word_sizes.contains(&bits)
    }

    fn apply(&mut self, config: &TransferConfig) -> Result<(), TransferError> {
        self.applies += 1;
        self.config = Some(*config);
        Ok(())
    }

    fn write_frame(&mut self, frame: u16) -> nb::Result<(), TransferError> {
        if self.would_block() {
            return Err(nb::Error::WouldBlock);
        }
        if !self.in_transfer {
            self.in_transfer = true;
            self.attempts += 1;
            let index = self.attempts - 1;
            if let Some(&(_, error)) = self.failures.iter().find(|f| f.0 == index) {
                self.in_transfer = false;
                return Err(nb::Error::Other(error));
            }
        }

        let config = self.config.ok_or(nb::Error::Other(TransferError::ModeFault))?;
        let bits = config.word_size;
        for i in 0..bits {
            let shift = match config.bit_order {
                BitOrder::MsbFirst => bits - 1 - i,
                BitOrder::LsbFirst => i,
            };
            self.wire.push(((frame >> shift) & 1) as u8);
        }
        self.frames.push(frame);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), TransferError> {
        if self.would_block() {
            return Err(nb::Error::WouldBlock);
        }
        self.in_transfer = false;
        self.transfers += 1;
        Ok(())
    }
}

/// Output pin remembering every level it was driven to, `false` for low
pub struct MockPin {
    pub levels: Vec<bool>,
}

impl MockPin {
    pub fn new() -> Self {
        Self { levels: Vec::new() }
    }
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.push(true);
        Ok(())
    }
}

/// Delay that only counts
#[derive(Default)]
pub struct CountingDelay {
    pub calls: u32,
    pub total_ms: u32,
    pub total_ns: u64,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_ns += u64::from(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.calls += 1;
        self.total_ms += ms;
    }
}

/// Owned copy of an [`Event`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recorded {
    Starting(String),
    PinFailed(crate::gpio::ConfigError),
    LookupFailed(String, crate::spi::LookupError),
    SendFailed(TransferError),
    Retrying(TransferError, u32),
}

#[derive(Default)]
pub struct RecordingReporter {
    pub events: Vec<Recorded>,
}

impl Reporter for RecordingReporter {
    fn report(&mut self, event: Event<'_>) {
        self.events.push(match event {
            Event::Starting { board } => Recorded::Starting(board.to_string()),
            Event::PinFailed(e) => Recorded::PinFailed(e),
            Event::LookupFailed { bus, error } => Recorded::LookupFailed(bus.to_string(), error),
            Event::SendFailed(e) => Recorded::SendFailed(e),
            Event::Retrying { error, attempt } => Recorded::Retrying(error, attempt),
        });
    }
}
