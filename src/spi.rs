/*!
  # Serial Peripheral Interface

  Peripherals are registered by name, together with their NSS pin, in a [`Registry`].
  [`Registry::acquire_bus`] hands out the single [`BusHandle`] for a name, and only once that NSS
  pin has been configured (it takes the [`ChipSelectReady`] token returned by
  [`configure_pin`](crate::gpio::configure_pin)).

  [`BusHandle::send`] is a blocking transmit: bytes go out in slice order, the bit order inside each
  frame follows [`TransferConfig::bit_order`], and in [`ChipSelect::Hardware`] mode the peripheral
  asserts NSS for the duration of the transfer. Nothing is retried here.

  ## Example

  ```rust
    # use stm32f1_nss_spi::gpio::{configure_pin, AltFunction, ElectricalMode, PinCapability, PinConfig, PinId, PinMux};
    # use stm32f1_nss_spi::spi::{Instance, TransferError};
    # struct Board;
    # impl PinMux for Board {
    #     fn capabilities(&self) -> &[PinCapability] {
    #         &[PinCapability { pin: PinId::PA4, function: AltFunction::AF0 }]
    #     }
    #     fn apply(&mut self, _config: &PinConfig) {}
    # }
    # struct Spi1;
    # impl Instance for Spi1 {
    #     fn apply(&mut self, _: &TransferConfig) -> Result<(), TransferError> { Ok(()) }
    #     fn write_frame(&mut self, _: u16) -> nb::Result<(), TransferError> { Ok(()) }
    #     fn flush(&mut self) -> nb::Result<(), TransferError> { Ok(()) }
    # }
    use stm32f1_nss_spi::prelude::*;
    use stm32f1_nss_spi::spi::{BitOrder, Registry, TransferConfig};

    let nss = PinConfig {
        pin: PinId::PA4,
        function: AltFunction::AF0,
        mode: ElectricalMode::PUSH_PULL_PULL_UP,
    };
    let ready = configure_pin(&mut Board, nss).unwrap();

    let mut registry = Registry::new([("SPI_1", PinId::PA4, Spi1)]);
    let mut bus = registry.acquire_bus(&ready, "SPI_1").unwrap();

    let config = TransferConfig::new(1.MHz())
        .word_size(8)
        .bit_order(BitOrder::MsbFirst);
    bus.send(&config, b"HELLO!").unwrap();
  ```
*/

use embedded_hal::digital::OutputPin;

pub use embedded_hal::spi::{Mode, Phase, Polarity, MODE_0, MODE_1, MODE_2, MODE_3};

use crate::gpio::{ChipSelectReady, PinId};
use crate::time::Hertz;

mod hal_1;
#[cfg(feature = "device")]
pub mod stm32f1;

/// Bit order inside a frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    MsbFirst,
    LsbFirst,
}

/// Bus role
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    Master,
    Slave,
}

/// Who drives the chip-select line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipSelect {
    /// The peripheral asserts NSS around every transfer
    Hardware,
    /// The caller toggles a GPIO, see [`BusHandle::send_with_cs`]
    Software,
}

/// Wire parameters of a transfer
///
/// Built once with [`TransferConfig::new`] and the builder methods, then passed by reference to
/// every [`BusHandle::send`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferConfig {
    /// Bits per frame, `4..=16`
    pub word_size: u8,
    pub bit_order: BitOrder,
    pub role: Role,
    pub frequency: Hertz,
    /// Clock polarity and phase
    pub mode: Mode,
    pub chip_select: ChipSelect,
}

impl TransferConfig {
    /// 8-bit, MSB first, master, SPI mode 0, hardware chip select
    pub const fn new(frequency: Hertz) -> Self {
        Self {
            word_size: 8,
            bit_order: BitOrder::MsbFirst,
            role: Role::Master,
            frequency,
            mode: MODE_0,
            chip_select: ChipSelect::Hardware,
        }
    }

    pub const fn word_size(mut self, bits: u8) -> Self {
        self.word_size = bits;
        self
    }

    pub const fn bit_order(mut self, bit_order: BitOrder) -> Self {
        self.bit_order = bit_order;
        self
    }

    pub const fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub const fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub const fn chip_select(mut self, chip_select: ChipSelect) -> Self {
        self.chip_select = chip_select;
        self
    }

    /// Checks the parameters every backend has to agree with
    pub fn validate(&self) -> Result<(), ConfigIssue> {
        if !(4..=16).contains(&self.word_size) {
            return Err(ConfigIssue::WordSize(self.word_size));
        }
        if self.role != Role::Master {
            return Err(ConfigIssue::Role);
        }
        if self.frequency.raw() == 0 {
            return Err(ConfigIssue::Frequency);
        }
        Ok(())
    }

    /// Payload bytes consumed by one frame
    pub fn frame_bytes(&self) -> usize {
        if self.word_size > 8 {
            2
        } else {
            1
        }
    }

    fn frame_mask(&self) -> u16 {
        ((1u32 << self.word_size) - 1) as u16
    }
}

/// Reason a [`TransferConfig`] cannot be used
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigIssue {
    /// Word size outside `4..=16` or not supported by the peripheral
    WordSize(u8),
    /// Only master transfers are supported
    Role,
    /// Zero clock frequency
    Frequency,
    /// The slowest prescaler still runs faster than requested
    FrequencyTooLow,
    /// The call does not match [`TransferConfig::chip_select`]
    ChipSelect,
}

/// SPI error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError {
    /// Overrun occurred
    Overrun,
    /// Mode fault occurred
    ModeFault,
    /// CRC error
    Crc,
    /// The configuration was rejected before anything was sent
    InvalidConfig(ConfigIssue),
    /// Payload length is not a multiple of the frame width
    PartialFrame,
    /// The software chip-select pin could not be driven
    ChipSelectPin,
}

impl TransferError {
    /// Errors a retry may clear: the data was lost but the peripheral is still configured
    pub fn is_transient(&self) -> bool {
        matches!(self, TransferError::Overrun)
    }
}

impl From<ConfigIssue> for TransferError {
    fn from(issue: ConfigIssue) -> Self {
        TransferError::InvalidConfig(issue)
    }
}

/// Bus lookup error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LookupError {
    /// No peripheral is registered under that name
    NotFound,
    /// The peripheral has already been handed out
    AlreadyAcquired,
    /// The chip-select token is for a pin this peripheral does not drive
    WrongChipSelect,
}

/// A peripheral that can shift frames out
///
/// Implemented by the register backends. All waiting is expressed through [`nb`], the driver
/// blocks on top of it.
pub trait Instance {
    /// Whether the peripheral can shift frames of `bits` bits
    fn supports_word_size(&self, bits: u8) -> bool {
        bits == 8
    }

    /// Programs the wire parameters. Called only with validated configurations and only when the
    /// configuration differs from the last one applied.
    fn apply(&mut self, config: &TransferConfig) -> Result<(), TransferError>;

    /// Queues one frame for transmission
    fn write_frame(&mut self, frame: u16) -> nb::Result<(), TransferError>;

    /// Completes once every queued frame has left the shift register
    fn flush(&mut self) -> nb::Result<(), TransferError>;
}

/// Picks the BR prescaler bits: the smallest `pclk / 2^(br + 1)` not above `frequency`
pub fn baud_rate_divisor(pclk: Hertz, frequency: Hertz) -> Result<u8, ConfigIssue> {
    let (pclk, frequency) = (pclk.raw(), frequency.raw());
    if frequency == 0 {
        return Err(ConfigIssue::Frequency);
    }
    (0u8..8)
        .find(|br| u64::from(pclk) <= u64::from(frequency) << (br + 1))
        .ok_or(ConfigIssue::FrequencyTooLow)
}

/// Named SPI peripherals available for [`Registry::acquire_bus`]
///
/// Every entry names the pin the peripheral drives as NSS.
pub struct Registry<SPI, const N: usize> {
    slots: [(&'static str, PinId, Option<SPI>); N],
}

impl<SPI, const N: usize> Registry<SPI, N> {
    pub fn new(entries: [(&'static str, PinId, SPI); N]) -> Self {
        Self {
            slots: entries.map(|(name, nss, spi)| (name, nss, Some(spi))),
        }
    }

    /// Takes the peripheral registered as `name`
    ///
    /// `cs` has to be the token of the peripheral's own NSS pin. Each peripheral is handed out at
    /// most once.
    pub fn acquire_bus(
        &mut self,
        cs: &ChipSelectReady,
        name: &str,
    ) -> Result<BusHandle<SPI>, LookupError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.0 == name)
            .ok_or(LookupError::NotFound)?;
        if slot.1 != cs.pin() {
            return Err(LookupError::WrongChipSelect);
        }
        let spi = slot.2.take().ok_or(LookupError::AlreadyAcquired)?;

        Ok(BusHandle {
            spi,
            name: slot.0,
            applied: None,
        })
    }

    /// Whether `name` is registered and not yet acquired
    pub fn is_available(&self, name: &str) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.0 == name && slot.2.is_some())
    }
}

/// Exclusive handle to an acquired SPI peripheral
pub struct BusHandle<SPI> {
    spi: SPI,
    name: &'static str,
    applied: Option<TransferConfig>,
}

impl<SPI> BusHandle<SPI> {
    /// Name the peripheral was registered under
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: Instance> BusHandle<SPI> {
    /// Transmits `payload` with the peripheral managing chip select
    ///
    /// Returns once the last frame has left the bus. An empty payload returns `Ok` without
    /// touching the peripheral.
    pub fn send(&mut self, config: &TransferConfig, payload: &[u8]) -> Result<(), TransferError> {
        if payload.is_empty() {
            return Ok(());
        }
        if config.chip_select != ChipSelect::Hardware {
            return Err(ConfigIssue::ChipSelect.into());
        }
        self.prepare(config, payload)?;
        self.transmit(config, payload)
    }

    /// Transmits `payload` framed by `cs`: driven low before the first frame and high after the
    /// last one, also when the transfer fails
    pub fn send_with_cs<CS>(
        &mut self,
        cs: &mut CS,
        config: &TransferConfig,
        payload: &[u8],
    ) -> Result<(), TransferError>
    where
        CS: OutputPin,
    {
        if payload.is_empty() {
            return Ok(());
        }
        if config.chip_select != ChipSelect::Software {
            return Err(ConfigIssue::ChipSelect.into());
        }
        self.prepare(config, payload)?;

        cs.set_low().map_err(|_| TransferError::ChipSelectPin)?;
        let res = self.transmit(config, payload);
        let deassert = cs.set_high().map_err(|_| TransferError::ChipSelectPin);
        res.and(deassert)
    }

    fn prepare(&mut self, config: &TransferConfig, payload: &[u8]) -> Result<(), TransferError> {
        config.validate()?;
        if !self.spi.supports_word_size(config.word_size) {
            return Err(ConfigIssue::WordSize(config.word_size).into());
        }
        if payload.len() % config.frame_bytes() != 0 {
            return Err(TransferError::PartialFrame);
        }
        if self.applied.as_ref() != Some(config) {
            // forget the old configuration first, the hardware may be half written on error
            self.applied = None;
            self.spi.apply(config)?;
            self.applied = Some(*config);
        }
        Ok(())
    }

    fn transmit(&mut self, config: &TransferConfig, payload: &[u8]) -> Result<(), TransferError> {
        let mask = config.frame_mask();
        for chunk in payload.chunks_exact(config.frame_bytes()) {
            let frame = match chunk {
                [lo, hi] => u16::from_le_bytes([*lo, *hi]),
                [byte] => u16::from(*byte),
                _ => unreachable!(),
            };
            nb::block!(self.spi.write_frame(frame & mask))?;
        }
        nb::block!(self.spi.flush())
    }
}
