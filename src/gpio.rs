//! # Chip-select pin configuration
//!
//! Before the SPI peripheral can drive the NSS line in hardware mode, the pin has to be routed to
//! the peripheral (alternate function) and its output stage configured. This module validates a
//! [`PinConfig`] against what the platform can do and applies it through a [`PinMux`].
//!
//! ```rust
//! use stm32f1_nss_spi::gpio::{configure_pin, AltFunction, ElectricalMode, PinConfig, PinId};
//! # use stm32f1_nss_spi::gpio::{PinCapability, PinMux};
//! # struct Board;
//! # impl PinMux for Board {
//! #     fn capabilities(&self) -> &[PinCapability] {
//! #         &[PinCapability { pin: PinId::PA4, function: AltFunction::AF0 }]
//! #     }
//! #     fn apply(&mut self, _config: &PinConfig) {}
//! # }
//! # let mut mux = Board;
//!
//! let nss = PinConfig {
//!     pin: PinId::PA4,
//!     function: AltFunction::AF0,
//!     mode: ElectricalMode::PUSH_PULL_PULL_UP,
//! };
//! let ready = configure_pin(&mut mux, nss).unwrap();
//! assert_eq!(ready.pin(), PinId::PA4);
//! ```
//!
//! The returned [`ChipSelectReady`] token is required to acquire a bus, so a transfer can never be
//! issued on a line that has not been pulled to its idle level.

use bitflags::bitflags;

pub mod stm32f1;

/// GPIO port
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl Port {
    /// Port letter, `'A'` for GPIOA
    pub const fn id(self) -> char {
        match self {
            Port::A => 'A',
            Port::B => 'B',
            Port::C => 'C',
            Port::D => 'D',
            Port::E => 'E',
            Port::F => 'F',
            Port::G => 'G',
        }
    }
}

/// A single pin: port and pin number (`0..=15`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId {
    port: Port,
    number: u8,
}

impl PinId {
    pub const PA4: Self = Self::at(Port::A, 4);
    pub const PA15: Self = Self::at(Port::A, 15);
    pub const PB12: Self = Self::at(Port::B, 12);

    /// Returns `None` for pin numbers above 15
    pub const fn new(port: Port, number: u8) -> Option<Self> {
        if number < 16 {
            Some(Self::at(port, number))
        } else {
            None
        }
    }

    const fn at(port: Port, number: u8) -> Self {
        Self { port, number }
    }

    pub const fn port(self) -> Port {
        self.port
    }

    pub const fn number(self) -> u8 {
        self.number
    }
}

/// Alternate function selector
///
/// The meaning of the index is platform defined. On parts with a per-pin multiplexer it is the
/// AF number from the datasheet. The STM32F1 backend reads it as the AFIO remap index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AltFunction(u8);

macro_rules! alt_functions {
    ($($AF:ident => $i:literal,)+) => {
        impl AltFunction {
            $(
                pub const $AF: Self = Self($i);
            )+
        }
    };
}

alt_functions! {
    AF0 => 0,
    AF1 => 1,
    AF2 => 2,
    AF3 => 3,
    AF4 => 4,
    AF5 => 5,
    AF6 => 6,
    AF7 => 7,
    AF8 => 8,
    AF9 => 9,
    AF10 => 10,
    AF11 => 11,
    AF12 => 12,
    AF13 => 13,
    AF14 => 14,
    AF15 => 15,
}

impl AltFunction {
    /// Returns `None` for selectors above 15
    pub const fn new(index: u8) -> Option<Self> {
        if index < 16 {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn index(self) -> u8 {
        self.0
    }
}

bitflags! {
    /// Output stage and pull resistor of a pin
    ///
    /// Exactly one of `PUSH_PULL` and `OPEN_DRAIN` must be set, at most one pull resistor may be
    /// enabled and an open-drain output cannot be pulled down.
    pub struct ElectricalMode: u8 {
        const PUSH_PULL = 1 << 0;
        const OPEN_DRAIN = 1 << 1;
        const PULL_UP = 1 << 2;
        const PULL_DOWN = 1 << 3;

        const PUSH_PULL_PULL_UP = Self::PUSH_PULL.bits | Self::PULL_UP.bits;
        const OPEN_DRAIN_PULL_UP = Self::OPEN_DRAIN.bits | Self::PULL_UP.bits;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ElectricalMode {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ElectricalMode({=u8:#x})", self.bits())
    }
}

/// Output driver type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputType {
    PushPull,
    OpenDrain,
}

/// Pull resistor selection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    None,
    Up,
    Down,
}

impl ElectricalMode {
    pub fn is_well_formed(self) -> bool {
        let drivers = self & (Self::PUSH_PULL | Self::OPEN_DRAIN);
        if drivers != Self::PUSH_PULL && drivers != Self::OPEN_DRAIN {
            return false;
        }
        if self.contains(Self::PULL_UP | Self::PULL_DOWN) {
            return false;
        }
        !self.contains(Self::OPEN_DRAIN | Self::PULL_DOWN)
    }

    /// Output driver, `None` if the mode is not well formed
    pub fn output(self) -> Option<OutputType> {
        if !self.is_well_formed() {
            None
        } else if self.contains(Self::OPEN_DRAIN) {
            Some(OutputType::OpenDrain)
        } else {
            Some(OutputType::PushPull)
        }
    }

    pub fn pull(self) -> Pull {
        if self.contains(Self::PULL_UP) {
            Pull::Up
        } else if self.contains(Self::PULL_DOWN) {
            Pull::Down
        } else {
            Pull::None
        }
    }
}

/// Electrical and multiplexing configuration of one pin
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinConfig {
    pub pin: PinId,
    pub function: AltFunction,
    pub mode: ElectricalMode,
}

/// A pin that can be routed to an SPI chip-select through the given alternate function
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinCapability {
    pub pin: PinId,
    pub function: AltFunction,
}

/// Pin configuration error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The electrical mode combines incompatible flags
    InvalidMode(ElectricalMode),
    /// The platform has no such pin, or cannot route it to a chip-select
    UnknownPin(PinId),
    /// The pin exists but not with this alternate function
    UnsupportedFunction { pin: PinId, function: AltFunction },
    /// The mode is well formed but the pin cannot be driven that way
    UnsupportedMode { pin: PinId, mode: ElectricalMode },
}

/// Platform pin multiplexer
pub trait PinMux {
    /// Pin/function pairs this platform can route to a chip-select
    fn capabilities(&self) -> &[PinCapability];

    /// Whether `mode` is electrically possible on `pin`
    fn supports_mode(&self, _pin: PinId, _mode: ElectricalMode) -> bool {
        true
    }

    /// Writes a configuration that already passed validation
    fn apply(&mut self, config: &PinConfig);
}

impl<M: PinMux + ?Sized> PinMux for &mut M {
    fn capabilities(&self) -> &[PinCapability] {
        (**self).capabilities()
    }

    fn supports_mode(&self, pin: PinId, mode: ElectricalMode) -> bool {
        (**self).supports_mode(pin, mode)
    }

    fn apply(&mut self, config: &PinConfig) {
        (**self).apply(config)
    }
}

/// Proof that the chip-select line has been configured
///
/// Only [`configure_pin`] creates this token.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipSelectReady {
    pin: PinId,
}

impl ChipSelectReady {
    pub fn pin(&self) -> PinId {
        self.pin
    }
}

/// Validates `config` against `mux` and applies it
///
/// Nothing is written to the hardware unless every check passes. Applying the same configuration
/// again leaves the pin in the same state.
pub fn configure_pin<M>(mux: &mut M, config: PinConfig) -> Result<ChipSelectReady, ConfigError>
where
    M: PinMux + ?Sized,
{
    if !config.mode.is_well_formed() {
        return Err(ConfigError::InvalidMode(config.mode));
    }

    let caps = mux.capabilities();
    if !caps.iter().any(|c| c.pin == config.pin) {
        return Err(ConfigError::UnknownPin(config.pin));
    }
    if !caps
        .iter()
        .any(|c| c.pin == config.pin && c.function == config.function)
    {
        return Err(ConfigError::UnsupportedFunction {
            pin: config.pin,
            function: config.function,
        });
    }
    if !mux.supports_mode(config.pin, config.mode) {
        return Err(ConfigError::UnsupportedMode {
            pin: config.pin,
            mode: config.mode,
        });
    }

    mux.apply(&config);
    Ok(ChipSelectReady { pin: config.pin })
}
