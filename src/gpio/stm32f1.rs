//! STM32F1 pin multiplexer
//!
//! The F1 has no per-pin alternate function selector. A pin carries the signal of whatever
//! peripheral is mapped onto it through the AFIO remap bits, so [`AltFunction`] is read as the
//! remap index of the SPI peripheral owning the NSS pin:
//!
//! | Pin  | Function | Peripheral          |
//! |------|----------|---------------------|
//! | PA4  | AF0      | SPI1, no remap      |
//! | PA15 | AF1      | SPI1, remapped      |
//! | PB12 | AF0      | SPI2                |
//!
//! Alternate function outputs on the F1 have no pull resistors and ignore the output data
//! register, so only pull-less modes are accepted. NSS is not driven while the SPI is disabled;
//! keep it at its idle level with an external pull-up.

use super::{AltFunction, ElectricalMode, PinCapability, PinId};

#[cfg(feature = "device")]
mod mux;
#[cfg(feature = "device")]
pub use mux::GpioMux;

/// Pins the SPI peripherals can drive as NSS
pub const NSS_PINS: [PinCapability; 3] = [
    PinCapability {
        pin: PinId::PA4,
        function: AltFunction::AF0,
    },
    PinCapability {
        pin: PinId::PA15,
        function: AltFunction::AF1,
    },
    PinCapability {
        pin: PinId::PB12,
        function: AltFunction::AF0,
    },
];

/// Whether an NSS pin can be driven in `mode`: push-pull or open-drain, without pull resistor
pub fn supports_mode(_pin: PinId, mode: ElectricalMode) -> bool {
    !mode.intersects(ElectricalMode::PULL_UP | ElectricalMode::PULL_DOWN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::{configure_pin, ConfigError, PinConfig, PinMux};

    /// The F1 tables without the registers behind them
    struct Tables;

    impl PinMux for Tables {
        fn capabilities(&self) -> &[PinCapability] {
            &NSS_PINS
        }

        fn supports_mode(&self, pin: PinId, mode: ElectricalMode) -> bool {
            supports_mode(pin, mode)
        }

        fn apply(&mut self, _config: &PinConfig) {}
    }

    fn nss(mode: ElectricalMode) -> PinConfig {
        PinConfig {
            pin: PinId::PA4,
            function: AltFunction::AF0,
            mode,
        }
    }

    #[test]
    fn pull_resistors_are_rejected() {
        for mode in [
            ElectricalMode::PUSH_PULL_PULL_UP,
            ElectricalMode::OPEN_DRAIN_PULL_UP,
            ElectricalMode::PUSH_PULL | ElectricalMode::PULL_DOWN,
        ] {
            assert_eq!(
                configure_pin(&mut Tables, nss(mode)).unwrap_err(),
                ConfigError::UnsupportedMode {
                    pin: PinId::PA4,
                    mode,
                }
            );
        }
    }

    #[test]
    fn plain_outputs_are_accepted() {
        for mode in [ElectricalMode::PUSH_PULL, ElectricalMode::OPEN_DRAIN] {
            assert!(configure_pin(&mut Tables, nss(mode)).is_ok());
        }
    }

    #[test]
    fn remap_index_selects_the_pin() {
        let remapped = PinConfig {
            pin: PinId::PA15,
            ..nss(ElectricalMode::PUSH_PULL)
        };
        assert!(configure_pin(&mut Tables, remapped).is_ok());

        let unmapped = PinConfig {
            function: AltFunction::AF0,
            ..remapped
        };
        assert_eq!(
            configure_pin(&mut Tables, unmapped).unwrap_err(),
            ConfigError::UnsupportedFunction {
                pin: PinId::PA15,
                function: AltFunction::AF0,
            }
        );
    }
}
