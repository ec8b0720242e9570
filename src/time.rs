//! Time units
//!
//! Frequencies and durations are [`fugit`] types. The [`RateExtU32`] and [`ExtU32`] traits add
//! methods like `.MHz()` and `.millis()` to the `u32` primitive type.
//!
//! ```rust
//! use stm32f1_nss_spi::time::{ExtU32, Hertz, MillisDurationU32, RateExtU32};
//!
//! let freq: Hertz = 1.MHz();
//! let period: MillisDurationU32 = 1.millis();
//!
//! assert_eq!(freq, Hertz::from_raw(1_000_000));
//! assert_eq!(period.ticks(), 1);
//! ```

pub use fugit::{
    ExtU32, HertzU32 as Hertz, KilohertzU32 as KiloHertz, MegahertzU32 as MegaHertz,
    MicrosDurationU32, MillisDurationU32, RateExtU32,
};
