pub use crate::gpio::PinMux as _nss_spi_gpio_PinMux;
pub use crate::spi::Instance as _nss_spi_spi_Instance;
pub use crate::time::ExtU32 as _nss_spi_time_ExtU32;
pub use crate::time::RateExtU32 as _nss_spi_time_RateExtU32;
pub use embedded_hal::delay::DelayNs as _embedded_hal_delay_DelayNs;
