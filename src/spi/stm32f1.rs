//! STM32F1 SPI register backend
//!
//! Transmit only, following the "Transmit only procedure" of RM0008. The peripheral is enabled
//! on the first frame and disabled again once the bus is idle: with SSOE set NSS is driven low
//! exactly while SPE is set, which frames every transfer in hardware.
//!
//! Only 8 and 16 bit frames are available on this family.

use core::ops::Deref;
use core::ptr;

use crate::pac;
use crate::time::Hertz;

use super::{baud_rate_divisor, BitOrder, ChipSelect, Instance, TransferConfig, TransferError};
use super::{Phase, Polarity};

pub type SpiRegisterBlock = pac::spi1::RegisterBlock;

/// SPI peripheral in master transmit mode
pub struct Spi<SPI> {
    spi: SPI,
    pclk: Hertz,
    wide: bool,
    enabled: bool,
}

macro_rules! spi {
    ($SPIX:ident: ($spiX:ident, $enr:ident, $en:ident, $rstr:ident, $rst:ident)) => {
        impl Spi<pac::$SPIX> {
            /// Enables and resets the peripheral
            ///
            /// `pclk` is the frequency of the APB bus the peripheral sits on.
            pub fn $spiX(spi: pac::$SPIX, rcc: &pac::RCC, pclk: Hertz) -> Self {
                rcc.$enr().modify(|_, w| w.$en().set_bit());
                // Stall the pipeline to work around erratum 2.1.13 (DM00037591)
                cortex_m::asm::dsb();
                rcc.$rstr().modify(|_, w| w.$rst().set_bit());
                rcc.$rstr().modify(|_, w| w.$rst().clear_bit());

                Spi {
                    spi,
                    pclk,
                    wide: false,
                    enabled: false,
                }
            }
        }
    };
}

spi!(SPI1: (spi1, apb2enr, spi1en, apb2rstr, spi1rst));
spi!(SPI2: (spi2, apb1enr, spi2en, apb1rstr, spi2rst));

impl<SPI> Spi<SPI>
where
    SPI: Deref<Target = SpiRegisterBlock>,
{
    fn write_data_reg(&mut self, frame: u16) {
        // NOTE(write_volatile) an 8 bit access queues exactly one 8 bit frame
        unsafe {
            if self.wide {
                ptr::write_volatile(self.spi.dr().as_ptr() as *mut u16, frame)
            } else {
                ptr::write_volatile(self.spi.dr().as_ptr() as *mut u8, frame as u8)
            }
        }
    }

    fn read_data_reg(&mut self) -> u16 {
        unsafe { ptr::read_volatile(self.spi.dr().as_ptr() as *const u16) }
    }

    fn disable(&mut self) {
        self.spi.cr1().modify(|_, w| w.spe().clear_bit());
        self.enabled = false;
    }

    /// Disables the peripheral and gives it back
    pub fn release(mut self) -> SPI {
        self.disable();
        self.spi
    }
}

impl<SPI> Instance for Spi<SPI>
where
    SPI: Deref<Target = SpiRegisterBlock>,
{
    fn supports_word_size(&self, bits: u8) -> bool {
        matches!(bits, 8 | 16)
    }

    fn apply(&mut self, config: &TransferConfig) -> Result<(), TransferError> {
        let br = baud_rate_divisor(self.pclk, config.frequency)?;
        let hardware_cs = config.chip_select == ChipSelect::Hardware;

        self.disable();
        self.spi.cr2().write(|w| w.ssoe().bit(hardware_cs));
        self.spi.cr1().write(|w| unsafe {
            w
                // clock phase from config
                .cpha()
                .bit(config.mode.phase == Phase::CaptureOnSecondTransition)
                // clock polarity from config
                .cpol()
                .bit(config.mode.polarity == Polarity::IdleHigh)
                // mstr: master configuration
                .mstr()
                .set_bit()
                // baudrate value
                .br()
                .bits(br)
                .lsbfirst()
                .bit(config.bit_order == BitOrder::LsbFirst)
                // ssm: software slave management unless the peripheral drives NSS
                .ssm()
                .bit(!hardware_cs)
                // ssi: set nss high = master mode
                .ssi()
                .bit(!hardware_cs)
                .dff()
                .bit(config.word_size == 16)
                // bidimode: 2-line unidirectional
                .bidimode()
                .clear_bit()
                .rxonly()
                .clear_bit()
                // spe stays off until the first frame
                .spe()
                .clear_bit()
        });
        self.wide = config.word_size == 16;

        Ok(())
    }

    fn write_frame(&mut self, frame: u16) -> nb::Result<(), TransferError> {
        if !self.enabled {
            self.spi.cr1().modify(|_, w| w.spe().set_bit());
            self.enabled = true;
        }

        let sr = self.spi.sr().read();
        // OVR is expected, nothing reads the receive buffer; it is cleared in flush
        let error = if sr.modf().bit_is_set() {
            TransferError::ModeFault
        } else if sr.crcerr().bit_is_set() {
            TransferError::Crc
        } else if sr.txe().bit_is_set() {
            self.write_data_reg(frame);
            return Ok(());
        } else {
            return Err(nb::Error::WouldBlock);
        };

        // release NSS, the transfer is abandoned
        self.disable();
        Err(nb::Error::Other(error))
    }

    fn flush(&mut self) -> nb::Result<(), TransferError> {
        let sr = self.spi.sr().read();
        if sr.modf().bit_is_set() {
            self.disable();
            return Err(nb::Error::Other(TransferError::ModeFault));
        }
        if sr.txe().bit_is_clear() || sr.bsy().bit_is_set() {
            return Err(nb::Error::WouldBlock);
        }

        // Clear OVR set due to dropped received values
        let _ = self.read_data_reg();
        let _ = self.spi.sr().read();
        self.disable();
        Ok(())
    }
}
