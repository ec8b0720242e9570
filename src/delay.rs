//! Delays

use cortex_m::peripheral::{syst::SystClkSource, SYST};
use embedded_hal::delay::DelayNs;
use fugit::ExtU32Ceil;

use crate::time::{ExtU32, Hertz, MicrosDurationU32};

/// System timer (SysTick) as a delay provider
pub struct SysDelay {
    syst: SYST,
    clk: Hertz,
}

impl SysDelay {
    /// Configures the system timer as a delay provider
    ///
    /// `hclk` is the core clock frequency.
    pub fn new(mut syst: SYST, hclk: Hertz) -> Self {
        syst.set_clock_source(SystClkSource::Core);
        SysDelay { syst, clk: hclk }
    }

    pub fn delay(&mut self, us: MicrosDurationU32) {
        // The SysTick Reload Value register supports values between 1 and 0x00FFFFFF.
        const MAX_RVR: u64 = 0x00FF_FFFF;

        let mut total_rvr = u64::from(us.ticks()) * u64::from(self.clk.raw() / 1_000_000);

        while total_rvr != 0 {
            let current_rvr = total_rvr.min(MAX_RVR);

            self.syst.set_reload(current_rvr as u32);
            self.syst.clear_current();
            self.syst.enable_counter();

            // Update the tracking variable while we are waiting...
            total_rvr -= current_rvr;

            while !self.syst.has_wrapped() {}

            self.syst.disable_counter();
        }
    }

    /// Releases the system timer resource
    pub fn release(self) -> SYST {
        self.syst
    }
}

impl DelayNs for SysDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delay(ns.nanos_at_least());
    }

    fn delay_ms(&mut self, ms: u32) {
        // split so the microsecond count cannot overflow
        for _ in 0..ms / 1_000 {
            self.delay(1_000_000.micros());
        }
        self.delay((ms % 1_000).millis_at_least());
    }
}
