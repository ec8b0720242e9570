//! # Control loop
//!
//! The start-up sequence and the periodic transmit as an explicit state machine:
//!
//! ```text
//! Starting -> Configuring -> Acquiring -> Ready -> (Sending -> Waiting)* -> Failed | Stopped
//! ```
//!
//! Every error is reported once through the [`Reporter`] and ends in `Failed`, after which no
//! further transfer is issued. Whether a failed send is retried is up to the [`RetryPolicy`]; the
//! default [`NoRetry`] halts on the first error.
//!
//! ```rust
//! # use stm32f1_nss_spi::gpio::{AltFunction, PinCapability, PinConfig, PinId, PinMux};
//! # use stm32f1_nss_spi::spi::{Instance, TransferConfig, TransferError};
//! # struct Board;
//! # impl PinMux for Board {
//! #     fn capabilities(&self) -> &[PinCapability] {
//! #         &[PinCapability { pin: PinId::PA4, function: AltFunction::AF0 }]
//! #     }
//! #     fn apply(&mut self, _config: &PinConfig) {}
//! # }
//! # struct Spi1(u32);
//! # impl Instance for Spi1 {
//! #     fn apply(&mut self, _: &TransferConfig) -> Result<(), TransferError> { Ok(()) }
//! #     fn write_frame(&mut self, _: u16) -> nb::Result<(), TransferError> {
//! #         self.0 += 1;
//! #         if self.0 > 12 { Err(nb::Error::Other(TransferError::ModeFault)) } else { Ok(()) }
//! #     }
//! #     fn flush(&mut self) -> nb::Result<(), TransferError> { Ok(()) }
//! # }
//! # struct NoDelay;
//! # impl embedded_hal::delay::DelayNs for NoDelay { fn delay_ns(&mut self, _: u32) {} }
//! use stm32f1_nss_spi::control::{ControlLoop, Event, Failure, LoopConfig, Reporter};
//! use stm32f1_nss_spi::spi::Registry;
//!
//! struct Log;
//! impl Reporter for Log {
//!     fn report(&mut self, event: Event<'_>) {
//!         // forward to the board's console
//!     }
//! }
//!
//! let registry = Registry::new([("SPI_1", PinId::PA4, Spi1(0))]);
//! let mut app = ControlLoop::new(LoopConfig::default(), Board, registry, NoDelay, Log);
//! assert_eq!(
//!     app.run(),
//!     Some(Failure::Transfer(TransferError::ModeFault))
//! );
//! ```

use core::mem;

use embedded_hal::delay::DelayNs;

use crate::gpio::{
    configure_pin, AltFunction, ChipSelectReady, ConfigError, ElectricalMode, PinConfig, PinId,
    PinMux,
};
use crate::spi::{BusHandle, Instance, LookupError, Registry, TransferConfig, TransferError};
use crate::time::{ExtU32, MillisDurationU32, RateExtU32};

/// What the loop does and with which parameters
#[derive(Clone, Copy, Debug)]
pub struct LoopConfig<'a> {
    /// Reported at start-up
    pub board: &'a str,
    /// Registry name of the SPI peripheral
    pub bus: &'a str,
    pub chip_select: PinConfig,
    pub transfer: TransferConfig,
    pub payload: &'a [u8],
    /// Pause between two transfers
    pub period: MillisDurationU32,
}

impl Default for LoopConfig<'static> {
    /// `"HELLO!"` every millisecond on `SPI_1`, 8-bit MSB first at 1 MHz, NSS on PA4 with
    /// pull-up
    fn default() -> Self {
        Self {
            board: crate::CHIP,
            bus: "SPI_1",
            chip_select: PinConfig {
                pin: PinId::PA4,
                function: AltFunction::AF0,
                mode: ElectricalMode::PUSH_PULL_PULL_UP,
            },
            transfer: TransferConfig::new(1.MHz()),
            payload: b"HELLO!",
            period: 1.millis(),
        }
    }
}

/// Loop state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Starting,
    Configuring,
    Acquiring,
    Ready,
    Sending,
    Waiting,
    Failed,
    Stopped,
}

/// The error that ended the loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Failure {
    Config(ConfigError),
    Lookup(LookupError),
    Transfer(TransferError),
}

impl From<ConfigError> for Failure {
    fn from(e: ConfigError) -> Self {
        Failure::Config(e)
    }
}

impl From<LookupError> for Failure {
    fn from(e: LookupError) -> Self {
        Failure::Lookup(e)
    }
}

impl From<TransferError> for Failure {
    fn from(e: TransferError) -> Self {
        Failure::Transfer(e)
    }
}

/// Diagnostic event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event<'a> {
    Starting { board: &'a str },
    PinFailed(ConfigError),
    LookupFailed { bus: &'a str, error: LookupError },
    SendFailed(TransferError),
    Retrying { error: TransferError, attempt: u32 },
}

/// Diagnostic output
pub trait Reporter {
    fn report(&mut self, event: Event<'_>);
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn report(&mut self, event: Event<'_>) {
        (**self).report(event)
    }
}

/// Writes events to the `defmt` logger
#[cfg(feature = "defmt")]
pub struct DefmtReporter;

#[cfg(feature = "defmt")]
impl Reporter for DefmtReporter {
    fn report(&mut self, event: Event<'_>) {
        match event {
            Event::Starting { board } => defmt::info!("Starting nss-spi on {=str}", board),
            Event::PinFailed(e) => defmt::error!("Could not configure chip-select pin: {}", e),
            Event::LookupFailed { bus, error } => {
                defmt::error!("Could not find SPI driver {=str}: {}", bus, error)
            }
            Event::SendFailed(e) => defmt::error!("SPI send error {}", e),
            Event::Retrying { error, attempt } => {
                defmt::warn!("SPI send error {}, retry {=u32}", error, attempt)
            }
        }
    }
}

/// Decision taken after a failed send
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Halt,
    RetryAfter(MillisDurationU32),
}

/// Decides what happens after a failed send
pub trait RetryPolicy {
    /// `attempt` counts consecutive failures, starting at 1
    fn on_failure(&mut self, error: &TransferError, attempt: u32) -> Verdict;
}

/// Halt on the first error
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn on_failure(&mut self, _error: &TransferError, _attempt: u32) -> Verdict {
        Verdict::Halt
    }
}

/// Retry transient errors up to `max_attempts` times in a row
#[derive(Clone, Copy, Debug)]
pub struct RetryTransient {
    pub max_attempts: u32,
    pub backoff: MillisDurationU32,
}

impl RetryPolicy for RetryTransient {
    fn on_failure(&mut self, error: &TransferError, attempt: u32) -> Verdict {
        if error.is_transient() && attempt <= self.max_attempts {
            Verdict::RetryAfter(self.backoff)
        } else {
            Verdict::Halt
        }
    }
}

enum Stage<SPI> {
    Starting,
    Configuring,
    Acquiring(ChipSelectReady),
    Ready(BusHandle<SPI>),
    Sending(BusHandle<SPI>),
    Waiting(BusHandle<SPI>, MillisDurationU32),
    Failed(Failure, Option<BusHandle<SPI>>),
    Stopped(Option<BusHandle<SPI>>),
}

impl<SPI> Stage<SPI> {
    fn state(&self) -> State {
        match self {
            Stage::Starting => State::Starting,
            Stage::Configuring => State::Configuring,
            Stage::Acquiring(_) => State::Acquiring,
            Stage::Ready(_) => State::Ready,
            Stage::Sending(_) => State::Sending,
            Stage::Waiting(..) => State::Waiting,
            Stage::Failed(..) => State::Failed,
            Stage::Stopped(_) => State::Stopped,
        }
    }

    fn take_bus(self) -> Option<BusHandle<SPI>> {
        match self {
            Stage::Ready(bus) | Stage::Sending(bus) | Stage::Waiting(bus, _) => Some(bus),
            Stage::Failed(_, bus) | Stage::Stopped(bus) => bus,
            Stage::Starting | Stage::Configuring | Stage::Acquiring(_) => None,
        }
    }
}

/// Configures the chip-select pin, acquires the bus and transmits the payload periodically
pub struct ControlLoop<'a, M, SPI, D, R, const N: usize, P = NoRetry> {
    config: LoopConfig<'a>,
    mux: M,
    registry: Registry<SPI, N>,
    delay: D,
    reporter: R,
    policy: P,
    stage: Stage<SPI>,
    failures: u32,
}

impl<'a, M, SPI, D, R, const N: usize> ControlLoop<'a, M, SPI, D, R, N, NoRetry>
where
    M: PinMux,
    SPI: Instance,
    D: DelayNs,
    R: Reporter,
{
    pub fn new(
        config: LoopConfig<'a>,
        mux: M,
        registry: Registry<SPI, N>,
        delay: D,
        reporter: R,
    ) -> Self {
        Self {
            config,
            mux,
            registry,
            delay,
            reporter,
            policy: NoRetry,
            stage: Stage::Starting,
            failures: 0,
        }
    }
}

impl<'a, M, SPI, D, R, const N: usize, P> ControlLoop<'a, M, SPI, D, R, N, P>
where
    M: PinMux,
    SPI: Instance,
    D: DelayNs,
    R: Reporter,
    P: RetryPolicy,
{
    /// Replaces the retry policy
    pub fn with_policy<Q: RetryPolicy>(self, policy: Q) -> ControlLoop<'a, M, SPI, D, R, N, Q> {
        ControlLoop {
            config: self.config,
            mux: self.mux,
            registry: self.registry,
            delay: self.delay,
            reporter: self.reporter,
            policy,
            stage: self.stage,
            failures: self.failures,
        }
    }

    pub fn state(&self) -> State {
        self.stage.state()
    }

    /// The error the loop halted on
    pub fn failure(&self) -> Option<Failure> {
        match self.stage {
            Stage::Failed(failure, _) => Some(failure),
            _ => None,
        }
    }

    pub fn registry(&self) -> &Registry<SPI, N> {
        &self.registry
    }

    /// Performs one transition and returns the new state
    ///
    /// `Failed` and `Stopped` are final.
    pub fn step(&mut self) -> State {
        let stage = mem::replace(&mut self.stage, Stage::Stopped(None));
        self.stage = match stage {
            Stage::Starting => {
                self.reporter.report(Event::Starting {
                    board: self.config.board,
                });
                Stage::Configuring
            }
            Stage::Configuring => match configure_pin(&mut self.mux, self.config.chip_select) {
                Ok(cs) => Stage::Acquiring(cs),
                Err(e) => {
                    self.reporter.report(Event::PinFailed(e));
                    Stage::Failed(e.into(), None)
                }
            },
            Stage::Acquiring(cs) => match self.registry.acquire_bus(&cs, self.config.bus) {
                Ok(bus) => Stage::Ready(bus),
                Err(error) => {
                    self.reporter.report(Event::LookupFailed {
                        bus: self.config.bus,
                        error,
                    });
                    Stage::Failed(error.into(), None)
                }
            },
            Stage::Ready(bus) => match self.config.transfer.validate() {
                Ok(()) => Stage::Sending(bus),
                Err(issue) => {
                    let e = TransferError::from(issue);
                    self.reporter.report(Event::SendFailed(e));
                    Stage::Failed(e.into(), Some(bus))
                }
            },
            Stage::Sending(bus) => self.send(bus),
            Stage::Waiting(bus, pause) => {
                self.delay.delay_ms(pause.ticks());
                Stage::Sending(bus)
            }
            stage @ (Stage::Failed(..) | Stage::Stopped(_)) => stage,
        };
        self.stage.state()
    }

    fn send(&mut self, mut bus: BusHandle<SPI>) -> Stage<SPI> {
        let e = match bus.send(&self.config.transfer, self.config.payload) {
            Ok(()) => {
                self.failures = 0;
                return Stage::Waiting(bus, self.config.period);
            }
            Err(e) => e,
        };

        self.failures += 1;
        match self.policy.on_failure(&e, self.failures) {
            Verdict::RetryAfter(pause) => {
                self.reporter.report(Event::Retrying {
                    error: e,
                    attempt: self.failures,
                });
                Stage::Waiting(bus, pause)
            }
            Verdict::Halt => {
                self.reporter.report(Event::SendFailed(e));
                Stage::Failed(e.into(), Some(bus))
            }
        }
    }

    /// Steps until the loop halts
    ///
    /// Returns the failure, or `None` if the loop had been stopped.
    pub fn run(&mut self) -> Option<Failure> {
        loop {
            match self.step() {
                State::Failed => return self.failure(),
                State::Stopped => return None,
                _ => {}
            }
        }
    }

    /// Ends the loop without an error; no transfer is issued afterwards
    pub fn stop(&mut self) {
        let stage = mem::replace(&mut self.stage, Stage::Stopped(None));
        self.stage = Stage::Stopped(stage.take_bus());
    }

    /// Gives back the bus handle, if one was acquired
    pub fn release(self) -> Option<BusHandle<SPI>> {
        self.stage.take_bus()
    }
}
