// Copyright (c) 2017-2019 Rene van der Meer
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL
// THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! Interface for a single sysfs PWM channel.
//!
//! The kernel exposes every PWM controller as `/sys/class/pwm/pwmchip<N>`. A
//! channel becomes usable after its number is written to the controller's
//! `export` file, which creates the `pwm<M>` directory holding the `period`,
//! `duty_cycle` and `enable` attributes. Writing `unexport` removes it again.
//!
//! Most drivers are picky about the order of those writes. A duty cycle is
//! meaningless until a period exists, and enabling a channel that was never
//! exported fails. [`PwmChannel`] keeps a shadow copy of every value it has
//! successfully written, so the caller always knows which step comes next.
//!
//! ## Ordering
//!
//! ```text
//! Unexported --export--> Exported --enable--> Enabled
//!     ^                      |  ^                |
//!     |                      |  +---disable------+
//!     +-------unexport-------+
//! ```
//!
//! Period and duty cycle writes belong to the `Exported` superstate and don't
//! change the export or enable state.
//!
//! `PwmChannel` never clamps the duty cycle to the period. Keeping
//! `duty_cycle_ns <= period_ns` is the caller's responsibility, because drivers
//! disagree on what an out-of-range value means. When shortening the period,
//! lower the duty cycle first.
//!
//! ## Concurrency
//!
//! Every operation performs at most one blocking attribute write. There is no
//! locking between handles. Driving the same chip and channel from several
//! handles, threads or processes at once is undefined at the hardware level,
//! so callers need to guarantee exclusive access per channel.
//!
//! ## Example
//!
//! ```no_run
//! use pwmchan::pwm::{EnableState, ExportState, PwmChannel};
//!
//! # fn main() -> pwmchan::pwm::Result<()> {
//! let mut pwm = PwmChannel::new(0, 1);
//!
//! pwm.set_export_state(ExportState::Exported)?;
//! pwm.set_period(20_000_000)?;
//! pwm.set_duty_cycle_percent(7.5)?;
//! pwm.set_enable_state(EnableState::Enabled)?;
//!
//! // ...
//!
//! pwm.set_enable_state(EnableState::Disabled)?;
//! pwm.set_export_state(ExportState::Unexported)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Troubleshooting
//!
//! ### Permission denied
//!
//! Writing to `/sys/class/pwm` requires root, unless udev has been configured
//! to hand the exported attributes to the `gpio` group. [`Sysfs`] waits for
//! udev to finish after each export when the process isn't running as root.
//!
//! ### Invalid argument
//!
//! Most drivers reject `enable` until a non-zero period has been written.

use std::error;
use std::fmt;
use std::io;
use std::result;
use std::time::Duration;

use log::debug;

#[cfg(feature = "hal")]
mod hal;
#[cfg(test)]
mod mock;
mod sysfs;

pub use self::sysfs::Sysfs;

/// Errors that can occur when controlling a PWM channel.
#[derive(Debug)]
pub enum Error {
    /// IO error.
    ///
    /// Opening or writing an attribute file failed. Common causes are missing
    /// permissions, a controller that doesn't exist, or a driver rejecting the
    /// value. The write is never retried.
    Io(io::Error),
    /// Invalid export transition.
    ///
    /// The requested export state already matches the state observed on disk,
    /// either because the channel was exported twice, or unexported while it
    /// wasn't exported at all. The value holds the requested state.
    InvalidTransition(ExportState),
    /// Channel not exported.
    ///
    /// The operation requires the channel to be exported through this handle
    /// first.
    NotExported,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Io(ref err) => write!(f, "IO error: {}", err),
            Error::InvalidTransition(ExportState::Exported) => {
                write!(f, "Channel is already exported")
            }
            Error::InvalidTransition(ExportState::Unexported) => {
                write!(f, "Channel isn't exported")
            }
            Error::NotExported => write!(f, "Channel must be exported first"),
        }
    }
}

impl error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

/// Result type returned from methods that can have `pwm::Error`s.
pub type Result<T> = result::Result<T, Error>;

/// Export states.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ExportState {
    Exported,
    Unexported,
}

impl Default for ExportState {
    fn default() -> ExportState {
        ExportState::Unexported
    }
}

/// Enable states.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum EnableState {
    Enabled,
    Disabled,
}

impl Default for EnableState {
    fn default() -> EnableState {
        EnableState::Disabled
    }
}

/// Attribute files written by [`PwmChannel`].
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum Attribute {
    /// Controller-scoped `export` file.
    Export,
    /// Controller-scoped `unexport` file.
    Unexport,
    /// Period in nanoseconds.
    Period,
    /// High time in nanoseconds.
    DutyCycle,
    /// `1` or `0`.
    Enable,
}

impl Attribute {
    /// Returns the attribute's file name.
    pub fn name(self) -> &'static str {
        match self {
            Attribute::Export => "export",
            Attribute::Unexport => "unexport",
            Attribute::Period => "period",
            Attribute::DutyCycle => "duty_cycle",
            Attribute::Enable => "enable",
        }
    }

    /// Returns `true` if the file lives in the controller directory rather
    /// than in the channel directory.
    pub fn is_chip_scoped(self) -> bool {
        matches!(self, Attribute::Export | Attribute::Unexport)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Persistence backend for [`PwmChannel`].
///
/// [`Sysfs`] is the implementation used on real hardware. Implementations
/// must finish each write before returning, and must not hold on to any
/// resources between calls.
pub trait AttributeStore {
    /// Returns `true` if the channel's attribute directory is present.
    fn exists(&self, chip: u32, channel: u32) -> bool;

    /// Writes `value` to `attribute`.
    ///
    /// `channel` is ignored for chip-scoped attributes, which are written to
    /// the controller directory instead.
    fn write_attribute(
        &mut self,
        chip: u32,
        channel: u32,
        attribute: Attribute,
        value: &str,
    ) -> io::Result<()>;
}

impl<S: AttributeStore + ?Sized> AttributeStore for &mut S {
    fn exists(&self, chip: u32, channel: u32) -> bool {
        (**self).exists(chip, channel)
    }

    fn write_attribute(
        &mut self,
        chip: u32,
        channel: u32,
        attribute: Attribute,
        value: &str,
    ) -> io::Result<()> {
        (**self).write_attribute(chip, channel, attribute, value)
    }
}

/// A handle to a single PWM channel.
///
/// `PwmChannel` keeps shadow state for everything written through it. The
/// shadow state is only updated after a write has been confirmed, so a failed
/// operation always leaves it untouched.
///
/// Constructing a `PwmChannel` doesn't touch the hardware. The channel starts
/// out [`Unexported`] and [`Disabled`], with a zero period and duty cycle.
///
/// [`Unexported`]: enum.ExportState.html#variant.Unexported
/// [`Disabled`]: enum.EnableState.html#variant.Disabled
#[derive(Debug)]
pub struct PwmChannel<S: AttributeStore = Sysfs> {
    chip: u32,
    channel: u32,
    export_state: ExportState,
    enable_state: EnableState,
    period_ns: u64,
    duty_cycle_ns: u64,
    reset_on_drop: bool,
    store: S,
}

impl PwmChannel<Sysfs> {
    /// Constructs a new `PwmChannel` for `channel` on controller `chip`,
    /// backed by `/sys/class/pwm`.
    pub fn new(chip: u32, channel: u32) -> PwmChannel {
        PwmChannel::with_store(chip, channel, Sysfs::new())
    }
}

impl<S: AttributeStore> PwmChannel<S> {
    /// Constructs a new `PwmChannel` that reads and writes through `store`.
    pub fn with_store(chip: u32, channel: u32, store: S) -> PwmChannel<S> {
        PwmChannel {
            chip,
            channel,
            export_state: ExportState::default(),
            enable_state: EnableState::default(),
            period_ns: 0,
            duty_cycle_ns: 0,
            reset_on_drop: false,
            store,
        }
    }

    /// Returns the controller number.
    pub fn chip(&self) -> u32 {
        self.chip
    }

    /// Returns the channel number within the controller.
    pub fn channel(&self) -> u32 {
        self.channel
    }

    /// Returns the export state last confirmed by this handle.
    pub fn export_state(&self) -> ExportState {
        self.export_state
    }

    /// Returns the enable state last confirmed by this handle.
    pub fn enable_state(&self) -> EnableState {
        self.enable_state
    }

    /// Returns the period in nanoseconds. `0` means the period hasn't been set.
    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    /// Returns the duty cycle in nanoseconds.
    pub fn duty_cycle_ns(&self) -> u64 {
        self.duty_cycle_ns
    }

    /// Returns the duty cycle as a percentage of the period.
    ///
    /// Returns `0.0` while the period is `0`. The result isn't clamped, and
    /// exceeds `100.0` if the duty cycle was set longer than the period.
    pub fn duty_cycle_percent(&self) -> f64 {
        if self.period_ns == 0 {
            return 0.0;
        }

        self.duty_cycle_ns as f64 / self.period_ns as f64 * 100.0
    }

    /// Returns a reference to the underlying attribute store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Checks whether the channel's attribute directory currently exists.
    ///
    /// Unlike [`export_state`], this observes the store directly, and also
    /// reports channels exported by another process.
    ///
    /// [`export_state`]: #method.export_state
    pub fn is_exported_on_disk(&self) -> bool {
        self.store.exists(self.chip, self.channel)
    }

    /// Exports or unexports the channel.
    ///
    /// Whether the transition is legal is decided by looking at the store, not
    /// at the shadow state. Exporting a channel whose directory already exists,
    /// or unexporting one whose directory is missing, returns
    /// [`Error::InvalidTransition`].
    ///
    /// A successful unexport also resets the enable state to `Disabled`, and
    /// the period and duty cycle to `0`. The kernel removes the channel
    /// directory, so a re-exported channel needs to be configured again.
    ///
    /// [`Error::InvalidTransition`]: enum.Error.html#variant.InvalidTransition
    pub fn set_export_state(&mut self, export_state: ExportState) -> Result<()> {
        let exists = self.store.exists(self.chip, self.channel);

        let attribute = match (export_state, exists) {
            (ExportState::Exported, false) => Attribute::Export,
            (ExportState::Unexported, true) => Attribute::Unexport,
            _ => return Err(Error::InvalidTransition(export_state)),
        };

        self.store.write_attribute(
            self.chip,
            self.channel,
            attribute,
            &self.channel.to_string(),
        )?;

        self.export_state = export_state;
        if export_state == ExportState::Unexported {
            self.enable_state = EnableState::Disabled;
            self.period_ns = 0;
            self.duty_cycle_ns = 0;
        }

        debug!(
            "pwmchip{}/pwm{}: {:?}",
            self.chip, self.channel, self.export_state
        );

        Ok(())
    }

    /// Exports the channel.
    ///
    /// Shorthand for `set_export_state(ExportState::Exported)`.
    pub fn export(&mut self) -> Result<()> {
        self.set_export_state(ExportState::Exported)
    }

    /// Unexports the channel.
    ///
    /// Shorthand for `set_export_state(ExportState::Unexported)`.
    pub fn unexport(&mut self) -> Result<()> {
        self.set_export_state(ExportState::Unexported)
    }

    /// Sets the period in nanoseconds.
    ///
    /// The duty cycle isn't adjusted. If the new period is shorter than the
    /// current duty cycle, lower the duty cycle first, or the driver may
    /// reject the write.
    ///
    /// Returns [`Error::NotExported`] without writing anything if the channel
    /// hasn't been exported through this handle.
    ///
    /// [`Error::NotExported`]: enum.Error.html#variant.NotExported
    pub fn set_period(&mut self, period_ns: u64) -> Result<()> {
        self.ensure_exported()?;

        self.store.write_attribute(
            self.chip,
            self.channel,
            Attribute::Period,
            &period_ns.to_string(),
        )?;

        self.period_ns = period_ns;

        Ok(())
    }

    /// Sets the period.
    ///
    /// `period` is converted to nanoseconds, saturating at `u64::MAX`.
    pub fn set_period_duration(&mut self, period: Duration) -> Result<()> {
        self.set_period(
            u64::from(period.subsec_nanos())
                .saturating_add(period.as_secs().saturating_mul(1_000_000_000)),
        )
    }

    /// Sets the duty cycle in nanoseconds.
    ///
    /// `duty_cycle_ns` isn't validated against the period.
    ///
    /// Returns [`Error::NotExported`] without writing anything if the channel
    /// hasn't been exported through this handle.
    ///
    /// [`Error::NotExported`]: enum.Error.html#variant.NotExported
    pub fn set_duty_cycle(&mut self, duty_cycle_ns: u64) -> Result<()> {
        self.ensure_exported()?;

        self.store.write_attribute(
            self.chip,
            self.channel,
            Attribute::DutyCycle,
            &duty_cycle_ns.to_string(),
        )?;

        self.duty_cycle_ns = duty_cycle_ns;

        Ok(())
    }

    /// Sets the duty cycle as a percentage of the current period.
    ///
    /// The duty cycle is calculated once, as `percentage / 100 * period`
    /// rounded to the nearest nanosecond, using the period stored at the time
    /// of the call. Changing the period later doesn't rescale it.
    ///
    /// `percentage` is expected to be between `0.0` and `100.0`, but isn't
    /// checked. Values above `100.0` result in a duty cycle longer than the
    /// period. Negative values and NaN result in `0`. Calling this before a
    /// period has been set always writes `0`.
    ///
    /// Whole percentages are calculated exactly. Fractional percentages go
    /// through `f64`, which can't represent periods above 2^53 ns exactly.
    pub fn set_duty_cycle_percent(&mut self, percentage: f64) -> Result<()> {
        self.set_duty_cycle(percent_to_ns(percentage, self.period_ns))
    }

    /// Enables or disables the channel.
    ///
    /// Returns [`Error::NotExported`] without writing anything if the channel
    /// hasn't been exported through this handle.
    ///
    /// [`Error::NotExported`]: enum.Error.html#variant.NotExported
    pub fn set_enable_state(&mut self, enable_state: EnableState) -> Result<()> {
        self.ensure_exported()?;

        let value = match enable_state {
            EnableState::Enabled => "1",
            EnableState::Disabled => "0",
        };

        self.store
            .write_attribute(self.chip, self.channel, Attribute::Enable, value)?;

        self.enable_state = enable_state;

        debug!(
            "pwmchip{}/pwm{}: {:?}",
            self.chip, self.channel, self.enable_state
        );

        Ok(())
    }

    /// Enables the channel.
    pub fn enable(&mut self) -> Result<()> {
        self.set_enable_state(EnableState::Enabled)
    }

    /// Disables the channel.
    pub fn disable(&mut self) -> Result<()> {
        self.set_enable_state(EnableState::Disabled)
    }

    fn ensure_exported(&self) -> Result<()> {
        if self.export_state != ExportState::Exported {
            return Err(Error::NotExported);
        }

        Ok(())
    }

    /// Returns the value of `reset_on_drop`.
    pub fn reset_on_drop(&self) -> bool {
        self.reset_on_drop
    }

    /// When enabled, disables and unexports the channel when the `PwmChannel`
    /// goes out of scope, provided it's exported at that point.
    ///
    /// By default, `reset_on_drop` is set to `false`, and the channel is left
    /// as is. Any errors during the reset are ignored.
    pub fn set_reset_on_drop(&mut self, reset_on_drop: bool) {
        self.reset_on_drop = reset_on_drop;
    }
}

impl<S: AttributeStore> Drop for PwmChannel<S> {
    fn drop(&mut self) {
        if !self.reset_on_drop || self.export_state != ExportState::Exported {
            return;
        }

        let _ = self.set_enable_state(EnableState::Disabled);
        let _ = self.set_export_state(ExportState::Unexported);
    }
}

// Float to integer casts saturate, so negative values and NaN end up as 0.
fn percent_to_ns(percentage: f64, period_ns: u64) -> u64 {
    // Whole percentages stay in integer arithmetic, rounding half up
    if percentage >= 0.0 && percentage <= u64::MAX as f64 && percentage.fract() == 0.0 {
        let ns = (percentage as u128 * u128::from(period_ns) + 50) / 100;

        return u64::try_from(ns).unwrap_or(u64::MAX);
    }

    (percentage / 100.0 * period_ns as f64).round() as u64
}
