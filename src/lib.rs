//! pwmchan controls a single Linux PWM channel through the `/sys/class/pwm`
//! sysfs interface.
//!
//! The kernel rejects or ignores attribute writes made out of order, such as
//! enabling a channel that was never exported. [`PwmChannel`] tracks what has
//! been written so far and enforces the export/enable ordering, while leaving
//! the period and duty cycle values entirely up to the caller.
//!
//! pwmchan can be used in conjunction with platform-agnostic drivers through
//! its `embedded-hal` v1.0.0 `SetDutyCycle` implementation, which is only
//! included when the `hal` feature flag is enabled.
//!
//! [`PwmChannel`]: pwm/struct.PwmChannel.html

// Used by rustdoc to link other crates to pwmchan's docs
#![doc(html_root_url = "https://docs.rs/pwmchan/0.1.0")]

pub mod pwm;
mod user;
