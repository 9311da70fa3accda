// Copyright (c) 2017-2021 Rene van der Meer
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

use embedded_hal::pwm::{self, ErrorKind, ErrorType, SetDutyCycle};

use super::{AttributeStore, Error, PwmChannel};

impl pwm::Error for Error {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// `ErrorType` trait implementation for `embedded-hal` v1.0.0.
impl<S: AttributeStore> ErrorType for PwmChannel<S> {
    type Error = Error;
}

/// `SetDutyCycle` trait implementation for `embedded-hal` v1.0.0.
///
/// The duty cycle is scaled against the period stored at the time of the
/// call, with `u16::MAX` representing the full period.
impl<S: AttributeStore> SetDutyCycle for PwmChannel<S> {
    fn max_duty_cycle(&self) -> u16 {
        u16::MAX
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        let duty_cycle_ns =
            u128::from(self.period_ns()) * u128::from(duty) / u128::from(u16::MAX);

        PwmChannel::set_duty_cycle(self, duty_cycle_ns as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::super::mock::MockStore;
    use super::*;

    #[test]
    fn scales_against_period() {
        let mut pwm = PwmChannel::with_store(0, 0, MockStore::new());
        pwm.export().unwrap();
        pwm.set_period(20_000_000).unwrap();

        SetDutyCycle::set_duty_cycle_fully_on(&mut pwm).unwrap();
        assert_eq!(pwm.duty_cycle_ns(), 20_000_000);

        SetDutyCycle::set_duty_cycle_fully_off(&mut pwm).unwrap();
        assert_eq!(pwm.duty_cycle_ns(), 0);

        SetDutyCycle::set_duty_cycle_percent(&mut pwm, 50).unwrap();
        assert_eq!(pwm.duty_cycle_ns(), 9_999_847);
    }
}
