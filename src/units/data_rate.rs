/*
 *  Copyright (c) 2018 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

//! Bandwidth estimates and pacing rates. Stored as bits per second, reported in
//! bytes per second.
super::relative_unit!(DataRate);

use std::fmt;
use std::ops::Mul;

use super::{DataSize, TimeDelta};

impl DataRate {
    pub const fn from_bits_per_sec(value: i64) -> Self {
        Self::from_value(value)
    }

    pub fn from_bits_per_sec_float(value: f64) -> Self {
        Self::from_value_float(value)
    }

    pub const fn from_bytes_per_sec(value: i64) -> Self {
        Self::from_fraction(8, value)
    }

    pub fn from_bytes_per_sec_float(value: f64) -> Self {
        Self::from_fraction_float(8.0, value)
    }

    pub const fn infinity() -> Self {
        Self::plus_infinity()
    }

    pub const fn bps(&self) -> i64 {
        self.to_value()
    }

    pub fn bps_float(&self) -> f64 {
        self.to_value_float()
    }

    pub fn bytes_per_sec_float(&self) -> f64 {
        self.to_fraction_float(8.0)
    }
}

impl Mul<TimeDelta> for DataRate {
    type Output = DataSize;

    fn mul(self, duration: TimeDelta) -> DataSize {
        if self.is_zero() || duration.is_zero() {
            return DataSize::zero();
        }
        if self.is_infinite() || duration.is_infinite() {
            return DataSize::infinity();
        }
        DataSize::from_bytes_float((self.bps_float() * duration.us_float() / 8_000_000.0).round())
    }
}

impl Mul<DataRate> for TimeDelta {
    type Output = DataSize;

    fn mul(self, rate: DataRate) -> DataSize {
        rate * self
    }
}

impl fmt::Debug for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_plus_infinity() {
            write!(f, "+inf bps")
        } else if self.is_minus_infinity() {
            write!(f, "-inf bps")
        } else if self.0 == 0 || self.0 % 1000 != 0 {
            write!(f, "{} bps", self.0)
        } else {
            write!(f, "{} kbps", self.0 / 1000)
        }
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn bytes_and_bits() {
        let rate = DataRate::from_bytes_per_sec(1_000);
        assert_eq!(rate.bps(), 8_000);
        assert_relative_eq!(rate.bytes_per_sec_float(), 1_000.0);
        assert_eq!(DataRate::from_bytes_per_sec_float(0.5).bps(), 4);
    }

    #[test]
    fn rate_times_duration_is_size() {
        let rate = DataRate::from_bytes_per_sec(1_000_000);
        assert_eq!(rate * TimeDelta::from_millis(50), DataSize::from_bytes(50_000));
        assert_eq!(TimeDelta::from_millis(50) * rate, DataSize::from_bytes(50_000));
        assert!((rate * TimeDelta::plus_infinity()).is_infinite());
        assert!((DataRate::zero() * TimeDelta::plus_infinity()).is_zero());
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", DataRate::from_bits_per_sec(64_000)), "64 kbps");
        assert_eq!(format!("{:?}", DataRate::from_bits_per_sec(1_500)), "1500 bps");
    }
}
