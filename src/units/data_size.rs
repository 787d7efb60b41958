/*
 *  Copyright (c) 2018 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

//! A byte count: delivered data, segment size, bandwidth-delay product.
super::relative_unit!(DataSize);

use std::fmt;
use std::ops::Div;

use super::{DataRate, TimeDelta};

impl DataSize {
    pub const fn from_bytes(value: i64) -> Self {
        Self::from_value(value)
    }

    pub fn from_bytes_float(value: f64) -> Self {
        Self::from_value_float(value)
    }

    pub const fn infinity() -> Self {
        Self::plus_infinity()
    }

    pub const fn bytes(&self) -> i64 {
        self.to_value()
    }

    pub fn bytes_float(&self) -> f64 {
        self.to_value_float()
    }
}

impl Div<TimeDelta> for DataSize {
    type Output = DataRate;

    fn div(self, duration: TimeDelta) -> DataRate {
        if self.is_infinite() || duration.is_zero() {
            return DataRate::infinity();
        }
        if duration.is_infinite() {
            return DataRate::zero();
        }
        DataRate::from_bits_per_sec_float(self.bytes_float() * 8_000_000.0 / duration.us_float())
    }
}

impl fmt::Debug for DataSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_plus_infinity() {
            write!(f, "+inf bytes")
        } else if self.is_minus_infinity() {
            write!(f, "-inf bytes")
        } else {
            write!(f, "{} bytes", self.0)
        }
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn divided_by_duration_gives_rate() {
        let rate = DataSize::from_bytes(1024) / TimeDelta::from_millis(1);
        assert_relative_eq!(rate.bytes_per_sec_float(), 1_024_000.0);
    }

    #[test]
    fn degenerate_durations() {
        assert!((DataSize::from_bytes(10) / TimeDelta::zero()).is_infinite());
        assert!((DataSize::from_bytes(10) / TimeDelta::plus_infinity()).is_zero());
    }

    #[test]
    fn ratio_of_sizes() {
        assert_relative_eq!(DataSize::from_bytes(5120) / DataSize::from_bytes(1024), 5.0);
    }
}
