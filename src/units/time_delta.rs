/*
 *  Copyright (c) 2018 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

//! A signed span of time: RTT samples, cooldowns, timeouts. An unknown minimum
//! is plus infinity, which compares greater than every measured span.
super::relative_unit!(TimeDelta);

use std::fmt;

impl TimeDelta {
    pub const fn from_seconds(value: i64) -> Self {
        Self::from_fraction(1_000_000, value)
    }

    pub fn from_seconds_float(value: f64) -> Self {
        Self::from_fraction_float(1_000_000.0, value)
    }

    pub const fn from_millis(value: i64) -> Self {
        Self::from_fraction(1_000, value)
    }

    pub fn from_millis_float(value: f64) -> Self {
        Self::from_fraction_float(1_000.0, value)
    }

    pub const fn from_micros(value: i64) -> Self {
        Self::from_value(value)
    }

    /// Saturates to the infinities instead of panicking.
    pub fn from_micros_float(value: f64) -> Self {
        Self::from_value_float(value)
    }

    pub fn seconds_float(&self) -> f64 {
        self.to_fraction_float(1_000_000.0)
    }

    pub fn ms_float(&self) -> f64 {
        self.to_fraction_float(1_000.0)
    }

    pub const fn us(&self) -> i64 {
        self.to_value()
    }

    pub fn us_float(&self) -> f64 {
        self.to_value_float()
    }

    pub const fn abs(&self) -> Self {
        if self.0 < 0 {
            if self.is_minus_infinity() {
                Self::plus_infinity()
            } else {
                Self(-self.0)
            }
        } else {
            *self
        }
    }
}

impl fmt::Debug for TimeDelta {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_plus_infinity() {
            write!(f, "+inf ms")
        } else if self.is_minus_infinity() {
            write!(f, "-inf ms")
        } else if self.0 == 0 || self.0 % 1000 != 0 {
            write!(f, "{} us", self.0)
        } else {
            write!(f, "{} ms", self.0 / 1000)
        }
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(TimeDelta::from_seconds(2).us(), 2_000_000);
        assert_eq!(TimeDelta::from_millis(150).us(), 150_000);
        assert_eq!(TimeDelta::from_seconds_float(0.2).us(), 200_000);
        assert_eq!(TimeDelta::from_millis_float(1.5).us(), 1_500);
        assert_relative_eq!(TimeDelta::from_millis(250).seconds_float(), 0.25);
        assert_relative_eq!(TimeDelta::from_micros(1500).ms_float(), 1.5);
    }

    #[test]
    fn infinity_behaves_as_unset_bound() {
        let unset = TimeDelta::plus_infinity();
        assert!(TimeDelta::from_seconds(3600) < unset);
        assert_eq!(unset.seconds_float(), f64::INFINITY);
        assert!((unset + TimeDelta::from_millis(1)).is_plus_infinity());
    }

    #[test]
    fn absolute_value() {
        assert_eq!(TimeDelta::from_millis(-5).abs(), TimeDelta::from_millis(5));
        assert_eq!(TimeDelta::from_millis(5).abs(), TimeDelta::from_millis(5));
        assert!(TimeDelta::minus_infinity().abs().is_plus_infinity());
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", TimeDelta::from_millis(20)), "20 ms");
        assert_eq!(format!("{:?}", TimeDelta::from_micros(1500)), "1500 us");
        assert_eq!(format!("{:?}", TimeDelta::plus_infinity()), "+inf ms");
    }
}
