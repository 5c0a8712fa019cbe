//! Peak detection in a 1D signal.
//!
//! A sample is reported as a peak when it is the running maximum and the
//! signal subsequently drops at least `delta` below it before rising
//! again by `delta` (hysteresis peak detection). Small ripples on a
//! plateau therefore never produce separate peaks.

use serde::{Deserialize, Serialize};

/// A detected local maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Index into the signal.
    pub index: usize,
    /// Signal value at `index`.
    pub value: f64,
}

/// Find the local maxima of `signal` that stand out by at least `delta`.
///
/// A maximum at the very end of the signal is only reported if the
/// signal has already dropped by `delta` after it, so callers looking for
/// peaks in a cyclic signal should pad it.
#[must_use = "returns the detected peaks"]
pub fn find_peaks(signal: &[f64], delta: f64) -> Vec<Peak> {
    let mut peaks = Vec::new();
    let mut max = f64::NEG_INFINITY;
    let mut max_at = 0;
    let mut min = f64::INFINITY;
    let mut looking_for_max = true;

    for (i, &v) in signal.iter().enumerate() {
        if v > max {
            max = v;
            max_at = i;
        }
        if v < min {
            min = v;
        }

        if looking_for_max {
            if v < max - delta {
                peaks.push(Peak {
                    index: max_at,
                    value: max,
                });
                min = v;
                looking_for_max = false;
            }
        } else if v > min + delta {
            max = v;
            max_at = i;
            looking_for_max = true;
        }
    }
    peaks
}
