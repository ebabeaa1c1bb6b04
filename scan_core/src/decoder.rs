/*!
Unit-width digit decoder.

This is an application-specific mapping, not a symbology decoder: there is
no guard-pattern search and no checksum.

1. The narrowest run is one unit.
2. Runs are taken in non-overlapping groups of four from index 0; a trailing
   remainder of fewer than four runs is dropped.
3. Each group decodes to `round(sum / unit) - 4`.
4. Values outside 0..=9 contribute nothing.
5. At least `min_digits` characters are needed for a candidate.
*/

use crate::error::{CoreError, Result};
use crate::limits::RUNS_PER_DIGIT;
use crate::runs::RunSequence;

/// Map one group of runs to a digit value (may be out of range)
#[inline]
pub fn group_value(group: &[usize], unit_width: usize) -> i64 {
    let sum: usize = group.iter().sum();
    (sum as f64 / unit_width as f64).round() as i64 - RUNS_PER_DIGIT as i64
}

/// Decode every complete group, skipping out-of-range values
pub fn decode_digits(runs: &RunSequence) -> String {
    let Some(unit_width) = runs.unit_width() else {
        return String::new();
    };

    runs.as_slice()
        .chunks_exact(RUNS_PER_DIGIT)
        .filter_map(|group| {
            let value = group_value(group, unit_width);
            u32::try_from(value)
                .ok()
                .and_then(|v| char::from_digit(v, 10))
        })
        .collect()
}

/// Decode a run sequence into a candidate code
pub fn decode(runs: &RunSequence, min_runs: usize, min_digits: usize) -> Result<String> {
    runs.require(min_runs)?;

    let digits = decode_digits(runs);
    if digits.len() < min_digits {
        return Err(CoreError::DecodeRejected { digits: digits.len() });
    }

    Ok(digits)
}
