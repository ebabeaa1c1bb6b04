/*!
Run-length extraction along one scan line.

The scan starts at column 0 with that column's value as the first run's
color. By default the run still open when the line ends is not emitted, so a
line with `n` color changes yields `n` runs. [`TrailingRun::Flush`] emits it
as well; this changes how many digits a line decodes to.
*/

use crate::error::{CoreError, Result};
use crate::threshold::BinarySignal;

/// What happens to the run still open at the end of the line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrailingRun {
    /// Drop it
    #[default]
    Drop,
    /// Append it to the sequence
    Flush,
}

/// Ordered run lengths; every entry is positive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSequence(Vec<usize>);

impl RunSequence {
    /// Wrap run lengths; `None` if any run is zero
    pub fn new(runs: Vec<usize>) -> Option<Self> {
        (!runs.contains(&0)).then_some(Self(runs))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Narrowest run, taken as one decoding unit
    pub fn unit_width(&self) -> Option<usize> {
        self.0.iter().copied().min()
    }

    /// Total samples covered
    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    /// Fail with `InsufficientPattern` below `min_runs` entries
    pub fn require(&self, min_runs: usize) -> Result<()> {
        if self.0.len() < min_runs {
            return Err(CoreError::InsufficientPattern { runs: self.0.len() });
        }
        Ok(())
    }
}

/// Extract runs from one line of binary samples
pub fn extract_line(line: &[u8], trailing: TrailingRun) -> RunSequence {
    let Some(&first) = line.first() else {
        return RunSequence::default();
    };

    let mut runs = Vec::new();
    let mut current_color = first;
    let mut current_width = 0usize;

    for &value in line {
        if value == current_color {
            current_width += 1;
        } else {
            runs.push(current_width);
            current_width = 1;
            current_color = value;
        }
    }

    if trailing == TrailingRun::Flush {
        runs.push(current_width);
    }

    RunSequence(runs)
}

/// Extract runs from row `y` of a signal; rows past the bottom yield no runs
pub fn extract(signal: &BinarySignal, y: usize, trailing: TrailingRun) -> RunSequence {
    signal
        .row(y)
        .map(|line| extract_line(line, trailing))
        .unwrap_or_default()
}
