/*!
Synthetic barcode rendering.

Each digit `d` is drawn as four alternating runs of `[1, 1, 1, d + 1]`
modules, so the group spans `d + 4` modules and the decoder reads it back as
`d`. Drawing starts with a bar at column 0; a closing bar fills whatever width
is left and is absorbed by the trailing-run policy.
*/

use crate::error::{CoreError, Result};
use crate::frame::Frame;

/// Intensity used for bars
pub const INK: u8 = 20;

/// Intensity used for spaces
pub const PAPER: u8 = 235;

/// Modules occupied by the closing bar at minimum
const GUARD_MODULES: usize = 4;

/// Module counts for every run of a code, excluding the closing bar
pub fn module_runs(code: &str) -> Result<Vec<usize>> {
    code.chars()
        .map(|c| {
            c.to_digit(10)
                .map(|d| [1, 1, 1, d as usize + 1])
                .ok_or_else(|| CoreError::invalid_frame(format!("cannot render {:?} as a digit", c)))
        })
        .collect::<Result<Vec<_>>>()
        .map(|groups| groups.concat())
}

/// Render a code with a fixed module width in pixels
pub fn render(code: &str, module: usize, height: usize) -> Result<Frame> {
    let units: usize = module_runs(code)?.iter().sum();
    render_sized(code, (units + GUARD_MODULES) * module, height)
}

/// Render a code into a frame of the given size using the widest module that fits
pub fn render_sized(code: &str, width: usize, height: usize) -> Result<Frame> {
    let runs = module_runs(code)?;
    let units: usize = runs.iter().sum();
    let module = width / (units + GUARD_MODULES);
    if module == 0 || height == 0 {
        return Err(CoreError::invalid_frame(format!(
            "{}x{} is too small for a {}-digit code",
            width,
            height,
            code.len()
        )));
    }

    let mut line = Vec::with_capacity(width);
    for (i, run) in runs.iter().enumerate() {
        let level = if i % 2 == 0 { INK } else { PAPER };
        line.extend(std::iter::repeat(level).take(run * module));
    }
    // Closing bar; runs.len() is a multiple of four so the last run drawn was a space
    line.resize(width, INK);

    let row: Vec<u8> = line.iter().flat_map(|&v| [v, v, v]).collect();
    Frame::from_rgb(0, width, height, row.repeat(height))
}
