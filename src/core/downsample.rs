//! Coarse 128-cell view of a universe for the multi-universe dashboard

/// Cells in a downsampled frame
pub const DASHBOARD_CELLS: usize = 128;
/// Channels averaged into one cell
pub const BLOCK_SIZE: usize = 4;

/// Average each block of four channels. Missing channels read as 0, so short
/// input is treated as zero-padded.
pub fn downsample(frame: &[u8]) -> [f32; DASHBOARD_CELLS] {
    let mut cells = [0.0f32; DASHBOARD_CELLS];
    for (i, cell) in cells.iter_mut().enumerate() {
        let start = i * BLOCK_SIZE;
        let sum: u32 = (start..start + BLOCK_SIZE)
            .map(|idx| frame.get(idx).copied().unwrap_or(0) as u32)
            .sum();
        *cell = sum as f32 / BLOCK_SIZE as f32;
    }
    cells
}
