//! Rolling history of max-hold rows for the waterfall display.

use std::sync::Mutex;

use crate::proto::ScanReading;

pub static DEFAULT_ROWS: usize = 200;
/// Initial cell level, below any power the scanner reports.
pub static FLOOR_DBM: f32 = -90.0;

/// Fixed-height matrix of the last N max-hold rows, one column per
/// scan channel. Rows shift toward index 0 as readings arrive; the
/// newest row is always last. A change in channel count or first
/// frequency means the scan range moved, which restarts the history
/// from a floor-filled grid.
pub struct Waterfall {
    rows: usize,
    floor: f32,
    state: Mutex<Option<Grid>>,
}

struct Grid {
    cols: usize,
    first_freq: i32,
    // row-major, rows * cols cells
    data: Vec<f32>,
}

impl Grid {
    fn push(&mut self, row: &[f32]) {
        self.data.copy_within(self.cols.., 0);
        let tail = self.data.len() - self.cols;
        self.data[tail..].copy_from_slice(row);
    }
}

impl Waterfall {
    pub fn new(rows: usize, floor: f32) -> Waterfall {
        Waterfall {
            rows,
            floor,
            state: Mutex::new(None),
        }
    }

    /// Fold one reading's max-hold values into the history.
    pub fn observe(&self, reading: &ScanReading) {
        if reading.is_empty() {
            return;
        }
        let mut state = self.state.lock().unwrap();
        let needs_init = match state.as_ref() {
            Some(grid) => {
                grid.cols != reading.len() || grid.first_freq != reading.freqs[0]
            }
            None => true,
        };
        if needs_init {
            *state = Some(Grid {
                cols: reading.len(),
                first_freq: reading.freqs[0],
                data: vec![self.floor; self.rows * reading.len()],
            });
        }
        let row: Vec<f32> = reading.max.iter().map(|&v| v as f32).collect();
        if let Some(grid) = state.as_mut() {
            grid.push(&row);
        }
    }

    /// Copy of the current grid, `None` before the first reading.
    pub fn snapshot(&self) -> Option<WaterfallSnapshot> {
        let state = self.state.lock().unwrap();
        state.as_ref().map(|grid| WaterfallSnapshot {
            rows: self.rows,
            cols: grid.cols,
            data: grid.data.clone(),
        })
    }
}

impl Default for Waterfall {
    fn default() -> Waterfall {
        Waterfall::new(DEFAULT_ROWS, FLOOR_DBM)
    }
}

/// Owned copy of the waterfall grid, detached from the live history.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterfallSnapshot {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl WaterfallSnapshot {
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }
}
