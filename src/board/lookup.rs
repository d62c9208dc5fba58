//! Precomputed status and heuristic tables for every 3x3 group
//!
//! A group is encoded as nine 2-bit fields (cell `i` at bit offset `2 * i`),
//! giving 4^9 = 262144 possible keys. Both tables are built once per process
//! and are read-only afterwards, so every status/score lookup during search
//! is a single array access.
//!
//! # Example
//!
//! ```
//! use fractal::board::{LookupTables, TABLES, X, EMPTY, PLAYING};
//!
//! let key = LookupTables::encode(&[X, X, X, EMPTY, EMPTY, EMPTY, EMPTY, EMPTY, EMPTY]);
//! assert_eq!(TABLES.status(key), X);
//! assert_eq!(TABLES.status(0), PLAYING);
//! ```

use once_cell::sync::Lazy;

use super::{DRAW, EMPTY, O, PLAYING, X};

/// Number of distinct group encodings (4^9)
pub const KEY_COUNT: usize = 1 << 18;

/// The 8 winning lines of a 3x3 group
pub const WIN_LINES: [[usize; 3]; 8] = [
    // rows
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    // columns
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    // diagonals
    [0, 4, 8],
    [2, 4, 6],
];

/// Heuristic weights (X-positive)
pub struct GroupScore;

impl GroupScore {
    /// Group won outright
    pub const WIN: i32 = 1000;
    /// Two marks on an otherwise empty line
    pub const THREAT: i32 = 100;
    /// One mark on an otherwise empty line
    pub const OPEN_LINE: i32 = 10;
    /// Holding the center cell
    pub const CENTER: i32 = 5;
    /// Holding a corner cell
    pub const CORNER: i32 = 2;
}

const CORNERS: [usize; 4] = [0, 2, 6, 8];

/// Process-wide lookup tables, built on first use
pub static TABLES: Lazy<LookupTables> = Lazy::new(LookupTables::build);

/// Dense status / score tables indexed by packed group key.
pub struct LookupTables {
    status: Box<[u8]>,
    score: Box<[i16]>,
}

impl LookupTables {
    /// Build both tables by classifying all 262144 encodings.
    #[must_use]
    pub fn build() -> Self {
        let mut status = vec![PLAYING; KEY_COUNT].into_boxed_slice();
        let mut score = vec![0i16; KEY_COUNT].into_boxed_slice();

        for key in 0..KEY_COUNT {
            let cells = Self::decode(key as u32);
            let st = classify(&cells);
            status[key] = st;
            score[key] = heuristic(&cells, st) as i16;
        }

        Self { status, score }
    }

    /// Derived status of a group: `PLAYING`, `X`, `O` or `DRAW`
    #[inline]
    pub fn status(&self, key: u32) -> u8 {
        self.status[key as usize]
    }

    /// Heuristic value of a group, positive favours X
    #[inline]
    pub fn score(&self, key: u32) -> i32 {
        i32::from(self.score[key as usize])
    }

    /// Pack nine cell values into a key.
    #[inline]
    pub fn encode(cells: &[u8; 9]) -> u32 {
        cells
            .iter()
            .enumerate()
            .fold(0u32, |key, (i, &c)| key | (u32::from(c & 3) << (2 * i)))
    }

    /// Unpack a key into nine cell values.
    #[inline]
    pub fn decode(key: u32) -> [u8; 9] {
        let mut cells = [EMPTY; 9];
        for (i, cell) in cells.iter_mut().enumerate() {
            *cell = ((key >> (2 * i)) & 3) as u8;
        }
        cells
    }

    /// Read the 2-bit field of child `offset`
    #[inline]
    pub fn field(key: u32, offset: usize) -> u8 {
        ((key >> (2 * offset)) & 3) as u8
    }

    /// Replace the 2-bit field of child `offset`
    #[inline]
    pub fn splice(key: u32, offset: usize, value: u8) -> u32 {
        let shift = 2 * offset;
        (key & !(3 << shift)) | (u32::from(value) << shift)
    }
}

fn classify(cells: &[u8; 9]) -> u8 {
    for line in &WIN_LINES {
        let a = cells[line[0]];
        if (a == X || a == O) && a == cells[line[1]] && a == cells[line[2]] {
            return a;
        }
    }
    if cells.iter().all(|&c| c != EMPTY) {
        DRAW
    } else {
        PLAYING
    }
}

fn heuristic(cells: &[u8; 9], status: u8) -> i32 {
    match status {
        X => return GroupScore::WIN,
        O => return -GroupScore::WIN,
        DRAW => return 0,
        _ => {}
    }

    let mut score = 0;
    for line in &WIN_LINES {
        let mut xs = 0;
        let mut os = 0;
        let mut dead = false;
        for &i in line {
            match cells[i] {
                X => xs += 1,
                O => os += 1,
                DRAW => dead = true,
                _ => {}
            }
        }
        if dead || (xs > 0 && os > 0) {
            continue;
        }
        score += match (xs, os) {
            (2, 0) => GroupScore::THREAT,
            (1, 0) => GroupScore::OPEN_LINE,
            (0, 2) => -GroupScore::THREAT,
            (0, 1) => -GroupScore::OPEN_LINE,
            _ => 0,
        };
    }

    score += mark_sign(cells[4]) * GroupScore::CENTER;
    for &c in &CORNERS {
        score += mark_sign(cells[c]) * GroupScore::CORNER;
    }
    score
}

#[inline]
fn mark_sign(cell: u8) -> i32 {
    match cell {
        X => 1,
        O => -1,
        _ => 0,
    }
}
