//! Legal move generation with subtree skipping
//!
//! A leaf is playable when it is empty and none of its ancestors has been
//! won or filled. Rather than testing every leaf of a dead group, the scan
//! jumps straight past the whole leaf block of the first resolved ancestor it
//! meets, which keeps generation cheap on depth-4 boards.

use crate::board::{Board, EMPTY, PLAYING, POW9};

/// Collect legal leaf indices into `out` (cleared first).
///
/// With an active constraint whose sub-board is still open, only that
/// sub-board is scanned. Otherwise the whole board is.
pub fn generate_moves(board: &Board, out: &mut Vec<usize>) {
    out.clear();

    if let Some(c) = board.constraint() {
        if board.is_open(c) {
            scan(board, c.leaf_range(board.depth()), c.layer, out);
            if !out.is_empty() {
                return;
            }
        }
    }

    scan(board, 0..board.leaf_count(), 0, out);
}

/// Convenience wrapper returning a fresh vector
pub fn legal_moves(board: &Board) -> Vec<usize> {
    let mut moves = Vec::with_capacity(81);
    generate_moves(board, &mut moves);
    moves
}

/// Scan `range` for playable leaves, checking ancestors at layers
/// `min_layer..depth`.
fn scan(board: &Board, range: std::ops::Range<usize>, min_layer: usize, out: &mut Vec<usize>) {
    let depth = board.depth();
    let leaves = board.leaves();
    let mut idx = range.start;

    'leaves: while idx < range.end {
        if leaves[idx] != EMPTY {
            idx += 1;
            continue;
        }

        let mut node = idx / 9;
        for layer in (min_layer..depth).rev() {
            if board.node_status(layer, node) != PLAYING {
                // jump past every leaf under this node
                idx = (node + 1) * POW9[depth - layer];
                continue 'leaves;
            }
            node /= 9;
        }

        out.push(idx);
        idx += 1;
    }
}
