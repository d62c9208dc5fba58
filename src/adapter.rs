//! Conversion between the tree-form game state and the packed board
//!
//! Callers describe a position as a tree of nested 3x3 groups. Every internal
//! node has exactly nine children and the leaves all sit at the board depth.
//! Paths are root-first lists of local digits `0..9`, and the flat leaf index
//! of a path is its base-9 reading.
//!
//! # Example
//!
//! ```
//! use fractal::adapter::{flat_index_to_path, path_to_flat_index, to_packed, TreeNode};
//! use fractal::board::{Constraint, Player, X};
//!
//! let mut tree = TreeNode::empty(2);
//! tree.play(&[4, 4], Player::X).unwrap();
//!
//! let board = to_packed(&tree, 2, &[4]).unwrap();
//! assert_eq!(board.leaf(40), X);
//! assert_eq!(board.constraint(), Some(Constraint::new(1, 4)));
//!
//! assert_eq!(flat_index_to_path(40, 2), vec![4, 4]);
//! assert_eq!(path_to_flat_index(&[4, 4]), 40);
//! ```

use serde::{Deserialize, Serialize};

use crate::board::{Board, Constraint, LookupTables, Player, DRAW, EMPTY, O, POW9, TABLES, X};
use crate::error::{EngineError, EngineResult};

/// Value carried by a tree node.
///
/// On a leaf this is the mark placed there. On an internal node it is the
/// status recorded by the caller's game logic; `Empty` means "still being
/// played" and lets the engine derive the status from the children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    #[default]
    Empty,
    X,
    O,
    Draw,
}

impl Mark {
    /// Packed cell/status value
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            Mark::Empty => EMPTY,
            Mark::X => X,
            Mark::O => O,
            Mark::Draw => DRAW,
        }
    }

    #[inline]
    pub fn from_code(code: u8) -> Mark {
        match code {
            X => Mark::X,
            O => Mark::O,
            DRAW => Mark::Draw,
            _ => Mark::Empty,
        }
    }
}

impl From<Player> for Mark {
    fn from(player: Player) -> Self {
        match player {
            Player::X => Mark::X,
            Player::O => Mark::O,
        }
    }
}

/// One node of the tree-form board
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub value: Mark,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Empty board with `depth` nested levels
    pub fn empty(depth: usize) -> TreeNode {
        let children = if depth == 0 {
            Vec::new()
        } else {
            vec![TreeNode::empty(depth - 1); 9]
        };
        TreeNode {
            value: Mark::Empty,
            children,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Node reached by following `path`, if it exists
    pub fn node(&self, path: &[u8]) -> Option<&TreeNode> {
        path.iter()
            .try_fold(self, |node, &d| node.children.get(d as usize))
    }

    /// Effective status.
    ///
    /// A recorded status wins; otherwise internal nodes derive theirs from
    /// their children through the line tables.
    pub fn status(&self) -> Mark {
        if self.value != Mark::Empty || self.is_leaf() {
            return self.value;
        }
        let key = self
            .children
            .iter()
            .take(9)
            .enumerate()
            .fold(0u32, |key, (i, child)| LookupTables::splice(key, i, child.status().code()));
        Mark::from_code(TABLES.status(key))
    }

    /// Place `player`'s mark at the leaf named by `path` and refresh the
    /// recorded status of every ancestor.
    pub fn play(&mut self, path: &[u8], player: Player) -> EngineResult<()> {
        if self.place(path, player.into()) {
            Ok(())
        } else {
            Err(EngineError::InvalidMove(path.to_vec()))
        }
    }

    fn place(&mut self, path: &[u8], mark: Mark) -> bool {
        match path.split_first() {
            None => {
                if !self.is_leaf() || self.value != Mark::Empty {
                    return false;
                }
                self.value = mark;
                true
            }
            Some((&d, rest)) => {
                if self.value != Mark::Empty {
                    return false;
                }
                let placed = match self.children.get_mut(d as usize) {
                    Some(child) => child.place(rest, mark),
                    None => false,
                };
                if placed {
                    self.value = self.status();
                }
                placed
            }
        }
    }
}

/// Base-9 digits of a leaf index, root first
pub fn flat_index_to_path(mv: usize, depth: usize) -> Vec<u8> {
    (0..depth)
        .rev()
        .map(|level| ((mv / POW9[level]) % 9) as u8)
        .collect()
}

/// Leaf index of a root-first digit path
pub fn path_to_flat_index(path: &[u8]) -> usize {
    path.iter().fold(0, |idx, &d| idx * 9 + d as usize)
}

/// Translate a constraint path into a packed constraint.
///
/// An empty path means free play. A path names a node strictly above the
/// leaves.
pub fn constraint_from_path(path: &[u8], depth: usize) -> EngineResult<Option<Constraint>> {
    if path.is_empty() {
        return Ok(None);
    }
    if path.len() >= depth || path.iter().any(|&d| d >= 9) {
        return Err(EngineError::InvalidConstraint(path.to_vec()));
    }
    Ok(Some(Constraint::new(path.len(), path_to_flat_index(path))))
}

/// Build a packed board from a tree.
///
/// Leaves are written first; then every internal node the caller recorded as
/// resolved, but whose derived status disagrees, is forced into its parent's
/// key, deepest layer first.
pub fn to_packed(tree: &TreeNode, depth: usize, constraint_path: &[u8]) -> EngineResult<Board> {
    let mut board = Board::new(depth)?;

    // recorded statuses per keyed layer (the root has no parent key)
    let mut recorded: Vec<Vec<u8>> = (0..depth).map(|layer| vec![EMPTY; POW9[layer]]).collect();
    let mut path = Vec::with_capacity(depth);
    load(tree, depth, 0, &mut path, &mut board, &mut recorded)?;

    for layer in (1..depth).rev() {
        for (idx, &status) in recorded[layer].iter().enumerate() {
            if status != EMPTY && board.node_status(layer, idx) != status {
                board.force_status(layer, idx, status);
            }
        }
    }

    board.set_constraint(constraint_from_path(constraint_path, depth)?);
    Ok(board)
}

fn load(
    node: &TreeNode,
    depth: usize,
    level: usize,
    path: &mut Vec<u8>,
    board: &mut Board,
    recorded: &mut [Vec<u8>],
) -> EngineResult<()> {
    let malformed = |path: &[u8], reason: &str| EngineError::MalformedTree {
        path: path.to_vec(),
        reason: reason.to_string(),
    };

    if level == depth {
        if !node.is_leaf() {
            return Err(malformed(path, "leaf has children"));
        }
        if node.value == Mark::Draw {
            return Err(malformed(path, "leaf marked as draw"));
        }
        board.set_cell(path_to_flat_index(path), node.value.code());
        return Ok(());
    }

    if node.children.len() != 9 {
        return Err(malformed(path, "internal node needs nine children"));
    }
    recorded[level][path_to_flat_index(path)] = node.value.code();

    for (i, child) in node.children.iter().enumerate() {
        path.push(i as u8);
        load(child, depth, level + 1, path, board, recorded)?;
        path.pop();
    }
    Ok(())
}

/// Check a candidate move against the tree it is meant for.
///
/// The path must name an empty leaf with no resolved ancestor. When the
/// constrained node is still open the move must lie inside it.
pub fn is_legal_path(tree: &TreeNode, constraint_path: &[u8], path: &[u8], depth: usize) -> bool {
    if path.len() != depth || path.iter().any(|&d| d >= 9) {
        return false;
    }

    let mut node = tree;
    for &d in path {
        if node.status() != Mark::Empty {
            return false;
        }
        match node.children.get(d as usize) {
            Some(child) => node = child,
            None => return false,
        }
    }
    if !node.is_leaf() || node.value != Mark::Empty {
        return false;
    }

    if !constraint_path.is_empty() && is_open(tree, constraint_path) {
        return path.starts_with(constraint_path);
    }
    true
}

/// True when the node at `path` and all of its ancestors are still playing
fn is_open(tree: &TreeNode, path: &[u8]) -> bool {
    let mut node = tree;
    for &d in path {
        if node.status() != Mark::Empty {
            return false;
        }
        match node.children.get(d as usize) {
            Some(child) => node = child,
            None => return false,
        }
    }
    !node.is_leaf() && node.status() == Mark::Empty
}
