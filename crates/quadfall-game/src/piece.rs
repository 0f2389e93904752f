//! The falling piece.
//!
//! A piece is a 4×4 kind matrix plus one board position per matrix slot; the
//! whole position grid shifts as the piece moves, so occupied and empty slots
//! stay aligned. Movement checks the occupied slots against the walls and the
//! settled stack before committing a shift.

use glam::IVec2;

use crate::board::{BOARD_HEIGHT, BOARD_WIDTH, Board, CellKind};

/// Piece matrix edge length.
pub const PIECE_GRID: usize = 4;

/// Slots in the piece matrix.
pub const PIECE_CELLS: usize = PIECE_GRID * PIECE_GRID;

/// Spawn origin of the piece matrix (bottom-left slot).
pub const SPAWN_X: i32 = BOARD_WIDTH as i32 / 2 - 2;
pub const SPAWN_Y: i32 = BOARD_HEIGHT as i32 - 4;

/// The seven piece shapes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PieceKind {
    I,
    O,
    L,
    J,
    T,
    S,
    Z,
}

impl PieceKind {
    pub const COUNT: usize = 7;

    pub fn from_index(index: usize) -> Self {
        match index {
            0 => PieceKind::I,
            1 => PieceKind::O,
            2 => PieceKind::L,
            3 => PieceKind::J,
            4 => PieceKind::T,
            5 => PieceKind::S,
            6 => PieceKind::Z,
            _ => panic!("piece index out of range: {index}"),
        }
    }

    /// The cell color this shape locks in as.
    pub fn color(self) -> CellKind {
        match self {
            PieceKind::I => CellKind::Cyan,
            PieceKind::O => CellKind::Yellow,
            PieceKind::L => CellKind::Orange,
            PieceKind::J => CellKind::Blue,
            PieceKind::T => CellKind::Magenta,
            PieceKind::S => CellKind::Green,
            PieceKind::Z => CellKind::Red,
        }
    }

    /// Occupied `(x, y)` slots within the 4×4 matrix.
    fn slots(self) -> [(usize, usize); 4] {
        match self {
            PieceKind::I => [(1, 0), (1, 1), (1, 2), (1, 3)],
            PieceKind::O => [(1, 1), (1, 2), (2, 1), (2, 2)],
            PieceKind::L => [(1, 1), (1, 2), (1, 3), (2, 1)],
            PieceKind::J => [(1, 1), (2, 1), (2, 2), (2, 3)],
            PieceKind::T => [(1, 1), (2, 1), (3, 1), (2, 2)],
            PieceKind::S => [(1, 1), (2, 1), (2, 2), (3, 2)],
            PieceKind::Z => [(1, 2), (2, 2), (2, 1), (3, 1)],
        }
    }
}

/// The active piece: kind matrix + per-slot board positions.
pub struct ActivePiece {
    kinds: [CellKind; PIECE_CELLS],
    positions: [IVec2; PIECE_CELLS],
}

impl ActivePiece {
    pub fn new() -> Self {
        let mut piece = Self {
            kinds: [CellKind::Empty; PIECE_CELLS],
            positions: [IVec2::ZERO; PIECE_CELLS],
        };
        piece.reset_grid();
        piece
    }

    /// Clears the matrix and re-homes the position grid at the spawn origin.
    fn reset_grid(&mut self) {
        self.kinds = [CellKind::Empty; PIECE_CELLS];
        for y in 0..PIECE_GRID {
            for x in 0..PIECE_GRID {
                self.positions[y * PIECE_GRID + x] =
                    IVec2::new(x as i32 + SPAWN_X, y as i32 + SPAWN_Y);
            }
        }
    }

    /// Respawns as `kind` at the spawn position.
    pub fn reset(&mut self, kind: PieceKind) {
        self.reset_grid();
        let color = kind.color();
        for (x, y) in kind.slots() {
            self.kinds[y * PIECE_GRID + x] = color;
        }
    }

    /// Occupied cells as `(board position, kind)` pairs.
    pub fn cells(&self) -> impl Iterator<Item = (IVec2, CellKind)> + '_ {
        self.kinds
            .iter()
            .zip(self.positions.iter())
            .filter(|(kind, _)| **kind != CellKind::Empty)
            .map(|(kind, position)| (*position, *kind))
    }

    pub fn move_left(&mut self, board: &Board) {
        for (position, _) in self.cells() {
            if position.x <= 0 || board.get(position.x - 1, position.y) != CellKind::Empty {
                return;
            }
        }
        for position in &mut self.positions {
            position.x -= 1;
        }
    }

    pub fn move_right(&mut self, board: &Board) {
        for (position, _) in self.cells() {
            if position.x >= BOARD_WIDTH as i32 - 1
                || board.get(position.x + 1, position.y) != CellKind::Empty
            {
                return;
            }
        }
        for position in &mut self.positions {
            position.x += 1;
        }
    }

    pub fn move_down(&mut self, board: &Board) {
        if self.is_on_ground(board) {
            return;
        }
        for position in &mut self.positions {
            position.y -= 1;
        }
    }

    /// Falls until grounded.
    pub fn drop_down(&mut self, board: &Board) {
        while !self.is_on_ground(board) {
            self.move_down(board);
        }
    }

    /// Whether the piece rests on the floor or on settled cells.
    pub fn is_on_ground(&self, board: &Board) -> bool {
        for (position, _) in self.cells() {
            if position.y < 1 || board.get(position.x, position.y - 1) != CellKind::Empty {
                return true;
            }
        }
        false
    }

    /// Writes the occupied cells into the board.
    pub fn lock_into(&self, board: &mut Board) {
        for (position, kind) in self.cells() {
            board.set(position.x, position.y, kind);
        }
    }
}

impl Default for ActivePiece {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawned(kind: PieceKind) -> ActivePiece {
        let mut piece = ActivePiece::new();
        piece.reset(kind);
        piece
    }

    fn min_x(piece: &ActivePiece) -> i32 {
        piece.cells().map(|(p, _)| p.x).min().expect("occupied")
    }

    fn min_y(piece: &ActivePiece) -> i32 {
        piece.cells().map(|(p, _)| p.y).min().expect("occupied")
    }

    #[test]
    fn every_shape_occupies_four_cells() {
        for index in 0..PieceKind::COUNT {
            let piece = spawned(PieceKind::from_index(index));
            assert_eq!(piece.cells().count(), 4);
        }
    }

    #[test]
    fn shapes_lock_in_their_own_color() {
        let mut board = Board::new();
        let piece = spawned(PieceKind::Z);
        piece.lock_into(&mut board);

        let locked: Vec<_> = piece.cells().collect();
        for (position, kind) in locked {
            assert_eq!(kind, CellKind::Red);
            assert_eq!(board.get(position.x, position.y), CellKind::Red);
        }
    }

    #[test]
    fn moves_shift_every_occupied_cell() {
        let board = Board::new();
        let mut piece = spawned(PieceKind::T);
        let before: Vec<_> = piece.cells().map(|(p, _)| p).collect();

        piece.move_left(&board);
        piece.move_down(&board);

        let after: Vec<_> = piece.cells().map(|(p, _)| p).collect();
        for (a, b) in before.iter().zip(after.iter()) {
            assert_eq!(*b, *a + IVec2::new(-1, -1));
        }
    }

    #[test]
    fn left_wall_stops_movement() {
        let board = Board::new();
        let mut piece = spawned(PieceKind::O);
        for _ in 0..BOARD_WIDTH * 2 {
            piece.move_left(&board);
        }
        assert_eq!(min_x(&piece), 0);
    }

    #[test]
    fn right_wall_stops_movement() {
        let board = Board::new();
        let mut piece = spawned(PieceKind::O);
        for _ in 0..BOARD_WIDTH * 2 {
            piece.move_right(&board);
        }
        let max_x = piece.cells().map(|(p, _)| p.x).max().expect("occupied");
        assert_eq!(max_x, BOARD_WIDTH as i32 - 1);
    }

    #[test]
    fn settled_cells_block_sideways_movement() {
        let mut board = Board::new();
        let mut piece = spawned(PieceKind::O);
        let blocked_x = min_x(&piece) - 1;
        for y in 0..BOARD_HEIGHT as i32 {
            board.set(blocked_x, y, CellKind::Green);
        }

        let before = min_x(&piece);
        piece.move_left(&board);
        assert_eq!(min_x(&piece), before);
    }

    #[test]
    fn drop_down_lands_on_the_floor() {
        let board = Board::new();
        let mut piece = spawned(PieceKind::I);
        piece.drop_down(&board);
        assert!(piece.is_on_ground(&board));
        assert_eq!(min_y(&piece), 0);
    }

    #[test]
    fn drop_down_stacks_on_settled_cells() {
        let mut board = Board::new();
        let mut first = spawned(PieceKind::O);
        first.drop_down(&board);
        first.lock_into(&mut board);

        let mut second = spawned(PieceKind::O);
        second.drop_down(&board);
        assert!(second.is_on_ground(&board));
        // The O occupies rows 0..2 once settled; the next lands on rows 2..4.
        assert_eq!(min_y(&second), 2);
    }

    #[test]
    fn spawn_is_airborne() {
        let board = Board::new();
        let piece = spawned(PieceKind::L);
        assert!(!piece.is_on_ground(&board));
    }
}
