use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::Position;

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order.
/// Lookups take signed board coordinates so callers can query cells beyond
/// the edge without casting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with the specified dimensions, filled by a generator function.
    ///
    /// The generator function `f` takes `(x, y)` coordinates and returns the value for that cell.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn from_generator<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        let mut cells = Vec::with_capacity(size);
        for y in 0..height {
            for x in 0..width {
                cells.push(f(x, y));
            }
        }
        Grid {
            width,
            height,
            cells,
        }
    }

    /// Converts a board position to a flat vector index.
    ///
    /// Returns `None` for negative or out-of-range coordinates.
    #[inline]
    fn index_of(&self, pos: Position) -> Option<usize> {
        let x = usize::try_from(pos.x).ok()?;
        let y = usize::try_from(pos.y).ok()?;
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    /// Gets a reference to the cell at `pos`, or `None` outside the grid.
    pub fn get(&self, pos: Position) -> Option<&T> {
        self.index_of(pos).map(|idx| &self.cells[idx])
    }
}

impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, pos: Position) -> &Self::Output {
        match self.index_of(pos) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                pos.x, pos.y, self.width, self.height
            ),
        }
    }
}

/// Static terrain of a board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Terrain {
    #[default]
    Floor,
    Wall,
}

/// The playing field: an interior of `width x height` floor cells enclosed
/// by a one-cell ring of permanent wall.
///
/// The full grid spans `[0, width + 1] x [0, height + 1]`; anything beyond
/// that is out of scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridWorld {
    width: usize,
    height: usize,
    terrain: Grid<Terrain>,
}

impl GridWorld {
    /// Builds a world with the given interior size.
    pub fn new(width: usize, height: usize) -> Self {
        let terrain = Grid::from_generator(width + 2, height + 2, |x, y| {
            if x == 0 || y == 0 || x == width + 1 || y == height + 1 {
                Terrain::Wall
            } else {
                Terrain::Floor
            }
        });
        Self {
            width,
            height,
            terrain,
        }
    }

    /// Interior width, walls excluded.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Interior height, walls excluded.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Terrain at `pos`, or `None` when `pos` lies outside the wall ring.
    pub fn terrain_at(&self, pos: Position) -> Option<Terrain> {
        self.terrain.get(pos).copied()
    }

    /// True for floor cells strictly inside the wall ring.
    pub fn is_interior(&self, pos: Position) -> bool {
        self.terrain_at(pos) == Some(Terrain::Floor)
    }

    /// Iterates over every interior cell in row-major order.
    pub fn interior_cells(&self) -> impl Iterator<Item = Position> + '_ {
        (1..=self.height as i32)
            .flat_map(move |y| (1..=self.width as i32).map(move |x| Position::new(x, y)))
    }
}

impl Index<Position> for GridWorld {
    type Output = Terrain;

    fn index(&self, pos: Position) -> &Self::Output {
        &self.terrain[pos]
    }
}
