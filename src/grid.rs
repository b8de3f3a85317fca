use crate::entity::{Direction, Position};

pub const LARGE_BREAKPOINT: f64 = 992.0;
pub const MEDIUM_BREAKPOINT: f64 = 576.0;

pub const LARGE_CELL: u32 = 36;
pub const MEDIUM_CELL: u32 = 30;
pub const SMALL_CELL: u32 = 22;

/// Logical (CSS pixel) size of the area the game is drawn into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Cell size in pixels, picked from the viewport width.
pub fn cell_size_for_width(viewport_width: f64) -> u32 {
    if viewport_width >= LARGE_BREAKPOINT {
        LARGE_CELL
    } else if viewport_width >= MEDIUM_BREAKPOINT {
        MEDIUM_CELL
    } else {
        SMALL_CELL
    }
}

/// Returns `(rows, columns)`. A cell of padding is reserved on the left,
/// right and top, and one more row/column is held back so the board never
/// touches the viewport edge. Degenerate viewports give `(0, 0)`.
pub fn compute_grid_size(viewport_width: f64, viewport_height: f64, cell_size: u32) -> (i32, i32) {
    if cell_size == 0 || !(viewport_width > 0.0) || !(viewport_height > 0.0) {
        return (0, 0);
    }
    let cell = cell_size as f64;
    let usable_width = viewport_width - cell * 2.0;
    let usable_height = viewport_height - cell;

    let rows = ((usable_height / cell).floor() as i32 - 1).max(0);
    let columns = ((usable_width / cell).floor() as i32 - 1).max(0);
    (rows, columns)
}

/// Boundary cells one step outside the playable rectangle, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeSet {
    pub top: Vec<Position>,
    pub bottom: Vec<Position>,
    pub left: Vec<Position>,
    pub right: Vec<Position>,
}

impl EdgeSet {
    pub fn facing(&self, direction: Direction) -> &[Position] {
        match direction {
            Direction::Up => &self.top,
            Direction::Down => &self.bottom,
            Direction::Left => &self.left,
            Direction::Right => &self.right,
        }
    }
}

/// Playable cells are `0..=columns` by `0..=rows`; the edges sit at `-1`
/// and `rows + 1` / `columns + 1`.
pub fn compute_edge_positions(rows: i32, columns: i32) -> EdgeSet {
    if rows <= 0 || columns <= 0 {
        return EdgeSet::default();
    }
    EdgeSet {
        top: (0..=columns).map(|x| Position::new(x, -1)).collect(),
        bottom: (0..=columns).map(|x| Position::new(x, rows + 1)).collect(),
        left: (0..=rows).map(|y| Position::new(-1, y)).collect(),
        right: (0..=rows).map(|y| Position::new(columns + 1, y)).collect(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub rows: i32,
    pub columns: i32,
    pub cell_size: u32,
    pub edges: EdgeSet,
}

impl Grid {
    pub fn new(rows: i32, columns: i32, cell_size: u32) -> Self {
        Self {
            rows,
            columns,
            cell_size,
            edges: compute_edge_positions(rows, columns),
        }
    }

    pub fn from_viewport(viewport: Viewport) -> Self {
        let cell_size = cell_size_for_width(viewport.width);
        let (rows, columns) = compute_grid_size(viewport.width, viewport.height, cell_size);
        Self::new(rows, columns, cell_size)
    }

    /// Recompute everything in place after the viewport changed.
    pub fn resize(&mut self, viewport: Viewport) {
        *self = Self::from_viewport(viewport);
        tracing::debug!(
            rows = self.rows,
            columns = self.columns,
            cell_size = self.cell_size,
            "grid resized"
        );
    }

    pub fn is_playable(&self) -> bool {
        self.rows > 0 && self.columns > 0
    }

    pub fn contains(&self, position: Position) -> bool {
        position.x >= 0 && position.y >= 0 && position.x <= self.columns && position.y <= self.rows
    }

    /// Top-left pixel of a cell. Cell `(0, 0)` sits one cell in from the
    /// origin so the edge cells map to the padding.
    pub fn cell_origin(&self, position: Position) -> (f64, f64) {
        let cell = self.cell_size as f64;
        ((position.x + 1) as f64 * cell, (position.y + 1) as f64 * cell)
    }

    pub fn playable_cells(&self) -> impl Iterator<Item = Position> + '_ {
        let columns = self.columns;
        let rows = if self.is_playable() { self.rows } else { -1 };
        (0..=rows).flat_map(move |y| (0..=columns).map(move |x| Position::new(x, y)))
    }
}
