#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn moved(&self, direction: Direction) -> Self {
        match direction {
            Direction::Up => Position::new(self.x, self.y - 1),
            Direction::Down => Position::new(self.x, self.y + 1),
            Direction::Left => Position::new(self.x - 1, self.y),
            Direction::Right => Position::new(self.x + 1, self.y),
        }
    }

    /// One orthogonal step away.
    pub fn is_adjacent_to(&self, other: Position) -> bool {
        (self.x - other.x).abs() + (self.y - other.y).abs() == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    pub fn is_horizontal(&self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }

    /// Left/Right are perpendicular to Up/Down and vice versa.
    pub fn is_perpendicular_to(&self, other: Direction) -> bool {
        self.is_horizontal() != other.is_horizontal()
    }
}

/// One body segment. `previous` is where the node stood before the last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnakeNode {
    pub previous: Position,
    pub current: Position,
}

impl SnakeNode {
    pub fn at(position: Position) -> Self {
        Self {
            previous: position,
            current: position,
        }
    }
}
