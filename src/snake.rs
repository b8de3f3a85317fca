use crate::entity::{Direction, Position, SnakeNode};
use crate::grid::Grid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    /// The head ran into another node.
    SelfCollision,
    /// The head crossed the edge it was travelling towards.
    Edge(Direction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnakeState {
    Ready,
    Moving(Direction),
    Crashed(Collision),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// No direction yet, or already crashed.
    Idle,
    Moved,
    Crashed(Collision),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snake {
    nodes: Vec<SnakeNode>,
    direction: Option<Direction>,
    crash: Option<Collision>,
}

impl Snake {
    /// Head first. Panics on an empty body.
    pub fn new(body: &[Position]) -> Self {
        assert!(!body.is_empty(), "a snake needs at least one node");
        Self {
            nodes: body.iter().copied().map(SnakeNode::at).collect(),
            direction: None,
            crash: None,
        }
    }

    /// A horizontal snake of `length` nodes with its head at `head`, body
    /// trailing to the left.
    pub fn horizontal(head: Position, length: usize) -> Self {
        let body: Vec<Position> = (0..length.max(1) as i32)
            .map(|i| Position::new(head.x - i, head.y))
            .collect();
        Self::new(&body)
    }

    pub fn nodes(&self) -> &[SnakeNode] {
        &self.nodes
    }

    pub fn head(&self) -> &SnakeNode {
        &self.nodes[0]
    }

    pub fn tail(&self) -> &SnakeNode {
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn state(&self) -> SnakeState {
        match (self.crash, self.direction) {
            (Some(collision), _) => SnakeState::Crashed(collision),
            (None, Some(direction)) => SnakeState::Moving(direction),
            (None, None) => SnakeState::Ready,
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.nodes.iter().map(|node| node.current)
    }

    /// Whether `requested` may replace the current direction. Anything goes
    /// from a standstill, the same direction is always fine, and otherwise
    /// only a quarter turn is allowed.
    pub fn accepts(&self, requested: Direction) -> bool {
        match self.direction {
            None => true,
            Some(current) => current == requested || current.is_perpendicular_to(requested),
        }
    }

    /// Returns whether the request was taken. Rejected requests are dropped.
    pub fn set_direction(&mut self, requested: Direction) -> bool {
        if self.crash.is_some() || !self.accepts(requested) {
            return false;
        }
        self.direction = Some(requested);
        true
    }

    /// Shift every node one step. Each body node moves onto the cell its
    /// predecessor occupied before this step; the head moves one cell in the
    /// current direction.
    pub fn advance(&mut self) {
        let Some(direction) = self.direction else {
            return;
        };
        if self.crash.is_some() {
            return;
        }

        // Walk tail to head so each predecessor is still untouched when read.
        for i in (1..self.nodes.len()).rev() {
            let lead = self.nodes[i - 1].current;
            let node = &mut self.nodes[i];
            node.previous = node.current;
            node.current = lead;
        }

        let head = &mut self.nodes[0];
        head.previous = head.current;
        head.current = head.current.moved(direction);
    }

    pub fn collides_with_self(&self) -> bool {
        if self.direction.is_none() {
            return false;
        }
        let head = self.head().current;
        self.nodes[1..].iter().any(|node| node.current == head)
    }

    /// Only the edge in the direction of travel is checked.
    pub fn collides_with_edge(&self, grid: &Grid) -> bool {
        let Some(direction) = self.direction else {
            return false;
        };
        let head = self.head().current;
        grid.edges.facing(direction).contains(&head)
    }

    /// Advance, then check for collisions. A collision is terminal until
    /// [`Snake::reset`].
    pub fn step(&mut self, grid: &Grid) -> StepOutcome {
        if self.crash.is_some() || self.direction.is_none() {
            return StepOutcome::Idle;
        }
        self.advance();

        let collision = if self.collides_with_self() {
            Some(Collision::SelfCollision)
        } else if self.collides_with_edge(grid) {
            self.direction.map(Collision::Edge)
        } else {
            None
        };

        match collision {
            Some(collision) => {
                self.crash = Some(collision);
                tracing::warn!(?collision, head = ?self.head().current, "snake crashed");
                StepOutcome::Crashed(collision)
            }
            None => StepOutcome::Moved,
        }
    }

    pub fn reset(&mut self, body: &[Position]) {
        *self = Self::new(body);
    }
}
