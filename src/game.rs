use crate::config::GameConfig;
use crate::entity::{Direction, Position};
use crate::grid::{Grid, Viewport};
use crate::provider::SchedulerProvider;
use crate::scheduler::{BoundTask, Scheduler, TaskId, UrgentTask};
use crate::snake::{Collision, Snake, SnakeState, StepOutcome};
use crate::surface::{DrawContext, Rect, Rgb};
use std::cell::RefCell;
use std::io;
use std::rc::Rc;

/// Session status. Only Ready/Running/Pause/Fail are ever entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Ready,
    Pause,
    Running,
    Win,
    Fail,
}

pub struct Game {
    pub grid: Grid,
    pub snake: Snake,
    pub status: GameStatus,
    initial_body: Vec<Position>,
}

impl Game {
    pub fn new(viewport: Viewport, config: &GameConfig) -> Self {
        let grid = Grid::from_viewport(viewport);
        let initial_body: Vec<Position> = config
            .initial_body
            .iter()
            .map(|&(x, y)| Position::new(x, y))
            .collect();
        let body = spawn_body(&grid, &initial_body);

        Self {
            snake: Snake::new(&body),
            grid,
            status: GameStatus::Ready,
            initial_body,
        }
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn set_status(&mut self, status: GameStatus) {
        self.status = status;
    }

    /// Nothing starts on a board with no playable cells.
    pub fn start(&mut self) {
        if !self.grid.is_playable() {
            tracing::debug!(
                rows = self.grid.rows,
                columns = self.grid.columns,
                "start ignored, board too small"
            );
            return;
        }
        if matches!(self.status, GameStatus::Ready | GameStatus::Pause) {
            self.status = GameStatus::Running;
        }
    }

    pub fn pause(&mut self) {
        if self.status == GameStatus::Running {
            self.status = GameStatus::Pause;
        }
    }

    pub fn restart(&mut self) {
        let body = spawn_body(&self.grid, &self.initial_body);
        self.snake.reset(&body);
        self.status = GameStatus::Ready;
    }

    pub fn steer(&mut self, direction: Direction) -> bool {
        if matches!(self.status, GameStatus::Fail | GameStatus::Win) {
            return false;
        }
        self.snake.set_direction(direction)
    }

    /// A game in progress ends if the new board no longer holds the snake.
    pub fn resize(&mut self, viewport: Viewport) {
        self.grid.resize(viewport);
        match self.status {
            GameStatus::Ready => self.restart(),
            GameStatus::Running | GameStatus::Pause if !self.snake_fits() => {
                tracing::warn!(
                    rows = self.grid.rows,
                    columns = self.grid.columns,
                    head = ?self.snake.head().current,
                    "board shrank under the snake"
                );
                self.status = GameStatus::Fail;
            }
            _ => {}
        }
    }

    fn snake_fits(&self) -> bool {
        self.grid.is_playable() && self.snake.positions().all(|p| self.grid.contains(p))
    }

    /// Dashed outline of every playable cell.
    pub fn draw_grid(&mut self, ctx: &mut DrawContext) {
        let size = self.grid.cell_size as f64;
        for cell in self.grid.playable_cells() {
            let (x, y) = self.grid.cell_origin(cell);
            ctx.stroke_rect(Rect::square(x, y, size), Rgb::GRID);
        }
    }

    /// Step the snake (while running), then draw it.
    pub fn move_and_render(&mut self, ctx: &mut DrawContext) {
        if self.status == GameStatus::Running && self.grid.is_playable() {
            if let StepOutcome::Crashed(_) = self.snake.step(&self.grid) {
                self.status = GameStatus::Fail;
            }
        }
        self.render_snake(ctx);
    }

    pub fn render_snake(&mut self, ctx: &mut DrawContext) {
        let size = self.grid.cell_size as f64;
        let inset = (size * 0.1).floor();
        for (i, position) in self.snake.positions().enumerate() {
            let (x, y) = self.grid.cell_origin(position);
            let color = if i == 0 { Rgb::SNAKE_HEAD } else { Rgb::SNAKE };
            ctx.fill_rect(
                Rect::square(x + inset, y + inset, size - inset * 2.0),
                color,
            );
        }
    }

    pub fn draw_status(&mut self, ctx: &mut DrawContext) {
        let x = self.grid.cell_size as f64;
        let (text, color) = match (self.status, self.snake.state()) {
            _ if !self.grid.is_playable() => ("Window too small".to_string(), Rgb::CRASH),
            (GameStatus::Fail, SnakeState::Crashed(Collision::SelfCollision)) => {
                ("Bit your own tail! R to restart".to_string(), Rgb::CRASH)
            }
            (GameStatus::Fail, SnakeState::Crashed(Collision::Edge(_))) => {
                ("Hit the wall! R to restart".to_string(), Rgb::CRASH)
            }
            (GameStatus::Fail, _) => ("Board shrank! R to restart".to_string(), Rgb::CRASH),
            (GameStatus::Ready, _) => (
                "Arrows/WASD to steer, SPACE to start".to_string(),
                Rgb::WHITE,
            ),
            (GameStatus::Pause, _) => ("Paused, SPACE to resume".to_string(), Rgb::WHITE),
            (GameStatus::Running, _) => (format!("Length {}", self.snake.len()), Rgb::WHITE),
            (GameStatus::Win, _) => ("You win!".to_string(), Rgb::WHITE),
        };
        ctx.fill_text(x, 0.0, text, color);
    }

    /// Everything except the motion step, for redraws outside the schedule.
    pub fn render_board(&mut self, ctx: &mut DrawContext) {
        self.draw_grid(ctx);
        self.render_snake(ctx);
        self.draw_status(ctx);
    }
}

/// Use the configured body if it is a valid snake that fits, otherwise
/// centre a snake of the same length on the board.
fn spawn_body(grid: &Grid, initial_body: &[Position]) -> Vec<Position> {
    if is_valid_body(initial_body) && initial_body.iter().all(|p| grid.contains(*p)) {
        return initial_body.to_vec();
    }
    let head = Position::new(grid.columns / 2, grid.rows / 2);
    let length = initial_body.len().clamp(1, head.x.max(0) as usize + 1);
    (0..length as i32)
        .map(|i| Position::new(head.x - i, head.y))
        .collect()
}

/// Non-empty, every node next to the one before it, no cell used twice.
fn is_valid_body(body: &[Position]) -> bool {
    !body.is_empty()
        && body.windows(2).all(|pair| pair[0].is_adjacent_to(pair[1]))
        && body
            .iter()
            .enumerate()
            .all(|(i, p)| !body[i + 1..].contains(p))
}

/// The schedule a game registers on a provider.
pub struct GameTasks {
    pub scheduler: Scheduler,
    pub grid: TaskId,
    pub snake: TaskId,
    pub status: TaskId,
}

impl GameTasks {
    pub fn install(
        game: &Rc<RefCell<Game>>,
        provider: &mut SchedulerProvider,
        config: &GameConfig,
    ) -> Self {
        let scheduler = provider.create_scheduler();
        scheduler.set_render_interval(config.snake_interval_ms);
        scheduler.set_render_when_hidden(config.render_when_hidden);

        let grid = scheduler.add_task(game, Game::draw_grid);
        let snake = scheduler.add_task(game, Game::move_and_render);
        let status = scheduler.add_task(game, Game::draw_status);

        Self {
            scheduler,
            grid,
            snake,
            status,
        }
    }

    /// Draw the current board right away without stepping the snake.
    pub fn redraw(&self, game: &Rc<RefCell<Game>>, provider: &mut SchedulerProvider) -> io::Result<()> {
        let task = BoundTask::new(game.clone(), Game::render_board);
        provider.run_urgent(&self.scheduler, UrgentTask::Inline(&task))
    }

    pub fn uninstall(&self) {
        self.scheduler.destroy();
    }
}
