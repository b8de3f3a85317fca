pub mod config;
pub mod entity;
pub mod error;
pub mod game;
pub mod grid;
pub mod input;
pub mod provider;
pub mod scheduler;
pub mod snake;
pub mod surface;

#[cfg(not(target_arch = "wasm32"))]
pub mod terminal;

#[cfg(target_arch = "wasm32")]
pub mod canvas;
#[cfg(target_arch = "wasm32")]
mod web_main;

pub use config::GameConfig;
pub use entity::{Direction, Position, SnakeNode};
pub use error::{Error, Result};
pub use game::{Game, GameStatus, GameTasks};
pub use grid::{Grid, Viewport};
pub use input::Input;
pub use provider::{FrameStatus, SchedulerProvider};
pub use scheduler::{RenderTask, Scheduler, TaskId, TickStatus, UrgentTask};
pub use snake::{Collision, Snake, SnakeState, StepOutcome};
pub use surface::{DrawContext, Surface};

#[cfg(target_arch = "wasm32")]
pub use web_main::start_game;
