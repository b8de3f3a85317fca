use crate::entity::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Direction(Direction),
    Start,
    Pause,
    Restart,
    Quit,
}

/// Maps a DOM `KeyboardEvent.code` to an input. Unknown codes give `None`.
pub fn input_for_key_code(code: &str) -> Option<Input> {
    let input = match code {
        "ArrowRight" | "KeyD" => Input::Direction(Direction::Right),
        "ArrowDown" | "KeyS" => Input::Direction(Direction::Down),
        "ArrowLeft" | "KeyA" => Input::Direction(Direction::Left),
        "ArrowUp" | "KeyW" => Input::Direction(Direction::Up),
        "Space" | "Enter" => Input::Start,
        "KeyP" => Input::Pause,
        "KeyR" => Input::Restart,
        "KeyQ" | "Escape" => Input::Quit,
        _ => return None,
    };
    Some(input)
}
