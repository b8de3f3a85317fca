use crate::canvas::CanvasSurface;
use crate::config::GameConfig;
use crate::game::{Game, GameTasks};
use crate::grid::Viewport;
use crate::input::{input_for_key_code, Input};
use crate::provider::{FrameStatus, SchedulerProvider};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Event, KeyboardEvent};

const CANVAS_ID: &str = "gameCanvas";

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

struct App {
    game: Rc<RefCell<Game>>,
    provider: SchedulerProvider,
    tasks: GameTasks,
    loop_active: bool,
}

impl App {
    fn redraw(&mut self) {
        if let Err(e) = self.tasks.redraw(&self.game, &mut self.provider) {
            web_sys::console::error_1(&format!("[slither] redraw failed: {}", e).into());
        }
    }

    fn handle_input(&mut self, input: Input) -> bool {
        match input {
            Input::Direction(direction) => {
                self.game.borrow_mut().steer(direction);
            }
            Input::Start => {
                self.game.borrow_mut().start();
                self.provider.start();
                return true;
            }
            Input::Pause => {
                self.game.borrow_mut().pause();
                self.provider.stop();
                self.redraw();
            }
            Input::Restart => {
                self.game.borrow_mut().restart();
                self.provider.stop();
                self.redraw();
            }
            Input::Quit => {
                web_sys::console::log_1(&"[slither] quit".into());
                self.provider.stop();
            }
        }
        false
    }

    fn handle_resize(&mut self, viewport: Viewport, device_pixel_ratio: f64) {
        self.game.borrow_mut().resize(viewport);
        if let Err(e) = self.provider.resize(viewport, device_pixel_ratio) {
            web_sys::console::error_1(&format!("[slither] resize failed: {}", e).into());
        }
        self.redraw();
    }
}

fn window_viewport(window: &web_sys::Window) -> Result<Viewport, JsValue> {
    let width = window.inner_width()?.as_f64().unwrap_or(0.0);
    let height = window.inner_height()?.as_f64().unwrap_or(0.0);
    Ok(Viewport::new(width, height))
}

fn request_frame(callback: &FrameCallback) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or("no window")?;
    if let Some(closure) = callback.borrow().as_ref() {
        window.request_animation_frame(closure.as_ref().unchecked_ref())?;
    }
    Ok(())
}

/// Begin the frame loop unless it is already going.
fn ensure_loop(app: &Rc<RefCell<App>>, callback: &FrameCallback) {
    let mut state = app.borrow_mut();
    if state.loop_active {
        return;
    }
    state.loop_active = true;
    drop(state);
    if let Err(e) = request_frame(callback) {
        web_sys::console::error_1(&e);
        app.borrow_mut().loop_active = false;
    }
}

#[wasm_bindgen]
pub fn start_game() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    web_sys::console::log_1(&"[slither] starting...".into());

    let window = web_sys::window().ok_or("no window")?;
    let document = window.document().ok_or("no document")?;
    let performance = window.performance().ok_or("no performance")?;

    let config = GameConfig::default();
    let viewport = window_viewport(&window)?;
    let device_pixel_ratio = window.device_pixel_ratio();

    let surface = CanvasSurface::new(CANVAS_ID).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let mut provider = SchedulerProvider::new(Box::new(surface), viewport, device_pixel_ratio)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    provider.set_page_hidden(document.hidden());

    let game = Rc::new(RefCell::new(Game::new(viewport, &config)));
    let tasks = GameTasks::install(&game, &mut provider, &config);
    let app = Rc::new(RefCell::new(App {
        game,
        provider,
        tasks,
        loop_active: false,
    }));
    app.borrow_mut().redraw();

    // Frame loop: ends by itself once the provider reports it has stopped.
    let callback: FrameCallback = Rc::new(RefCell::new(None));
    let next = callback.clone();
    let frame_app = app.clone();
    *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        let now = performance.now();
        let status = frame_app.borrow_mut().provider.frame(now);
        match status {
            Ok(FrameStatus::Running) => {
                if let Err(e) = request_frame(&next) {
                    web_sys::console::error_1(&e);
                    frame_app.borrow_mut().loop_active = false;
                }
            }
            Ok(FrameStatus::Stopped) => frame_app.borrow_mut().loop_active = false,
            Err(e) => {
                web_sys::console::error_1(&format!("[slither] frame failed: {}", e).into());
                frame_app.borrow_mut().loop_active = false;
            }
        }
    }) as Box<dyn FnMut()>));

    let key_app = app.clone();
    let key_callback = callback.clone();
    let keydown = Closure::wrap(Box::new(move |event: KeyboardEvent| {
        if let Some(input) = input_for_key_code(&event.code()) {
            event.prevent_default();
            let wants_loop = key_app.borrow_mut().handle_input(input);
            if wants_loop {
                ensure_loop(&key_app, &key_callback);
            }
        }
    }) as Box<dyn FnMut(KeyboardEvent)>);
    window.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
    keydown.forget();

    let resize_app = app.clone();
    let resize = Closure::wrap(Box::new(move |_event: Event| {
        let Some(window) = web_sys::window() else {
            return;
        };
        match window_viewport(&window) {
            Ok(viewport) => resize_app
                .borrow_mut()
                .handle_resize(viewport, window.device_pixel_ratio()),
            Err(e) => web_sys::console::error_1(&e),
        }
    }) as Box<dyn FnMut(Event)>);
    window.add_event_listener_with_callback("resize", resize.as_ref().unchecked_ref())?;
    resize.forget();

    let visibility_app = app.clone();
    let visibility_document = document.clone();
    let visibility = Closure::wrap(Box::new(move |_event: Event| {
        visibility_app
            .borrow_mut()
            .provider
            .set_page_hidden(visibility_document.hidden());
    }) as Box<dyn FnMut(Event)>);
    document
        .add_event_listener_with_callback("visibilitychange", visibility.as_ref().unchecked_ref())?;
    visibility.forget();

    web_sys::console::log_1(&"[slither] ready, press SPACE to start".into());
    Ok(())
}
