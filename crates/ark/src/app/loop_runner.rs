use std::sync::Arc;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use super::renderer::Renderer;
use crate::config::WorldConfig;
use crate::geometry::vec2;
use crate::input::{Key, PointerButton};
use crate::surface::SharedSceneGraph;
use crate::world::{PointerUp, World, WorldError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    /// How often tick statistics are logged; zero falls back to one second.
    pub metrics_log_interval_ms: u64,
    pub world: WorldConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Ark".to_string(),
            window_width: 1024,
            window_height: 768,
            metrics_log_interval_ms: 1_000,
            world: WorldConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("failed to build the world: {0}")]
    World(#[from] WorldError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

/// Opens a window, builds a [`World`] over it, lets `setup` populate the
/// world and then drives the timer and input until the window closes.
pub fn run_app<F>(config: LoopConfig, setup: F) -> Result<(), AppError>
where
    F: FnOnce(&mut World) -> Result<(), WorldError>,
{
    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(Arc::clone(&window)).map_err(AppError::CreateRenderer)?;

    let size = window.inner_size();
    let graph = SharedSceneGraph::new(vec2(size.width as f64, size.height as f64));
    let mut world = World::new(config.world.clone(), Box::new(graph.clone()))?;
    let metrics_log_interval = normalize_non_zero_duration(
        Duration::from_millis(config.metrics_log_interval_ms),
        Duration::from_secs(1),
    );
    world.set_tick_stats_interval(metrics_log_interval);
    setup(&mut world)?;

    info!(
        ticks_per_second = config.world.ticks_per_second,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        window_width = size.width,
        window_height = size.height,
        entity_count = world.entity_count(),
        "loop_config"
    );
    world.start(Instant::now());

    let window_for_loop = Arc::clone(&window);
    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window_for_loop.id() => {
                match event {
                    WindowEvent::CloseRequested => {
                        info!(reason = "window_close", "shutdown_requested");
                        window_target.exit();
                    }
                    WindowEvent::Resized(new_size) => {
                        graph.set_window_size(vec2(new_size.width as f64, new_size.height as f64));
                        if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                            warn!(error = %error, "renderer_resize_failed");
                            window_target.exit();
                        }
                    }
                    WindowEvent::ScaleFactorChanged { .. } => {
                        let size = window_for_loop.inner_size();
                        graph.set_window_size(vec2(size.width as f64, size.height as f64));
                        if let Err(error) = renderer.resize(size.width, size.height) {
                            warn!(error = %error, "renderer_resize_failed");
                            window_target.exit();
                        }
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        world.pointer_moved(vec2(position.x, position.y));
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        let Some(button) = pointer_button_from_mouse(button) else {
                            return;
                        };
                        match state {
                            ElementState::Pressed => {
                                let at = world.pointer().position();
                                world.button_down(at, button);
                            }
                            ElementState::Released => {
                                if let PointerUp::Activated { button, result } = world.button_up() {
                                    debug!(button = %button, ok = result.is_ok(), "click_handled");
                                }
                            }
                        }
                        window_for_loop.request_redraw();
                    }
                    WindowEvent::MouseWheel { delta, .. } => {
                        let steps = zoom_steps_from_scroll_delta(delta);
                        if steps != 0 && world.zoom(steps) {
                            window_for_loop.request_redraw();
                        }
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        let PhysicalKey::Code(code) = event.physical_key else {
                            return;
                        };
                        if code == KeyCode::Escape && event.state == ElementState::Pressed {
                            info!(reason = "escape_key", "shutdown_requested");
                            window_target.exit();
                            return;
                        }
                        let Some(key) = key_from_code(code) else {
                            return;
                        };
                        match event.state {
                            ElementState::Pressed => world.key_down(key),
                            ElementState::Released => world.key_up(key),
                        }
                        window_for_loop.request_redraw();
                    }
                    WindowEvent::RedrawRequested => {
                        if let Err(error) = renderer.render(&graph.borrow()) {
                            warn!(error = %error, "renderer_draw_failed");
                            window_target.exit();
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                let now = Instant::now();
                let tick_before = world.timer().tick();
                match world.run_due(now) {
                    Some(next) => window_target.set_control_flow(ControlFlow::WaitUntil(next)),
                    None => window_target.set_control_flow(ControlFlow::Wait),
                }
                if world.timer().tick() != tick_before {
                    window_for_loop.request_redraw();
                }
                if let Some(snapshot) = world.take_tick_stats(now) {
                    info!(
                        tps = snapshot.tps,
                        mean_tick_ms = snapshot.mean_tick_ms,
                        slow_ticks = snapshot.slow_ticks,
                        entity_count = world.entity_count(),
                        "loop_metrics"
                    );
                }
            }
            Event::LoopExiting => {
                world.stop();
                info!(entity_count = world.entity_count(), "shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn pointer_button_from_mouse(button: MouseButton) -> Option<PointerButton> {
    match button {
        MouseButton::Left => Some(PointerButton::Primary),
        MouseButton::Middle => Some(PointerButton::Middle),
        MouseButton::Right => Some(PointerButton::Secondary),
        _ => None,
    }
}

fn key_from_code(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::ShiftLeft | KeyCode::ShiftRight => Some(Key::Shift),
        KeyCode::ControlLeft | KeyCode::ControlRight => Some(Key::Control),
        KeyCode::AltLeft | KeyCode::AltRight => Some(Key::Alt),
        KeyCode::SuperLeft | KeyCode::SuperRight => Some(Key::Meta),
        KeyCode::Equal | KeyCode::NumpadAdd => Some(Key::ZoomIn),
        KeyCode::Minus | KeyCode::NumpadSubtract => Some(Key::ZoomOut),
        KeyCode::Digit0 | KeyCode::Numpad0 => Some(Key::ResetView),
        _ => None,
    }
}

fn zoom_steps_from_scroll_delta(delta: MouseScrollDelta) -> i32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y.round() as i32,
        MouseScrollDelta::PixelDelta(position) => {
            if position.y > 0.0 {
                1
            } else if position.y < 0.0 {
                -1
            } else {
                0
            }
        }
    }
}
