//! Direct-manipulation object environment: entities on a zoomable desk,
//! a hand that drags them, stickable hosts that carry their attachments
//! and buttons that run actions against whatever they are stuck to.

pub mod action;
pub mod app;
pub mod config;
pub mod geometry;
pub mod input;
pub mod scheduler;
pub mod surface;
pub mod viewport;
pub mod world;

pub use action::{Action, ActionError, BoundFn, Receiver, ReceiverRef, SharedObject, Value};
pub use app::{run_app, AppError, LoopConfig, Renderer};
pub use config::{ConfigError, WorldConfig};
pub use geometry::{vec2, Rectangle, Vector};
pub use input::{Key, PointerButton, PointerState};
pub use scheduler::{Subscriber, TickStatsSnapshot, Timer, TimerPoll};
pub use surface::{
    SceneGraph, SceneNode, SharedSceneGraph, Surface, VisualClass, VisualHandle, VisualMark,
    VisualSpec,
};
pub use viewport::{Viewport, ViewportError, DEFAULT_SCALE_PERCENT};
pub use world::{
    Behavior, BehaviorContext, Capabilities, DragMode, Entity, EntityDesc, EntityId, Hand,
    HandState, PointerUp, Registry, World, WorldError, ENTITY_MESSAGES,
};
