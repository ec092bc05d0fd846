mod attach;
mod dispatch;
mod entity;
mod hand;
mod registry;

pub use dispatch::{PointerUp, ENTITY_MESSAGES};
pub use entity::{
    Behavior, BehaviorClone, BehaviorContext, Capabilities, Entity, EntityDesc, EntityId,
};
pub use hand::{DragMode, Hand, HandState};
pub use registry::Registry;

use std::collections::BTreeMap;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::action::ActionError;
use crate::config::{ConfigError, WorldConfig};
use crate::geometry::{Rectangle, Vector};
use crate::input::{Key, PointerState};
use crate::scheduler::{Subscriber, TickStatsSnapshot, Timer, TimerPoll};
use crate::surface::Surface;
use crate::viewport::{Viewport, ViewportError};

use entity::EntityIdAllocator;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("entity {0} is not in the world")]
    InvalidTicket(EntityId),
    #[error("entity {0} is not a button")]
    NotAButton(EntityId),
    #[error("entity {0} cannot host attachments")]
    NotStickable(EntityId),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Viewport(#[from] ViewportError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// One independent object environment: entities, their placement on a
/// [`Surface`], the camera, the timer and the hand.
pub struct World {
    config: WorldConfig,
    surface: Box<dyn Surface>,
    allocator: EntityIdAllocator,
    entities: BTreeMap<EntityId, Entity>,
    registry: Registry,
    viewport: Viewport,
    timer: Timer,
    hand: Hand,
    pointer: PointerState,
}

impl World {
    pub fn new(config: WorldConfig, surface: Box<dyn Surface>) -> Result<Self, WorldError> {
        config.validate()?;
        let viewport = Viewport::with_scale(surface.window_size(), config.initial_scale_percent)?;
        let mut timer = Timer::new(config.ticks_per_second);
        timer.add(Subscriber::Viewport);
        timer.add(Subscriber::Hand);
        Ok(Self {
            config,
            surface,
            allocator: EntityIdAllocator::default(),
            entities: BTreeMap::new(),
            registry: Registry::default(),
            viewport,
            timer,
            hand: Hand::default(),
            pointer: PointerState::default(),
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn surface(&self) -> &dyn Surface {
        self.surface.as_ref()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn hand(&self) -> &Hand {
        &self.hand
    }

    pub fn pointer(&self) -> &PointerState {
        &self.pointer
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn is_registered(&self, id: EntityId) -> bool {
        self.entities
            .get(&id)
            .is_some_and(|entity| self.registry.contains(entity.handle))
    }

    /// A registered entity; anything else is a stale ticket.
    pub(crate) fn live(&self, id: EntityId) -> Result<&Entity, WorldError> {
        self.entities
            .get(&id)
            .filter(|entity| self.registry.contains(entity.handle))
            .ok_or(WorldError::InvalidTicket(id))
    }

    pub fn position(&self, id: EntityId) -> Result<Vector, WorldError> {
        self.live(id).map(Entity::position)
    }

    pub fn describe_entity(&self, id: EntityId) -> String {
        match self.entities.get(&id) {
            Some(entity) => format!("{} {}", entity.name, id),
            None => format!("vanished {id}"),
        }
    }

    /// Creates, registers and places an entity; active ones join the timer.
    pub fn spawn(&mut self, desc: EntityDesc) -> EntityId {
        let id = self.allocator.allocate();
        let handle = self.surface.create_handle(&desc.visual);
        let entity = Entity::from_desc(id, handle, self.config.default_layer, desc);
        self.insert(entity);
        info!(
            entity = id.0,
            name = %self.describe_entity(id),
            "entity_spawned"
        );
        id
    }

    fn insert(&mut self, entity: Entity) {
        let id = entity.id;
        let handle = entity.handle;
        let layer = entity.layer;
        let active = entity.is_active();
        self.entities.insert(id, entity);
        self.surface.set_layer(handle, layer);
        self.registry.add(&mut *self.surface, handle, id);
        if active {
            self.timer.add(Subscriber::Entity(id));
        }
        self.place_visual(id);
    }

    /// Clone-on-spawn at the configured offset.
    pub fn xerox(&mut self, id: EntityId) -> Result<EntityId, WorldError> {
        let source = self.live(id)?.handle;
        let handle = self.surface.clone_handle(source);
        let copy_id = self.allocator.allocate();
        let offset = self.config.xerox_offset;
        let copy = self.live(id)?.duplicate(copy_id, handle, offset);
        self.insert(copy);
        info!(source = id.0, entity = copy_id.0, "entity_xeroxed");
        Ok(copy_id)
    }

    /// Removes the entity from the world for good: the hand lets go, it is
    /// peeled from its host, its attachments are dropped, it leaves the timer
    /// and the registry.
    pub fn destroy(&mut self, id: EntityId) -> Result<(), WorldError> {
        if !self.entities.contains_key(&id) {
            return Err(WorldError::InvalidTicket(id));
        }
        if self.hand.held() == Some(id) {
            self.hand.clear();
        }
        self.hand.forget_press(id);

        if let Some(host) = self.entities.get(&id).and_then(|entity| entity.stuck_to) {
            self.detach(host, id);
        }
        let children: Vec<EntityId> = self
            .entities
            .get(&id)
            .map(|entity| entity.attached.iter().map(|(child, _)| *child).collect())
            .unwrap_or_default();
        for child in children {
            self.detach(id, child);
        }

        self.timer.remove(Subscriber::Entity(id));
        if let Some(entity) = self.entities.remove(&id) {
            self.registry.remove(&mut *self.surface, entity.handle);
            info!(entity = id.0, name = %entity.name, "entity_destroyed");
        }
        Ok(())
    }

    /// Puts an unregistered entity back on the surface.
    pub fn register(&mut self, id: EntityId) -> Result<bool, WorldError> {
        let handle = self
            .entities
            .get(&id)
            .map(Entity::handle)
            .ok_or(WorldError::InvalidTicket(id))?;
        let added = self.registry.add(&mut *self.surface, handle, id);
        if added {
            self.place_visual(id);
            if self.entities.get(&id).is_some_and(Entity::is_active) {
                self.timer.add(Subscriber::Entity(id));
            }
        }
        Ok(added)
    }

    /// Takes the entity off the surface and out of the timer; it keeps its
    /// state but every mutating operation on it fails until it is registered
    /// again. A hand dragging it lets go.
    pub fn unregister(&mut self, id: EntityId) -> Result<bool, WorldError> {
        let handle = self
            .entities
            .get(&id)
            .map(Entity::handle)
            .ok_or(WorldError::InvalidTicket(id))?;
        let removed = self.registry.remove(&mut *self.surface, handle);
        if removed {
            if self.hand.held() == Some(id) {
                self.let_go();
            }
            self.hand.forget_press(id);
            self.timer.remove(Subscriber::Entity(id));
        }
        Ok(removed)
    }

    pub fn set_layer(&mut self, id: EntityId, layer: i32) -> Result<(), WorldError> {
        let handle = self.live(id)?.handle;
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.layer = layer;
        }
        if self.hand.held() != Some(id) || self.hand.state() != HandState::Holding {
            self.surface.set_layer(handle, layer);
        }
        Ok(())
    }

    /// Topmost registered entity under a screen position.
    pub fn entity_at(&self, screen_pos: Vector) -> Option<EntityId> {
        self.surface
            .handle_at(screen_pos)
            .and_then(|handle| self.registry.find_owner(handle))
    }

    /// Registered entities overlapping `id` on screen, topmost first.
    pub fn find_intersecting(&self, id: EntityId) -> Result<Vec<EntityId>, WorldError> {
        let handle = self.live(id)?.handle;
        Ok(self.registry.find_intersecting(self.surface.as_ref(), handle, |other| {
            self.entities
                .get(&other)
                .map(Entity::layer)
                .unwrap_or(i32::MIN)
        }))
    }

    pub fn screen_rect(&self, id: EntityId) -> Result<Rectangle, WorldError> {
        let handle = self.live(id)?.handle;
        Ok(self.surface.bounding_rect(handle))
    }

    pub(crate) fn place_visual(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        let handle = entity.handle;
        let scale = self.viewport.scale_factor();
        let screen = self.viewport.world_to_screen(entity.position);
        let size = self.surface.natural_size(handle).scale(scale);
        if self.viewport.shows(screen, size) {
            self.surface.place(handle, screen, scale);
        } else {
            self.surface.hide(handle);
        }
    }

    /// Re-places every registered entity after a camera change.
    pub fn refresh_visuals(&mut self) {
        for id in self.registry.owners() {
            self.place_visual(id);
        }
    }

    pub fn start(&mut self, now: Instant) {
        if !self.timer.is_running() {
            info!(
                ticks_per_second = self.timer.rate(),
                subscribers = self.timer.len(),
                "timer_started"
            );
        }
        self.timer.on(now);
    }

    pub fn stop(&mut self) {
        if self.timer.is_running() {
            info!(tick = self.timer.tick(), "timer_stopped");
        }
        self.timer.off();
    }

    /// Advances one tick: the viewport and every active entity in
    /// subscription order, then the hand, so a dragged entity ends the tick
    /// under the pointer whatever its own behavior did. The subscriber list
    /// is captured before anyone runs, so joins and leaves during the tick
    /// apply from the next one.
    pub fn step(&mut self) -> u64 {
        let (tick, subscribers) = self.timer.advance();
        let mut hand_due = false;
        for subscriber in subscribers {
            match subscriber {
                Subscriber::Viewport => self.step_viewport(),
                Subscriber::Hand => hand_due = true,
                Subscriber::Entity(id) => self.step_entity(id, tick),
            }
        }
        if hand_due {
            self.step_hand();
        }
        tick
    }

    /// Runs a tick if one is due and returns when to call again; `None`
    /// once the timer is off.
    pub fn run_due(&mut self, now: Instant) -> Option<Instant> {
        match self.timer.poll(now) {
            TimerPoll::Stopped => None,
            TimerPoll::Pending(due) => Some(due),
            TimerPoll::Due => {
                self.step();
                let finished = Instant::now().max(now);
                self.timer.rearm(now, finished)
            }
        }
    }

    pub fn take_tick_stats(&mut self, now: Instant) -> Option<TickStatsSnapshot> {
        self.timer.take_stats(now)
    }

    pub fn set_tick_stats_interval(&mut self, interval: std::time::Duration) {
        self.timer.set_stats_interval(interval);
    }

    fn step_viewport(&mut self) {
        if self.viewport.step(self.surface.window_size()) {
            debug!(
                width = self.viewport.rect().dimensions.x,
                height = self.viewport.rect().dimensions.y,
                "viewport_resized"
            );
            self.refresh_visuals();
        }
    }

    fn step_entity(&mut self, id: EntityId, tick: u64) {
        let Some(mut behavior) = self
            .entities
            .get_mut(&id)
            .and_then(|entity| entity.behavior.take())
        else {
            return;
        };

        let result = behavior.step(&mut BehaviorContext::new(self, id, tick));
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.behavior = Some(behavior);
        }
        if let Err(error) = result {
            warn!(entity = id.0, tick, error = %error, "entity_step_failed");
        }
    }

    pub fn pointer_moved(&mut self, screen_pos: Vector) {
        self.pointer.set_position(screen_pos);
    }

    pub fn key_down(&mut self, key: Key) {
        if !self.pointer.set_key(key, true) {
            return;
        }
        let changed = match key {
            Key::ZoomIn => self.zoom(1),
            Key::ZoomOut => self.zoom(-1),
            Key::ResetView => self.reset_view(),
            _ => false,
        };
        if changed {
            debug!(scale_percent = self.viewport.scale_percent(), "viewport_changed");
        }
    }

    pub fn key_up(&mut self, key: Key) {
        self.pointer.set_key(key, false);
    }

    pub fn is_key_down(&self, key: Key) -> bool {
        self.pointer.is_down(key)
    }

    /// Changes the scale by whole zoom steps within the configured bounds.
    pub fn zoom(&mut self, steps: i32) -> bool {
        let changed = self.viewport.zoom_steps(
            steps,
            self.config.zoom_step_percent,
            self.config.min_scale_percent,
            self.config.max_scale_percent,
        );
        if changed {
            self.refresh_visuals();
        }
        changed
    }

    pub fn set_scale_percent(&mut self, scale_percent: f64) -> Result<(), WorldError> {
        if let Err(error) = self.viewport.set_scale_percent(scale_percent) {
            warn!(scale_percent, "viewport_rejected_scale");
            return Err(error.into());
        }
        self.refresh_visuals();
        Ok(())
    }

    pub fn pan_to(&mut self, center: Vector) {
        self.viewport.set_center(center);
        self.refresh_visuals();
    }

    /// Back to the origin at the initial scale.
    pub fn reset_view(&mut self) -> bool {
        let before = self.viewport;
        let rect = Rectangle::new(Vector::ZERO, self.surface.window_size());
        if self
            .viewport
            .reset(rect, self.config.initial_scale_percent)
            .is_err()
        {
            warn!(
                scale_percent = self.config.initial_scale_percent,
                "viewport_rejected_scale"
            );
            return false;
        }
        let changed = before != self.viewport;
        if changed {
            self.refresh_visuals();
        }
        changed
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("registered", &self.registry.len())
            .field("tick", &self.timer.tick())
            .field("hand", &self.hand)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::geometry::vec2;
    use crate::surface::SharedSceneGraph;

    pub(crate) const WINDOW: Vector = vec2(800.0, 600.0);

    pub(crate) fn world() -> (World, SharedSceneGraph) {
        let graph = SharedSceneGraph::new(WINDOW);
        let world = World::new(WorldConfig::default(), Box::new(graph.clone())).expect("world");
        (world, graph)
    }

    /// Screen position of a world point at the default camera.
    pub(crate) fn screen(world: &World, x: f64, y: f64) -> Vector {
        world.viewport().world_to_screen(vec2(x, y))
    }

    #[derive(Debug, Clone)]
    pub(crate) struct Recorder {
        pub(crate) log: Rc<RefCell<Vec<(u64, EntityId)>>>,
    }

    impl Behavior for Recorder {
        fn step(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), WorldError> {
            self.log.borrow_mut().push((ctx.tick(), ctx.id()));
            Ok(())
        }
    }

    #[derive(Debug, Clone)]
    pub(crate) struct Drift(pub(crate) Vector);

    impl Behavior for Drift {
        fn step(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), WorldError> {
            ctx.move_by(self.0)
        }
    }
}
