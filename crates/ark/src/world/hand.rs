use tracing::{debug, info};

use crate::geometry::Vector;
use crate::scheduler::Subscriber;
use crate::surface::VisualMark;

use super::{EntityId, World, WorldError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HandState {
    #[default]
    Open,
    Moving,
    Holding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    /// Follow the pointer; the entity keeps its own ticks.
    Move,
    /// Lift the entity out of the world until it is put down.
    Hold,
}

/// The single pointer-drag session of a world.
#[derive(Debug, Default)]
pub struct Hand {
    state: HandState,
    held: Option<EntityId>,
    offset: Vector,
    pressed: Option<EntityId>,
}

impl Hand {
    pub fn state(&self) -> HandState {
        self.state
    }

    pub fn held(&self) -> Option<EntityId> {
        self.held
    }

    /// World-space offset from the pointer to the held entity.
    pub fn offset(&self) -> Vector {
        self.offset
    }

    /// Button under a primary press that may still become a click.
    pub fn pressed(&self) -> Option<EntityId> {
        self.pressed
    }

    pub(crate) fn grab(&mut self, id: EntityId, state: HandState, offset: Vector) {
        self.state = state;
        self.held = Some(id);
        self.offset = offset;
        self.pressed = None;
    }

    pub(crate) fn clear(&mut self) -> (HandState, Option<EntityId>) {
        let previous = (self.state, self.held.take());
        self.state = HandState::Open;
        self.offset = Vector::ZERO;
        previous
    }

    pub(crate) fn press(&mut self, id: EntityId) {
        self.pressed = Some(id);
    }

    pub(crate) fn take_press(&mut self) -> Option<EntityId> {
        self.pressed.take()
    }

    pub(crate) fn forget_press(&mut self, id: EntityId) {
        if self.pressed == Some(id) {
            self.pressed = None;
        }
    }
}

impl World {
    /// Starts dragging `id` at the current pointer position. Returns false
    /// when the hand is already busy.
    pub fn begin_drag(&mut self, id: EntityId, mode: DragMode) -> Result<bool, WorldError> {
        let position = self.live(id)?.position;
        if self.hand.state() != HandState::Open {
            debug!(entity = id.0, held = ?self.hand.held(), "drag_rejected");
            return Ok(false);
        }

        let pointer_world = self.viewport.screen_to_world(self.pointer.position());
        let state = match mode {
            DragMode::Move => HandState::Moving,
            DragMode::Hold => HandState::Holding,
        };
        self.hand.grab(id, state, position - pointer_world);
        if mode == DragMode::Hold {
            self.pick_up(id);
        }
        info!(entity = id.0, state = ?state, "drag_started");
        Ok(true)
    }

    /// Ends the drag, putting a held entity back into the world. Returns the
    /// entity that was being dragged.
    pub fn end_drag(&mut self) -> Option<EntityId> {
        let (state, held) = self.hand.clear();
        let id = held?;
        if state == HandState::Holding && self.entities.contains_key(&id) {
            self.put_down(id);
        }
        info!(entity = id.0, state = ?state, "drag_ended");
        Some(id)
    }

    /// Sticks a loose `button` to whatever host it overlaps, as a drop
    /// there would. A button that is already stuck stays where it is.
    pub fn settle_button(&mut self, button: EntityId) -> Result<bool, WorldError> {
        let entity = self.live(button)?;
        if !entity.is_button() {
            return Err(WorldError::NotAButton(button));
        }
        if entity.stuck_to.is_some() {
            return Ok(false);
        }
        Ok(self.attach_on_release(button))
    }

    pub(super) fn step_hand(&mut self) {
        let Some(id) = self.hand.held() else {
            return;
        };
        let target = self.viewport.screen_to_world(self.pointer.position()) + self.hand.offset();
        if let Err(error) = self.move_to(id, target) {
            debug!(entity = id.0, error = %error, "held_entity_vanished");
            self.let_go();
        }
    }

    /// Opens the hand without attaching anything. A held entity that still
    /// exists gets its layer and mark back, and its ticks if it is still on
    /// the surface.
    pub(super) fn let_go(&mut self) {
        let (state, held) = self.hand.clear();
        let Some(id) = held else {
            return;
        };
        if state == HandState::Holding {
            if let Some(entity) = self.entities.get(&id) {
                let handle = entity.handle;
                let layer = entity.layer;
                let active = entity.is_active();
                self.surface.set_layer(handle, layer);
                self.surface.set_mark(handle, VisualMark::Held, false);
                if active && self.registry.contains(handle) {
                    self.timer.add(Subscriber::Entity(id));
                }
            }
        }
        info!(entity = id.0, state = ?state, "drag_abandoned");
    }

    /// Lifts `id` above everything; it stops receiving ticks and a button
    /// comes off its host.
    fn pick_up(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        let handle = entity.handle;
        let active = entity.is_active();
        let button_host = entity.stuck_to.filter(|_| entity.is_button());

        self.surface.set_layer(handle, self.config.held_layer);
        self.surface.set_mark(handle, VisualMark::Held, true);
        if active {
            self.timer.remove(Subscriber::Entity(id));
        }
        if let Some(host) = button_host {
            self.detach(host, id);
            self.surface.set_mark(handle, VisualMark::Stuck, false);
            info!(button = id.0, host = host.0, "button_unstuck");
        }
    }

    fn put_down(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        let handle = entity.handle;
        let layer = entity.layer;
        let active = entity.is_active();
        let button = entity.is_button();

        self.surface.set_layer(handle, layer);
        self.surface.set_mark(handle, VisualMark::Held, false);
        if active {
            self.timer.add(Subscriber::Entity(id));
        }
        if button {
            self.attach_on_release(id);
        }
    }

    /// Sticks a released button to the topmost overlapping host that takes
    /// it, or drops it to the baseline layer.
    fn attach_on_release(&mut self, button: EntityId) -> bool {
        let candidates = match self.find_intersecting(button) {
            Ok(candidates) => candidates,
            Err(error) => {
                debug!(button = button.0, error = %error, "attach_search_failed");
                Vec::new()
            }
        };
        for host in candidates {
            let stickable = self
                .entities
                .get(&host)
                .is_some_and(|entity| entity.is_stickable());
            if !stickable || !matches!(self.stick(host, button), Ok(true)) {
                continue;
            }
            let host_layer = self.entities.get(&host).map_or(0, |entity| entity.layer);
            if self.set_layer(button, host_layer.saturating_add(1)).is_ok() {
                if let Some(entity) = self.entities.get(&button) {
                    self.surface.set_mark(entity.handle, VisualMark::Stuck, true);
                }
            }
            info!(button = button.0, host = host.0, "button_stuck");
            return true;
        }

        let baseline = self.config.baseline_layer;
        if let Err(error) = self.set_layer(button, baseline) {
            debug!(button = button.0, error = %error, "button_layer_reset_failed");
        }
        debug!(button = button.0, "button_loose");
        false
    }
}
