use std::fmt;
use std::rc::Rc;

use crate::action::{Action, ActionError, SharedObject, Value};
use crate::geometry::{vec2, Vector};
use crate::surface::{VisualClass, VisualHandle, VisualSpec};

use super::{World, WorldError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub(crate) struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub(crate) fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Per-tick logic of an active entity, plus any messages it answers.
pub trait Behavior: BehaviorClone + fmt::Debug {
    fn step(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), WorldError>;

    fn understands(&self, _message: &str) -> bool {
        false
    }

    fn receive(
        &mut self,
        message: &str,
        ctx: &mut BehaviorContext<'_>,
    ) -> Result<Value, ActionError> {
        Err(ActionError::invalid_message(ctx.describe(), message))
    }
}

pub trait BehaviorClone {
    fn clone_box(&self) -> Box<dyn Behavior>;
}

impl<T> BehaviorClone for T
where
    T: Behavior + Clone + 'static,
{
    fn clone_box(&self) -> Box<dyn Behavior> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Behavior> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// The world as seen from inside one entity's behavior.
pub struct BehaviorContext<'w> {
    world: &'w mut World,
    id: EntityId,
    tick: u64,
}

impl<'w> BehaviorContext<'w> {
    pub(crate) fn new(world: &'w mut World, id: EntityId, tick: u64) -> Self {
        Self { world, id, tick }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn position(&self) -> Vector {
        self.world
            .entity(self.id)
            .map(Entity::position)
            .unwrap_or_default()
    }

    pub fn move_to(&mut self, position: Vector) -> Result<(), WorldError> {
        self.world.move_to(self.id, position)
    }

    pub fn move_by(&mut self, delta: Vector) -> Result<(), WorldError> {
        let target = self.position() + delta;
        self.move_to(target)
    }

    pub fn describe(&self) -> String {
        self.world.describe_entity(self.id)
    }

    pub fn world(&self) -> &World {
        &*self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut *self.world
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub active: bool,
    pub stickable: bool,
    pub button: bool,
}

/// Everything needed to spawn an entity.
#[derive(Debug, Clone)]
pub struct EntityDesc {
    pub name: String,
    pub visual: VisualSpec,
    pub position: Vector,
    pub layer: Option<i32>,
    pub behavior: Option<Box<dyn Behavior>>,
    pub stickable: bool,
    pub action: Option<Rc<Action>>,
    pub represents: Option<SharedObject>,
}

const GLYPH_ADVANCE: f64 = 8.0;
const BUTTON_PADDING: f64 = 12.0;
const BUTTON_HEIGHT: f64 = 18.0;

impl EntityDesc {
    pub fn thing(name: impl Into<String>, size: Vector) -> Self {
        let name = name.into();
        Self {
            visual: VisualSpec::new(VisualClass::Thing, name.clone(), size),
            name,
            position: Vector::ZERO,
            layer: None,
            behavior: None,
            stickable: false,
            action: None,
            represents: None,
        }
    }

    pub fn stickable(name: impl Into<String>, size: Vector) -> Self {
        Self::thing(name, size).sticky()
    }

    /// A stickable stand-in whose receiver is `object` rather than itself.
    pub fn representative(name: impl Into<String>, size: Vector, object: SharedObject) -> Self {
        let mut desc = Self::stickable(name, size).with_class(VisualClass::Representative);
        desc.represents = Some(object);
        desc
    }

    /// A button sized to fit its action's label.
    pub fn button(action: impl Into<Rc<Action>>) -> Self {
        let action = action.into();
        let label = format!("{} {}", action.verb(), action.name());
        let width = label.chars().count() as f64 * GLYPH_ADVANCE + BUTTON_PADDING;
        let mut desc = Self::stickable(label, vec2(width, BUTTON_HEIGHT))
            .with_class(VisualClass::Button);
        desc.action = Some(action);
        desc
    }

    pub fn at(mut self, position: Vector) -> Self {
        self.position = position;
        self
    }

    pub fn with_layer(mut self, layer: i32) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn with_class(mut self, class: VisualClass) -> Self {
        self.visual.class = class;
        self
    }

    /// Makes the entity active: it is stepped by the timer.
    pub fn with_behavior(mut self, behavior: impl Behavior + 'static) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    pub fn sticky(mut self) -> Self {
        self.stickable = true;
        self
    }
}

#[derive(Debug)]
pub struct Entity {
    pub(crate) id: EntityId,
    pub(crate) name: String,
    pub(crate) handle: VisualHandle,
    pub(crate) position: Vector,
    pub(crate) layer: i32,
    pub(crate) capabilities: Capabilities,
    /// Taken out while the behavior runs; see [`World::step`].
    pub(crate) behavior: Option<Box<dyn Behavior>>,
    pub(crate) action: Option<Rc<Action>>,
    pub(crate) represents: Option<SharedObject>,
    /// Insertion-ordered attached entities with their captured offsets.
    pub(crate) attached: Vec<(EntityId, Vector)>,
    pub(crate) stuck_to: Option<EntityId>,
}

impl Entity {
    pub(crate) fn from_desc(id: EntityId, handle: VisualHandle, layer: i32, desc: EntityDesc) -> Self {
        let capabilities = Capabilities {
            active: desc.behavior.is_some(),
            stickable: desc.stickable || desc.action.is_some(),
            button: desc.action.is_some(),
        };
        Self {
            id,
            name: desc.name,
            handle,
            position: desc.position,
            layer: desc.layer.unwrap_or(layer),
            capabilities,
            behavior: desc.behavior,
            action: desc.action,
            represents: desc.represents,
            attached: Vec::new(),
            stuck_to: None,
        }
    }

    /// Copy placed at `offset` with its own handle and no attachments.
    /// The action and the represented object are shared, not copied.
    pub(crate) fn duplicate(&self, id: EntityId, handle: VisualHandle, offset: Vector) -> Self {
        Self {
            id,
            name: self.name.clone(),
            handle,
            position: self.position + offset,
            layer: self.layer,
            capabilities: self.capabilities,
            behavior: self.behavior.clone(),
            action: self.action.clone(),
            represents: self.represents.clone(),
            attached: Vec::new(),
            stuck_to: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> VisualHandle {
        self.handle
    }

    pub fn position(&self) -> Vector {
        self.position
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn is_active(&self) -> bool {
        self.capabilities.active
    }

    pub fn is_stickable(&self) -> bool {
        self.capabilities.stickable
    }

    pub fn is_button(&self) -> bool {
        self.capabilities.button
    }

    pub fn action(&self) -> Option<&Rc<Action>> {
        self.action.as_ref()
    }

    pub fn represents(&self) -> Option<&SharedObject> {
        self.represents.as_ref()
    }

    pub fn stuck_to(&self) -> Option<EntityId> {
        self.stuck_to
    }

    pub fn attached(&self) -> impl Iterator<Item = (EntityId, Vector)> + '_ {
        self.attached.iter().copied()
    }

    pub(crate) fn offset_of(&self, child: EntityId) -> Option<Vector> {
        self.attached
            .iter()
            .find(|(id, _)| *id == child)
            .map(|(_, offset)| *offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Still;

    impl Behavior for Still {
        fn step(&mut self, _ctx: &mut BehaviorContext<'_>) -> Result<(), WorldError> {
            Ok(())
        }
    }

    #[test]
    fn allocator_hands_out_increasing_ids() {
        let mut allocator = EntityIdAllocator::default();
        assert_eq!(allocator.allocate(), EntityId(0));
        assert_eq!(allocator.allocate(), EntityId(1));
    }

    #[test]
    fn capabilities_follow_description() {
        let passive = Entity::from_desc(
            EntityId(0),
            VisualHandle(0),
            1,
            EntityDesc::thing("rock", vec2(10.0, 10.0)),
        );
        assert_eq!(passive.capabilities(), Capabilities::default());
        assert_eq!(passive.layer(), 1);

        let active = Entity::from_desc(
            EntityId(1),
            VisualHandle(1),
            1,
            EntityDesc::stickable("tray", vec2(10.0, 10.0))
                .with_behavior(Still)
                .with_layer(4),
        );
        assert!(active.is_active());
        assert!(active.is_stickable());
        assert!(!active.is_button());
        assert_eq!(active.layer(), 4);

        let button = Entity::from_desc(
            EntityId(2),
            VisualHandle(2),
            1,
            EntityDesc::button(Action::send("vaporize")),
        );
        assert!(button.is_button());
        assert!(button.is_stickable());
        assert_eq!(button.name(), "send vaporize");
    }

    #[test]
    fn button_width_grows_with_label() {
        let short = EntityDesc::button(Action::send("go"));
        let long = EntityDesc::button(Action::send("go somewhere"));
        assert!(long.visual.size.x > short.visual.size.x);
        assert_eq!(short.visual.class, VisualClass::Button);
    }

    #[test]
    fn duplicate_shares_action_and_drops_attachments() {
        let mut original = Entity::from_desc(
            EntityId(0),
            VisualHandle(0),
            1,
            EntityDesc::button(Action::send("xerox")).at(vec2(5.0, 5.0)),
        );
        original.attached.push((EntityId(9), vec2(1.0, 1.0)));
        original.stuck_to = Some(EntityId(7));

        let copy = original.duplicate(EntityId(1), VisualHandle(1), vec2(10.0, 10.0));
        assert_eq!(copy.position(), vec2(15.0, 15.0));
        assert_eq!(copy.attached().count(), 0);
        assert_eq!(copy.stuck_to(), None);
        let (Some(a), Some(b)) = (original.action(), copy.action()) else {
            panic!("both carry an action");
        };
        assert!(Rc::ptr_eq(a, b));
    }

    #[test]
    fn entity_id_displays_with_hash() {
        assert_eq!(EntityId(12).to_string(), "#12");
    }
}
