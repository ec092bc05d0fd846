use tracing::debug;

use crate::action::ReceiverRef;
use crate::geometry::Vector;

use super::{EntityId, World, WorldError};

impl World {
    /// Whether `candidate` may be attached to `host`.
    ///
    /// The candidate must be free (attached to nobody, this host included),
    /// must not be the host or one of its ancestors, and if it carries an
    /// action that action must apply to the host's receiver.
    pub fn can_stick(&self, host: EntityId, candidate: EntityId) -> Result<bool, WorldError> {
        let host_entity = self.live(host)?;
        let candidate_entity = self.live(candidate)?;
        if !host_entity.is_stickable() || host == candidate || candidate_entity.stuck_to.is_some() {
            return Ok(false);
        }
        if self.ancestors(host).any(|ancestor| ancestor == candidate) {
            return Ok(false);
        }
        if let Some(action) = candidate_entity.action.clone() {
            let receiver = self.receiver_of(host)?;
            if !action.can_act_on(self, Some(&receiver)) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Attaches `candidate` to `host`, capturing their current offset.
    /// Returns false when [`World::can_stick`] refuses.
    pub fn stick(&mut self, host: EntityId, candidate: EntityId) -> Result<bool, WorldError> {
        if !self.live(host)?.is_stickable() {
            return Err(WorldError::NotStickable(host));
        }
        if !self.can_stick(host, candidate)? {
            debug!(host = host.0, candidate = candidate.0, "stick_rejected");
            return Ok(false);
        }

        let offset = self.live(candidate)?.position - self.live(host)?.position;
        if let Some(host_entity) = self.entities.get_mut(&host) {
            host_entity.attached.push((candidate, offset));
        }
        if let Some(candidate_entity) = self.entities.get_mut(&candidate) {
            candidate_entity.stuck_to = Some(host);
        }
        debug!(host = host.0, candidate = candidate.0, dx = offset.x, dy = offset.y, "stuck");
        Ok(true)
    }

    /// Detaches `candidate` from `host`; false when it was not attached.
    pub fn peel(&mut self, host: EntityId, candidate: EntityId) -> Result<bool, WorldError> {
        if !self.live(host)?.is_stickable() {
            return Err(WorldError::NotStickable(host));
        }
        let peeled = self.detach(host, candidate);
        if peeled {
            debug!(host = host.0, candidate = candidate.0, "peeled");
        }
        Ok(peeled)
    }

    pub(crate) fn detach(&mut self, host: EntityId, candidate: EntityId) -> bool {
        let Some(host_entity) = self.entities.get_mut(&host) else {
            return false;
        };
        let before = host_entity.attached.len();
        host_entity.attached.retain(|(child, _)| *child != candidate);
        if host_entity.attached.len() == before {
            return false;
        }
        if let Some(candidate_entity) = self.entities.get_mut(&candidate) {
            if candidate_entity.stuck_to == Some(host) {
                candidate_entity.stuck_to = None;
            }
        }
        true
    }

    /// Offset captured when `candidate` was attached to `host`.
    pub fn attachment_offset(&self, host: EntityId, candidate: EntityId) -> Option<Vector> {
        self.entities.get(&host)?.offset_of(candidate)
    }

    /// Moves the entity and, depth first, everything attached below it.
    /// Moving to the current position does nothing.
    pub fn move_to(&mut self, id: EntityId, position: Vector) -> Result<(), WorldError> {
        self.live(id)?;
        self.propagate_move(id, position);
        Ok(())
    }

    fn propagate_move(&mut self, id: EntityId, position: Vector) {
        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };
        if entity.position == position {
            return;
        }
        entity.position = position;
        let attached = entity.attached.clone();
        self.place_visual(id);
        for (child, offset) in attached {
            self.propagate_move(child, position + offset);
        }
    }

    /// Hosts above `id`, nearest first.
    pub fn ancestors(&self, id: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        let mut next = self.entities.get(&id).and_then(|entity| entity.stuck_to);
        let mut remaining = self.entities.len();
        std::iter::from_fn(move || {
            let current = next?;
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            next = self.entities.get(&current).and_then(|entity| entity.stuck_to);
            Some(current)
        })
    }

    /// What an action attached to `host` runs against: the object a
    /// representative stands for, or the host itself.
    pub fn receiver_of(&self, host: EntityId) -> Result<ReceiverRef, WorldError> {
        let entity = self.live(host)?;
        Ok(match &entity.represents {
            Some(object) => ReceiverRef::Object(object.clone()),
            None => ReceiverRef::Entity(host),
        })
    }

    /// Receiver for an activation of `button`, `None` when it is loose.
    pub fn resolve_receiver(&self, button: EntityId) -> Result<Option<ReceiverRef>, WorldError> {
        match self.live(button)?.stuck_to {
            Some(host) => self.receiver_of(host).map(Some),
            None => Ok(None),
        }
    }

    pub fn attached_to(&self, host: EntityId) -> Result<Vec<EntityId>, WorldError> {
        Ok(self.live(host)?.attached().map(|(child, _)| child).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::super::test_support::*;
    use super::*;
    use crate::action::{Action, ActionError, Receiver, SharedObject, Value};
    use crate::geometry::vec2;
    use crate::world::EntityDesc;

    fn host(world: &mut World, name: &str, at: Vector) -> EntityId {
        world.spawn(EntityDesc::stickable(name, vec2(40.0, 40.0)).at(at))
    }

    #[test]
    fn attached_entity_follows_host_with_captured_offset() {
        let (mut world, _) = world();
        let a = host(&mut world, "a", vec2(0.0, 0.0));
        let b = world.spawn(EntityDesc::thing("b", vec2(10.0, 10.0)).at(vec2(5.0, 0.0)));

        assert!(world.stick(a, b).expect("stick"));
        assert_eq!(world.attachment_offset(a, b), Some(vec2(5.0, 0.0)));
        world.move_to(a, vec2(10.0, 10.0)).expect("move");
        assert_eq!(world.position(b).expect("b"), vec2(15.0, 10.0));
    }

    #[test]
    fn propagation_is_depth_first_through_the_forest() {
        let (mut world, _) = world();
        let root = host(&mut world, "root", vec2(0.0, 0.0));
        let middle = host(&mut world, "middle", vec2(10.0, 0.0));
        let leaf = world.spawn(EntityDesc::thing("leaf", vec2(5.0, 5.0)).at(vec2(10.0, 10.0)));
        assert!(world.stick(root, middle).expect("root-middle"));
        assert!(world.stick(middle, leaf).expect("middle-leaf"));

        world.move_to(root, vec2(-100.0, 50.0)).expect("move");
        assert_eq!(world.position(middle).expect("middle"), vec2(-90.0, 50.0));
        assert_eq!(world.position(leaf).expect("leaf"), vec2(-90.0, 60.0));
        assert_eq!(world.ancestors(leaf).collect::<Vec<_>>(), vec![middle, root]);
    }

    #[test]
    fn moving_a_child_does_not_move_its_host() {
        let (mut world, _) = world();
        let a = host(&mut world, "a", vec2(0.0, 0.0));
        let b = host(&mut world, "b", vec2(5.0, 0.0));
        world.stick(a, b).expect("stick");
        world.move_to(b, vec2(50.0, 50.0)).expect("move");
        assert_eq!(world.position(a).expect("a"), Vector::ZERO);
    }

    #[test]
    fn moving_to_the_same_position_skips_propagation() {
        let (mut world, _) = world();
        let a = host(&mut world, "a", vec2(0.0, 0.0));
        let b = world.spawn(EntityDesc::thing("b", vec2(10.0, 10.0)).at(vec2(5.0, 0.0)));
        world.stick(a, b).expect("stick");
        world.move_to(b, vec2(99.0, 99.0)).expect("stray");

        world.move_to(a, Vector::ZERO).expect("no-op");
        assert_eq!(world.position(b).expect("b"), vec2(99.0, 99.0));
    }

    #[test]
    fn cycles_and_double_attachment_are_rejected() {
        let (mut world, _) = world();
        let a = host(&mut world, "a", vec2(0.0, 0.0));
        let b = host(&mut world, "b", vec2(5.0, 0.0));
        let c = host(&mut world, "c", vec2(9.0, 0.0));

        assert!(world.stick(a, b).expect("a-b"));
        assert!(!world.can_stick(b, a).expect("b-a"));
        assert!(!world.stick(b, a).expect("b-a"));
        assert!(!world.can_stick(a, b).expect("already attached"));
        assert!(!world.can_stick(c, b).expect("attached elsewhere"));
        assert!(!world.can_stick(a, a).expect("self"));

        assert!(world.stick(b, c).expect("b-c"));
        assert!(!world.can_stick(c, a).expect("grandparent"));
    }

    #[test]
    fn peel_requires_an_existing_attachment() {
        let (mut world, _) = world();
        let a = host(&mut world, "a", vec2(0.0, 0.0));
        let b = world.spawn(EntityDesc::thing("b", vec2(10.0, 10.0)));

        assert!(!world.peel(a, b).expect("nothing to peel"));
        world.stick(a, b).expect("stick");
        assert_eq!(world.entity(b).expect("b").stuck_to(), Some(a));
        assert!(world.peel(a, b).expect("peel"));
        assert_eq!(world.entity(b).expect("b").stuck_to(), None);
        assert!(world.attached_to(a).expect("a").is_empty());

        world.move_to(a, vec2(30.0, 30.0)).expect("move");
        assert_eq!(world.position(b).expect("b"), Vector::ZERO);
    }

    #[test]
    fn passive_hosts_refuse_attachments() {
        let (mut world, _) = world();
        let rock = world.spawn(EntityDesc::thing("rock", vec2(10.0, 10.0)));
        let pebble = world.spawn(EntityDesc::thing("pebble", vec2(2.0, 2.0)));
        assert!(!world.can_stick(rock, pebble).expect("predicate"));
        assert!(matches!(
            world.stick(rock, pebble),
            Err(WorldError::NotStickable(_))
        ));
    }

    #[derive(Debug)]
    struct Mute;

    impl Receiver for Mute {
        fn describe(&self) -> String {
            "mute".to_string()
        }

        fn supports(&self, _message: &str) -> bool {
            false
        }

        fn invoke(&mut self, message: &str) -> Result<Value, ActionError> {
            Err(ActionError::invalid_message("mute", message))
        }
    }

    #[test]
    fn button_only_sticks_where_its_action_applies() {
        let (mut world, _) = world();
        let object: SharedObject = Rc::new(RefCell::new(Mute));
        let stand_in = world.spawn(EntityDesc::representative("mute", vec2(40.0, 40.0), object));
        let plain = host(&mut world, "plain", vec2(100.0, 0.0));
        let shout = world.spawn(EntityDesc::button(Action::send("shout")));
        let vaporize = world.spawn(EntityDesc::button(Action::send("vaporize")));
        let hello = world.spawn(EntityDesc::button(Action::bound("hello", |_, _| Ok(Value::Unit))));

        assert!(!world.can_stick(stand_in, shout).expect("mute rejects shout"));
        assert!(!world.can_stick(plain, shout).expect("entities reject shout"));
        assert!(world.can_stick(plain, vaporize).expect("entities vaporize"));
        assert!(!world.can_stick(stand_in, vaporize).expect("mute cannot vaporize"));
        assert!(world.can_stick(stand_in, hello).expect("bound applies anywhere"));
    }

    #[test]
    fn receiver_redirects_through_representatives() {
        let (mut world, _) = world();
        let object: SharedObject = Rc::new(RefCell::new(Mute));
        let stand_in = world.spawn(EntityDesc::representative("mute", vec2(40.0, 40.0), object.clone()));
        let plain = host(&mut world, "plain", vec2(100.0, 0.0));

        match world.receiver_of(stand_in).expect("receiver") {
            ReceiverRef::Object(found) => assert!(Rc::ptr_eq(&found, &object)),
            other => panic!("expected the represented object, got {other:?}"),
        }
        assert!(matches!(
            world.receiver_of(plain).expect("receiver"),
            ReceiverRef::Entity(id) if id == plain
        ));
    }

    #[test]
    fn destroying_a_host_frees_its_children() {
        let (mut world, _) = world();
        let a = host(&mut world, "a", vec2(0.0, 0.0));
        let b = host(&mut world, "b", vec2(5.0, 0.0));
        let c = world.spawn(EntityDesc::thing("c", vec2(2.0, 2.0)).at(vec2(6.0, 0.0)));
        world.stick(a, b).expect("a-b");
        world.stick(b, c).expect("b-c");

        world.destroy(b).expect("destroy");
        assert!(world.attached_to(a).expect("a").is_empty());
        assert_eq!(world.entity(c).expect("c").stuck_to(), None);
        assert!(world.stick(a, c).expect("c is free again"));
    }
}
