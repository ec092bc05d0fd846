use tracing::{info, warn};

use crate::action::{ActionError, ReceiverRef, Value};
use crate::geometry::Vector;
use crate::input::{Key, PointerButton};

use super::{BehaviorContext, DragMode, EntityId, World, WorldError};

/// Messages every registered entity answers.
pub const ENTITY_MESSAGES: [&str; 4] = ["xerox", "vaporize", "name", "position"];

/// What a pointer release did.
#[derive(Debug)]
pub enum PointerUp {
    Ignored,
    Released(EntityId),
    Activated {
        button: EntityId,
        result: Result<Value, WorldError>,
    },
}

impl World {
    /// Routes a press to the entity under `screen_pos`: Shift with the
    /// primary button moves it, the middle or secondary button holds it,
    /// a plain primary press on a button arms a click.
    pub fn button_down(&mut self, screen_pos: Vector, button: PointerButton) -> Option<EntityId> {
        self.pointer.set_position(screen_pos);
        let target = self.entity_at(screen_pos)?;

        let mode = match button {
            PointerButton::Primary if self.pointer.is_down(Key::Shift) => Some(DragMode::Move),
            PointerButton::Primary => None,
            PointerButton::Middle | PointerButton::Secondary => Some(DragMode::Hold),
        };
        match mode {
            Some(mode) => match self.begin_drag(target, mode) {
                Ok(true) => Some(target),
                Ok(false) | Err(_) => None,
            },
            None => {
                let is_button = self.entity(target).is_some_and(|entity| entity.is_button());
                if !is_button || self.hand.state() != super::HandState::Open {
                    return None;
                }
                self.hand.press(target);
                Some(target)
            }
        }
    }

    /// Ends a drag, or completes a click when the pointer comes up over the
    /// same button it went down on.
    pub fn button_up(&mut self) -> PointerUp {
        let pressed = self.hand.take_press();
        if let Some(released) = self.end_drag() {
            return PointerUp::Released(released);
        }
        let Some(button) = pressed else {
            return PointerUp::Ignored;
        };
        if self.entity_at(self.pointer.position()) != Some(button) {
            return PointerUp::Ignored;
        }
        let result = self.activate(button);
        PointerUp::Activated { button, result }
    }

    /// Runs the button's action against its resolved receiver. A rejected
    /// action changes nothing and surfaces as an error.
    pub fn activate(&mut self, button: EntityId) -> Result<Value, WorldError> {
        let action = self
            .live(button)?
            .action
            .clone()
            .ok_or(WorldError::NotAButton(button))?;
        let receiver = self.resolve_receiver(button)?;
        let target = self.describe_receiver(receiver.as_ref());

        match action.run(self, receiver.as_ref()) {
            Ok(value) => {
                info!(
                    button = button.0,
                    verb = action.verb(),
                    action = action.name(),
                    receiver = %target,
                    result = %value,
                    "action_ran"
                );
                Ok(value)
            }
            Err(error) => {
                warn!(
                    button = button.0,
                    action = action.name(),
                    receiver = %target,
                    error = %error,
                    "action_rejected"
                );
                Err(error.into())
            }
        }
    }

    pub fn understands(&self, receiver: &ReceiverRef, message: &str) -> bool {
        match receiver {
            ReceiverRef::Entity(id) => self.live(*id).is_ok_and(|entity| {
                ENTITY_MESSAGES.contains(&message)
                    || entity
                        .behavior
                        .as_ref()
                        .is_some_and(|behavior| behavior.understands(message))
            }),
            ReceiverRef::Object(object) => object
                .try_borrow()
                .is_ok_and(|object| object.supports(message)),
        }
    }

    /// Delivers `message` to `receiver`.
    pub fn send(&mut self, receiver: &ReceiverRef, message: &str) -> Result<Value, ActionError> {
        match receiver {
            ReceiverRef::Entity(id) => self.send_to_entity(*id, message),
            ReceiverRef::Object(object) => {
                let mut object = object.try_borrow_mut().map_err(|_| ActionError::Failed {
                    action: message.to_string(),
                    reason: "receiver is busy".to_string(),
                })?;
                if !object.supports(message) {
                    return Err(ActionError::invalid_message(object.describe(), message));
                }
                object.invoke(message)
            }
        }
    }

    fn send_to_entity(&mut self, id: EntityId, message: &str) -> Result<Value, ActionError> {
        let entity = self.live(id)?;
        match message {
            "xerox" => Ok(Value::Entity(self.xerox(id)?)),
            "vaporize" => {
                self.destroy(id)?;
                Ok(Value::Unit)
            }
            "name" => Ok(Value::Text(entity.name.clone())),
            "position" => Ok(Value::Vector(entity.position)),
            _ => {
                let understood = entity
                    .behavior
                    .as_ref()
                    .is_some_and(|behavior| behavior.understands(message));
                if !understood {
                    return Err(ActionError::invalid_message(self.describe_entity(id), message));
                }
                let Some(mut behavior) = self
                    .entities
                    .get_mut(&id)
                    .and_then(|entity| entity.behavior.take())
                else {
                    return Err(ActionError::invalid_message(self.describe_entity(id), message));
                };
                let tick = self.timer.tick();
                let result = behavior.receive(message, &mut BehaviorContext::new(self, id, tick));
                if let Some(entity) = self.entities.get_mut(&id) {
                    entity.behavior = Some(behavior);
                }
                result
            }
        }
    }

    pub fn describe_receiver(&self, receiver: Option<&ReceiverRef>) -> String {
        match receiver {
            None => "nothing".to_string(),
            Some(ReceiverRef::Entity(id)) => self.describe_entity(*id),
            Some(ReceiverRef::Object(object)) => match object.try_borrow() {
                Ok(object) => object.describe(),
                Err(_) => "busy object".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::super::test_support::*;
    use super::*;
    use crate::action::{Action, Receiver, SharedObject};
    use crate::geometry::vec2;
    use crate::world::{Behavior, EntityDesc, HandState};

    #[derive(Debug)]
    struct Switch {
        on: bool,
    }

    impl Receiver for Switch {
        fn describe(&self) -> String {
            format!("switch ({})", if self.on { "on" } else { "off" })
        }

        fn supports(&self, message: &str) -> bool {
            message == "toggle"
        }

        fn invoke(&mut self, message: &str) -> Result<Value, ActionError> {
            match message {
                "toggle" => {
                    self.on = !self.on;
                    Ok(Value::Bool(self.on))
                }
                other => Err(ActionError::invalid_message(self.describe(), other)),
            }
        }
    }

    fn click(world: &mut World, id: EntityId) -> PointerUp {
        let at = world
            .screen_rect(id)
            .expect("button on screen")
            .center;
        world.button_down(at, PointerButton::Primary);
        world.button_up()
    }

    #[test]
    fn loose_bound_button_runs_unbound() {
        let (mut world, _) = world();
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        let button = world.spawn(EntityDesc::button(Action::bound("probe", move |_, receiver| {
            *sink.borrow_mut() = Some(receiver.is_some());
            Ok(Value::Unit)
        })));

        assert!(matches!(
            click(&mut world, button),
            PointerUp::Activated { result: Ok(Value::Unit), .. }
        ));
        assert_eq!(*seen.borrow(), Some(false));
    }

    #[test]
    fn stuck_button_sends_to_represented_object() {
        let (mut world, _) = world();
        let switch = Rc::new(RefCell::new(Switch { on: false }));
        let object: SharedObject = switch.clone();
        let stand_in = world.spawn(EntityDesc::representative("switch", vec2(60.0, 60.0), object));
        let toggle = world.spawn(EntityDesc::button(Action::send("toggle")).at(vec2(0.0, 10.0)));
        assert!(world.stick(stand_in, toggle).expect("stick"));

        assert_eq!(world.activate(toggle).expect("toggle"), Value::Bool(true));
        assert!(switch.borrow().on);
        assert_eq!(world.activate(toggle).expect("toggle"), Value::Bool(false));
    }

    #[test]
    fn rejected_send_reports_invalid_message_and_changes_nothing() {
        let (mut world, _) = world();
        let host = world.spawn(EntityDesc::stickable("host", vec2(60.0, 60.0)));
        let button = world.spawn(EntityDesc::button(Action::send("position")));
        world.stick(host, button).expect("stick");

        let switch: SharedObject = Rc::new(RefCell::new(Switch { on: false }));
        let loose = world.spawn(EntityDesc::button(Action::send("toggle")).at(vec2(300.0, 0.0)));
        assert!(matches!(
            world.activate(loose),
            Err(WorldError::Action(ActionError::InvalidMessage { .. }))
        ));
        assert!(world.understands(&ReceiverRef::Object(switch), "toggle"));
        assert_eq!(world.entity_count(), 3);
    }

    #[test]
    fn entity_messages_xerox_and_vaporize_the_host() {
        let (mut world, _) = world();
        let host = world.spawn(EntityDesc::stickable("host", vec2(60.0, 60.0)).at(vec2(20.0, 20.0)));
        let xerox = world.spawn(EntityDesc::button(Action::send("xerox")).at(vec2(20.0, 20.0)));
        let vaporize = world.spawn(EntityDesc::button(Action::send("vaporize")).at(vec2(30.0, 20.0)));
        world.stick(host, xerox).expect("stick xerox");
        world.stick(host, vaporize).expect("stick vaporize");

        let copy = match world.activate(xerox).expect("xerox") {
            Value::Entity(copy) => copy,
            other => panic!("expected a new entity, got {other:?}"),
        };
        assert_eq!(world.position(copy).expect("copy"), vec2(30.0, 30.0));
        assert!(world.attached_to(copy).expect("copy").is_empty());

        assert_eq!(world.activate(vaporize).expect("vaporize"), Value::Unit);
        assert!(world.entity(host).is_none());
        assert_eq!(world.entity(xerox).expect("xerox").stuck_to(), None);
        assert!(matches!(
            world.activate(vaporize),
            Err(WorldError::Action(ActionError::InvalidMessage { .. }))
        ));
    }

    #[test]
    fn activating_a_non_button_is_an_error() {
        let (mut world, _) = world();
        let rock = world.spawn(EntityDesc::thing("rock", vec2(10.0, 10.0)));
        assert!(matches!(world.activate(rock), Err(WorldError::NotAButton(_))));
        world.destroy(rock).expect("destroy");
        assert!(matches!(world.activate(rock), Err(WorldError::InvalidTicket(_))));
    }

    #[test]
    fn xerox_of_a_button_shares_its_action() {
        let (mut world, _) = world();
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        let button = world.spawn(EntityDesc::button(Action::bound("count", move |_, _| {
            counter.set(counter.get() + 1);
            Ok(Value::Number(counter.get() as f64))
        })));
        let copy = world.xerox(button).expect("xerox");

        let original_action = world.entity(button).and_then(|e| e.action().cloned()).expect("action");
        let copy_action = world.entity(copy).and_then(|e| e.action().cloned()).expect("action");
        assert!(Rc::ptr_eq(&original_action, &copy_action));

        world.activate(button).expect("original");
        world.activate(copy).expect("copy");
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn shift_press_moves_and_suppresses_the_click() {
        let (mut world, _) = world();
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let button = world.spawn(EntityDesc::button(Action::bound("flag", move |_, _| {
            flag.set(true);
            Ok(Value::Unit)
        })));
        let at = world.screen_rect(button).expect("rect").center;

        world.key_down(Key::Shift);
        assert_eq!(world.button_down(at, PointerButton::Primary), Some(button));
        assert_eq!(world.hand().state(), HandState::Moving);
        assert!(matches!(world.button_up(), PointerUp::Released(id) if id == button));
        assert!(!ran.get());
    }

    #[test]
    fn click_requires_release_over_the_same_button() {
        let (mut world, _) = world();
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let button = world.spawn(EntityDesc::button(Action::bound("flag", move |_, _| {
            flag.set(true);
            Ok(Value::Unit)
        })));
        let at = world.screen_rect(button).expect("rect").center;

        world.button_down(at, PointerButton::Primary);
        world.pointer_moved(vec2(5.0, 5.0));
        assert!(matches!(world.button_up(), PointerUp::Ignored));
        assert!(!ran.get());
    }

    #[test]
    fn middle_press_holds_and_pressing_empty_space_does_nothing() {
        let (mut world, _) = world();
        let thing = world.spawn(EntityDesc::thing("thing", vec2(20.0, 20.0)));
        let at = world.screen_rect(thing).expect("rect").center;

        assert_eq!(world.button_down(vec2(5.0, 5.0), PointerButton::Middle), None);
        assert_eq!(world.button_down(at, PointerButton::Primary), None);
        assert!(matches!(world.button_up(), PointerUp::Ignored));

        assert_eq!(world.button_down(at, PointerButton::Secondary), Some(thing));
        assert_eq!(world.hand().state(), HandState::Holding);
        assert!(matches!(world.button_up(), PointerUp::Released(id) if id == thing));
    }

    #[derive(Debug, Clone)]
    struct Greeter;

    impl Behavior for Greeter {
        fn step(&mut self, _ctx: &mut BehaviorContext<'_>) -> Result<(), WorldError> {
            Ok(())
        }

        fn understands(&self, message: &str) -> bool {
            message == "greet"
        }

        fn receive(
            &mut self,
            message: &str,
            ctx: &mut BehaviorContext<'_>,
        ) -> Result<Value, ActionError> {
            Ok(Value::Text(format!("{message} from {}", ctx.describe())))
        }
    }

    #[test]
    fn behaviors_extend_what_an_entity_understands() {
        let (mut world, _) = world();
        let greeter = world.spawn(
            EntityDesc::stickable("greeter", vec2(40.0, 40.0)).with_behavior(Greeter),
        );
        let receiver = ReceiverRef::Entity(greeter);
        assert!(world.understands(&receiver, "greet"));
        assert!(world.understands(&receiver, "name"));
        assert!(!world.understands(&receiver, "dance"));

        let reply = world.send(&receiver, "greet").expect("greet");
        assert_eq!(reply, Value::Text(format!("greet from greeter {greeter}")));
        assert!(world.send(&receiver, "dance").is_err());
        assert_eq!(
            world.send(&receiver, "name").expect("name"),
            Value::Text("greeter".to_string())
        );
    }
}
