//! The desk a session starts with: a motion law and its stand-in, two balls
//! that obey it, a tray to stick things on and a handful of buttons.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ark::{
    vec2, Action, ActionError, Behavior, BehaviorContext, EntityDesc, EntityId, Receiver,
    SharedObject, Value, VisualClass, Vector, World, WorldError,
};
use tracing::info;

/// Balls turn around when they would leave this box around the origin.
const FIELD_HALF_EXTENT: Vector = vec2(420.0, 300.0);
const BALL_SIZE: Vector = vec2(28.0, 28.0);
const BUTTON_COLUMN_X: f64 = -330.0;
const BUTTON_SPACING: f64 = 30.0;

/// Global switch the balls consult every tick.
#[derive(Debug)]
pub(crate) struct MotionLaw {
    enabled: Rc<Cell<bool>>,
}

impl Receiver for MotionLaw {
    fn describe(&self) -> String {
        let state = if self.enabled.get() { "on" } else { "off" };
        format!("motion law ({state})")
    }

    fn supports(&self, message: &str) -> bool {
        matches!(message, "toggle" | "on" | "off" | "enabled")
    }

    fn invoke(&mut self, message: &str) -> Result<Value, ActionError> {
        match message {
            "toggle" => self.enabled.set(!self.enabled.get()),
            "on" => self.enabled.set(true),
            "off" => self.enabled.set(false),
            "enabled" => {}
            _ => return Err(ActionError::invalid_message(self.describe(), message)),
        }
        info!(enabled = self.enabled.get(), message, "motion_law_changed");
        Ok(Value::Bool(self.enabled.get()))
    }
}

#[derive(Debug, Clone)]
struct Ball {
    velocity: Vector,
    law: Rc<Cell<bool>>,
}

impl Behavior for Ball {
    fn step(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), WorldError> {
        if !self.law.get() {
            return Ok(());
        }
        let next = ctx.position() + self.velocity;
        if next.x.abs() > FIELD_HALF_EXTENT.x {
            self.velocity.x = -self.velocity.x;
        }
        if next.y.abs() > FIELD_HALF_EXTENT.y {
            self.velocity.y = -self.velocity.y;
        }
        ctx.move_by(self.velocity)
    }

    fn understands(&self, message: &str) -> bool {
        message == "reverse"
    }

    fn receive(
        &mut self,
        message: &str,
        ctx: &mut BehaviorContext<'_>,
    ) -> Result<Value, ActionError> {
        if message != "reverse" {
            return Err(ActionError::invalid_message(ctx.describe(), message));
        }
        self.velocity = -self.velocity;
        Ok(Value::Vector(self.velocity))
    }
}

pub(crate) struct Workbench {
    pub(crate) law: Rc<Cell<bool>>,
    pub(crate) motion: EntityId,
    pub(crate) tray: EntityId,
    pub(crate) balls: [EntityId; 2],
    pub(crate) toggle: EntityId,
    pub(crate) hello: EntityId,
    pub(crate) whoami: EntityId,
    pub(crate) xerox: EntityId,
    pub(crate) vaporize: EntityId,
    pub(crate) reverse: EntityId,
}

impl Workbench {
    pub(crate) fn buttons(&self) -> [EntityId; 6] {
        [
            self.toggle,
            self.hello,
            self.whoami,
            self.xerox,
            self.vaporize,
            self.reverse,
        ]
    }
}

fn hello_action() -> Action {
    Action::bound("hello", |world, receiver| {
        let target = world.describe_receiver(receiver);
        info!(target = %target, "hello");
        Ok(Value::Text(format!("hello, {target}")))
    })
}

fn whoami_action() -> Action {
    Action::bound("whoami", |world, receiver| {
        Ok(Value::Text(world.describe_receiver(receiver)))
    })
}

fn ball(law: &Rc<Cell<bool>>, name: &str, at: Vector, velocity: Vector) -> EntityDesc {
    EntityDesc::stickable(name, BALL_SIZE)
        .with_class(VisualClass::Ball)
        .with_behavior(Ball {
            velocity,
            law: Rc::clone(law),
        })
        .at(at)
}

/// Populates `world` and returns the ids of what it placed.
pub(crate) fn build(world: &mut World) -> Result<Workbench, WorldError> {
    let law = Rc::new(Cell::new(true));
    let object: SharedObject = Rc::new(RefCell::new(MotionLaw {
        enabled: Rc::clone(&law),
    }));

    let motion_at = vec2(-260.0, -170.0);
    let motion =
        world.spawn(EntityDesc::representative("Motion", vec2(140.0, 70.0), object).at(motion_at));
    let tray =
        world.spawn(EntityDesc::stickable("Tray", vec2(240.0, 150.0)).at(vec2(220.0, -150.0)));
    let balls = [
        world.spawn(ball(&law, "ball", vec2(-80.0, 60.0), vec2(1.5, 0.8))),
        world.spawn(ball(&law, "ball", vec2(140.0, 120.0), vec2(-1.0, 1.2))),
    ];

    let toggle = world.spawn(EntityDesc::button(Action::send("toggle")).at(motion_at));
    world.settle_button(toggle)?;

    let mut column = (0..).map(|row| vec2(BUTTON_COLUMN_X, 40.0 + row as f64 * BUTTON_SPACING));
    let mut loose = |world: &mut World, action: Action| {
        let at = column.next().unwrap_or(Vector::ZERO);
        world.spawn(EntityDesc::button(action).at(at))
    };
    let hello = loose(world, hello_action());
    let whoami = loose(world, whoami_action());
    let xerox = loose(world, Action::send("xerox"));
    let vaporize = loose(world, Action::send("vaporize"));
    let reverse = loose(world, Action::send("reverse"));

    Ok(Workbench {
        law,
        motion,
        tray,
        balls,
        toggle,
        hello,
        whoami,
        xerox,
        vaporize,
        reverse,
    })
}
