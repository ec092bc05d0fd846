use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::geometry::Vector;
use crate::world::{EntityId, World, WorldError};

/// Something a named-send action can be delivered to without being an
/// entity itself, e.g. the object a representative stands in for.
pub trait Receiver: fmt::Debug {
    fn describe(&self) -> String;
    fn supports(&self, message: &str) -> bool;
    fn invoke(&mut self, message: &str) -> Result<Value, ActionError>;
}

pub type SharedObject = Rc<RefCell<dyn Receiver>>;

/// Where an action runs once the attachment chain has been resolved.
#[derive(Debug, Clone)]
pub enum ReceiverRef {
    Entity(EntityId),
    Object(SharedObject),
}

impl ReceiverRef {
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            ReceiverRef::Entity(id) => Some(*id),
            ReceiverRef::Object(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Number(f64),
    Text(String),
    Vector(Vector),
    Entity(EntityId),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Number(value) => write!(f, "{value}"),
            Value::Text(value) => f.write_str(value),
            Value::Vector(value) => write!(f, "({}, {})", value.x, value.y),
            Value::Entity(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{receiver} does not understand '{message}'")]
    InvalidMessage { receiver: String, message: String },
    #[error("action '{action}' failed: {reason}")]
    Failed { action: String, reason: String },
    #[error(transparent)]
    World(Box<WorldError>),
}

impl ActionError {
    pub fn invalid_message(receiver: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            receiver: receiver.into(),
            message: message.into(),
        }
    }
}

impl From<WorldError> for ActionError {
    fn from(error: WorldError) -> Self {
        Self::World(Box::new(error))
    }
}

pub type BoundFn = dyn Fn(&mut World, Option<&ReceiverRef>) -> Result<Value, ActionError>;

enum ActionKind {
    Bound(Box<BoundFn>),
    Send { message: String },
}

/// A named, applicability-checked operation a button runs.
///
/// A bound action runs its function with the resolved receiver as subject,
/// or with `None` when the button is not attached to anything. A send
/// action only applies to receivers that understand its message.
pub struct Action {
    verb: &'static str,
    name: String,
    kind: ActionKind,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("verb", &self.verb)
            .field("name", &self.name)
            .finish()
    }
}

impl Action {
    pub const CALL: &'static str = "call";
    pub const SEND: &'static str = "send";

    pub fn bound<F>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&mut World, Option<&ReceiverRef>) -> Result<Value, ActionError> + 'static,
    {
        Self {
            verb: Self::CALL,
            name: name.into(),
            kind: ActionKind::Bound(Box::new(function)),
        }
    }

    pub fn send(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            verb: Self::SEND,
            name: message.clone(),
            kind: ActionKind::Send { message },
        }
    }

    pub fn verb(&self) -> &str {
        self.verb
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn can_act_on(&self, world: &World, receiver: Option<&ReceiverRef>) -> bool {
        match &self.kind {
            ActionKind::Bound(_) => true,
            ActionKind::Send { message } => {
                receiver.is_some_and(|receiver| world.understands(receiver, message))
            }
        }
    }

    pub fn fail_if_cannot_run(
        &self,
        world: &World,
        receiver: Option<&ReceiverRef>,
    ) -> Result<(), ActionError> {
        if self.can_act_on(world, receiver) {
            return Ok(());
        }
        Err(ActionError::invalid_message(
            world.describe_receiver(receiver),
            self.name.clone(),
        ))
    }

    pub fn run(&self, world: &mut World, receiver: Option<&ReceiverRef>) -> Result<Value, ActionError> {
        self.fail_if_cannot_run(world, receiver)?;
        match &self.kind {
            ActionKind::Bound(function) => function(world, receiver),
            ActionKind::Send { message } => match receiver {
                Some(receiver) => world.send(receiver, message),
                None => Err(ActionError::invalid_message(
                    world.describe_receiver(None),
                    message.clone(),
                )),
            },
        }
    }
}
