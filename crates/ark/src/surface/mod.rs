mod scene_graph;

pub use scene_graph::{SceneGraph, SceneNode, SharedSceneGraph};

use crate::geometry::{Rectangle, Vector};

/// Opaque reference to one visual owned by a [`Surface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisualHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualClass {
    Thing,
    Button,
    Representative,
    Ball,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisualSpec {
    pub class: VisualClass,
    pub label: String,
    /// Unscaled size in screen pixels.
    pub size: Vector,
}

impl VisualSpec {
    pub fn new(class: VisualClass, label: impl Into<String>, size: Vector) -> Self {
        Self {
            class,
            label: label.into(),
            size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualMark {
    Held,
    Stuck,
}

/// Rendering collaborator the world drives.
///
/// Positions are screen space. A hidden or unmounted visual reports an
/// empty bounding rectangle, which hit tests and overlap queries skip.
pub trait Surface {
    fn create_handle(&mut self, spec: &VisualSpec) -> VisualHandle;
    fn clone_handle(&mut self, handle: VisualHandle) -> VisualHandle;
    fn mount(&mut self, handle: VisualHandle);
    fn unmount(&mut self, handle: VisualHandle);
    fn bounding_rect(&self, handle: VisualHandle) -> Rectangle;
    fn natural_size(&self, handle: VisualHandle) -> Vector;
    fn place(&mut self, handle: VisualHandle, screen_pos: Vector, scale: f64);
    fn hide(&mut self, handle: VisualHandle);
    fn set_layer(&mut self, handle: VisualHandle, layer: i32);
    fn set_mark(&mut self, handle: VisualHandle, mark: VisualMark, enabled: bool);
    fn handle_at(&self, screen_pos: Vector) -> Option<VisualHandle>;
    fn window_size(&self) -> Vector;
}
