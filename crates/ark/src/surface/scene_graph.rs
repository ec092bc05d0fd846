use std::cell::{Ref, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use tracing::warn;

use super::{Surface, VisualHandle, VisualMark, VisualSpec};
use crate::geometry::{Rectangle, Vector};

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub spec: VisualSpec,
    pub mounted: bool,
    pub visible: bool,
    pub screen_pos: Vector,
    pub scale: f64,
    pub layer: i32,
    marks: HashSet<VisualMark>,
}

impl SceneNode {
    fn new(spec: VisualSpec) -> Self {
        Self {
            spec,
            mounted: false,
            visible: false,
            screen_pos: Vector::ZERO,
            scale: 1.0,
            layer: 0,
            marks: HashSet::new(),
        }
    }

    pub fn has_mark(&self, mark: VisualMark) -> bool {
        self.marks.contains(&mark)
    }

    pub fn is_drawn(&self) -> bool {
        self.mounted && self.visible
    }

    pub fn screen_rect(&self) -> Rectangle {
        if !self.is_drawn() {
            return Rectangle::default();
        }
        Rectangle::new(self.screen_pos, self.spec.size.scale(self.scale))
    }
}

/// Retained visual tree kept in memory.
///
/// The world mutates it through [`Surface`]; a painter reads it back with
/// [`SceneGraph::draw_order`].
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: BTreeMap<VisualHandle, SceneNode>,
    next_handle: u64,
    window_size: Vector,
}

impl SceneGraph {
    pub fn new(window_size: Vector) -> Self {
        Self {
            window_size,
            ..Self::default()
        }
    }

    pub fn set_window_size(&mut self, window_size: Vector) {
        self.window_size = window_size;
    }

    pub fn node(&self, handle: VisualHandle) -> Option<&SceneNode> {
        self.nodes.get(&handle)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn mounted_count(&self) -> usize {
        self.nodes.values().filter(|node| node.mounted).count()
    }

    /// Drawn nodes, bottom layer first; later handles paint over earlier ones.
    pub fn draw_order(&self) -> Vec<(VisualHandle, &SceneNode)> {
        let mut drawn: Vec<_> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.is_drawn())
            .map(|(handle, node)| (*handle, node))
            .collect();
        drawn.sort_by_key(|(handle, node)| (node.layer, *handle));
        drawn
    }

    fn allocate(&mut self, node: SceneNode) -> VisualHandle {
        let handle = VisualHandle(self.next_handle);
        self.next_handle = self.next_handle.saturating_add(1);
        self.nodes.insert(handle, node);
        handle
    }

    fn with_node(
        &mut self,
        handle: VisualHandle,
        operation: &'static str,
        f: impl FnOnce(&mut SceneNode),
    ) {
        match self.nodes.get_mut(&handle) {
            Some(node) => f(node),
            None => warn!(handle = handle.0, operation, "unknown_visual_handle"),
        }
    }
}

impl Surface for SceneGraph {
    fn create_handle(&mut self, spec: &VisualSpec) -> VisualHandle {
        self.allocate(SceneNode::new(spec.clone()))
    }

    fn clone_handle(&mut self, handle: VisualHandle) -> VisualHandle {
        let spec = match self.nodes.get(&handle) {
            Some(node) => node.spec.clone(),
            None => {
                warn!(handle = handle.0, "clone_of_unknown_visual_handle");
                VisualSpec::new(super::VisualClass::Thing, "", Vector::ZERO)
            }
        };
        let mut copy = SceneNode::new(spec);
        if let Some(source) = self.nodes.get(&handle) {
            copy.layer = source.layer;
            copy.scale = source.scale;
        }
        self.allocate(copy)
    }

    fn mount(&mut self, handle: VisualHandle) {
        self.with_node(handle, "mount", |node| node.mounted = true);
    }

    fn unmount(&mut self, handle: VisualHandle) {
        self.with_node(handle, "unmount", |node| node.mounted = false);
    }

    fn bounding_rect(&self, handle: VisualHandle) -> Rectangle {
        self.nodes
            .get(&handle)
            .map(SceneNode::screen_rect)
            .unwrap_or_default()
    }

    fn natural_size(&self, handle: VisualHandle) -> Vector {
        self.nodes
            .get(&handle)
            .map(|node| node.spec.size)
            .unwrap_or_default()
    }

    fn place(&mut self, handle: VisualHandle, screen_pos: Vector, scale: f64) {
        self.with_node(handle, "place", |node| {
            node.screen_pos = screen_pos;
            node.scale = scale;
            node.visible = true;
        });
    }

    fn hide(&mut self, handle: VisualHandle) {
        self.with_node(handle, "hide", |node| node.visible = false);
    }

    fn set_layer(&mut self, handle: VisualHandle, layer: i32) {
        self.with_node(handle, "set_layer", |node| node.layer = layer);
    }

    fn set_mark(&mut self, handle: VisualHandle, mark: VisualMark, enabled: bool) {
        self.with_node(handle, "set_mark", |node| {
            if enabled {
                node.marks.insert(mark);
            } else {
                node.marks.remove(&mark);
            }
        });
    }

    fn handle_at(&self, screen_pos: Vector) -> Option<VisualHandle> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.screen_rect().contains_point(screen_pos))
            .max_by_key(|(handle, node)| (node.layer, **handle))
            .map(|(handle, _)| *handle)
    }

    fn window_size(&self) -> Vector {
        self.window_size
    }
}

/// A [`SceneGraph`] that the world and a painter can both hold.
#[derive(Debug, Clone, Default)]
pub struct SharedSceneGraph(Rc<RefCell<SceneGraph>>);

impl SharedSceneGraph {
    pub fn new(window_size: Vector) -> Self {
        Self(Rc::new(RefCell::new(SceneGraph::new(window_size))))
    }

    pub fn borrow(&self) -> Ref<'_, SceneGraph> {
        self.0.borrow()
    }

    pub fn set_window_size(&self, window_size: Vector) {
        self.0.borrow_mut().set_window_size(window_size);
    }
}

impl Surface for SharedSceneGraph {
    fn create_handle(&mut self, spec: &VisualSpec) -> VisualHandle {
        self.0.borrow_mut().create_handle(spec)
    }

    fn clone_handle(&mut self, handle: VisualHandle) -> VisualHandle {
        self.0.borrow_mut().clone_handle(handle)
    }

    fn mount(&mut self, handle: VisualHandle) {
        self.0.borrow_mut().mount(handle);
    }

    fn unmount(&mut self, handle: VisualHandle) {
        self.0.borrow_mut().unmount(handle);
    }

    fn bounding_rect(&self, handle: VisualHandle) -> Rectangle {
        self.0.borrow().bounding_rect(handle)
    }

    fn natural_size(&self, handle: VisualHandle) -> Vector {
        self.0.borrow().natural_size(handle)
    }

    fn place(&mut self, handle: VisualHandle, screen_pos: Vector, scale: f64) {
        self.0.borrow_mut().place(handle, screen_pos, scale);
    }

    fn hide(&mut self, handle: VisualHandle) {
        self.0.borrow_mut().hide(handle);
    }

    fn set_layer(&mut self, handle: VisualHandle, layer: i32) {
        self.0.borrow_mut().set_layer(handle, layer);
    }

    fn set_mark(&mut self, handle: VisualHandle, mark: VisualMark, enabled: bool) {
        self.0.borrow_mut().set_mark(handle, mark, enabled);
    }

    fn handle_at(&self, screen_pos: Vector) -> Option<VisualHandle> {
        self.0.borrow().handle_at(screen_pos)
    }

    fn window_size(&self) -> Vector {
        self.0.borrow().window_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::vec2;
    use crate::surface::VisualClass;

    fn spec(label: &str) -> VisualSpec {
        VisualSpec::new(VisualClass::Thing, label, vec2(20.0, 10.0))
    }

    #[test]
    fn unplaced_or_unmounted_nodes_report_empty_rect() {
        let mut graph = SceneGraph::new(vec2(800.0, 600.0));
        let handle = graph.create_handle(&spec("a"));
        assert_eq!(graph.bounding_rect(handle), Rectangle::default());

        graph.place(handle, vec2(100.0, 100.0), 1.0);
        assert_eq!(graph.bounding_rect(handle), Rectangle::default());

        graph.mount(handle);
        assert_eq!(
            graph.bounding_rect(handle),
            Rectangle::new(vec2(100.0, 100.0), vec2(20.0, 10.0))
        );

        graph.hide(handle);
        assert_eq!(graph.bounding_rect(handle), Rectangle::default());
    }

    #[test]
    fn bounding_rect_scales_with_placement() {
        let mut graph = SceneGraph::new(vec2(800.0, 600.0));
        let handle = graph.create_handle(&spec("a"));
        graph.mount(handle);
        graph.place(handle, vec2(50.0, 50.0), 2.0);
        assert_eq!(graph.bounding_rect(handle).dimensions, vec2(40.0, 20.0));
        assert_eq!(graph.natural_size(handle), vec2(20.0, 10.0));
    }

    #[test]
    fn handle_at_prefers_higher_layer_then_later_handle() {
        let mut graph = SceneGraph::new(vec2(800.0, 600.0));
        let low = graph.create_handle(&spec("low"));
        let high = graph.create_handle(&spec("high"));
        let later = graph.create_handle(&spec("later"));
        for handle in [low, high, later] {
            graph.mount(handle);
            graph.place(handle, vec2(100.0, 100.0), 1.0);
        }
        graph.set_layer(high, 5);
        assert_eq!(graph.handle_at(vec2(101.0, 101.0)), Some(high));

        graph.set_layer(high, 0);
        assert_eq!(graph.handle_at(vec2(101.0, 101.0)), Some(later));
        assert_eq!(graph.handle_at(vec2(300.0, 300.0)), None);
    }

    #[test]
    fn clone_handle_copies_spec_but_not_mount_state() {
        let mut graph = SceneGraph::new(vec2(800.0, 600.0));
        let original = graph.create_handle(&spec("orig"));
        graph.mount(original);
        graph.set_layer(original, 3);
        let copy = graph.clone_handle(original);

        assert_ne!(original, copy);
        let node = graph.node(copy).expect("copy node");
        assert_eq!(node.spec.label, "orig");
        assert_eq!(node.layer, 3);
        assert!(!node.mounted);
    }

    #[test]
    fn marks_toggle_independently() {
        let mut graph = SceneGraph::new(vec2(800.0, 600.0));
        let handle = graph.create_handle(&spec("a"));
        graph.set_mark(handle, VisualMark::Held, true);
        graph.set_mark(handle, VisualMark::Stuck, true);
        graph.set_mark(handle, VisualMark::Held, false);
        let node = graph.node(handle).expect("node");
        assert!(!node.has_mark(VisualMark::Held));
        assert!(node.has_mark(VisualMark::Stuck));
    }

    #[test]
    fn draw_order_sorts_by_layer() {
        let mut graph = SceneGraph::new(vec2(800.0, 600.0));
        let top = graph.create_handle(&spec("top"));
        let bottom = graph.create_handle(&spec("bottom"));
        for handle in [top, bottom] {
            graph.mount(handle);
            graph.place(handle, vec2(10.0, 10.0), 1.0);
        }
        graph.set_layer(top, 9);
        let order: Vec<_> = graph.draw_order().into_iter().map(|(h, _)| h).collect();
        assert_eq!(order, vec![bottom, top]);
    }

    #[test]
    fn shared_graph_sees_mutations_through_any_clone() {
        let shared = SharedSceneGraph::new(vec2(640.0, 480.0));
        let mut writer = shared.clone();
        let handle = writer.create_handle(&spec("shared"));
        writer.mount(handle);
        assert_eq!(shared.borrow().mounted_count(), 1);

        shared.set_window_size(vec2(320.0, 240.0));
        assert_eq!(writer.window_size(), vec2(320.0, 240.0));
    }
}
