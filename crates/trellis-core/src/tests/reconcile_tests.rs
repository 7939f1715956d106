use super::*;
use crate::applier::{MemoryApplier, Mutation};
use crate::runtime::{DefaultScheduler, Runtime};
use crate::vnode::{Component, EventHandler, RenderResult};
use crate::{h, props};
use std::cell::Cell;
use std::sync::Arc;

struct Harness {
    applier: MemoryApplier,
    container: NodeId,
    runtime: Runtime,
    tree: Option<Mounted>,
}

impl Harness {
    fn new() -> Self {
        let mut applier = MemoryApplier::new();
        let container = applier.create_root("root");
        Self {
            applier,
            container,
            runtime: Runtime::new(Arc::new(DefaultScheduler)),
            tree: None,
        }
    }

    fn render(&mut self, node: VNode) -> Result<Status, RenderError> {
        let mut reconciler = Reconciler::new(&mut self.applier, self.runtime.handle());
        reconciler.diff(
            &mut self.tree,
            Some(&node),
            self.container,
            0,
            &Scope::default(),
        )
    }

    fn top(&self) -> NodeId {
        self.applier.children(self.container).expect("container")[0]
    }

    fn items(&self) -> Vec<NodeId> {
        self.applier.children(self.top()).expect("list").to_vec()
    }

    fn markup(&self) -> String {
        self.applier.markup(self.container).expect("markup")
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if let Some(tree) = self.tree.take() {
            tree.unmount();
        }
    }
}

fn list(keys: &[&str]) -> VNode {
    h!(
        "ul",
        (),
        keys.iter()
            .map(|key| h!("li", props! { "key" => *key }, *key))
            .collect::<Vec<_>>()
    )
}

#[test]
fn moving_the_first_item_to_the_end_takes_one_move() {
    let mut harness = Harness::new();
    harness.render(list(&["a", "b", "c", "d"])).expect("render");
    let before = harness.items();
    harness.applier.clear_mutations();

    harness.render(list(&["b", "c", "d", "a"])).expect("render");
    assert_eq!(
        harness.applier.take_mutations(),
        vec![Mutation::MoveChild {
            parent: harness.top(),
            from: 0,
            to: 3
        }]
    );
    assert_eq!(
        harness.items(),
        vec![before[1], before[2], before[3], before[0]]
    );
}

#[test]
fn duplicate_keys_match_the_first_occurrence() {
    let mut harness = Harness::new();
    let duplicated = h!(
        "ul",
        (),
        h!("li", props! { "key" => "k" }, "first"),
        h!("li", props! { "key" => "k" }, "second")
    );
    harness.render(duplicated).expect("render");
    let before = harness.items();

    harness
        .render(h!("ul", (), h!("li", props! { "key" => "k" }, "first")))
        .expect("render");
    assert_eq!(harness.items(), vec![before[0]]);
    assert!(!harness.applier.contains(before[1]));
    assert_eq!(harness.markup(), "<ul><li>first</li></ul>");
}

#[test]
fn keyed_and_keyless_children_match_independently() {
    let mut harness = Harness::new();
    harness
        .render(h!(
            "ul",
            (),
            h!("li", props! { "key" => "a" }, "A"),
            "t1",
            h!("li", props! { "key" => "b" }, "B")
        ))
        .expect("render");
    let before = harness.items();
    harness.applier.clear_mutations();

    harness
        .render(h!(
            "ul",
            (),
            h!("li", props! { "key" => "b" }, "B"),
            "t2",
            h!("li", props! { "key" => "a" }, "A")
        ))
        .expect("render");
    assert_eq!(harness.items(), vec![before[2], before[1], before[0]]);
    assert_eq!(harness.markup(), "<ul><li>B</li>t2<li>A</li></ul>");
    assert!(harness.applier.mutations().contains(&Mutation::SetText {
        node: before[1],
        text: "t2".into()
    }));
}

#[test]
fn locate_falls_back_to_a_search_when_the_hint_is_stale() {
    let mut harness = Harness::new();
    harness.render(list(&["a", "b", "c"])).expect("render");
    let top = harness.top();
    let items = harness.items();

    let reconciler = Reconciler::new(&mut harness.applier, harness.runtime.handle());
    assert_eq!(reconciler.locate(top, items[2], 2), Ok(2));
    assert_eq!(reconciler.locate(top, items[2], 0), Ok(2));
    assert_eq!(
        reconciler.locate(top, top, 0),
        Err(NodeError::NotAChild {
            parent: top,
            child: top
        })
    );
}

fn render_card(props: &Props, _: &[VNode]) -> RenderResult {
    let title = props.str("title").unwrap_or_default();
    if props.bool("wide").unwrap_or(false) {
        Ok(h!("section", (), title).into())
    } else {
        Ok(h!("div", (), title).into())
    }
}

const CARD: Component = Component::new("Card", render_card);

#[test]
fn keyed_components_mark_their_host_node() {
    let mut harness = Harness::new();
    let cards = |wide: bool| {
        h!(
            "main",
            (),
            h!(CARD, props! { "key" => "x", "title" => "one", "wide" => wide }),
            h!(CARD, props! { "key" => "y", "title" => "two" })
        )
    };
    harness.render(cards(false)).expect("render");
    let main = harness.top();
    assert_eq!(harness.applier.find_keyed(main, &Key::from("y")), Ok(Some(1)));

    harness.render(cards(true)).expect("render");
    let host = harness.applier.child_at(main, 0).expect("main").expect("host");
    assert_eq!(harness.applier.tag(host), Ok(Some("section")));
    assert_eq!(harness.applier.find_keyed(main, &Key::from("x")), Ok(Some(0)));
}

fn render_broken(_: &Props, _: &[VNode]) -> RenderResult {
    Err(RenderError::failed("nope"))
}

const BROKEN: Component = Component::new("Broken", render_broken);

#[test]
fn failed_creation_leaves_no_detached_nodes() {
    let mut harness = Harness::new();
    let nodes = harness.applier.len();
    let err = harness
        .render(h!("div", (), h!("p", (), "ok"), h!(BROKEN)))
        .expect_err("creation fails");
    assert!(matches!(err, RenderError::Component { component: "Broken", .. }));
    assert_eq!(harness.applier.len(), nodes);
    assert!(harness.tree.is_none());
}

#[test]
fn empty_output_becomes_an_empty_text_node() {
    let (node, status) = split_render(Render::pending());
    assert_eq!(status, Status::Pending);
    assert_eq!(node.as_text(), Some(""));

    let (node, status) = split_render(Render::Ready(Some(h!("p"))));
    assert_eq!(status, Status::Ready);
    assert!(node.same_kind(&h!("p")));
}

#[test]
fn only_on_props_holding_handlers_bind_listeners() {
    let handler = PropValue::from(EventHandler::new(|_| {}));
    assert_eq!(
        listener("onMouseDown", &handler).map(|(event, _)| event),
        Some("mousedown".to_owned())
    );
    assert!(listener("on", &handler).is_none());
    assert!(listener("click", &handler).is_none());
    assert!(listener("onClick", &PropValue::from("text")).is_none());
}

#[test]
fn rebinding_a_handler_swaps_the_listener() {
    let mut harness = Harness::new();
    let button = |handler: EventHandler| h!("button", props! { "onClick" => handler });
    harness
        .render(button(EventHandler::new(|_| {})))
        .expect("render");
    let node = harness.top();
    harness.applier.clear_mutations();

    harness
        .render(button(EventHandler::new(|_| {})))
        .expect("render");
    assert_eq!(
        harness.applier.take_mutations(),
        vec![
            Mutation::RemoveListener {
                node,
                event: "click".into()
            },
            Mutation::AddListener {
                node,
                event: "click".into()
            },
        ]
    );
    assert_eq!(harness.applier.listener_count(node, "click"), Ok(1));
}

#[test]
fn switching_a_prop_between_attribute_and_handler_clears_the_old_binding() {
    let mut harness = Harness::new();
    harness
        .render(h!("button", props! { "onClick" => "legacy()" }))
        .expect("render");
    let node = harness.top();
    harness.applier.clear_mutations();

    harness
        .render(h!("button", props! { "onClick" => EventHandler::new(|_| {}) }))
        .expect("render");
    assert_eq!(
        harness.applier.take_mutations(),
        vec![
            Mutation::RemoveAttribute {
                node,
                name: "onClick".into()
            },
            Mutation::AddListener {
                node,
                event: "click".into()
            },
        ]
    );
    assert_eq!(harness.applier.attribute(node, "onClick"), Ok(None));
    assert_eq!(harness.applier.listener_count(node, "click"), Ok(1));

    harness
        .render(h!("button", props! { "onClick" => "legacy()" }))
        .expect("render");
    assert_eq!(harness.applier.listener_count(node, "click"), Ok(0));
    assert!(harness.applier.attribute(node, "onClick").expect("node").is_some());
}

/// Forwards to a [`MemoryApplier`], counting child lookups.
#[derive(Default)]
struct CountingApplier {
    inner: MemoryApplier,
    lookups: Cell<usize>,
}

impl Applier for CountingApplier {
    fn create_element(&mut self, tag: &str) -> NodeId {
        self.inner.create_element(tag)
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.inner.create_text(text)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &PropValue) -> Result<(), NodeError> {
        self.inner.set_attribute(node, name, value)
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), NodeError> {
        self.inner.remove_attribute(node, name)
    }

    fn add_listener(&mut self, node: NodeId, event: &str, handler: &EventHandler) -> Result<(), NodeError> {
        self.inner.add_listener(node, event, handler)
    }

    fn remove_listener(&mut self, node: NodeId, event: &str, handler: &EventHandler) -> Result<(), NodeError> {
        self.inner.remove_listener(node, event, handler)
    }

    fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), NodeError> {
        self.inner.insert_child(parent, index, child)
    }

    fn remove_child(&mut self, parent: NodeId, index: usize) -> Result<NodeId, NodeError> {
        self.inner.remove_child(parent, index)
    }

    fn detach_child(&mut self, parent: NodeId, index: usize) -> Result<NodeId, NodeError> {
        self.inner.detach_child(parent, index)
    }

    fn replace_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<NodeId, NodeError> {
        self.inner.replace_child(parent, index, child)
    }

    fn move_child(&mut self, parent: NodeId, from: usize, to: usize) -> Result<(), NodeError> {
        self.inner.move_child(parent, from, to)
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), NodeError> {
        self.inner.set_text(node, text)
    }

    fn child_count(&self, parent: NodeId) -> Result<usize, NodeError> {
        self.lookups.set(self.lookups.get() + 1);
        self.inner.child_count(parent)
    }

    fn child_at(&self, parent: NodeId, index: usize) -> Result<Option<NodeId>, NodeError> {
        self.lookups.set(self.lookups.get() + 1);
        self.inner.child_at(parent, index)
    }

    fn set_marker(&mut self, node: NodeId, key: &Key) -> Result<(), NodeError> {
        self.inner.set_marker(node, key)
    }

    fn marker(&self, node: NodeId) -> Option<Key> {
        self.inner.marker(node)
    }

    fn release(&mut self, node: NodeId) {
        self.inner.release(node);
    }
}

#[test]
fn reversing_a_long_keyed_list_takes_linear_host_lookups() {
    let count = 300;
    let keys: Vec<String> = (0..count).map(|key| key.to_string()).collect();
    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    let reversed: Vec<&str> = keys.iter().rev().copied().collect();

    let mut applier = CountingApplier::default();
    let container = applier.inner.create_root("root");
    let runtime = Runtime::new(Arc::new(DefaultScheduler));
    let mut tree = None;
    let mut render = |applier: &mut CountingApplier, node: VNode| {
        Reconciler::new(applier, runtime.handle())
            .diff(&mut tree, Some(&node), container, 0, &Scope::default())
            .expect("render")
    };

    render(&mut applier, list(&keys));
    applier.lookups.set(0);
    render(&mut applier, list(&reversed));

    let top = applier.inner.children(container).expect("container")[0];
    let texts: Vec<String> = applier
        .inner
        .children(top)
        .expect("list")
        .iter()
        .map(|item| applier.inner.text_content(*item).expect("item"))
        .collect();
    assert_eq!(texts, reversed);
    assert!(
        applier.lookups.get() <= 2 * count,
        "{} lookups for {count} children",
        applier.lookups.get()
    );
    if let Some(tree) = tree.take() {
        tree.unmount();
    }
}

#[test]
fn status_merge_prefers_pending() {
    assert_eq!(Status::Ready.merge(Status::Ready), Status::Ready);
    assert_eq!(Status::Ready.merge(Status::Pending), Status::Pending);
    assert_eq!(Status::Pending.merge(Status::Ready), Status::Pending);
}
