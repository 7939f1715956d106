use super::*;
use std::cell::Cell;
use std::rc::Rc;

fn tree() -> (MemoryApplier, NodeId) {
    let mut applier = MemoryApplier::new();
    let root = applier.create_root("root");
    (applier, root)
}

#[test]
fn create_root_is_not_logged() {
    let (applier, root) = tree();
    assert!(applier.mutations().is_empty());
    assert_eq!(applier.tag(root), Ok(Some("root")));
}

#[test]
fn insert_move_and_remove_children() {
    let (mut applier, root) = tree();
    let a = applier.create_text("a");
    let b = applier.create_text("b");
    let c = applier.create_text("c");
    for (index, node) in [a, b, c].into_iter().enumerate() {
        applier.insert_child(root, index, node).expect("insert");
    }
    assert_eq!(applier.markup(root).expect("markup"), "abc");

    applier.move_child(root, 0, 2).expect("move");
    assert_eq!(applier.markup(root).expect("markup"), "bca");
    assert_eq!(applier.index_of(root, a), Ok(Some(2)));

    let removed = applier.remove_child(root, 1).expect("remove");
    assert_eq!(removed, c);
    assert!(!applier.contains(c));
    assert_eq!(applier.markup(root).expect("markup"), "ba");
}

#[test]
fn detached_children_survive_and_reattach() {
    let (mut applier, root) = tree();
    let list = applier.create_element("ul");
    let item = applier.create_element("li");
    applier.insert_child(list, 0, item).expect("insert item");
    applier.insert_child(root, 0, list).expect("insert list");

    assert_eq!(applier.detach_child(root, 0), Ok(list));
    assert_eq!(applier.child_count(root), Ok(0));
    assert_eq!(applier.parent(list), Ok(None));
    assert!(applier.contains(item));

    let holder = applier.create_root("holder");
    applier.insert_child(holder, 0, list).expect("park");
    applier.release(holder);
    assert!(!applier.contains(list));
    assert!(!applier.contains(item));
}

#[test]
fn replace_child_frees_displaced_subtree() {
    let (mut applier, root) = tree();
    let list = applier.create_element("ul");
    let item = applier.create_element("li");
    applier.insert_child(list, 0, item).expect("insert item");
    applier.insert_child(root, 0, list).expect("insert list");

    let replacement = applier.create_element("p");
    let previous = applier.replace_child(root, 0, replacement).expect("replace");
    assert_eq!(previous, list);
    assert!(!applier.contains(list));
    assert!(!applier.contains(item));
    assert_eq!(applier.parent(replacement), Ok(Some(root)));
}

#[test]
fn release_only_frees_detached_nodes() {
    let (mut applier, root) = tree();
    let attached = applier.create_element("div");
    applier.insert_child(root, 0, attached).expect("insert");
    let detached = applier.create_element("div");

    applier.release(attached);
    applier.release(detached);
    assert!(applier.contains(attached));
    assert!(!applier.contains(detached));
}

#[test]
fn attributes_and_text_errors() {
    let (mut applier, root) = tree();
    let text = applier.create_text("t");
    assert_eq!(
        applier.set_attribute(text, "id", &PropValue::from("x")),
        Err(NodeError::NotAnElement {
            id: text,
            what: "attributes"
        })
    );
    assert_eq!(
        applier.set_text(root, "nope"),
        Err(NodeError::NotText { id: root })
    );
    assert_eq!(
        applier.insert_child(root, 3, text),
        Err(NodeError::IndexOutOfBounds {
            parent: root,
            index: 3,
            len: 0
        })
    );
}

#[test]
fn dispatch_runs_matching_listeners() {
    let (mut applier, root) = tree();
    let button = applier.create_element("button");
    applier.insert_child(root, 0, button).expect("insert");
    let clicks = Rc::new(Cell::new(0));
    let counter = Rc::clone(&clicks);
    let handler = EventHandler::new(move |event: &Event| {
        assert_eq!(event.name(), "click");
        counter.set(counter.get() + 1);
    });
    applier.add_listener(button, "click", &handler).expect("listen");

    assert_eq!(applier.dispatch(button, "click"), Ok(1));
    assert_eq!(applier.dispatch(button, "keydown"), Ok(0));
    applier.remove_listener(button, "click", &handler).expect("unlisten");
    assert_eq!(applier.dispatch(button, "click"), Ok(0));
    assert_eq!(clicks.get(), 1);
}

#[test]
fn find_keyed_uses_markers() {
    let (mut applier, root) = tree();
    let first = applier.create_element("li");
    let second = applier.create_element("li");
    applier.set_marker(second, &Key::from("b")).expect("marker");
    applier.insert_child(root, 0, first).expect("insert");
    applier.insert_child(root, 1, second).expect("insert");

    assert_eq!(applier.find_keyed(root, &Key::from("b")), Ok(Some(1)));
    assert_eq!(applier.find_keyed(root, &Key::from("a")), Ok(None));
    assert!(applier.dump_tree(Some(root)).contains("key=b"));
}
