use std::cell::{Cell, RefCell};

use trellis_core::{create_node, Arg, IntoArg};
use trellis_macros::component;
use trellis_testing::prelude::*;

thread_local! {
    static EVENTS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn record(event: impl Into<String>) {
    EVENTS.with(|events| events.borrow_mut().push(event.into()));
}

fn take_events() -> Vec<String> {
    EVENTS.with(|events| std::mem::take(&mut *events.borrow_mut()))
}

#[component]
fn Badge(props: &Props) -> RenderResult {
    let label = props.str("label").unwrap_or_default().to_owned();
    use_effect((), move || {
        EffectCleanup::new(move || record(format!("cleanup {label}")))
    })?;
    Ok(h!("b", (), props.str("label").unwrap_or_default()).into())
}

fn page(title: &str) -> VNode {
    h!(
        "section",
        props! { "class" => "page", "data-title" => title },
        h!("h1", (), title),
        h!(Badge, props! { "label" => "new" }),
        ["x", "y"].map(|item| h!("span", (), item))
    )
}

#[test]
fn unchanged_tree_rerenders_without_mutations() {
    run_test_root(|root| {
        root.render(page("home")).expect("render");
        root.clear_mutations();

        root.render(page("home")).expect("render");
        assert!(root.mutations().is_empty(), "{}", root.dump());
    });
}

#[test]
fn reordered_keys_move_without_content_updates() {
    run_test_root(|root| {
        let list = |keys: [i32; 2]| {
            h!(
                "ul",
                (),
                keys.map(|key| h!("li", props! { "key" => key }, format!("item {key}")))
            )
        };
        root.render(list([1, 2])).expect("render");
        let before = root.top_children();
        root.clear_mutations();

        root.render(list([2, 1])).expect("render");
        let mutations = root.take_mutations();
        assert!(content_updates(&mutations).is_empty(), "{mutations:?}");
        assert!(mutations
            .iter()
            .any(|mutation| matches!(mutation, Mutation::MoveChild { .. })));
        assert_eq!(root.top_children(), vec![before[1], before[0]]);
        assert_eq!(root.markup(), "<ul><li>item 2</li><li>item 1</li></ul>");
    });
}

#[test]
fn tag_change_replaces_the_whole_subtree() {
    run_test_root(|root| {
        root.render(h!("div", props! { "id" => "box" }, h!(Badge, props! { "label" => "a" })))
            .expect("render");
        let old = root.find_by_id("box").expect("div");
        take_events();
        root.clear_mutations();

        root.render(h!("span", props! { "id" => "box" }, h!(Badge, props! { "label" => "a" })))
            .expect("render");
        assert_eq!(take_events(), vec!["cleanup a"]);
        assert!(!root.applier().contains(old));
        assert!(!root
            .mutations()
            .iter()
            .any(|mutation| matches!(mutation, Mutation::SetAttribute { node, .. } if *node == old)));
        assert_eq!(root.markup(), "<span id=\"box\"><b>a</b></span>");
    });
}

thread_local! {
    static SECOND: RefCell<Option<SetState<u32>>> = const { RefCell::new(None) };
}

#[component]
fn TwoSlots() -> RenderResult {
    let (first, _) = use_state(|| "kept")?;
    let (second, set_second) = use_state(|| 0u32)?;
    SECOND.with(|slot| *slot.borrow_mut() = Some(set_second));
    Ok(VNode::text(format!("{first} {second}")).into())
}

#[test]
fn updating_the_second_slot_keeps_the_first() {
    run_test_root(|root| {
        root.render(h!(TwoSlots)).expect("render");
        let set_second = SECOND.with(|slot| slot.borrow().clone()).expect("setter");
        set_second.set(3);
        root.settle().expect("settle");
        assert_eq!(root.markup(), "kept 3");
    });
}

#[component]
fn Gated(props: &Props) -> RenderResult {
    let a = props.int("a").unwrap_or_default();
    use_effect(a, move || {
        record(format!("run {a}"));
        EffectCleanup::new(move || record(format!("clean {a}")))
    })?;
    Ok(VNode::text(props.int("other").unwrap_or_default()).into())
}

#[test]
fn effects_rerun_only_when_dependencies_change() {
    run_test_root(|root| {
        take_events();
        root.render(h!(Gated, props! { "a" => 1, "other" => 1 }))
            .expect("render");
        root.render(h!(Gated, props! { "a" => 1, "other" => 2 }))
            .expect("render");
        assert_eq!(take_events(), vec!["run 1"]);

        root.render(h!(Gated, props! { "a" => 5, "other" => 2 }))
            .expect("render");
        assert_eq!(take_events(), vec!["clean 1", "run 5"]);
    });
}

thread_local! {
    static RENDERS: Cell<u32> = const { Cell::new(0) };
    static EFFECT_RUNS: Cell<u32> = const { Cell::new(0) };
    static COUNT: RefCell<Option<SetState<i32>>> = const { RefCell::new(None) };
}

#[component]
fn Counter() -> RenderResult {
    RENDERS.with(|renders| renders.set(renders.get() + 1));
    let (count, set_count) = use_state(|| 0)?;
    COUNT.with(|slot| *slot.borrow_mut() = Some(set_count));
    use_effect_each(|| EFFECT_RUNS.with(|runs| runs.set(runs.get() + 1)))?;
    Ok(h!("output", (), count).into())
}

#[test]
fn three_updates_in_one_turn_render_once() {
    run_test_root(|root| {
        root.render(h!(Counter)).expect("render");
        let set_count = COUNT.with(|slot| slot.borrow().clone()).expect("setter");
        let renders = RENDERS.with(Cell::get);
        let effects = EFFECT_RUNS.with(Cell::get);

        set_count.update(|count| count + 1);
        set_count.update(|count| count + 1);
        set_count.update(|count| count + 1);
        root.flush().expect("flush");

        assert_eq!(RENDERS.with(Cell::get), renders + 1);
        assert_eq!(EFFECT_RUNS.with(Cell::get), effects + 1);
        assert_eq!(root.markup(), "<output>3</output>");
        assert!(!root.has_pending_work());
    });
}

#[test]
fn create_node_flattens_arrays() {
    let node = create_node(
        "ul",
        vec![Arg::Null, vec!["a", "b"].into_arg(), "c".into_arg()],
    );
    let texts: Vec<_> = node.children().iter().filter_map(VNode::as_text).collect();
    assert_eq!(texts, vec!["a", "b", "c"]);
}
