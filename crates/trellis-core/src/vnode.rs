//! Immutable description of a UI subtree.
//!
//! A [`VNode`] is a closed union of element, text and component nodes. Nodes are
//! cheap to clone (every variant is reference counted) and never touch the
//! display tree; the reconciler is the only code that turns them into display
//! mutations.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::collections::fast_set;
use crate::error::RenderError;
use crate::NodeId;

pub(crate) const KEY_PROP: &str = "key";

/// Identity token distinguishing siblings across renders.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Rc<str>);

impl Key {
    pub fn new(value: impl Into<Rc<str>>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:?})", &*self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self(Rc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self(Rc::from(value))
    }
}

impl From<Rc<str>> for Key {
    fn from(value: Rc<str>) -> Self {
        Self(value)
    }
}

macro_rules! key_from_display {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Key {
                fn from(value: $ty) -> Self {
                    Self(Rc::from(value.to_string()))
                }
            }
        )*
    };
}

key_from_display!(i32, i64, u32, u64, usize);

/// Event delivered by the host to a bound listener.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    name: Rc<str>,
    target: NodeId,
}

impl Event {
    pub fn new(name: &str, target: NodeId) -> Self {
        Self {
            name: Rc::from(name),
            target,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> NodeId {
        self.target
    }
}

/// Shared function whose equality is reference identity.
///
/// Two callbacks are equal only when they are clones of the same allocation,
/// which is what lets `use_callback` hand out stable values across renders.
pub struct Callback<A> {
    func: Rc<dyn Fn(&A)>,
}

impl<A> Callback<A> {
    pub fn new(func: impl Fn(&A) + 'static) -> Self {
        Self {
            func: Rc::new(func),
        }
    }

    pub fn call(&self, arg: &A) {
        (self.func)(arg)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

impl<A> Clone for Callback<A> {
    fn clone(&self) -> Self {
        Self {
            func: Rc::clone(&self.func),
        }
    }
}

impl<A> PartialEq for Callback<A> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<A> fmt::Debug for Callback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Rc::as_ptr(&self.func).cast::<()>())
    }
}

pub type EventHandler = Callback<Event>;

/// Value stored under a prop name.
#[derive(Clone)]
pub enum PropValue {
    Str(Rc<str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Handler(EventHandler),
    Node(VNode),
    Any(Rc<dyn Any>),
}

impl PropValue {
    /// Wraps an arbitrary value; equality is reference identity.
    pub fn any<T: 'static>(value: T) -> Self {
        PropValue::Any(Rc::new(value))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropValue::Float(value) => Some(*value),
            PropValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            PropValue::Handler(handler) => Some(handler),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&VNode> {
        match self {
            PropValue::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        match self {
            PropValue::Any(value) => Rc::clone(value).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Textual form a host uses when writing the value as an attribute.
    pub fn to_attribute_string(&self) -> Option<String> {
        match self {
            PropValue::Str(value) => Some(value.to_string()),
            PropValue::Int(value) => Some(value.to_string()),
            PropValue::Float(value) => Some(value.to_string()),
            PropValue::Bool(value) => Some(value.to_string()),
            PropValue::Handler(_) | PropValue::Node(_) | PropValue::Any(_) => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            (PropValue::Float(a), PropValue::Float(b)) => a == b,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => a == b,
            (PropValue::Node(a), PropValue::Node(b)) => a == b,
            (PropValue::Any(a), PropValue::Any(b)) => {
                std::ptr::eq(Rc::as_ptr(a).cast::<()>(), Rc::as_ptr(b).cast::<()>())
            }
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Str(value) => write!(f, "{value:?}"),
            PropValue::Int(value) => write!(f, "{value}"),
            PropValue::Float(value) => write!(f, "{value}"),
            PropValue::Bool(value) => write!(f, "{value}"),
            PropValue::Handler(handler) => write!(f, "{handler:?}"),
            PropValue::Node(node) => write!(f, "{node:?}"),
            PropValue::Any(value) => write!(f, "Any({:p})", Rc::as_ptr(value).cast::<()>()),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(Rc::from(value))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(Rc::from(value))
    }
}

impl From<Rc<str>> for PropValue {
    fn from(value: Rc<str>) -> Self {
        PropValue::Str(value)
    }
}

macro_rules! prop_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PropValue {
                fn from(value: $ty) -> Self {
                    PropValue::Int(value as i64)
                }
            }
        )*
    };
}

prop_from_int!(i32, i64, u32, usize);

impl From<f32> for PropValue {
    fn from(value: f32) -> Self {
        PropValue::Float(f64::from(value))
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<VNode> for PropValue {
    fn from(value: VNode) -> Self {
        PropValue::Node(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

/// Insertion-ordered prop map.
#[derive(Clone, Default, PartialEq, Debug)]
pub struct Props {
    entries: IndexMap<Rc<str>, PropValue>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<Rc<str>>, value: impl Into<PropValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(
        &mut self,
        name: impl Into<Rc<str>>,
        value: impl Into<PropValue>,
    ) -> Option<PropValue> {
        self.entries.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<PropValue> {
        self.entries.shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> + '_ {
        self.entries.iter().map(|(name, value)| (&**name, value))
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropValue::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PropValue::as_int)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(PropValue::as_bool)
    }

    pub fn handler(&self, name: &str) -> Option<&EventHandler> {
        self.get(name).and_then(PropValue::as_handler)
    }

    pub fn node(&self, name: &str) -> Option<&VNode> {
        self.get(name).and_then(PropValue::as_node)
    }

    pub fn any<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        self.get(name).and_then(PropValue::downcast::<T>)
    }

    /// Removes the reserved `key` prop and converts it into a node identity.
    fn take_key(&mut self) -> Option<Key> {
        let value = self.remove(KEY_PROP)?;
        match value {
            PropValue::Str(value) => Some(Key::from(value)),
            PropValue::Int(value) => Some(Key::from(value)),
            PropValue::Float(value) => Some(Key::from(value.to_string())),
            PropValue::Bool(value) => Some(Key::from(value.to_string())),
            other => {
                log::warn!("ignoring non-scalar key prop {other:?}");
                None
            }
        }
    }
}

/// Builds [`Props`] from `name => value` pairs.
#[macro_export]
macro_rules! props {
    () => {
        $crate::Props::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut props = $crate::Props::new();
        $(
            props.insert($name, $value);
        )+
        props
    }};
}

/// Outcome of one render-function invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Render {
    /// The subtree is complete. `None` renders nothing.
    Ready(Option<VNode>),
    /// An asynchronous value is still pending; the optional node is shown
    /// until the nearest suspense boundary substitutes its fallback.
    Pending(Option<VNode>),
}

impl Render {
    pub fn empty() -> Self {
        Render::Ready(None)
    }

    pub fn pending() -> Self {
        Render::Pending(None)
    }

    pub fn placeholder(node: VNode) -> Self {
        Render::Pending(Some(node))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Render::Pending(_))
    }
}

impl From<VNode> for Render {
    fn from(node: VNode) -> Self {
        Render::Ready(Some(node))
    }
}

impl From<Option<VNode>> for Render {
    fn from(node: Option<VNode>) -> Self {
        Render::Ready(node)
    }
}

pub type RenderResult = Result<Render, RenderError>;
pub type RenderFn = fn(&Props, &[VNode]) -> RenderResult;

/// A component: a named render function. Identity is the function address
/// together with the name, so folded identical functions stay distinct.
#[derive(Clone, Copy)]
pub struct Component {
    name: &'static str,
    render: RenderFn,
    boundary: bool,
}

impl Component {
    pub const fn new(name: &'static str, render: RenderFn) -> Self {
        Self {
            name,
            render,
            boundary: false,
        }
    }

    pub(crate) const fn boundary(name: &'static str, render: RenderFn) -> Self {
        Self {
            name,
            render,
            boundary: true,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_boundary(&self) -> bool {
        self.boundary
    }

    pub(crate) fn render_fn(&self) -> RenderFn {
        self.render
    }

    fn identity(&self) -> usize {
        self.render as usize
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity() && self.name == other.name
    }
}

impl Eq for Component {}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    tag: Rc<str>,
    props: Props,
    children: Vec<VNode>,
    key: Option<Key>,
}

impl ElementNode {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn children(&self) -> &[VNode] {
        &self.children
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentNode {
    component: Component,
    props: Props,
    children: Vec<VNode>,
    key: Option<Key>,
}

impl ComponentNode {
    pub fn component(&self) -> Component {
        self.component
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn children(&self) -> &[VNode] {
        &self.children
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }
}

#[derive(Clone, Debug)]
pub enum VNode {
    Element(Rc<ElementNode>),
    Text(Rc<str>),
    Component(Rc<ComponentNode>),
}

impl VNode {
    pub fn text(value: impl fmt::Display) -> Self {
        VNode::Text(Rc::from(value.to_string()))
    }

    pub fn element(tag: impl Into<Rc<str>>, mut props: Props, children: Vec<VNode>) -> Self {
        let key = props.take_key();
        VNode::Element(Rc::new(ElementNode {
            tag: tag.into(),
            props,
            children,
            key,
        }))
    }

    pub fn component(component: Component, mut props: Props, children: Vec<VNode>) -> Self {
        let key = props.take_key();
        VNode::Component(Rc::new(ComponentNode {
            component,
            props,
            children,
            key,
        }))
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            VNode::Element(element) => element.key.as_ref(),
            VNode::Component(component) => component.key.as_ref(),
            VNode::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[VNode] {
        match self {
            VNode::Element(element) => &element.children,
            VNode::Component(component) => &component.children,
            VNode::Text(_) => &[],
        }
    }

    pub fn props(&self) -> Option<&Props> {
        match self {
            VNode::Element(element) => Some(&element.props),
            VNode::Component(component) => Some(&component.props),
            VNode::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            VNode::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Whether `other` may reuse the display subtree built for `self`.
    pub fn same_kind(&self, other: &VNode) -> bool {
        match (self, other) {
            (VNode::Element(a), VNode::Element(b)) => a.tag == b.tag,
            (VNode::Text(_), VNode::Text(_)) => true,
            (VNode::Component(a), VNode::Component(b)) => a.component == b.component,
            _ => false,
        }
    }
}

impl PartialEq for VNode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (VNode::Element(a), VNode::Element(b)) => Rc::ptr_eq(a, b) || a == b,
            (VNode::Text(a), VNode::Text(b)) => a == b,
            (VNode::Component(a), VNode::Component(b)) => Rc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

/// What `create_node` builds: an element tag or a component.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element(Rc<str>),
    Component(Component),
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Element(tag) => write!(f, "<{tag}>"),
            NodeKind::Component(component) => write!(f, "<{}>", component.name()),
        }
    }
}

impl From<&str> for NodeKind {
    fn from(tag: &str) -> Self {
        NodeKind::Element(Rc::from(tag))
    }
}

impl From<String> for NodeKind {
    fn from(tag: String) -> Self {
        NodeKind::Element(Rc::from(tag))
    }
}

impl From<Component> for NodeKind {
    fn from(component: Component) -> Self {
        NodeKind::Component(component)
    }
}

/// A child argument before flattening.
#[derive(Debug, Clone)]
pub enum Child {
    Empty,
    Node(VNode),
    List(Vec<Child>),
}

pub trait IntoChild {
    fn into_child(self) -> Child;
}

impl IntoChild for Child {
    fn into_child(self) -> Child {
        self
    }
}

impl IntoChild for VNode {
    fn into_child(self) -> Child {
        Child::Node(self)
    }
}

impl IntoChild for &VNode {
    fn into_child(self) -> Child {
        Child::Node(self.clone())
    }
}

impl IntoChild for &str {
    fn into_child(self) -> Child {
        Child::Node(VNode::Text(Rc::from(self)))
    }
}

impl IntoChild for String {
    fn into_child(self) -> Child {
        Child::Node(VNode::Text(Rc::from(self)))
    }
}

impl IntoChild for &String {
    fn into_child(self) -> Child {
        Child::Node(VNode::Text(Rc::from(self.as_str())))
    }
}

impl IntoChild for Rc<str> {
    fn into_child(self) -> Child {
        Child::Node(VNode::Text(self))
    }
}

macro_rules! child_from_display {
    ($($ty:ty),*) => {
        $(
            impl IntoChild for $ty {
                fn into_child(self) -> Child {
                    Child::Node(VNode::text(self))
                }
            }
        )*
    };
}

child_from_display!(i32, i64, u32, u64, usize, f32, f64);

/// Booleans render nothing, so `flag && node` style children disappear.
impl IntoChild for bool {
    fn into_child(self) -> Child {
        Child::Empty
    }
}

impl<T: IntoChild> IntoChild for Option<T> {
    fn into_child(self) -> Child {
        match self {
            Some(child) => child.into_child(),
            None => Child::Empty,
        }
    }
}

impl<T: IntoChild> IntoChild for Vec<T> {
    fn into_child(self) -> Child {
        Child::List(self.into_iter().map(IntoChild::into_child).collect())
    }
}

impl<T: IntoChild, const N: usize> IntoChild for [T; N] {
    fn into_child(self) -> Child {
        Child::List(self.into_iter().map(IntoChild::into_child).collect())
    }
}

/// One positional argument of [`create_node`].
#[derive(Debug, Clone)]
pub enum Arg {
    /// Explicit "no props" marker.
    Null,
    Props(Props),
    Child(Child),
}

pub trait IntoArg {
    fn into_arg(self) -> Arg;
}

impl IntoArg for Arg {
    fn into_arg(self) -> Arg {
        self
    }
}

impl IntoArg for () {
    fn into_arg(self) -> Arg {
        Arg::Null
    }
}

impl IntoArg for Props {
    fn into_arg(self) -> Arg {
        Arg::Props(self)
    }
}

macro_rules! arg_from_child {
    ($($ty:ty),*) => {
        $(
            impl IntoArg for $ty {
                fn into_arg(self) -> Arg {
                    Arg::Child(self.into_child())
                }
            }
        )*
    };
}

arg_from_child!(Child, VNode, &VNode, &str, String, &String, Rc<str>, bool);
arg_from_child!(i32, i64, u32, u64, usize, f32, f64);

impl<T: IntoChild> IntoArg for Option<T> {
    fn into_arg(self) -> Arg {
        Arg::Child(self.into_child())
    }
}

impl<T: IntoChild> IntoArg for Vec<T> {
    fn into_arg(self) -> Arg {
        Arg::Child(self.into_child())
    }
}

impl<T: IntoChild, const N: usize> IntoArg for [T; N] {
    fn into_arg(self) -> Arg {
        Arg::Child(self.into_child())
    }
}

/// Builds a node from a kind and positional arguments.
///
/// The first argument is the props when it is a [`Props`] value or the `()`
/// null marker; otherwise every argument is a child. Children are flattened
/// depth-first and empty children are dropped.
pub fn create_node(kind: impl Into<NodeKind>, args: Vec<Arg>) -> VNode {
    let kind = kind.into();
    let mut args = args.into_iter().peekable();
    let props = match args.peek() {
        Some(Arg::Null) => {
            args.next();
            Props::new()
        }
        Some(Arg::Props(_)) => match args.next() {
            Some(Arg::Props(props)) => props,
            _ => Props::new(),
        },
        _ => Props::new(),
    };

    let mut children = Vec::new();
    for arg in args {
        match arg {
            Arg::Child(child) => flatten_into(child, &mut children),
            Arg::Null => {}
            Arg::Props(props) => {
                log::warn!("create_node: props {props:?} passed in a child position of {kind}; ignored");
            }
        }
    }
    warn_duplicate_keys(&kind, &children);

    match kind {
        NodeKind::Element(tag) => VNode::element(tag, props, children),
        NodeKind::Component(component) => VNode::component(component, props, children),
    }
}

fn flatten_into(child: Child, out: &mut Vec<VNode>) {
    match child {
        Child::Empty => {}
        Child::Node(node) => out.push(node),
        Child::List(children) => {
            for child in children {
                flatten_into(child, out);
            }
        }
    }
}

fn warn_duplicate_keys(kind: &NodeKind, children: &[VNode]) {
    if children.len() < 2 {
        return;
    }
    let mut seen = fast_set(children.len());
    for key in children.iter().filter_map(VNode::key) {
        if !seen.insert(key) {
            log::warn!(
                "create_node: duplicate key `{key}` among the children of {kind}; the first occurrence wins"
            );
            break;
        }
    }
}

/// Builds a [`VNode`]: `h!("ul", props!{"class" => "list"}, items, "tail")`.
#[macro_export]
macro_rules! h {
    ($kind:expr $(, $arg:expr)* $(,)?) => {
        $crate::create_node($kind, ::std::vec![$($crate::IntoArg::into_arg($arg)),*])
    };
}

#[cfg(test)]
#[path = "tests/vnode_tests.rs"]
mod tests;
