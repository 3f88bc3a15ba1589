//! A small JSON document model.
//!
//! Nodes live in an arena owned by [`Json`] and are addressed by [`NodeId`].
//! Containers keep their children as a doubly linked list threaded through
//! the arena, so appending, prepending and detaching are constant time.
//! A detached node stays in the arena and can be attached again; [`Json::delete`]
//! releases a subtree's slots for reuse.

mod check;
mod decode;
mod encode;

use std::fmt;

pub use self::check::CheckError;
pub use self::decode::{decode, decode_bytes, decode_prefix, validate};
pub use self::encode::{encode_string, format_number};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline(always)]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    Null,
    Bool,
    String,
    Number,
    Array,
    Object,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tag::Null => "null",
            Tag::Bool => "bool",
            Tag::String => "string",
            Tag::Number => "number",
            Tag::Array => "array",
            Tag::Object => "object",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    String(String),
    Number(f64),
    Array,
    Object,
}

impl Value {
    pub fn tag(&self) -> Tag {
        match self {
            Value::Null => Tag::Null,
            Value::Bool(_) => Tag::Bool,
            Value::String(_) => Tag::String,
            Value::Number(_) => Tag::Number,
            Value::Array => Tag::Array,
            Value::Object => Tag::Object,
        }
    }

    fn is_container(&self) -> bool {
        matches!(self, Value::Array | Value::Object)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JsonError {
    #[error("JSON syntax error at offset {offset}: {reason}")]
    Syntax { offset: usize, reason: &'static str },

    #[error("JSON text is not valid UTF-8")]
    InvalidUtf8,

    #[error("JSON nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("JSON node {0:?} does not exist")]
    StaleNode(NodeId),

    #[error("expected a JSON {expected}, found a JSON {found}")]
    WrongTag { expected: Tag, found: Tag },

    #[error("JSON node {0:?} already has a parent")]
    Attached(NodeId),

    #[error("attaching JSON node {0:?} would create a cycle")]
    Cycle(NodeId),
}

#[derive(Clone, Debug)]
struct Node {
    value: Value,
    key: Option<String>,
    parent: Option<NodeId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
}

impl Node {
    fn new(value: Value) -> Node {
        Node {
            value,
            key: None,
            parent: None,
            prev: None,
            next: None,
            head: None,
            tail: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Json {
    slots: Vec<Option<Node>>,
    free: Vec<u32>,
    root: Option<NodeId>,
}

impl Json {
    pub fn new() -> Json {
        Json::default()
    }

    /// A document whose root is an empty object.
    pub fn with_object_root() -> Json {
        let mut doc = Json::new();
        let root = doc.new_object();
        doc.root = Some(root);
        doc
    }

    #[inline(always)]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: Option<NodeId>) {
        self.root = root;
    }

    /// Number of live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, value: Value) -> NodeId {
        let node = Node::new(value);
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(node);
                NodeId(index)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() as u32 - 1)
            }
        }
    }

    pub fn new_null(&mut self) -> NodeId {
        self.insert(Value::Null)
    }

    pub fn new_bool(&mut self, b: bool) -> NodeId {
        self.insert(Value::Bool(b))
    }

    pub fn new_string<S: Into<String>>(&mut self, s: S) -> NodeId {
        self.insert(Value::String(s.into()))
    }

    pub fn new_number(&mut self, n: f64) -> NodeId {
        self.insert(Value::Number(n))
    }

    pub fn new_array(&mut self) -> NodeId {
        self.insert(Value::Array)
    }

    pub fn new_object(&mut self) -> NodeId {
        self.insert(Value::Object)
    }

    fn node(&self, id: NodeId) -> Result<&Node, JsonError> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(JsonError::StaleNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, JsonError> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(JsonError::StaleNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn value(&self, id: NodeId) -> Option<&Value> {
        self.node(id).ok().map(|n| &n.value)
    }

    pub fn tag(&self, id: NodeId) -> Option<Tag> {
        self.value(id).map(Value::tag)
    }

    /// The member key, present only on children of an object.
    pub fn key(&self, id: NodeId) -> Option<&str> {
        self.node(id).ok().and_then(|n| n.key.as_deref())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok().and_then(|n| n.parent)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok().and_then(|n| n.next)
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok().and_then(|n| n.prev)
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok().and_then(|n| n.head)
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok().and_then(|n| n.tail)
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            cursor: self.first_child(id),
        }
    }

    pub fn as_str(&self, id: NodeId) -> Option<&str> {
        match self.value(id)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self, id: NodeId) -> Option<f64> {
        match self.value(id)? {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self, id: NodeId) -> Option<bool> {
        match self.value(id)? {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn find_element(&self, array: NodeId, index: usize) -> Option<NodeId> {
        if self.tag(array)? != Tag::Array {
            return None;
        }
        self.children(array).nth(index)
    }

    /// First member of `object` named `name`.
    pub fn find_member(&self, object: NodeId, name: &str) -> Option<NodeId> {
        if self.tag(object)? != Tag::Object {
            return None;
        }
        self.children(object).find(|&c| self.key(c) == Some(name))
    }

    fn expect_tag(&self, id: NodeId, expected: Tag) -> Result<(), JsonError> {
        let found = self.node(id)?.value.tag();
        if found != expected {
            return Err(JsonError::WrongTag { expected, found });
        }
        Ok(())
    }

    /// Refuses children that are attached elsewhere, and ancestors of the
    /// prospective parent.
    fn check_attachable(&self, parent: NodeId, child: NodeId) -> Result<(), JsonError> {
        if self.node(child)?.parent.is_some() {
            return Err(JsonError::Attached(child));
        }
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(JsonError::Cycle(child));
            }
            cursor = self.node(id)?.parent;
        }
        Ok(())
    }

    fn link_last(&mut self, parent: NodeId, child: NodeId) -> Result<(), JsonError> {
        let tail = self.node(parent)?.tail;
        {
            let node = self.node_mut(child)?;
            node.parent = Some(parent);
            node.prev = tail;
            node.next = None;
        }
        match tail {
            Some(tail) => self.node_mut(tail)?.next = Some(child),
            None => self.node_mut(parent)?.head = Some(child),
        }
        self.node_mut(parent)?.tail = Some(child);
        Ok(())
    }

    fn link_first(&mut self, parent: NodeId, child: NodeId) -> Result<(), JsonError> {
        let head = self.node(parent)?.head;
        {
            let node = self.node_mut(child)?;
            node.parent = Some(parent);
            node.prev = None;
            node.next = head;
        }
        match head {
            Some(head) => self.node_mut(head)?.prev = Some(child),
            None => self.node_mut(parent)?.tail = Some(child),
        }
        self.node_mut(parent)?.head = Some(child);
        Ok(())
    }

    pub fn append_element(&mut self, array: NodeId, element: NodeId) -> Result<(), JsonError> {
        self.expect_tag(array, Tag::Array)?;
        self.check_attachable(array, element)?;
        self.node_mut(element)?.key = None;
        self.link_last(array, element)
    }

    pub fn prepend_element(&mut self, array: NodeId, element: NodeId) -> Result<(), JsonError> {
        self.expect_tag(array, Tag::Array)?;
        self.check_attachable(array, element)?;
        self.node_mut(element)?.key = None;
        self.link_first(array, element)
    }

    pub fn append_member(
        &mut self,
        object: NodeId,
        key: &str,
        value: NodeId,
    ) -> Result<(), JsonError> {
        self.expect_tag(object, Tag::Object)?;
        self.check_attachable(object, value)?;
        self.node_mut(value)?.key = Some(key.to_string());
        self.link_last(object, value)
    }

    pub fn prepend_member(
        &mut self,
        object: NodeId,
        key: &str,
        value: NodeId,
    ) -> Result<(), JsonError> {
        self.expect_tag(object, Tag::Object)?;
        self.check_attachable(object, value)?;
        self.node_mut(value)?.key = Some(key.to_string());
        self.link_first(object, value)
    }

    /// Detaches `id` from its parent without freeing it. A no-op for nodes
    /// without a parent.
    pub fn remove_from_parent(&mut self, id: NodeId) -> Result<(), JsonError> {
        let (parent, prev, next) = {
            let node = self.node(id)?;
            match node.parent {
                Some(parent) => (parent, node.prev, node.next),
                None => return Ok(()),
            }
        };

        match prev {
            Some(prev) => self.node_mut(prev)?.next = next,
            None => self.node_mut(parent)?.head = next,
        }
        match next {
            Some(next) => self.node_mut(next)?.prev = prev,
            None => self.node_mut(parent)?.tail = prev,
        }

        let node = self.node_mut(id)?;
        node.parent = None;
        node.prev = None;
        node.next = None;
        node.key = None;
        Ok(())
    }

    /// Detaches `id` and frees it along with all of its descendants.
    pub fn delete(&mut self, id: NodeId) -> Result<(), JsonError> {
        self.remove_from_parent(id)?;
        if self.root == Some(id) {
            self.root = None;
        }

        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let node = self
                .slots
                .get_mut(current.index())
                .and_then(Option::take)
                .ok_or(JsonError::StaleNode(current))?;
            let mut child = node.head;
            while let Some(c) = child {
                pending.push(c);
                child = self.node(c)?.next;
            }
            self.free.push(current.0);
        }
        Ok(())
    }

    /// Deep-copies the subtree at `node` of `other` into this arena,
    /// returning the detached copy.
    pub fn import(&mut self, other: &Json, node: NodeId) -> Result<NodeId, JsonError> {
        let value = other.node(node)?.value.clone();
        let is_object = value == Value::Object;
        let copy = self.insert(value);
        for child in other.children(node) {
            let child_copy = self.import(other, child)?;
            match other.key(child) {
                Some(key) if is_object => self.append_member(copy, key, child_copy)?,
                _ => self.append_element(copy, child_copy)?,
            }
        }
        Ok(copy)
    }

    /// Structural equality of the subtree `a` in `self` and `b` in `other`.
    /// Member order is significant.
    pub fn subtree_eq(&self, a: NodeId, other: &Json, b: NodeId) -> bool {
        let (na, nb) = match (self.node(a), other.node(b)) {
            (Ok(na), Ok(nb)) => (na, nb),
            _ => return false,
        };
        if na.value != nb.value || na.key != nb.key {
            return false;
        }
        if !na.value.is_container() {
            return true;
        }

        let mut ca = self.children(a);
        let mut cb = other.children(b);
        loop {
            match (ca.next(), cb.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    if !self.subtree_eq(x, other, y) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}

impl PartialEq for Json {
    fn eq(&self, other: &Json) -> bool {
        match (self.root, other.root) {
            (None, None) => true,
            (Some(a), Some(b)) => self.subtree_eq(a, other, b),
            _ => false,
        }
    }
}

pub struct Children<'a> {
    doc: &'a Json,
    cursor: Option<NodeId>,
}

impl<'a> Iterator for Children<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.cursor?;
        self.cursor = self.doc.next_sibling(current);
        Some(current)
    }
}
