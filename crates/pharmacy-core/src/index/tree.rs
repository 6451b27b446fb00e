//! Unbalanced binary search tree stored in an arena.
//!
//! Nodes live in a slot vector and link to each other by slot index, each
//! keeping a parent back-reference so in-order traversal needs no stack.
//! External handles ([`Cursor`]) carry a generation number so a handle to a
//! removed node is detected instead of silently aliasing a reused slot.
//!
//! No rebalancing is ever performed: inserting keys in sorted order produces a
//! linked list of depth `n`. Traversal order always equals comparator order.

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

/// Index errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("Cursor is at the end of the index")]
    EndOfIndex,

    #[error("Cursor refers to a removed node")]
    StaleCursor,
}

pub type IndexResult<T> = Result<T, IndexError>;

/// Stable handle to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

/// Position in the index: a node, or the end sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor(Option<NodeId>);

impl Cursor {
    pub fn end() -> Self {
        Cursor(None)
    }

    pub fn is_end(&self) -> bool {
        self.0.is_none()
    }

    pub fn node(&self) -> Option<NodeId> {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Node<T> {
    value: T,
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    node: Option<Node<T>>,
}

/// Default ordering: `a < b`.
pub fn natural_less<T: PartialOrd>(a: &T, b: &T) -> bool {
    a < b
}

/// Binary search tree ordered by a strict-weak "less" comparator.
///
/// Two values are equivalent when neither is less than the other. Inserting a
/// value equivalent to one already present is a no-op.
#[derive(Clone)]
pub struct OrderedIndex<T, C = fn(&T, &T) -> bool> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    root: Option<usize>,
    less: C,
}

impl<T: PartialOrd> OrderedIndex<T> {
    /// Empty index ordered by `<`.
    pub fn new() -> Self {
        Self::with_comparator(natural_less::<T>)
    }
}

impl<T: PartialOrd> Default for OrderedIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

// Structure and traversal: no comparator needed.
impl<T, C> OrderedIndex<T, C> {
    fn node(&self, i: usize) -> Option<&Node<T>> {
        self.slots.get(i).and_then(|s| s.node.as_ref())
    }

    fn node_mut(&mut self, i: usize) -> Option<&mut Node<T>> {
        self.slots.get_mut(i).and_then(|s| s.node.as_mut())
    }

    fn left(&self, i: usize) -> Option<usize> {
        self.node(i).and_then(|n| n.left)
    }

    fn right(&self, i: usize) -> Option<usize> {
        self.node(i).and_then(|n| n.right)
    }

    fn parent(&self, i: usize) -> Option<usize> {
        self.node(i).and_then(|n| n.parent)
    }

    fn set_parent(&mut self, child: Option<usize>, parent: Option<usize>) {
        if let Some(node) = child.and_then(|c| self.node_mut(c)) {
            node.parent = parent;
        }
    }

    fn handle(&self, i: usize) -> Cursor {
        match self.slots.get(i) {
            Some(slot) if slot.node.is_some() => Cursor(Some(NodeId {
                index: i,
                generation: slot.generation,
            })),
            _ => Cursor::end(),
        }
    }

    fn resolve(&self, cursor: Cursor) -> IndexResult<usize> {
        let id = cursor.0.ok_or(IndexError::EndOfIndex)?;
        match self.slots.get(id.index) {
            Some(slot) if slot.generation == id.generation && slot.node.is_some() => {
                Ok(id.index)
            }
            _ => Err(IndexError::StaleCursor),
        }
    }

    fn minimum(&self, mut i: usize) -> usize {
        while let Some(l) = self.left(i) {
            i = l;
        }
        i
    }

    fn maximum(&self, mut i: usize) -> usize {
        while let Some(r) = self.right(i) {
            i = r;
        }
        i
    }

    fn successor(&self, i: usize) -> Option<usize> {
        if let Some(r) = self.right(i) {
            return Some(self.minimum(r));
        }
        let mut child = i;
        let mut parent = self.parent(i);
        while let Some(p) = parent {
            if self.right(p) != Some(child) {
                break;
            }
            child = p;
            parent = self.parent(p);
        }
        parent
    }

    fn predecessor(&self, i: usize) -> Option<usize> {
        if let Some(l) = self.left(i) {
            return Some(self.maximum(l));
        }
        let mut child = i;
        let mut parent = self.parent(i);
        while let Some(p) = parent {
            if self.left(p) != Some(child) {
                break;
            }
            child = p;
            parent = self.parent(p);
        }
        parent
    }

    fn alloc(&mut self, node: Node<T>) -> usize {
        match self.free.pop() {
            Some(i) => {
                self.slots[i].node = Some(node);
                i
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, i: usize) -> Option<T> {
        let slot = self.slots.get_mut(i)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(i);
        Some(node.value)
    }

    /// Replace the subtree rooted at `u` with the one rooted at `v`.
    fn transplant(&mut self, u: usize, v: Option<usize>) {
        let parent = self.parent(u);
        match parent {
            None => self.root = v,
            Some(p) => {
                let is_left = self.left(p) == Some(u);
                if let Some(node) = self.node_mut(p) {
                    if is_left {
                        node.left = v;
                    } else {
                        node.right = v;
                    }
                }
            }
        }
        self.set_parent(v, parent);
    }

    /// Detach node `z` from the tree, keeping every other node in place.
    fn unlink(&mut self, z: usize) {
        match (self.left(z), self.right(z)) {
            (None, right) => self.transplant(z, right),
            (left, None) => self.transplant(z, left),
            (Some(left), Some(right)) => {
                let successor = self.minimum(right);
                if self.parent(successor) != Some(z) {
                    // Successor sits deeper in the right subtree: lift its
                    // right child into its place, then adopt z's right subtree.
                    let successor_right = self.right(successor);
                    self.transplant(successor, successor_right);
                    if let Some(node) = self.node_mut(successor) {
                        node.right = Some(right);
                    }
                    self.set_parent(Some(right), Some(successor));
                }
                self.transplant(z, Some(successor));
                if let Some(node) = self.node_mut(successor) {
                    node.left = Some(left);
                }
                self.set_parent(Some(left), Some(successor));
            }
        }
    }

    /// Remove the node under `cursor` and return its value.
    pub fn remove_at(&mut self, cursor: Cursor) -> IndexResult<T> {
        let i = self.resolve(cursor)?;
        self.unlink(i);
        self.release(i).ok_or(IndexError::StaleCursor)
    }

    /// First element in pre-order (node, left, right) matching `pred`,
    /// or the end cursor.
    pub fn find_if<P>(&self, mut pred: P) -> Cursor
    where
        P: FnMut(&T) -> bool,
    {
        let mut stack: Vec<usize> = self.root.into_iter().collect();
        while let Some(i) = stack.pop() {
            let Some(node) = self.node(i) else {
                continue;
            };
            if pred(&node.value) {
                return self.handle(i);
            }
            stack.extend(node.right);
            stack.extend(node.left);
        }
        Cursor::end()
    }

    /// Descend by key. `order` reports how a stored value orders against the
    /// key being sought (`Less` means the value sorts before it).
    ///
    /// `order` must agree with the index ordering.
    pub fn find_by<P>(&self, mut order: P) -> Cursor
    where
        P: FnMut(&T) -> Ordering,
    {
        let mut current = self.root;
        while let Some(i) = current {
            let Some(node) = self.node(i) else {
                break;
            };
            match order(&node.value) {
                Ordering::Less => current = node.right,
                Ordering::Greater => current = node.left,
                Ordering::Equal => return self.handle(i),
            }
        }
        Cursor::end()
    }

    pub fn get(&self, cursor: Cursor) -> IndexResult<&T> {
        let i = self.resolve(cursor)?;
        self.node(i)
            .map(|n| &n.value)
            .ok_or(IndexError::StaleCursor)
    }

    /// Mutable access to a value. Callers must not change its ordering key.
    pub fn get_mut(&mut self, cursor: Cursor) -> IndexResult<&mut T> {
        let i = self.resolve(cursor)?;
        self.node_mut(i)
            .map(|n| &mut n.value)
            .ok_or(IndexError::StaleCursor)
    }

    /// Cursor at the smallest element (end when empty).
    pub fn begin(&self) -> Cursor {
        match self.root {
            Some(r) => self.handle(self.minimum(r)),
            None => Cursor::end(),
        }
    }

    pub fn end(&self) -> Cursor {
        Cursor::end()
    }

    /// In-order successor. The end cursor stays at end.
    pub fn next(&self, cursor: Cursor) -> Cursor {
        match self.resolve(cursor) {
            Ok(i) => self
                .successor(i)
                .map_or_else(Cursor::end, |s| self.handle(s)),
            Err(_) => Cursor::end(),
        }
    }

    /// In-order predecessor. Stepping back from end yields the largest element;
    /// stepping back from the first element yields end.
    pub fn prev(&self, cursor: Cursor) -> Cursor {
        if cursor.is_end() {
            return match self.root {
                Some(r) => self.handle(self.maximum(r)),
                None => Cursor::end(),
            };
        }
        match self.resolve(cursor) {
            Ok(i) => self
                .predecessor(i)
                .map_or_else(Cursor::end, |p| self.handle(p)),
            Err(_) => Cursor::end(),
        }
    }

    /// In-order iterator; double-ended.
    pub fn iter(&self) -> Iter<'_, T, C> {
        let front = self.root.map(|r| self.minimum(r));
        let back = self.root.map(|r| self.maximum(r));
        Iter {
            index: self,
            front,
            back,
            done: front.is_none(),
        }
    }

    /// Number of elements, counted by a full traversal.
    pub fn size(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Depth of the deepest node (0 for an empty index).
    pub fn height(&self) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(usize, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((i, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let Some(node) = self.node(i) {
                stack.extend(node.left.map(|l| (l, depth + 1)));
                stack.extend(node.right.map(|r| (r, depth + 1)));
            }
        }
        deepest
    }

    /// Remove every element. Slots are kept so outstanding cursors go stale.
    pub fn clear(&mut self) {
        self.free.clear();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push(i);
        }
        self.root = None;
    }
}

// Operations that compare values.
impl<T, C> OrderedIndex<T, C>
where
    C: Fn(&T, &T) -> bool,
{
    /// Empty index ordered by `less`.
    pub fn with_comparator(less: C) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            less,
        }
    }

    /// Insert a value. Returns `false`, dropping `value`, when an equivalent
    /// element is already present.
    pub fn insert(&mut self, value: T) -> bool {
        let mut parent = None;
        let mut go_left = false;
        let mut current = self.root;

        while let Some(i) = current {
            let Some(node) = self.node(i) else {
                break;
            };
            if (self.less)(&value, &node.value) {
                go_left = true;
                current = node.left;
            } else if (self.less)(&node.value, &value) {
                go_left = false;
                current = node.right;
            } else {
                return false;
            }
            parent = Some(i);
        }

        let i = self.alloc(Node {
            value,
            parent,
            left: None,
            right: None,
        });
        match parent {
            None => self.root = Some(i),
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    if go_left {
                        node.left = Some(i);
                    } else {
                        node.right = Some(i);
                    }
                }
            }
        }
        true
    }

    /// Cursor at the element equivalent to `value`, or end.
    pub fn find(&self, value: &T) -> Cursor {
        let mut current = self.root;
        while let Some(i) = current {
            let Some(node) = self.node(i) else {
                break;
            };
            if (self.less)(value, &node.value) {
                current = node.left;
            } else if (self.less)(&node.value, value) {
                current = node.right;
            } else {
                return self.handle(i);
            }
        }
        Cursor::end()
    }

    pub fn contains(&self, value: &T) -> bool {
        !self.find(value).is_end()
    }

    /// Remove the element equivalent to `value`, returning it.
    pub fn remove(&mut self, value: &T) -> Option<T> {
        let cursor = self.find(value);
        self.remove_at(cursor).ok()
    }
}

impl<T: fmt::Debug, C> fmt::Debug for OrderedIndex<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// In-order iterator over an [`OrderedIndex`].
pub struct Iter<'a, T, C> {
    index: &'a OrderedIndex<T, C>,
    front: Option<usize>,
    back: Option<usize>,
    done: bool,
}

impl<'a, T, C> Iterator for Iter<'a, T, C> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let i = self.front?;
        if self.front == self.back {
            self.done = true;
        } else {
            self.front = self.index.successor(i);
        }
        self.index.node(i).map(|n| &n.value)
    }
}

impl<'a, T, C> DoubleEndedIterator for Iter<'a, T, C> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let i = self.back?;
        if self.front == self.back {
            self.done = true;
        } else {
            self.back = self.index.predecessor(i);
        }
        self.index.node(i).map(|n| &n.value)
    }
}

impl<'a, T, C> IntoIterator for &'a OrderedIndex<T, C> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
