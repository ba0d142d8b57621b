use std::any::type_name;
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

/// A shared handle to a reference counted node.
///
/// Cloning a `Ref` acquires the node, dropping it releases the node, and the
/// node itself is destroyed when the last handle goes away. A `Ref` may be
/// null (see [`Ref::null`]); dereferencing a null handle panics.
pub struct Ref<T: ?Sized> {
    node: Option<Rc<T>>,
}

impl<T> Ref<T> {
    pub fn new(node: T) -> Self {
        Self {
            node: Some(Rc::new(node)),
        }
    }
}

impl<T: ?Sized> Ref<T> {
    pub fn null() -> Self {
        Self { node: None }
    }

    pub fn from_rc(node: Rc<T>) -> Self {
        Self { node: Some(node) }
    }

    /// Upgrades a non-owning back reference, giving a null handle if the
    /// node has already been destroyed.
    pub fn from_weak(weak: &Weak<T>) -> Self {
        Self {
            node: weak.upgrade(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.node.is_none()
    }

    pub fn get_node(&self) -> Option<&T> {
        self.node.as_deref()
    }

    pub fn as_rc(&self) -> Option<&Rc<T>> {
        self.node.as_ref()
    }

    /// Points this handle at `other`'s node. The old node is released before
    /// the new one is acquired; assigning a handle to itself is a no-op.
    pub fn set_node(&mut self, other: &Ref<T>) {
        if self.ptr_eq(other) {
            return;
        }
        drop(self.node.take());
        self.node = other.node.clone();
    }

    /// Releases the node, leaving a null handle behind.
    pub fn clear(&mut self) {
        drop(self.node.take());
    }

    pub fn downgrade(&self) -> Weak<T>
    where
        T: Sized,
    {
        match &self.node {
            Some(node) => Rc::downgrade(node),
            None => Weak::new(),
        }
    }

    /// Converts into a handle over a related node type, e.g. from a concrete
    /// type to a trait object it implements:
    /// `Ref::new(f).upcast(|f| f as Rc<dyn ModelFunction>)`.
    pub fn upcast<U: ?Sized>(self, coerce: impl FnOnce(Rc<T>) -> Rc<U>) -> Ref<U> {
        Ref {
            node: self.node.map(coerce),
        }
    }

    /// Handles are equal if they point at the same node. Two null handles
    /// compare equal.
    pub fn ptr_eq(&self, other: &Ref<T>) -> bool {
        match (&self.node, &other.node) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub fn ref_count(&self) -> usize {
        self.node.as_ref().map_or(0, Rc::strong_count)
    }
}

impl<T: ?Sized> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<T: ?Sized> Default for Ref<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> Deref for Ref<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.node {
            Some(node) => node,
            None => panic!("dereferenced a null Ref<{}>", type_name::<T>()),
        }
    }
}

impl<T: ?Sized> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: ?Sized> Eq for Ref<T> {}

impl<T: ?Sized> From<Rc<T>> for Ref<T> {
    fn from(node: Rc<T>) -> Self {
        Self::from_rc(node)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.node {
            Some(node) => write!(f, "Ref({:?})", node),
            None => write!(f, "Ref(null)"),
        }
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.node {
            Some(node) => write!(f, "{}", node),
            None => write!(f, "null"),
        }
    }
}
