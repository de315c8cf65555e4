//! Single-owner hand-off of render resources between threads.
//!
//! A producer wraps a resource in a [`TransferPointer`] and ships it. The
//! receiver turns it into a [`MasterPointer`], which stays on the receiving
//! thread. Whoever holds the resource when a handle is dropped destroys it.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use static_assertions::{assert_impl_all, assert_not_impl_any};

pub struct TransferPointer<T> {
    resource: Option<Box<T>>,
}

impl<T> TransferPointer<T> {
    pub fn transfer(resource: T) -> Self {
        Self::from_box(Box::new(resource))
    }

    pub fn from_box(resource: Box<T>) -> Self {
        Self {
            resource: Some(resource),
        }
    }

    pub fn is_holding(&self) -> bool {
        self.resource.is_some()
    }

    /// Converts the handle into the receiving owner.
    pub fn accept(mut self) -> MasterPointer<T> {
        match self.resource.take() {
            Some(resource) => MasterPointer::from_box(resource),
            None => panic!("transfer pointer accepted after its resource was released"),
        }
    }

    /// Takes the resource out, leaving the handle released. Returns `None`
    /// when the resource was already taken or destroyed.
    pub fn take(&mut self) -> Option<MasterPointer<T>> {
        self.resource.take().map(MasterPointer::from_box)
    }

    /// Destroys the held resource now. Calling it on a released handle is a no-op.
    pub fn destroy(&mut self) {
        self.resource = None;
    }
}

impl<T> fmt::Debug for TransferPointer<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TransferPointer")
            .field("holding", &self.is_holding())
            .finish()
    }
}

/// Owning handle on the receiving side.
///
/// Not `Send`: once accepted, a resource stays with the thread that accepted
/// it. Use [`MasterPointer::into_transfer`] for a deliberate second hand-off.
pub struct MasterPointer<T> {
    resource: Box<T>,
    _not_send: PhantomData<*const ()>,
}

impl<T> MasterPointer<T> {
    pub fn new(resource: T) -> Self {
        Self::from_box(Box::new(resource))
    }

    fn from_box(resource: Box<T>) -> Self {
        Self {
            resource,
            _not_send: PhantomData,
        }
    }

    pub fn into_transfer(self) -> TransferPointer<T> {
        TransferPointer::from_box(self.resource)
    }

    pub fn into_inner(self) -> T {
        *self.resource
    }
}

impl<T> Deref for MasterPointer<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.resource
    }
}

impl<T> DerefMut for MasterPointer<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.resource
    }
}

impl<T: fmt::Debug> fmt::Debug for MasterPointer<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("MasterPointer")
            .field(&self.resource)
            .finish()
    }
}

assert_impl_all!(TransferPointer<crate::RenderBucket>: Send);
assert_not_impl_any!(TransferPointer<crate::RenderBucket>: Clone);
assert_not_impl_any!(MasterPointer<crate::RenderBucket>: Send, Sync, Clone);
