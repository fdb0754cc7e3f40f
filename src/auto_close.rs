//! Flatten several closeable resources into one sequence, closing each as
//! soon as it is exhausted.
//!
//! Every resource is closed exactly once: when iteration moves past it, or,
//! if iteration is abandoned, when the [`AutoClose`] is dropped. In the
//! latter case the active resource is closed first and the pending ones
//! follow in order.

use std::collections::VecDeque;

use crate::error::{PipelineError, Result};

/// An iterable resource that must be released explicitly.
pub trait Closeable: Iterator {
    /// Name used in log messages.
    fn name(&self) -> &str;

    /// Release the resource. Called exactly once by [`AutoClose`].
    fn close(&mut self);
}

/// Iterates resources in order, closing each one as it runs dry.
pub struct AutoClose<R: Closeable> {
    current: Option<R>,
    pending: VecDeque<R>,
}

impl<R: Closeable> AutoClose<R> {
    pub fn new(resources: impl IntoIterator<Item = R>) -> Result<Self> {
        let mut pending: VecDeque<R> = resources.into_iter().collect();
        let current = pending.pop_front().ok_or(PipelineError::NoResources)?;
        Ok(Self {
            current: Some(current),
            pending,
        })
    }

    /// Name of the resource currently being read.
    pub fn current_name(&self) -> Option<&str> {
        self.current.as_ref().map(|r| r.name())
    }

    /// Number of resources not yet closed.
    pub fn remaining(&self) -> usize {
        self.pending.len() + usize::from(self.current.is_some())
    }

    fn close_current(&mut self) {
        if let Some(mut resource) = self.current.take() {
            resource.close();
        }
    }
}

impl<R: Closeable> Iterator for AutoClose<R> {
    type Item = R::Item;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let resource = self.current.as_mut()?;
            if let Some(item) = resource.next() {
                return Some(item);
            }
            self.close_current();
            self.current = self.pending.pop_front();
        }
    }
}

impl<R: Closeable> Drop for AutoClose<R> {
    fn drop(&mut self) {
        self.close_current();
        while let Some(mut resource) = self.pending.pop_front() {
            resource.close();
        }
    }
}

/// Adapts a plain iterator into a [`Closeable`] with a close callback.
pub struct CloseWith<I, F> {
    name: String,
    iter: I,
    on_close: F,
}

/// Wrap `iter` so that `on_close` runs when it is closed.
pub fn close_with<I, F>(name: impl Into<String>, iter: I, on_close: F) -> CloseWith<I, F>
where
    I: Iterator,
    F: FnMut(),
{
    CloseWith {
        name: name.into(),
        iter,
        on_close,
    }
}

impl<I: Iterator, F: FnMut()> Iterator for CloseWith<I, F> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

impl<I: Iterator, F: FnMut()> Closeable for CloseWith<I, F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) {
        (self.on_close)();
    }
}
