//! Generic transform stages over any item type.
//!
//! Buffering stages (`tail`, `sorted`, `reversed`) read nothing until the
//! first item is pulled, and stop at the first upstream error, yielding it.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::marker::PhantomData;

use crate::error::Result;
use crate::pipeline::Lazy;
use crate::stage::{Stage, StageKind};

/// Collect `upstream` and hand the items to `f`, deferring until first pull.
fn buffered<T, F>(upstream: Lazy<T>, f: F) -> Lazy<T>
where
    T: 'static,
    F: FnOnce(Vec<T>) -> Vec<T> + 'static,
{
    Lazy::deferred(move || match upstream.collect::<Result<Vec<T>>>() {
        Ok(items) => Lazy::from_values(f(items)),
        Err(err) => Lazy::failed(err),
    })
}

/// HEAD n - keeps the first n items.
pub struct Head<T> {
    n: usize,
    _item: PhantomData<fn(T)>,
}

pub fn head<T>(n: usize) -> Head<T> {
    Head {
        n,
        _item: PhantomData,
    }
}

struct HeadIter<T> {
    upstream: Option<Lazy<T>>,
    remaining: usize,
}

impl<T> Iterator for HeadIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.upstream.as_mut()?.next();
        match item {
            Some(Ok(value)) => {
                self.remaining -= 1;
                if self.remaining == 0 {
                    // release upstream resources without reading further
                    self.upstream = None;
                }
                Some(Ok(value))
            }
            Some(Err(err)) => Some(Err(err)),
            None => {
                self.upstream = None;
                None
            }
        }
    }
}

impl<T: 'static> Stage<T> for Head<T> {
    type Out = T;

    fn name(&self) -> &'static str {
        "head"
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn apply(self, upstream: Lazy<T>) -> Lazy<T> {
        if self.n == 0 {
            return Lazy::empty();
        }
        Lazy::new(HeadIter {
            upstream: Some(upstream),
            remaining: self.n,
        })
    }
}

/// TAIL n - keeps the last n items.
pub struct Tail<T> {
    n: usize,
    _item: PhantomData<fn(T)>,
}

pub fn tail<T>(n: usize) -> Tail<T> {
    Tail {
        n,
        _item: PhantomData,
    }
}

impl<T: 'static> Stage<T> for Tail<T> {
    type Out = T;

    fn name(&self) -> &'static str {
        "tail"
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn apply(self, upstream: Lazy<T>) -> Lazy<T> {
        let n = self.n;
        Lazy::deferred(move || {
            let mut last: VecDeque<T> = VecDeque::with_capacity(n);
            for item in upstream {
                match item {
                    Ok(value) => {
                        if n == 0 {
                            continue;
                        }
                        if last.len() == n {
                            last.pop_front();
                        }
                        last.push_back(value);
                    }
                    Err(err) => return Lazy::failed(err),
                }
            }
            Lazy::from_values(last)
        })
    }
}

/// UNIQ - drops consecutive duplicates.
pub struct Uniq<T> {
    _item: PhantomData<fn(T)>,
}

pub fn uniq<T>() -> Uniq<T> {
    Uniq { _item: PhantomData }
}

impl<T: PartialEq + Clone + 'static> Stage<T> for Uniq<T> {
    type Out = T;

    fn name(&self) -> &'static str {
        "uniq"
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn apply(self, upstream: Lazy<T>) -> Lazy<T> {
        let mut previous: Option<T> = None;
        Lazy::new(upstream.filter(move |item| match item {
            Ok(value) => {
                if previous.as_ref() == Some(value) {
                    false
                } else {
                    previous = Some(value.clone());
                    true
                }
            }
            Err(_) => true,
        }))
    }
}

/// UNIQ ALL - drops every item already seen.
pub struct UniqAll<T> {
    _item: PhantomData<fn(T)>,
}

pub fn uniq_all<T>() -> UniqAll<T> {
    UniqAll { _item: PhantomData }
}

impl<T: Eq + Hash + Clone + 'static> Stage<T> for UniqAll<T> {
    type Out = T;

    fn name(&self) -> &'static str {
        "uniq-all"
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn apply(self, upstream: Lazy<T>) -> Lazy<T> {
        let mut seen: HashSet<T> = HashSet::new();
        Lazy::new(upstream.filter(move |item| match item {
            Ok(value) => seen.insert(value.clone()),
            Err(_) => true,
        }))
    }
}

/// SORT - orders all items, optionally descending.
pub struct Sorted<T> {
    descending: bool,
    _item: PhantomData<fn(T)>,
}

pub fn sorted<T>() -> Sorted<T> {
    Sorted {
        descending: false,
        _item: PhantomData,
    }
}

impl<T> Sorted<T> {
    pub fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }
}

impl<T: Ord + 'static> Stage<T> for Sorted<T> {
    type Out = T;

    fn name(&self) -> &'static str {
        "sort"
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn apply(self, upstream: Lazy<T>) -> Lazy<T> {
        let descending = self.descending;
        buffered(upstream, move |mut items| {
            if descending {
                items.sort_by(|a, b| b.cmp(a));
            } else {
                items.sort();
            }
            items
        })
    }
}

/// REVERSE - emits items in reverse order.
pub struct Reversed<T> {
    _item: PhantomData<fn(T)>,
}

pub fn reversed<T>() -> Reversed<T> {
    Reversed { _item: PhantomData }
}

impl<T: 'static> Stage<T> for Reversed<T> {
    type Out = T;

    fn name(&self) -> &'static str {
        "reverse"
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn apply(self, upstream: Lazy<T>) -> Lazy<T> {
        buffered(upstream, |mut items| {
            items.reverse();
            items
        })
    }
}

/// MAP - converts each item.
pub struct Map<T, U, F> {
    f: F,
    _item: PhantomData<fn(T) -> U>,
}

pub fn map<T, U, F>(f: F) -> Map<T, U, F>
where
    F: FnMut(T) -> U,
{
    Map {
        f,
        _item: PhantomData,
    }
}

impl<T, U, F> Stage<T> for Map<T, U, F>
where
    T: 'static,
    U: 'static,
    F: FnMut(T) -> U + 'static,
{
    type Out = U;

    fn name(&self) -> &'static str {
        "map"
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn apply(self, upstream: Lazy<T>) -> Lazy<U> {
        let mut f = self.f;
        Lazy::new(upstream.map(move |item| item.map(&mut f)))
    }
}

/// FILTER - keeps items matching a predicate.
pub struct Filter<T, F> {
    pred: F,
    _item: PhantomData<fn(T)>,
}

pub fn filter<T, F>(pred: F) -> Filter<T, F>
where
    F: FnMut(&T) -> bool,
{
    Filter {
        pred,
        _item: PhantomData,
    }
}

impl<T, F> Stage<T> for Filter<T, F>
where
    T: 'static,
    F: FnMut(&T) -> bool + 'static,
{
    type Out = T;

    fn name(&self) -> &'static str {
        "filter"
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn apply(self, upstream: Lazy<T>) -> Lazy<T> {
        let mut pred = self.pred;
        Lazy::new(upstream.filter(move |item| match item {
            Ok(value) => pred(value),
            Err(_) => true,
        }))
    }
}

/// INSPECT - observes each item without changing it.
pub struct Inspect<T, F> {
    f: F,
    _item: PhantomData<fn(T)>,
}

pub fn inspect<T, F>(f: F) -> Inspect<T, F>
where
    F: FnMut(&T),
{
    Inspect {
        f,
        _item: PhantomData,
    }
}

impl<T, F> Stage<T> for Inspect<T, F>
where
    T: 'static,
    F: FnMut(&T) + 'static,
{
    type Out = T;

    fn name(&self) -> &'static str {
        "inspect"
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn apply(self, upstream: Lazy<T>) -> Lazy<T> {
        let mut f = self.f;
        Lazy::new(upstream.inspect(move |item| {
            if let Ok(value) = item {
                f(value);
            }
        }))
    }
}
