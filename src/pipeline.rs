//! Lazy sequences and the pipeline wrapper that chains stages over them.

use std::fmt;
use std::ops::BitOr;

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::stage::{Sink, Stage, StageKind};

/// A lazily evaluated sequence of items.
///
/// Errors travel through the sequence as items so that a failure in one
/// input surfaces at the point it is pulled, after everything before it.
pub struct Lazy<T> {
    iter: Box<dyn Iterator<Item = Result<T>>>,
}

impl<T: 'static> Lazy<T> {
    pub fn new(iter: impl Iterator<Item = Result<T>> + 'static) -> Self {
        Self {
            iter: Box::new(iter),
        }
    }

    /// An exhausted sequence.
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// Wrap infallible values.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'static,
    {
        Self::new(values.into_iter().map(Ok))
    }

    /// A sequence yielding a single error.
    pub fn failed(err: PipelineError) -> Self {
        Self::new(std::iter::once(Err(err)))
    }

    /// Build the sequence on first pull.
    ///
    /// Buffering stages use this so that nothing upstream is read until the
    /// pipeline is actually drained.
    pub fn deferred(init: impl FnOnce() -> Lazy<T> + 'static) -> Self {
        let mut init = Some(init);
        let mut inner: Option<Lazy<T>> = None;
        Self::new(std::iter::from_fn(move || {
            if let Some(init) = init.take() {
                inner = Some(init());
            }
            inner.as_mut()?.next()
        }))
    }
}

impl<T> Iterator for Lazy<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

impl<T> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy").finish_non_exhaustive()
    }
}

/// A chain of stages over a lazy sequence.
///
/// ```
/// use dw::{Pipeline, head, sorted, to_list};
///
/// let out = (Pipeline::from_values(vec![5, 3, 9, 1]) | sorted() | head(2))
///     .run(to_list())
///     .unwrap();
/// assert_eq!(out, vec![1, 3]);
/// ```
pub struct Pipeline<T> {
    items: Lazy<T>,
    stages: Vec<&'static str>,
}

impl<T: 'static> Pipeline<T> {
    /// Start a pipeline from a stage that reads its own inputs.
    pub fn source<In, S>(stage: S) -> Result<Self>
    where
        In: 'static,
        S: Stage<In, Out = T>,
    {
        if stage.kind() != StageKind::Source {
            return Err(PipelineError::NotASource {
                stage: stage.name(),
            });
        }
        let name = stage.name();
        Ok(Self {
            items: stage.apply(Lazy::empty()),
            stages: vec![name],
        })
    }

    /// Start a pipeline over in-memory values.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'static,
    {
        Self::from_lazy(Lazy::from_values(values))
    }

    /// Start a pipeline over an existing lazy sequence.
    pub fn from_lazy(items: Lazy<T>) -> Self {
        Self {
            items,
            stages: Vec::new(),
        }
    }

    /// Chain a stage.
    ///
    /// A source stage replaces the upstream: the upstream is dropped, which
    /// closes any resources it still holds, before the stage opens its own
    /// inputs. A transform stage extends the upstream.
    pub fn bind<S>(self, stage: S) -> Pipeline<S::Out>
    where
        S: Stage<T>,
        S::Out: 'static,
    {
        let Pipeline { items, mut stages } = self;
        let name = stage.name();
        let items = match stage.kind() {
            StageKind::Source => {
                debug!(stage = name, upstream = ?stages, "Replacing upstream");
                drop(items);
                stage.apply(Lazy::empty())
            }
            StageKind::Transform => stage.apply(items),
        };
        stages.push(name);
        Pipeline { items, stages }
    }

    /// Drive the pipeline into a sink.
    pub fn run<K: Sink<T>>(self, sink: K) -> Result<K::Output> {
        debug!(stages = ?self.stages, "Running pipeline");
        sink.consume(self.items)
    }

    /// Names of the stages bound so far, head first.
    pub fn stage_names(&self) -> &[&'static str] {
        &self.stages
    }

    /// Unwrap the underlying lazy sequence.
    pub fn into_lazy(self) -> Lazy<T> {
        self.items
    }
}

impl<T, S> BitOr<S> for Pipeline<T>
where
    T: 'static,
    S: Stage<T>,
    S::Out: 'static,
{
    type Output = Pipeline<S::Out>;

    fn bitor(self, stage: S) -> Self::Output {
        self.bind(stage)
    }
}

impl<T> Iterator for Pipeline<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::to_list;
    use crate::transform::{filter, map};
    use std::cell::Cell;
    use std::rc::Rc;

    /// Source stage yielding fixed values, for exercising replace semantics.
    struct Values(Vec<i32>);

    impl Stage<i32> for Values {
        type Out = i32;

        fn name(&self) -> &'static str {
            "values"
        }

        fn kind(&self) -> StageKind {
            StageKind::Source
        }

        fn apply(self, _upstream: Lazy<i32>) -> Lazy<i32> {
            Lazy::from_values(self.0)
        }
    }

    /// Counts how many times the wrapped sequence was dropped.
    struct DropCounter {
        inner: std::vec::IntoIter<i32>,
        drops: Rc<Cell<usize>>,
    }

    impl Iterator for DropCounter {
        type Item = Result<i32>;

        fn next(&mut self) -> Option<Self::Item> {
            self.inner.next().map(Ok)
        }
    }

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[test]
    fn test_wraps_values() {
        let out: Vec<_> = Pipeline::from_values(vec!["a", "b", "c"])
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(out, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_bind_transform_extends_upstream() {
        let out = Pipeline::from_values(0..10)
            .bind(filter(|x: &i32| x % 2 == 0))
            .bind(map(|x: i32| 2 * x))
            .run(to_list())
            .unwrap();
        assert_eq!(out, vec![0, 4, 8, 12, 16]);
    }

    #[test]
    fn test_bitor_matches_bind() {
        let out = (Pipeline::from_values(0..5) | map(|x: i32| x + 1))
            .run(to_list())
            .unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_bind_source_replaces_and_drops_upstream() {
        let drops = Rc::new(Cell::new(0));
        let upstream = Lazy::new(DropCounter {
            inner: vec![1, 2, 3].into_iter(),
            drops: Rc::clone(&drops),
        });

        let pipe = Pipeline::from_lazy(upstream) | Values(vec![7, 8]);
        assert_eq!(drops.get(), 1);
        assert_eq!(pipe.run(to_list()).unwrap(), vec![7, 8]);
    }

    #[test]
    fn test_source_requires_source_stage() {
        let err = Pipeline::source(map(|x: i32| x)).err().unwrap();
        assert!(matches!(err, PipelineError::NotASource { stage: "map" }));
    }

    #[test]
    fn test_stage_names_recorded() {
        let pipe = Pipeline::source(Values(vec![1])).unwrap() | map(|x: i32| x);
        assert_eq!(pipe.stage_names(), &["values", "map"]);
    }

    #[test]
    fn test_deferred_builds_on_first_pull() {
        let built = Rc::new(Cell::new(false));
        let flag = Rc::clone(&built);
        let mut lazy = Lazy::deferred(move || {
            flag.set(true);
            Lazy::from_values(vec![1])
        });
        assert!(!built.get());
        assert_eq!(lazy.next().unwrap().unwrap(), 1);
        assert!(built.get());
        assert!(lazy.next().is_none());
    }
}
