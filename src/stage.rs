//! Stage and sink traits.
//!
//! A stage turns one lazy sequence into another. Every stage declares up
//! front whether it reads its own inputs ([`StageKind::Source`]) or consumes
//! whatever is upstream of it ([`StageKind::Transform`]); the pipeline uses
//! that to decide between replacing and extending the upstream.

use crate::error::Result;
use crate::pipeline::Lazy;

/// How a stage obtains its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Ignores upstream and opens its own inputs.
    Source,
    /// Consumes upstream lazily.
    Transform,
}

/// A pipeline stage consuming items of type `In`.
pub trait Stage<In> {
    /// Item type produced by this stage.
    type Out;

    /// The display name of this stage.
    fn name(&self) -> &'static str;

    /// Whether this stage sources its own input or transforms upstream.
    fn kind(&self) -> StageKind;

    /// Build the output sequence.
    ///
    /// Source stages are handed an empty upstream; the real one has already
    /// been dropped (and its resources closed) by the pipeline.
    fn apply(self, upstream: Lazy<In>) -> Lazy<Self::Out>;
}

/// Consumes a lazy sequence to completion.
pub trait Sink<T> {
    type Output;

    /// Drain `items`, stopping at the first error.
    fn consume(self, items: Lazy<T>) -> Result<Self::Output>;
}

/// Sink collecting every item into a `Vec`.
pub struct ToList;

/// Collect a pipeline into a `Vec`.
pub fn to_list() -> ToList {
    ToList
}

impl<T> Sink<T> for ToList {
    type Output = Vec<T>;

    fn consume(self, items: Lazy<T>) -> Result<Vec<T>> {
        items.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn test_to_list_collects_in_order() {
        let items = Lazy::from_values(vec!["a", "b", "c"]);
        assert_eq!(to_list().consume(items).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_to_list_stops_at_error() {
        let items: Lazy<i32> = Lazy::new(
            vec![
                Ok(1),
                Err(PipelineError::InvalidArgument("bad".to_string())),
                Ok(3),
            ]
            .into_iter(),
        );
        let err = to_list().consume(items).unwrap_err();
        assert_eq!(err.to_string(), "invalid argument: bad");
    }
}
