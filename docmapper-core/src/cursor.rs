//! Lazily wrapping cursors over query results.

use futures::{Stream, StreamExt};
use std::{
    fmt::{self, Debug},
    pin::Pin,
    task::{Context, Poll},
};

use crate::{
    backend::RecordStream,
    error::{ModelError, ModelResult},
    mapper::Mapper,
    model::Model,
    schema::ModelSchema,
};

/// A forward-only sequence of query results, each wrapped into a bound model as it is
/// produced.
///
/// A cursor cannot be restarted once exhausted; issue the query again instead.
///
/// # Example
///
/// ```ignore
/// let mut cursor = users.find(doc! { "name": "test" }).await?;
///
/// let first = cursor.next().await?;
/// let third = cursor.nth(1).await?;
/// let rest = cursor.try_collect().await?;
/// ```
pub struct ModelCursor<S: ModelSchema> {
    mapper: Mapper<S>,
    records: RecordStream,
}

impl<S: ModelSchema> ModelCursor<S> {
    pub(crate) fn new(mapper: Mapper<S>, records: RecordStream) -> Self {
        Self { mapper, records }
    }

    pub fn mapper(&self) -> &Mapper<S> {
        &self.mapper
    }

    /// Fetches the next record and wraps it, or returns `None` once exhausted.
    pub async fn next(&mut self) -> ModelResult<Option<Model<S>>> {
        let record = self.records
            .next()
            .await
            .transpose()?;

        Ok(record.map(|record| self.mapper.wrap(record)))
    }

    /// Skips `n` records and wraps the one after them.
    ///
    /// `nth(0)` is equivalent to [`next`](Self::next). Skipped records are consumed.
    pub async fn nth(&mut self, n: usize) -> ModelResult<Option<Model<S>>> {
        for _ in 0..n {
            if self.records.next().await.transpose()?.is_none() {
                return Ok(None);
            }
        }

        self.next().await
    }

    /// Wraps every remaining record.
    pub async fn try_collect(mut self) -> ModelResult<Vec<Model<S>>> {
        let mut models = Vec::new();

        while let Some(model) = self.next().await? {
            models.push(model);
        }

        Ok(models)
    }
}

impl<S: ModelSchema> Stream for ModelCursor<S> {
    type Item = ModelResult<Model<S>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        this.records
            .poll_next_unpin(cx)
            .map(|record| {
                record.map(|record| {
                    record
                        .map(|record| this.mapper.wrap(record))
                        .map_err(ModelError::from)
                })
            })
    }
}

impl<S: ModelSchema> Debug for ModelCursor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCursor")
            .field("mapper", &self.mapper)
            .finish_non_exhaustive()
    }
}
