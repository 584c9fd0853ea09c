use std::sync::Arc;

use crate::error::{MetaQueryError, Result};
use crate::query::SelectItem;

use super::{Row, Value};

/// A pull-based producer of raw value tuples feeding a [`DataSet`].
pub trait RowSource: Send {
    /// The next tuple, or `None` once exhausted.
    fn next_values(&mut self) -> Result<Option<Vec<Value>>>;

    /// Releases back-end resources. Called at most once.
    fn close(&mut self) {}
}

impl<I> RowSource for I
where
    I: Iterator<Item = Result<Vec<Value>>> + Send,
{
    fn next_values(&mut self) -> Result<Option<Vec<Value>>> {
        self.next().transpose()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    BeforeFirst,
    OnRow,
    Exhausted,
    Failed,
    Closed,
}

/// A single-pass, forward-only row cursor.
///
/// After a retrieval error, exhaustion or [`close`](DataSet::close) the cursor
/// is terminal and `next()` keeps returning `Ok(false)`.
pub struct DataSet {
    header: Arc<[SelectItem]>,
    source: Box<dyn RowSource>,
    current: Option<Row>,
    state: CursorState,
}

impl DataSet {
    pub fn new(header: Vec<SelectItem>, source: impl RowSource + 'static) -> Self {
        Self {
            header: header.into(),
            source: Box::new(source),
            current: None,
            state: CursorState::BeforeFirst,
        }
    }

    pub fn from_values(header: Vec<SelectItem>, rows: Vec<Vec<Value>>) -> Self {
        Self::new(header, rows.into_iter().map(Ok::<_, MetaQueryError>))
    }

    pub fn select_items(&self) -> &[SelectItem] {
        &self.header
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<bool> {
        match self.state {
            CursorState::BeforeFirst | CursorState::OnRow => {}
            _ => return Ok(false),
        }
        self.current = None;
        match self.source.next_values() {
            Ok(Some(values)) => {
                if values.len() != self.header.len() {
                    self.fail();
                    return Err(MetaQueryError::InvalidState(format!(
                        "Row has {} values but the data set selects {} items",
                        values.len(),
                        self.header.len()
                    )));
                }
                self.current = Some(Row::new(Arc::clone(&self.header), values));
                self.state = CursorState::OnRow;
                Ok(true)
            }
            Ok(None) => {
                self.state = CursorState::Exhausted;
                Ok(false)
            }
            Err(e) => {
                self.fail();
                Err(e)
            }
        }
    }

    fn fail(&mut self) {
        self.state = CursorState::Failed;
        self.source.close();
    }

    /// The current row; only valid after `next()` returned `true`.
    pub fn row(&self) -> Result<&Row> {
        self.current.as_ref().ok_or_else(|| {
            MetaQueryError::InvalidState("No current row, call next() first".to_string())
        })
    }

    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    pub fn close(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        // a failed source was already closed when the failure surfaced
        if self.state != CursorState::Failed {
            self.source.close();
        }
        self.current = None;
        self.state = CursorState::Closed;
    }

    /// Drains the remaining rows and closes the cursor.
    pub fn to_rows(mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while self.next()? {
            if let Some(row) = self.current.take() {
                rows.push(row);
            }
        }
        self.close();
        Ok(rows)
    }

    pub fn to_values(self) -> Result<Vec<Vec<Value>>> {
        Ok(self.to_rows()?.into_iter().map(Row::into_values).collect())
    }

    /// Advances and moves the row's values out of the cursor.
    pub(crate) fn next_values(&mut self) -> Result<Option<Vec<Value>>> {
        if self.next()? {
            Ok(self.current.take().map(Row::into_values))
        } else {
            Ok(None)
        }
    }
}

/// Adapts a cursor into a stream of value tuples; dropping the stream
/// closes the cursor.
pub(crate) struct DataSetRows(pub(crate) DataSet);

impl Iterator for DataSetRows {
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next_values().transpose()
    }
}

impl Drop for DataSet {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DataSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSet")
            .field("select_items", &self.header.len())
            .field("state", &self.state)
            .finish()
    }
}
