//! Lazy traversal of cursor-paged collections.
//!
//! A collection is read as a sequence of pages of lightweight references;
//! each reference is resolved into a decoded entry only when the consumer asks
//! for it. Nothing is cached between calls: every [`walk`] starts from the
//! first page, since stale cursors are not guaranteed to stay valid once the
//! collection changes.
//!
//! Nested collections are walked by composition, e.g. a table of spaces whose
//! entries each name a votes table: walk the outer table, then call [`walk`]
//! again with the inner table id.

use std::collections::VecDeque;
use std::future::Future;
use std::marker::PhantomData;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;

use crate::cancel::{self, CancelSignal};
use crate::error::{Error, Result};
use crate::ledger::{DynamicFieldSource, ObjectReader};
use crate::schema::{DynamicFieldInfo, MoveObject};
use crate::types::{ObjectId, Page, PageCursor};

/// Paged child collection of a parent object.
#[async_trait]
pub trait PagedStore: Send + Sync {
    type Ref: Send + 'static;
    type Entry: Send + 'static;

    async fn fetch_page(
        &self,
        parent: ObjectId,
        cursor: Option<PageCursor>,
    ) -> anyhow::Result<Page<Self::Ref>>;

    async fn fetch_entry(&self, reference: Self::Ref) -> anyhow::Result<Self::Entry>;
}

/// Recovers crate errors that travelled through an `anyhow` seam.
pub(crate) fn upstream(err: anyhow::Error) -> Error {
    match err.downcast::<Error>() {
        Ok(err) => err,
        Err(err) => Error::Upstream(err),
    }
}

enum NextPage {
    Fetch(Option<PageCursor>),
    Exhausted,
}

struct PagingState<T, F> {
    fetch: F,
    buffered: VecDeque<T>,
    next: NextPage,
    cancel: Option<CancelSignal>,
    fetched_pages: usize,
}

/// Flattens a paged source into a stream of its items.
///
/// The next page is requested only once every item of the previous one has
/// been consumed. The stream ends after the first page with
/// `has_next_page == false`, or after the first error.
pub fn walk_pages<T, F, Fut>(
    fetch: F,
    cancel: Option<CancelSignal>,
) -> impl Stream<Item = Result<T>>
where
    F: FnMut(Option<PageCursor>) -> Fut,
    Fut: Future<Output = anyhow::Result<Page<T>>>,
{
    let state = PagingState {
        fetch,
        buffered: VecDeque::new(),
        next: NextPage::Fetch(None),
        cancel,
        fetched_pages: 0,
    };

    stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.buffered.pop_front() {
                return Ok(Some((item, state)));
            }

            let cursor = match std::mem::replace(&mut state.next, NextPage::Exhausted) {
                NextPage::Exhausted => return Ok(None),
                NextPage::Fetch(cursor) => cursor,
            };
            if cancel::is_cancelled(state.cancel.as_ref()) {
                return Err(Error::Cancelled);
            }

            let page = (state.fetch)(cursor.clone()).await.map_err(upstream)?;
            state.fetched_pages += 1;
            tracing::debug!(
                "fetched page {:?} at cursor {:?}, entries: {:?}, has next page: {:?}",
                state.fetched_pages,
                cursor,
                page.data.len(),
                page.has_next_page
            );

            state.next = match (page.has_next_page, page.next_cursor) {
                (false, _) => NextPage::Exhausted,
                (true, Some(next)) => NextPage::Fetch(Some(next)),
                (true, None) => {
                    return Err(Error::Upstream(anyhow!(
                        "page {} after cursor {:?} reports more results but no cursor",
                        state.fetched_pages,
                        cursor
                    )))
                }
            };
            state.buffered.extend(page.data);
        }
    })
}

/// Walks every entry under `parent`, resolving references in page order.
///
/// The first error, from a page or an entry, ends the walk: nothing is
/// fetched after it.
pub fn walk<'a, S>(
    store: &'a S,
    parent: ObjectId,
    cancel: Option<CancelSignal>,
) -> impl Stream<Item = Result<S::Entry>> + 'a
where
    S: PagedStore + ?Sized + 'a,
{
    let references = walk_pages(move |cursor| store.fetch_page(parent, cursor), cancel.clone());
    let state = Some((Box::pin(references), cancel));

    stream::unfold(state, move |state| async move {
        let (mut references, cancel) = state?;
        let reference = match references.next().await? {
            Ok(reference) => reference,
            Err(err) => return Some((Err(err), None)),
        };
        if cancel::is_cancelled(cancel.as_ref()) {
            return Some((Err(Error::Cancelled), None));
        }
        match store.fetch_entry(reference).await {
            Ok(entry) => Some((Ok(entry), Some((references, cancel)))),
            Err(err) => Some((Err(upstream(err)), None)),
        }
    })
}

/// A Move `Table` (or any object with dynamic fields) read as a [`PagedStore`]:
/// pages come from the dynamic field index, entries are the field objects
/// decoded into `T`.
pub struct DynamicFieldTable<'a, C: ?Sized, T> {
    client: &'a C,
    _entry: PhantomData<fn() -> T>,
}

impl<'a, C: ?Sized, T> DynamicFieldTable<'a, C, T> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            _entry: PhantomData,
        }
    }
}

#[async_trait]
impl<'a, C, T> PagedStore for DynamicFieldTable<'a, C, T>
where
    C: DynamicFieldSource + ObjectReader + ?Sized,
    T: DeserializeOwned + Send + 'static,
{
    type Ref = DynamicFieldInfo;
    type Entry = MoveObject<T>;

    async fn fetch_page(
        &self,
        parent: ObjectId,
        cursor: Option<PageCursor>,
    ) -> anyhow::Result<Page<DynamicFieldInfo>> {
        self.client.dynamic_fields_page(parent, cursor).await
    }

    async fn fetch_entry(&self, field: DynamicFieldInfo) -> anyhow::Result<MoveObject<T>> {
        let object = self.client.get_object(field.object_id).await?;
        Ok(object.decode()?)
    }
}

/// Walks a dynamic-field collection and collects the decoded entries.
pub async fn collect_table<T, C>(
    client: &C,
    table: ObjectId,
    cancel: Option<CancelSignal>,
) -> Result<Vec<MoveObject<T>>>
where
    C: DynamicFieldSource + ObjectReader + ?Sized,
    T: DeserializeOwned + Send + 'static,
{
    let store = DynamicFieldTable::<C, T>::new(client);
    let entries: Vec<MoveObject<T>> = walk(&store, table, cancel).try_collect().await?;
    tracing::debug!("collected {:?} entries of table {}", entries.len(), table);
    Ok(entries)
}
