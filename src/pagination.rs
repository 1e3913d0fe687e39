//! Cursor-paginated connection walking with early termination.
//!
//! Pages are modelled as a lazy stream: each page is fetched only once the
//! previous one has been consumed, so stopping the stream early also stops
//! the remote calls.

use crate::config::RepoId;
use crate::github::{ConnectionQuery, Edge, RepoSource};
use futures::stream::{self, Stream, StreamExt};

/// Streams every edge of a connection, newest first, one page at a time.
///
/// The walk ends when GitHub reports no further page, when a page comes back
/// empty, or when a request fails. A failed request ends the stream quietly
/// after the edges already yielded.
pub fn edges<'a, S>(
    source: &'a S,
    repo: &'a RepoId,
    query: &'a ConnectionQuery,
) -> impl Stream<Item = Edge> + Send + 'a
where
    S: RepoSource + ?Sized,
{
    // `None` once the walk is over, `Some(cursor)` for the next page to fetch.
    let start: Option<Option<String>> = Some(query.after.clone());

    stream::unfold(start, move |state| async move {
        let after = state?;
        match source.fetch_connection_page(repo, &query.after(after)).await {
            Ok(page) => {
                let next = match page.edges.last() {
                    Some(last) if page.has_next_page => Some(Some(last.cursor.clone())),
                    _ => None,
                };
                Some((stream::iter(page.edges), next))
            }
            Err(e) => {
                tracing::warn!(repo = %repo, kind = ?query.kind, error = %e, "Connection walk aborted");
                None
            }
        }
    })
    .flatten()
}

/// Collects edges up to, but not including, the first edge matching `stop`.
///
/// Relies on the newest-first ordering of connections: once an edge is past
/// the deadline every later edge is too, so no further page is requested.
pub async fn collect_until<S, F>(
    source: &S,
    repo: &RepoId,
    query: &ConnectionQuery,
    stop: F,
) -> Vec<Edge>
where
    S: RepoSource + ?Sized,
    F: Fn(&Edge) -> bool,
{
    edges(source, repo, query)
        .take_while(|edge| futures::future::ready(!stop(edge)))
        .collect()
        .await
}
