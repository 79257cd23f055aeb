//! Lazy, restartable listing of a session's selected items.
//!
//! [`item_pages`] turns the page-token protocol into a finite stream. Starting
//! from a persisted cursor resumes an interrupted listing; starting from
//! `None` reads from the first page.

use bridge_traits::picker::{ItemsPage, PickerService};
use futures::stream::{self, Stream};

use crate::error::{ImportError, Result};

/// Stream the pages of a selected-items listing in order
///
/// Each element is one page together with the token for the page after it.
/// The stream ends after the page that carries no next token, or after the
/// first error.
pub fn item_pages<'a>(
    picker: &'a dyn PickerService,
    access_token: &'a str,
    session_id: &'a str,
    start: Option<String>,
) -> impl Stream<Item = Result<ItemsPage>> + Send + 'a {
    // Outer None: listing finished. Inner None: first page.
    stream::try_unfold(Some(start), move |cursor| async move {
        let Some(page_token) = cursor else {
            return Ok(None);
        };

        let page = picker
            .list_items(access_token, session_id, page_token.as_deref())
            .await
            .map_err(ImportError::picker)?;

        let next = page.next_page_token.clone().map(Some);
        Ok::<_, ImportError>(Some((page, next)))
    })
}
