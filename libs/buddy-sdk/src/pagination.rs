//! Page-number pagination.
//!
//! Listing endpoints wrap their items in an envelope carrying `url` and
//! `html_url`. [`collect_pages`] walks `page=1,2,3,...` until the server
//! returns an empty page and hands back one envelope holding every item.

use buddy_http::{HttpError, RawResponse};
use serde::de::DeserializeOwned;
use std::future::Future;

/// A list response envelope.
pub trait Envelope: DeserializeOwned {
    type Item;

    fn items(&self) -> &[Self::Item];

    fn items_mut(&mut self) -> &mut Vec<Self::Item>;
}

/// Fetch pages in order until one comes back empty.
///
/// The returned envelope keeps the metadata of the last non-empty page (or
/// of the empty first page) and the concatenated items of all pages. The raw
/// response is the one of the terminating empty page.
///
/// # Errors
///
/// The first error returned by `fetch`; pages fetched before it are dropped.
pub async fn collect_pages<E, F, Fut>(mut fetch: F) -> Result<(E, RawResponse), HttpError>
where
    E: Envelope,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<(E, RawResponse), HttpError>>,
{
    let mut items = Vec::new();
    let mut last: Option<E> = None;
    let mut page = 1u32;

    loop {
        let (mut envelope, raw) = fetch(page).await?;
        if envelope.items().is_empty() {
            tracing::trace!(pages = page - 1, items = items.len(), "pagination complete");
            let mut accumulated = last.unwrap_or(envelope);
            *accumulated.items_mut() = items;
            return Ok((accumulated, raw));
        }

        items.append(envelope.items_mut());
        last = Some(envelope);
        page += 1;
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Numbers {
        url: String,
        values: Vec<u32>,
    }

    impl Envelope for Numbers {
        type Item = u32;

        fn items(&self) -> &[u32] {
            &self.values
        }

        fn items_mut(&mut self) -> &mut Vec<u32> {
            &mut self.values
        }
    }

    fn raw() -> RawResponse {
        RawResponse {
            method: http::Method::GET,
            url: http::Uri::from_static("https://api.buddy.works/numbers"),
            status: http::StatusCode::OK,
            headers: http::HeaderMap::new(),
        }
    }

    fn page_of(page: u32, len: u32) -> Numbers {
        Numbers {
            url: format!("page-{page}"),
            values: (0..len).map(|i| (page - 1) * 100 + i).collect(),
        }
    }

    #[tokio::test]
    async fn test_concatenates_pages_in_order() {
        let sizes = [3u32, 2, 0];
        let mut requested = Vec::new();

        let (all, _) = collect_pages(|page| {
            requested.push(page);
            let envelope = page_of(page, sizes[(page - 1) as usize]);
            async move { Ok((envelope, raw())) }
        })
        .await
        .unwrap();

        assert_eq!(requested, vec![1, 2, 3]);
        assert_eq!(all.values, vec![0, 1, 2, 100, 101]);
        assert_eq!(all.url, "page-2");
    }

    #[tokio::test]
    async fn test_empty_first_page() {
        let (all, _) = collect_pages(|page| async move { Ok((page_of(page, 0), raw())) })
            .await
            .unwrap();
        assert!(all.values.is_empty());
        assert_eq!(all.url, "page-1");
    }

    #[tokio::test]
    async fn test_error_stops_iteration() {
        let mut calls = 0;
        let result: Result<(Numbers, RawResponse), HttpError> = collect_pages(|page| {
            calls += 1;
            async move {
                if page == 2 {
                    Err(HttpError::Cancelled)
                } else {
                    Ok((page_of(page, 1), raw()))
                }
            }
        })
        .await;

        assert!(matches!(result, Err(HttpError::Cancelled)));
        assert_eq!(calls, 2);
    }
}
