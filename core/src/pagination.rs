//! Pull-driven pagination over `$top`/`$skip` style collection endpoints.
//!
//! # Design
//! A `PaginatedResult` owns a fetcher and advances only when the caller pulls
//! the next page: `NotStarted -> HasPage(n) -> HasPage(n + 1) | Exhausted`.
//! Fetched pages are cached, so iterating again replays them without touching
//! the network; [`PaginatedResult::refresh_cache`] drops every cache and
//! returns the machine to `NotStarted`.
//!
//! A failing page stops iteration with the error. Pages fetched before it stay
//! cached and valid; the next pull retries the failed page.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use crate::document::Document;
use crate::error::Result;
use crate::response::ResponseEnvelope;
use crate::value::Value;

/// Coordinates of the page a fetcher is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub top: u32,
    /// 1-based.
    pub page_num: u32,
}

/// One fetched page: its response plus the coordinates that produced it.
#[derive(Debug, Clone)]
pub struct Page {
    response: Arc<ResponseEnvelope>,
    offset: u64,
    top: u32,
    page_num: u32,
}

impl Page {
    pub fn new(response: ResponseEnvelope, request: PageRequest) -> Self {
        Self {
            response: Arc::new(response),
            offset: request.offset,
            top: request.top,
            page_num: request.page_num,
        }
    }

    pub fn response(&self) -> &ResponseEnvelope {
        &self.response
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn top(&self) -> u32 {
        self.top
    }

    pub fn page_num(&self) -> u32 {
        self.page_num
    }

    /// Decoded page payload.
    pub fn data(&self) -> Option<&Document> {
        self.response.data()
    }
}

/// Where a page's records live in its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSource {
    /// The payload is the array.
    Root,
    /// The array sits under this top-level field.
    Field(String),
}

/// How a page signals that more pages follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoreIndicator {
    /// The continuation header alone.
    Header,
    /// A page holding exactly `top` records implies another page.
    FullPage,
    /// The header when present, otherwise the full-page rule.
    HeaderOrFullPage,
}

/// Collection-shape rules for a concrete API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingRules {
    pub records: RecordSource,
    pub more: MoreIndicator,
}

impl Default for PagingRules {
    fn default() -> Self {
        Self {
            records: RecordSource::Root,
            more: MoreIndicator::HeaderOrFullPage,
        }
    }
}

impl PagingRules {
    /// Record values of a page, in payload order. Empty when the payload is
    /// absent or has no array where the rules expect one.
    pub fn records<'a>(&self, response: &'a ResponseEnvelope) -> &'a [Value] {
        let Some(doc) = response.data() else {
            return &[];
        };
        let array = match &self.records {
            RecordSource::Root => doc.value().as_array(),
            RecordSource::Field(name) => doc.get([name.as_str()]).and_then(Value::as_array),
        };
        array.map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_more(&self, response: &ResponseEnvelope, top: u32) -> bool {
        let full_page = || self.records(response).len() == top as usize;
        match self.more {
            MoreIndicator::Header => response.has_more(),
            MoreIndicator::FullPage => full_page(),
            MoreIndicator::HeaderOrFullPage => response.has_more_header().unwrap_or_else(full_page),
        }
    }
}

/// Source of page responses.
pub trait PageFetcher {
    fn fetch(&mut self, request: &PageRequest) -> Result<ResponseEnvelope>;
}

impl<F> PageFetcher for F
where
    F: FnMut(&PageRequest) -> Result<ResponseEnvelope>,
{
    fn fetch(&mut self, request: &PageRequest) -> Result<ResponseEnvelope> {
        self(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerState {
    NotStarted,
    /// Page `n` is the last one fetched and reported more data.
    HasPage(u32),
    Exhausted,
}

pub struct PaginatedResult<F> {
    fetcher: F,
    rules: PagingRules,
    top: u32,
    start_offset: u64,
    step: Option<u64>,
    pages: Vec<Page>,
    data: Option<Vec<Document>>,
    state: PagerState,
}

impl<F: PageFetcher> PaginatedResult<F> {
    /// `top` of zero is treated as one.
    pub fn new(fetcher: F, top: u32, start_offset: u64, rules: PagingRules) -> Self {
        Self {
            fetcher,
            rules,
            top: top.max(1),
            start_offset,
            step: None,
            pages: Vec::new(),
            data: None,
            state: PagerState::NotStarted,
        }
    }

    /// Advances the offset by `step` records per page instead of by `top`.
    /// A step of zero is treated as one.
    pub fn with_step(mut self, step: u64) -> Self {
        self.step = Some(step.max(1));
        self
    }

    /// Offset of page `page_num` (1-based).
    pub fn offset_of(&self, page_num: u32) -> u64 {
        let step = self.step.unwrap_or(u64::from(self.top));
        self.start_offset + u64::from(page_num.saturating_sub(1)) * step
    }

    pub fn state(&self) -> PagerState {
        self.state
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == PagerState::Exhausted
    }

    pub fn rules(&self) -> &PagingRules {
        &self.rules
    }

    /// Pages fetched so far, including those fetched before a failure.
    pub fn fetched_pages(&self) -> &[Page] {
        &self.pages
    }

    /// Lazy page sequence. Cached pages are replayed first; further pages are
    /// fetched one pull at a time. The sequence ends after yielding an error;
    /// a new call to `pages()` retries the failed page.
    pub fn pages(&mut self) -> Pages<'_, F> {
        Pages {
            result: self,
            index: 0,
            failed: false,
        }
    }

    /// Lazy record sequence: every page's records in page order.
    pub fn results(&mut self) -> Results<'_, F> {
        Results {
            pages: self.pages(),
            pending: VecDeque::new(),
        }
    }

    /// All records, fetching every remaining page on first call. Later calls
    /// return the cached aggregate until [`PaginatedResult::refresh_cache`].
    /// Fails without caching anything if any page fails.
    pub fn data(&mut self) -> Result<&[Document]> {
        if self.data.is_none() {
            let records = self.results().collect::<Result<Vec<_>>>()?;
            self.data = Some(records);
        }
        Ok(self.data.as_deref().unwrap_or_default())
    }

    /// Drops cached pages and records; the next access starts from page 1.
    pub fn refresh_cache(&mut self) {
        self.pages.clear();
        self.data = None;
        self.state = PagerState::NotStarted;
    }

    fn page_at(&mut self, index: usize) -> Option<Result<Page>> {
        if let Some(page) = self.pages.get(index) {
            return Some(Ok(page.clone()));
        }
        let page_num = match self.state {
            PagerState::Exhausted => return None,
            PagerState::NotStarted => 1,
            PagerState::HasPage(n) => n + 1,
        };
        let request = PageRequest {
            offset: self.offset_of(page_num),
            top: self.top,
            page_num,
        };
        debug!(page_num, offset = request.offset, top = request.top, "fetching page");

        let response = match self.fetcher.fetch(&request) {
            Ok(response) => response,
            Err(e) => return Some(Err(e)),
        };
        if let Err(e) = response.error_for_status() {
            return Some(Err(e));
        }

        let exhausted =
            self.rules.records(&response).is_empty() || !self.rules.has_more(&response, self.top);
        self.state = if exhausted {
            debug!(page_num, "pagination exhausted");
            PagerState::Exhausted
        } else {
            PagerState::HasPage(page_num)
        };

        let page = Page::new(response, request);
        self.pages.push(page.clone());
        Some(Ok(page))
    }
}

pub struct Pages<'a, F> {
    result: &'a mut PaginatedResult<F>,
    index: usize,
    failed: bool,
}

impl<F: PageFetcher> Iterator for Pages<'_, F> {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.result.page_at(self.index)?;
        match &item {
            Ok(_) => self.index += 1,
            Err(_) => self.failed = true,
        }
        Some(item)
    }
}

impl<F: PageFetcher> std::iter::FusedIterator for Pages<'_, F> {}

pub struct Results<'a, F> {
    pages: Pages<'a, F>,
    pending: VecDeque<Document>,
}

impl<F: PageFetcher> Iterator for Results<'_, F> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            let page = match self.pages.next()? {
                Ok(page) => page,
                Err(e) => return Some(Err(e)),
            };
            let rules = &self.pages.result.rules;
            self.pending.extend(
                rules
                    .records(page.response())
                    .iter()
                    .cloned()
                    .map(Document::new),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::http::HttpResponse;
    use serde_json::json;
    use std::cell::{Cell, RefCell};

    fn page_response(records: serde_json::Value, more: bool) -> ResponseEnvelope {
        ResponseEnvelope::new(
            HttpResponse::new(200)
                .with_header("x-has-more", if more { "true" } else { "false" })
                .with_json(&records),
        )
    }

    fn three_pages(request: &PageRequest) -> ResponseEnvelope {
        match request.page_num {
            1 => page_response(json!([{"id": 1}, {"id": 2}]), true),
            2 => page_response(json!([{"id": 3}, {"id": 4}]), true),
            _ => page_response(json!([{"id": 5}]), false),
        }
    }

    fn ids(docs: &[Document]) -> Vec<i64> {
        docs.iter()
            .map(|d| d.get("id").and_then(Value::as_i64).unwrap())
            .collect()
    }

    #[test]
    fn data_concatenates_pages_and_caches_until_refresh() {
        let calls = Cell::new(0);
        let mut result = PaginatedResult::new(
            |req: &PageRequest| -> Result<ResponseEnvelope> {
                calls.set(calls.get() + 1);
                Ok(three_pages(req))
            },
            2,
            0,
            PagingRules::default(),
        );

        assert_eq!(ids(result.data().unwrap()), vec![1, 2, 3, 4, 5]);
        assert_eq!(calls.get(), 3);
        assert!(result.is_exhausted());

        result.data().unwrap();
        assert_eq!(calls.get(), 3);

        result.refresh_cache();
        assert_eq!(result.state(), PagerState::NotStarted);
        assert_eq!(ids(result.data().unwrap()), vec![1, 2, 3, 4, 5]);
        assert_eq!(calls.get(), 6);
    }

    #[test]
    fn pages_are_fetched_only_when_pulled() {
        let requests = RefCell::new(Vec::new());
        let mut result = PaginatedResult::new(
            |req: &PageRequest| -> Result<ResponseEnvelope> {
                requests.borrow_mut().push(*req);
                Ok(three_pages(req))
            },
            2,
            10,
            PagingRules::default(),
        );

        let first = result.pages().next().unwrap().unwrap();
        assert_eq!((first.page_num(), first.offset(), first.top()), (1, 10, 2));
        assert_eq!(requests.borrow().len(), 1);
        assert_eq!(result.state(), PagerState::HasPage(1));

        let all: Vec<_> = result.pages().map(|p| p.unwrap().offset()).collect();
        assert_eq!(all, vec![10, 12, 14]);
        assert_eq!(
            requests.borrow().iter().map(|r| r.page_num).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn iterating_again_replays_cached_pages() {
        let calls = Cell::new(0);
        let mut result = PaginatedResult::new(
            |req: &PageRequest| -> Result<ResponseEnvelope> {
                calls.set(calls.get() + 1);
                Ok(three_pages(req))
            },
            2,
            0,
            PagingRules::default(),
        );
        assert_eq!(result.pages().count(), 3);
        assert_eq!(result.pages().count(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn results_flatten_records_in_order() {
        let mut result = PaginatedResult::new(
            |req: &PageRequest| -> Result<ResponseEnvelope> { Ok(three_pages(req)) },
            2,
            0,
            PagingRules::default(),
        );
        let records: Vec<_> = result.results().map(|r| r.unwrap()).collect();
        assert_eq!(ids(&records), vec![1, 2, 3, 4, 5]);
        assert!(records.iter().all(|d| !d.is_modified()));
    }

    #[test]
    fn failing_page_stops_iteration_and_keeps_earlier_pages() {
        let calls = Cell::new(0);
        let fetcher = |req: &PageRequest| -> Result<ResponseEnvelope> {
            calls.set(calls.get() + 1);
            if req.page_num == 2 {
                return Ok(ResponseEnvelope::new(HttpResponse::new(500).with_reason("Internal Server Error")));
            }
            Ok(three_pages(req))
        };
        let mut result = PaginatedResult::new(fetcher, 2, 0, PagingRules::default());

        let mut pages = result.pages();
        assert!(pages.next().unwrap().is_ok());
        let err = pages.next().unwrap().unwrap_err();
        assert_eq!(err.status(), Some(500));

        assert_eq!(result.fetched_pages().len(), 1);
        assert!(matches!(result.data(), Err(ApiError::Request(_))));
        assert!(result.data.is_none());
    }

    #[test]
    fn pulling_past_a_failed_page_ends_the_sequence() {
        let calls = Cell::new(0);
        let fetcher = |req: &PageRequest| -> Result<ResponseEnvelope> {
            calls.set(calls.get() + 1);
            if req.page_num == 2 {
                return Ok(ResponseEnvelope::new(HttpResponse::new(503)));
            }
            Ok(three_pages(req))
        };
        let mut result = PaginatedResult::new(fetcher, 2, 0, PagingRules::default());

        let outcomes: Vec<bool> = result.pages().take(6).map(|p| p.is_ok()).collect();
        assert_eq!(outcomes, vec![true, false]);
        assert_eq!(calls.get(), 2);
        assert_eq!(result.pages().filter_map(Result::ok).count(), 1);
        assert_eq!(calls.get(), 3);

        let records: Vec<bool> = result.results().map(|r| r.is_ok()).collect();
        assert_eq!(records, vec![true, true, false]);
        assert_eq!(calls.get(), 4);
        assert_eq!(result.state(), PagerState::HasPage(1));
    }

    #[test]
    fn safe_status_on_page_is_accepted() {
        let mut result = PaginatedResult::new(
            |_: &PageRequest| -> Result<ResponseEnvelope> {
                Ok(ResponseEnvelope::new(HttpResponse::new(404)).with_safe_statuses([404]))
            },
            10,
            0,
            PagingRules::default(),
        );
        assert!(result.data().unwrap().is_empty());
        assert_eq!(result.fetched_pages().len(), 1);
        assert!(result.is_exhausted());
    }

    #[test]
    fn transport_errors_propagate_unchanged() {
        let mut result = PaginatedResult::new(
            |_: &PageRequest| -> Result<ResponseEnvelope> {
                Err(ApiError::Transport("connection reset".to_string()))
            },
            10,
            0,
            PagingRules::default(),
        );
        assert!(result.pages().next().unwrap().unwrap_err().is_transport());
    }

    #[test]
    fn empty_page_terminates_even_if_header_says_more() {
        let calls = Cell::new(0);
        let mut result = PaginatedResult::new(
            |_: &PageRequest| -> Result<ResponseEnvelope> {
                calls.set(calls.get() + 1);
                Ok(page_response(json!([]), true))
            },
            5,
            0,
            PagingRules::default(),
        );
        assert_eq!(result.pages().count(), 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn full_page_rule_without_header() {
        let mut result = PaginatedResult::new(
            |req: &PageRequest| -> Result<ResponseEnvelope> {
                let body = if req.page_num < 3 { json!([1, 2]) } else { json!([3]) };
                Ok(ResponseEnvelope::new(HttpResponse::new(200).with_json(&body)))
            },
            2,
            0,
            PagingRules {
                records: RecordSource::Root,
                more: MoreIndicator::FullPage,
            },
        );
        assert_eq!(result.data().unwrap().len(), 5);
        assert_eq!(result.fetched_pages().len(), 3);
    }

    #[test]
    fn step_overrides_offset_advance() {
        let offsets = RefCell::new(Vec::new());
        let mut result = PaginatedResult::new(
            |req: &PageRequest| -> Result<ResponseEnvelope> {
                offsets.borrow_mut().push(req.offset);
                Ok(three_pages(req))
            },
            2,
            5,
            PagingRules::default(),
        )
        .with_step(10);

        assert_eq!(result.pages().count(), 3);
        assert_eq!(*offsets.borrow(), vec![5, 15, 25]);
        assert_eq!(result.fetched_pages()[2].top(), 2);
        assert_eq!(result.offset_of(4), 35);
    }

    #[test]
    fn records_under_a_named_field() {
        let mut result = PaginatedResult::new(
            |_: &PageRequest| -> Result<ResponseEnvelope> {
                Ok(page_response(json!({"items": [{"id": 7}], "count": 1}), false))
            },
            10,
            0,
            PagingRules {
                records: RecordSource::Field("items".to_string()),
                more: MoreIndicator::Header,
            },
        );
        assert_eq!(ids(result.data().unwrap()), vec![7]);
    }
}
