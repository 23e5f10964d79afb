//! Bounded pagination over Gateway list endpoints.
//!
//! A walk always terminates: on a short or empty page, once a reported total
//! is reached, at the page ceiling, at the row bound, or when the request
//! context is cancelled.

use crate::client::{Gateway, GatewayRequest};
use crate::envelope::unwrap_rows;
use crate::error::GatewayError;
use rootcause::Report;
use scm_assistant_core::RequestContext;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

/// Limits for a pagination walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Rows requested per page.
    pub page_size: u32,
    /// Hard ceiling on pages fetched.
    pub max_pages: u32,
    /// Optional bound on rows collected.
    pub max_total: Option<usize>,
}

impl PageLimits {
    /// Creates limits with no row bound.
    #[must_use]
    pub fn new(page_size: u32, max_pages: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
            max_total: None,
        }
    }

    /// Bounds the number of rows collected.
    #[must_use]
    pub fn with_max_total(mut self, max_total: usize) -> Self {
        self.max_total = Some(max_total);
        self
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self::new(100, 10)
    }
}

/// Why a walk stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStop {
    /// A page came back with fewer rows than requested.
    ShortPage,
    /// A page came back empty.
    EmptyPage,
    /// The Gateway-reported total was reached.
    TotalReached,
    /// The page ceiling was hit.
    PageCeiling,
    /// The row bound was hit.
    RowBound,
    /// The request context was cancelled.
    Cancelled,
    /// A later page failed; earlier rows are kept.
    Failed(String),
}

/// The outcome of a walk.
#[derive(Debug, Clone, PartialEq)]
pub struct PageWalk {
    /// Rows collected across all pages.
    pub rows: Vec<JsonValue>,
    /// Pages fetched.
    pub pages: u32,
    /// Why the walk stopped.
    pub stop: PageStop,
}

impl PageWalk {
    /// Returns true if the walk ended before the data was exhausted.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(
            self.stop,
            PageStop::PageCeiling | PageStop::RowBound | PageStop::Cancelled | PageStop::Failed(_)
        )
    }
}

/// `page` is 1-based.
fn page_request(base: &GatewayRequest, limits: &PageLimits, page_index: u32) -> GatewayRequest {
    base.clone()
        .with_query("limit", limits.page_size)
        .with_query("page", page_index + 1)
}

/// Walks a list endpoint page by page.
///
/// # Errors
///
/// Returns an error only if the first page fails; failures on later pages
/// end the walk with `PageStop::Failed` and keep the rows gathered so far.
pub async fn walk_pages(
    gateway: &dyn Gateway,
    ctx: &RequestContext,
    base: &GatewayRequest,
    limits: PageLimits,
) -> Result<PageWalk, Report<GatewayError>> {
    let mut rows = Vec::new();
    let mut pages = 0u32;

    let stop = loop {
        if pages >= limits.max_pages {
            break PageStop::PageCeiling;
        }
        if ctx.is_done() {
            if pages == 0 {
                return Err(GatewayError::Cancelled.into());
            }
            break PageStop::Cancelled;
        }

        let request = page_request(base, &limits, pages);
        let fetched = gateway
            .get_json(&request)
            .await
            .and_then(|body| {
                unwrap_rows(&body).map_err(|e| {
                    GatewayError::ResponseParseFailed {
                        reason: e.to_string(),
                    }
                    .into()
                })
            });

        let envelope = match fetched {
            Ok(envelope) => envelope,
            Err(e) if pages == 0 => return Err(e),
            Err(e) => {
                warn!(path = %base.path, page = pages + 1, error = %e, "page fetch failed, keeping partial rows");
                break PageStop::Failed(e.to_string());
            }
        };
        pages += 1;

        let page_len = envelope.rows.len();
        rows.extend(envelope.rows);

        if let Some(max_total) = limits.max_total
            && rows.len() >= max_total
        {
            rows.truncate(max_total);
            break PageStop::RowBound;
        }
        if page_len == 0 {
            break PageStop::EmptyPage;
        }
        if let Some(total) = envelope.total
            && rows.len() as u64 >= total
        {
            break PageStop::TotalReached;
        }
        if page_len < limits.page_size as usize {
            break PageStop::ShortPage;
        }
    };

    debug!(path = %base.path, pages, rows = rows.len(), ?stop, "pagination walk finished");

    Ok(PageWalk { rows, pages, stop })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GatewayResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves `total_rows` rows in pages, optionally reporting a total.
    struct PagedGateway {
        total_rows: usize,
        report_total: Option<u64>,
        fail_page: Option<u32>,
        requests: Mutex<Vec<GatewayRequest>>,
    }

    impl PagedGateway {
        fn new(total_rows: usize) -> Self {
            Self {
                total_rows,
                report_total: None,
                fail_page: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Gateway for PagedGateway {
        async fn send(
            &self,
            request: &GatewayRequest,
        ) -> Result<GatewayResponse, Report<GatewayError>> {
            self.requests.lock().unwrap().push(request.clone());
            let limit: usize = request.query["limit"].parse().unwrap();
            let page: u32 = request.query["page"].parse().unwrap();
            if self.fail_page == Some(page) {
                return Ok(GatewayResponse::new(500, "boom"));
            }
            let start = (page as usize - 1) * limit;
            let end = (start + limit).min(self.total_rows);
            let rows: Vec<JsonValue> = (start..end).map(|i| json!({"i": i})).collect();
            let mut body = json!({"data": rows});
            if let Some(total) = self.report_total {
                body["meta"] = json!({"total": total});
            }
            Ok(GatewayResponse::ok_json(&body))
        }
    }

    #[tokio::test]
    async fn stops_on_short_page() {
        let gateway = PagedGateway::new(25);
        let walk = walk_pages(
            &gateway,
            &RequestContext::new(),
            &GatewayRequest::get("/devices"),
            PageLimits::new(10, 50),
        )
        .await
        .unwrap();

        assert_eq!(walk.rows.len(), 25);
        assert_eq!(walk.pages, 3);
        assert_eq!(walk.stop, PageStop::ShortPage);
        assert!(!walk.is_truncated());
    }

    #[tokio::test]
    async fn stops_on_empty_page_when_rows_divide_evenly() {
        let gateway = PagedGateway::new(20);
        let walk = walk_pages(
            &gateway,
            &RequestContext::new(),
            &GatewayRequest::get("/devices"),
            PageLimits::new(10, 50),
        )
        .await
        .unwrap();

        assert_eq!(walk.rows.len(), 20);
        assert_eq!(walk.stop, PageStop::EmptyPage);
    }

    #[tokio::test]
    async fn stops_when_reported_total_reached() {
        let mut gateway = PagedGateway::new(20);
        gateway.report_total = Some(20);
        let walk = walk_pages(
            &gateway,
            &RequestContext::new(),
            &GatewayRequest::get("/devices"),
            PageLimits::new(10, 50),
        )
        .await
        .unwrap();

        assert_eq!(walk.stop, PageStop::TotalReached);
        assert_eq!(gateway.request_count(), 2);
    }

    #[tokio::test]
    async fn stops_at_page_ceiling_against_endless_backend() {
        let gateway = PagedGateway::new(usize::MAX / 2);
        let walk = walk_pages(
            &gateway,
            &RequestContext::new(),
            &GatewayRequest::get("/devices"),
            PageLimits::new(10, 4),
        )
        .await
        .unwrap();

        assert_eq!(walk.pages, 4);
        assert_eq!(walk.rows.len(), 40);
        assert_eq!(walk.stop, PageStop::PageCeiling);
        assert!(walk.is_truncated());
    }

    #[tokio::test]
    async fn stops_at_row_bound() {
        let gateway = PagedGateway::new(1000);
        let walk = walk_pages(
            &gateway,
            &RequestContext::new(),
            &GatewayRequest::get("/devices"),
            PageLimits::new(10, 50).with_max_total(15),
        )
        .await
        .unwrap();

        assert_eq!(walk.rows.len(), 15);
        assert_eq!(walk.stop, PageStop::RowBound);
    }

    #[tokio::test]
    async fn later_page_failure_keeps_partial_rows() {
        let mut gateway = PagedGateway::new(100);
        gateway.fail_page = Some(2);
        let walk = walk_pages(
            &gateway,
            &RequestContext::new(),
            &GatewayRequest::get("/devices"),
            PageLimits::new(10, 50),
        )
        .await
        .unwrap();

        assert_eq!(walk.rows.len(), 10);
        assert!(matches!(walk.stop, PageStop::Failed(_)));
    }

    #[tokio::test]
    async fn first_page_failure_is_an_error() {
        let mut gateway = PagedGateway::new(100);
        gateway.fail_page = Some(1);
        let result = walk_pages(
            &gateway,
            &RequestContext::new(),
            &GatewayRequest::get("/devices"),
            PageLimits::new(10, 50),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn cancelled_context_fetches_nothing() {
        let gateway = PagedGateway::new(100);
        let ctx = RequestContext::new();
        ctx.cancel_handle().cancel();
        let result = walk_pages(
            &gateway,
            &ctx,
            &GatewayRequest::get("/devices"),
            PageLimits::new(10, 50),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(gateway.request_count(), 0);
    }
}
