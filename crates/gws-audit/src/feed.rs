// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core::time::Duration;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::activity::{Activity, ActivityPage};
use crate::errors::FeedError;
use crate::token::TokenFactory;
use crate::window::format_rfc3339;

/// Upper bound on pages followed within a single query.
pub const MAX_PAGES_PER_QUERY: usize = 10_000;

#[async_trait]
pub trait AuditFeed {
    /// Returns every activity recorded for `source` in `[start, end]`, in feed order.
    async fn query(
        &self,
        source: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Activity>, FeedError>;
}

/// Admin SDK Reports API `activities.list` client.
#[derive(Debug, Clone)]
pub struct ReportsClient {
    client: reqwest::Client,
    base_url: String,
    user_key: String,
    tokens: TokenFactory,
}

impl ReportsClient {
    pub fn new(
        base_url: &str,
        user_key: &str,
        tokens: TokenFactory,
        proxy_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, FeedError> {
        Ok(ReportsClient {
            client: build_client(proxy_url, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_key: user_key.to_string(),
            tokens,
        })
    }

    fn activities_url(&self, source: &str) -> String {
        format!(
            "{}/admin/reports/v1/activity/users/{}/applications/{}",
            self.base_url, self.user_key, source
        )
    }

    async fn fetch_page(
        &self,
        url: &str,
        start: &str,
        end: &str,
        page_token: Option<&str>,
    ) -> Result<ActivityPage, FeedError> {
        let token = self.tokens.get_token().await?;
        let mut query = vec![("startTime", start), ("endTime", end)];
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token));
        }

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Status { status, body });
        }
        Ok(response.json::<ActivityPage>().await?)
    }
}

#[async_trait]
impl AuditFeed for ReportsClient {
    async fn query(
        &self,
        source: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Activity>, FeedError> {
        let url = self.activities_url(source);
        let start = format_rfc3339(start);
        let end = format_rfc3339(end);

        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        let mut pages = 0usize;
        loop {
            let page = self
                .fetch_page(&url, &start, &end, page_token.as_deref())
                .await?;
            pages += 1;
            items.extend(page.items);

            let next = match page.next_page_token {
                Some(next) if !next.is_empty() => next,
                _ => break,
            };
            if !seen_tokens.insert(next.clone()) {
                warn!(source, page_token = %next, "Feed repeated a page token, stopping pagination");
                break;
            }
            if pages >= MAX_PAGES_PER_QUERY {
                warn!(source, pages, "Page limit reached, stopping pagination");
                break;
            }
            page_token = Some(next);
        }

        debug!(
            source,
            start = %start,
            end = %end,
            pages,
            "Fetched {} activities",
            items.len()
        );
        Ok(items)
    }
}

/// Builds a reqwest client with optional proxy configuration and timeout.
pub fn build_client(
    proxy_url: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    builder.build()
}
