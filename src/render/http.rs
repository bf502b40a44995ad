//! Plain HTTP provider.
//!
//! Fetches markup with `reqwest` and executes no scripts. Growth triggers
//! are no-ops and the growth signal is the element count of the held page,
//! so the content loader converges after a single iteration. Suitable for
//! catalogs that render their grid server-side, and for tests.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};

use super::{RenderProvider, RenderSession};
use crate::config::ScoutConfig;
use crate::error::{RenderError, ScoutError};

static ANY_ELEMENT: Lazy<Selector> = Lazy::new(|| Selector::parse("*").expect("static selector"));

/// Provider whose sessions share one connection-pooled HTTP client.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: Client,
    timeout: Duration,
}

impl HttpProvider {
    pub fn new(config: &ScoutConfig) -> Result<Self, ScoutError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.navigation_timeout())
            .build()
            .map_err(|e| ScoutError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout: config.navigation_timeout(),
        })
    }
}

#[async_trait]
impl RenderProvider for HttpProvider {
    type Session = HttpSession;

    fn name(&self) -> &'static str {
        "http"
    }

    async fn open_session(&self) -> Result<Self::Session, RenderError> {
        Ok(HttpSession {
            client: self.client.clone(),
            timeout: self.timeout,
            page: None,
        })
    }
}

/// One "tab": the last fetched url and its body.
#[derive(Debug)]
pub struct HttpSession {
    client: Client,
    timeout: Duration,
    page: Option<(String, String)>,
}

impl HttpSession {
    fn body(&self) -> Result<&str, RenderError> {
        self.page
            .as_ref()
            .map(|(_, body)| body.as_str())
            .ok_or(RenderError::NoPage)
    }
}

fn has_match(markup: &str, selector: &Selector) -> bool {
    Html::parse_document(markup).select(selector).next().is_some()
}

fn element_count(markup: &str) -> u64 {
    Html::parse_document(markup).select(&ANY_ELEMENT).count() as u64
}

#[async_trait]
impl RenderSession for HttpSession {
    #[instrument(level = "debug", skip(self))]
    async fn goto(&mut self, url: &str) -> Result<(), RenderError> {
        self.page = None;
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(%url, error = %e, "HTTP request failed");
            if e.is_timeout() {
                RenderError::Timeout {
                    url: url.to_string(),
                    timeout: self.timeout,
                }
            } else {
                RenderError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| RenderError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        debug!(bytes = body.len(), "Fetched page");
        self.page = Some((url.to_string(), body));
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str) -> Result<(), RenderError> {
        let parsed = Selector::parse(selector)
            .map_err(|e| RenderError::Script(format!("bad selector `{selector}`: {e}")))?;
        if has_match(self.body()?, &parsed) {
            Ok(())
        } else {
            Err(RenderError::ElementMissing {
                selector: selector.to_string(),
            })
        }
    }

    async fn trigger_growth(&mut self, _load_more_label: Option<&str>) -> Result<(), RenderError> {
        Ok(())
    }

    async fn growth_signal(&mut self) -> Result<u64, RenderError> {
        Ok(element_count(self.body()?))
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        self.body().map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(route: &str, status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    async fn session() -> HttpSession {
        HttpProvider::new(&ScoutConfig::default())
            .unwrap()
            .open_session()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_goto_and_content() {
        let server = serve("/marketplace", 200, "<html><body><div id=grid></div></body></html>").await;
        let mut s = session().await;
        s.goto(&format!("{}/marketplace", server.uri())).await.unwrap();
        assert!(s.content().await.unwrap().contains("id=grid"));
        assert!(s.wait_for("#grid").await.is_ok());
        assert!(matches!(
            s.wait_for(".tile").await,
            Err(RenderError::ElementMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = serve("/gone", 404, "nope").await;
        let mut s = session().await;
        let err = s.goto(&format!("{}/gone", server.uri())).await.unwrap_err();
        assert!(matches!(err, RenderError::Status { status: 404, .. }));
        assert!(matches!(s.content().await, Err(RenderError::NoPage)));
    }

    #[tokio::test]
    async fn test_growth_signal_is_stable_for_static_markup() {
        let server = serve("/", 200, "<html><body><p>a</p><p>b</p></body></html>").await;
        let mut s = session().await;
        s.goto(&server.uri()).await.unwrap();
        let first = s.growth_signal().await.unwrap();
        s.trigger_growth(Some("Load More")).await.unwrap();
        assert_eq!(s.growth_signal().await.unwrap(), first);
        assert!(first >= 4);
    }

    #[tokio::test]
    async fn test_content_before_goto_is_no_page() {
        let mut s = session().await;
        assert!(matches!(s.content().await, Err(RenderError::NoPage)));
    }
}
