//! Headless Chrome provider (cargo feature `browser`).
//!
//! One Chrome process is launched per provider; each session is a tab.
//! `headless_chrome` is blocking, so every tab call runs on
//! `spawn_blocking`. Tabs are closed when their session is dropped, which
//! the pool only does for discarded sessions or on shutdown.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, info, instrument, warn};

use super::{RenderProvider, RenderSession};
use crate::config::ScoutConfig;
use crate::error::{RenderError, ScoutError};

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight); true";
const ELEMENT_COUNT: &str = "document.getElementsByTagName('*').length";

/// Click the first visible button or link whose text contains the label.
fn click_load_more(label: &str) -> Result<String, RenderError> {
    let label = serde_json::to_string(&label.to_lowercase())
        .map_err(|e| RenderError::Script(e.to_string()))?;
    Ok(format!(
        r#"(() => {{
            const wanted = {label};
            const controls = document.querySelectorAll('button, a, [role="button"]');
            for (const el of controls) {{
                if (el.offsetParent !== null && el.innerText.toLowerCase().includes(wanted)) {{
                    el.click();
                    return true;
                }}
            }}
            return false;
        }})()"#
    ))
}

pub struct BrowserProvider {
    browser: Arc<Browser>,
    timeout: Duration,
}

impl BrowserProvider {
    /// Launch headless Chrome. The sandbox is disabled inside containers.
    #[instrument(level = "info", skip_all)]
    pub fn launch(config: &ScoutConfig) -> Result<Self, ScoutError> {
        let is_container = std::env::var("SCOUT_CONTAINER").is_ok()
            || std::path::Path::new("/.dockerenv").exists();
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(!is_container)
            .idle_browser_timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| ScoutError::Config(format!("Chrome launch options: {e}")))?;
        let browser = Browser::new(options)
            .map_err(|e| ScoutError::Config(format!("failed to launch headless Chrome: {e}")))?;
        info!(is_container, "Launched headless Chrome");
        Ok(Self {
            browser: Arc::new(browser),
            timeout: config.navigation_timeout(),
        })
    }
}

#[async_trait]
impl RenderProvider for BrowserProvider {
    type Session = BrowserSession;

    fn name(&self) -> &'static str {
        "browser"
    }

    async fn open_session(&self) -> Result<Self::Session, RenderError> {
        let browser = Arc::clone(&self.browser);
        let timeout = self.timeout;
        let tab = tokio::task::spawn_blocking(move || {
            let tab = browser
                .new_tab()
                .map_err(|e| RenderError::Browser(format!("failed to create tab: {e}")))?;
            tab.set_default_timeout(timeout);
            Ok::<_, RenderError>(tab)
        })
        .await
        .map_err(|e| RenderError::Browser(format!("tab task panicked: {e}")))??;
        debug!("Opened browser tab");
        Ok(BrowserSession { tab })
    }
}

pub struct BrowserSession {
    tab: Arc<Tab>,
}

impl BrowserSession {
    async fn with_tab<T, F>(&self, f: F) -> Result<T, RenderError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T, RenderError> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| RenderError::Browser(format!("tab task panicked: {e}")))?
    }

    async fn evaluate(&self, script: String) -> Result<Option<serde_json::Value>, RenderError> {
        self.with_tab(move |tab| {
            tab.evaluate(&script, false)
                .map(|remote| remote.value)
                .map_err(|e| RenderError::Script(e.to_string()))
        })
        .await
    }
}

#[async_trait]
impl RenderSession for BrowserSession {
    async fn goto(&mut self, url: &str) -> Result<(), RenderError> {
        let target = url.to_string();
        self.with_tab(move |tab| {
            tab.navigate_to(&target)
                .and_then(|tab| tab.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| RenderError::Navigation {
                    url: target.clone(),
                    reason: e.to_string(),
                })
        })
        .await
    }

    async fn wait_for(&mut self, selector: &str) -> Result<(), RenderError> {
        let selector = selector.to_string();
        self.with_tab(move |tab| {
            tab.wait_for_element(&selector)
                .map(|_| ())
                .map_err(|_| RenderError::ElementMissing {
                    selector: selector.clone(),
                })
        })
        .await
    }

    async fn trigger_growth(&mut self, load_more_label: Option<&str>) -> Result<(), RenderError> {
        self.evaluate(SCROLL_TO_BOTTOM.to_string()).await?;
        if let Some(label) = load_more_label {
            let clicked = self.evaluate(click_load_more(label)?).await?;
            debug!(?clicked, "Load-more control");
        }
        Ok(())
    }

    async fn growth_signal(&mut self) -> Result<u64, RenderError> {
        self.evaluate(ELEMENT_COUNT.to_string())
            .await?
            .and_then(|v| v.as_u64())
            .ok_or_else(|| RenderError::Script("element count was not a number".to_string()))
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        self.with_tab(|tab| {
            tab.get_content()
                .map_err(|e| RenderError::Browser(format!("failed to read content: {e}")))
        })
        .await
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            warn!(error = %e, "Failed to close browser tab");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_script_escapes_label() {
        let script = click_load_more(r#"Load "More""#).unwrap();
        assert!(script.contains(r#"const wanted = "load \"more\"";"#));
    }
}
