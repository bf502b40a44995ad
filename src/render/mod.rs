//! Rendering and fetch providers.
//!
//! The pipeline only needs markup in and markup out, so it talks to pages
//! through two narrow traits:
//!
//! - [`RenderSession`]: one navigable page context ("goto", trigger growth,
//!   read the growth signal, read the current markup)
//! - [`RenderProvider`]: opens fresh sessions
//!
//! # Implementations
//!
//! | Provider | Module | Notes |
//! |----------|--------|-------|
//! | [`HttpProvider`] | [`http`] | `reqwest` GET; static markup, growth is a no-op |
//! | `BrowserProvider` | `browser` | headless Chrome tabs; feature `browser` |
//!
//! Sessions are handed out by a [`SessionPool`] that bounds how many exist
//! at once and reuses them between fetches.

#[cfg(feature = "browser")]
pub mod browser;
pub mod http;
pub mod pool;
pub mod retry;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, timeout};

use crate::error::RenderError;

pub use http::HttpProvider;
pub use pool::SessionPool;

/// A single page context. Not shared between concurrent tasks.
#[async_trait]
pub trait RenderSession: Send {
    /// Navigate to `url` and wait for the document to load.
    async fn goto(&mut self, url: &str) -> Result<(), RenderError>;

    /// Wait until an element matching `selector` exists.
    async fn wait_for(&mut self, selector: &str) -> Result<(), RenderError>;

    /// Try to make more content appear: scroll to the bottom, then press the
    /// "load more" control when a label is given and such a control exists.
    async fn trigger_growth(&mut self, load_more_label: Option<&str>) -> Result<(), RenderError>;

    /// A number that grows while content is still being added.
    async fn growth_signal(&mut self) -> Result<u64, RenderError>;

    /// Current markup of the page.
    async fn content(&mut self) -> Result<String, RenderError>;
}

/// Factory for [`RenderSession`]s.
#[async_trait]
pub trait RenderProvider: Send + Sync + 'static {
    type Session: RenderSession + 'static;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Open a fresh, isolated session.
    async fn open_session(&self) -> Result<Self::Session, RenderError>;
}

/// Run `fut`, converting an elapsed deadline into [`RenderError::Timeout`].
pub async fn with_timeout<T, F>(url: &str, limit: Duration, fut: F) -> Result<T, RenderError>
where
    F: Future<Output = Result<T, RenderError>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RenderError::Timeout {
            url: url.to_string(),
            timeout: limit,
        }),
    }
}

/// Plain page fetch through a session: navigate, let the page settle, read
/// the markup. The whole exchange is bounded by `limit`.
pub async fn fetch_markup<S>(
    session: &mut S,
    url: &str,
    limit: Duration,
    settle: Duration,
) -> Result<String, RenderError>
where
    S: RenderSession + ?Sized,
{
    with_timeout(url, limit, async {
        session.goto(url).await?;
        if !settle.is_zero() {
            sleep(settle).await;
        }
        session.content().await
    })
    .await
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory provider for pipeline tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{RenderProvider, RenderSession};
    use crate::error::RenderError;

    /// What a scripted page does when visited.
    #[derive(Debug, Clone)]
    pub enum Page {
        Markup(String),
        Fail(RenderError),
        Hang(Duration, String),
    }

    #[derive(Debug, Default)]
    pub struct Script {
        pub pages: HashMap<String, Page>,
        /// Growth signal values returned in order; the last one repeats.
        pub signals: Vec<u64>,
        pub fail_growth: bool,
    }

    #[derive(Debug, Clone, Default)]
    pub struct ScriptedProvider {
        pub script: Arc<Script>,
        pub opened: Arc<AtomicUsize>,
        pub growth_calls: Arc<AtomicUsize>,
        pub visits: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedProvider {
        pub fn new(script: Script) -> Self {
            Self {
                script: Arc::new(script),
                ..Self::default()
            }
        }

        pub fn with_pages<I, K>(pages: I) -> Self
        where
            I: IntoIterator<Item = (K, Page)>,
            K: Into<String>,
        {
            Self::new(Script {
                pages: pages.into_iter().map(|(k, p)| (k.into(), p)).collect(),
                ..Script::default()
            })
        }
    }

    pub struct ScriptedSession {
        provider: ScriptedProvider,
        current: Option<String>,
        signal_idx: usize,
    }

    #[async_trait]
    impl RenderSession for ScriptedSession {
        async fn goto(&mut self, url: &str) -> Result<(), RenderError> {
            self.provider.visits.lock().unwrap().push(url.to_string());
            match self.provider.script.pages.get(url) {
                Some(Page::Markup(markup)) => {
                    self.current = Some(markup.clone());
                    Ok(())
                }
                Some(Page::Fail(err)) => Err(err.clone()),
                Some(Page::Hang(delay, markup)) => {
                    tokio::time::sleep(*delay).await;
                    self.current = Some(markup.clone());
                    Ok(())
                }
                None => Err(RenderError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }

        async fn wait_for(&mut self, selector: &str) -> Result<(), RenderError> {
            match &self.current {
                Some(markup) if markup.contains(selector) => Ok(()),
                _ => Err(RenderError::ElementMissing {
                    selector: selector.to_string(),
                }),
            }
        }

        async fn trigger_growth(&mut self, _label: Option<&str>) -> Result<(), RenderError> {
            self.provider.growth_calls.fetch_add(1, Ordering::SeqCst);
            if self.provider.script.fail_growth {
                return Err(RenderError::Script("overlay intercepted click".to_string()));
            }
            Ok(())
        }

        async fn growth_signal(&mut self) -> Result<u64, RenderError> {
            let signals = &self.provider.script.signals;
            let value = signals
                .get(self.signal_idx)
                .or_else(|| signals.last())
                .copied()
                .unwrap_or(0);
            self.signal_idx += 1;
            Ok(value)
        }

        async fn content(&mut self) -> Result<String, RenderError> {
            self.current.clone().ok_or(RenderError::NoPage)
        }
    }

    #[async_trait]
    impl RenderProvider for ScriptedProvider {
        type Session = ScriptedSession;

        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn open_session(&self) -> Result<Self::Session, RenderError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(ScriptedSession {
                provider: self.clone(),
                current: None,
                signal_idx: 0,
            })
        }
    }
}
