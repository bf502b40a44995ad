//! Dynamic content loader for the catalog index page.
//!
//! The catalog grid materializes as the user scrolls or presses "Load More".
//! [`load_fully`] repeats that growth trigger, waits a settle delay, and
//! reads a growth signal (DOM element count). It stops when the signal is
//! unchanged between two consecutive reads, or after a hard iteration cap
//! so ad and tracker content that never stops growing cannot loop forever.
//!
//! Initial navigation and the ready-element wait are fatal. A failed growth
//! trigger or signal read only counts as "no growth this iteration".

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::error::{RenderError, ScoutError};
use crate::render::{with_timeout, RenderSession};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    /// Hard cap on growth iterations.
    pub max_iterations: usize,
    /// Wait after each growth trigger before reading the signal.
    pub settle_delay: Duration,
    /// Wait after the index page first loads.
    pub initial_settle: Duration,
    /// Bound on the initial navigation plus ready-element wait.
    pub navigation_timeout: Duration,
    pub ready_selector: Option<String>,
    pub load_more_label: Option<String>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            settle_delay: Duration::from_millis(1200),
            initial_settle: Duration::from_millis(2000),
            navigation_timeout: Duration::from_secs(60),
            ready_selector: None,
            load_more_label: None,
        }
    }
}

/// Outcome of a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Growth iterations performed.
    pub iterations: usize,
    /// True when growth stopped before the cap.
    pub converged: bool,
    /// Last growth signal read.
    pub final_signal: u64,
}

/// Navigate `session` to `url` and grow the page until it stops changing.
///
/// On return the session's document holds the fully materialized grid.
#[instrument(level = "info", skip(session, settings), fields(max_iterations = settings.max_iterations))]
pub async fn load_fully<S>(
    session: &mut S,
    url: &str,
    settings: &LoaderSettings,
) -> Result<LoadReport, ScoutError>
where
    S: RenderSession + ?Sized,
{
    let load_error = |source: RenderError| ScoutError::Load {
        url: url.to_string(),
        source,
    };

    with_timeout(url, settings.navigation_timeout, async {
        session.goto(url).await?;
        if let Some(selector) = settings.ready_selector.as_deref() {
            session.wait_for(selector).await?;
        }
        Ok(())
    })
    .await
    .map_err(load_error)?;
    info!("Index page ready");

    if !settings.initial_settle.is_zero() {
        sleep(settings.initial_settle).await;
    }

    let mut previous = session.growth_signal().await.unwrap_or_else(|e| {
        warn!(error = %e, "Could not read initial growth signal");
        0
    });
    let label = settings.load_more_label.as_deref();

    for iteration in 1..=settings.max_iterations {
        if let Err(e) = session.trigger_growth(label).await {
            debug!(iteration, error = %e, "Growth trigger failed; treating as no growth");
        }
        if !settings.settle_delay.is_zero() {
            sleep(settings.settle_delay).await;
        }
        let signal = match session.growth_signal().await {
            Ok(signal) => signal,
            Err(e) => {
                debug!(iteration, error = %e, "Growth signal unreadable; treating as no growth");
                previous
            }
        };
        debug!(iteration, previous, signal, "Growth iteration");

        if signal == previous {
            info!(iterations = iteration, signal, "Content converged");
            return Ok(LoadReport {
                iterations: iteration,
                converged: true,
                final_signal: signal,
            });
        }
        previous = signal;
    }

    warn!(
        iterations = settings.max_iterations,
        signal = previous,
        "Iteration cap reached before content converged"
    );
    Ok(LoadReport {
        iterations: settings.max_iterations,
        converged: false,
        final_signal: previous,
    })
}
