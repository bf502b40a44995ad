//! Bounded pool of reusable render sessions.
//!
//! Opening a session (a browser tab, say) is costly, so sessions are kept
//! after use and handed to the next caller. A counting semaphore bounds how
//! many sessions are checked out at once; that bound is the pipeline's
//! concurrency limit.
//!
//! [`SessionPool::acquire`] returns a [`PooledSession`] guard. Dropping the
//! guard returns the session to the idle stack (unless it was discarded
//! after a failure) and releases the permit, on every exit path.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, instrument};

use super::RenderProvider;
use crate::error::RenderError;

pub struct SessionPool<P: RenderProvider> {
    provider: P,
    idle: Mutex<Vec<P::Session>>,
    permits: Semaphore,
    capacity: usize,
}

impl<P: RenderProvider> SessionPool<P> {
    /// Pool allowing at most `capacity` (minimum 1) checked-out sessions.
    pub fn new(provider: P, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            provider,
            idle: Mutex::new(Vec::with_capacity(capacity)),
            permits: Semaphore::new(capacity),
            capacity,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held by a checked-out session.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn idle_count(&self) -> usize {
        self.lock_idle().len()
    }

    /// Wait for a free slot, then reuse an idle session or open a new one.
    #[instrument(level = "debug", skip_all, fields(provider = self.provider.name()))]
    pub async fn acquire(&self) -> Result<PooledSession<'_, P>, RenderError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| RenderError::PoolClosed)?;

        let reused = self.lock_idle().pop();
        let session = match reused {
            Some(session) => {
                debug!("Reusing idle session");
                session
            }
            None => {
                debug!("Opening new session");
                self.provider.open_session().await?
            }
        };

        Ok(PooledSession {
            session: Some(session),
            pool: self,
            discard: false,
            _permit: permit,
        })
    }

    /// Refuse further acquisitions and drop idle sessions.
    pub fn close(&self) {
        self.permits.close();
        self.lock_idle().clear();
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<P::Session>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A checked-out session. Derefs to the provider's session type.
pub struct PooledSession<'a, P: RenderProvider> {
    session: Option<P::Session>,
    pool: &'a SessionPool<P>,
    discard: bool,
    _permit: SemaphorePermit<'a>,
}

impl<P: RenderProvider> PooledSession<'_, P> {
    /// Do not return this session to the pool; it is dropped instead.
    pub fn discard(&mut self) {
        self.discard = true;
    }
}

impl<P: RenderProvider> Deref for PooledSession<'_, P> {
    type Target = P::Session;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref().expect("session present until drop")
    }
}

impl<P: RenderProvider> DerefMut for PooledSession<'_, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut().expect("session present until drop")
    }
}

impl<P: RenderProvider> Drop for PooledSession<'_, P> {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if self.discard || self.pool.permits.is_closed() {
            debug!("Dropping session instead of returning it to the pool");
            return;
        }
        self.pool.lock_idle().push(session);
    }
}
