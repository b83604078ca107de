//! Remote connection lifecycle for one linked table.
//!
//! The manager owns the table's single session, runs the bounded connect
//! retry loop with the introspection handshake, and remembers the final
//! failure when all attempts are spent. A disconnected table replays that
//! remembered failure on every later operation instead of reconnecting
//! lazily.

use std::sync::{Arc, Mutex, MutexGuard};

use relink_remote::{ConnectionSpec, RemoteSession, SessionPool};
use relink_result::{Error, Result};

/// Extra connect attempts after the first one.
pub(crate) const CONNECT_MAX_RETRY: usize = 2;

struct ConnState {
    /// Cleared on teardown; a manager without a spec is permanently dead.
    spec: Option<ConnectionSpec>,
    session: Option<Arc<RemoteSession>>,
    connect_error: Option<Error>,
}

pub(crate) struct ConnectionManager {
    pool: Arc<SessionPool>,
    state: Mutex<ConnState>,
}

impl ConnectionManager {
    pub(crate) fn new(pool: Arc<SessionPool>, spec: ConnectionSpec) -> Self {
        Self {
            pool,
            state: Mutex::new(ConnState {
                spec: Some(spec),
                session: None,
                connect_error: None,
            }),
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ConnState>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("connection manager lock poisoned".into()))
    }

    /// Establish the session, running `handshake` (schema introspection) as
    /// part of each attempt.
    ///
    /// Up to `CONNECT_MAX_RETRY + 1` attempts. A failed handshake
    /// force-closes its session before the next attempt so no session leaks.
    /// Ambiguity and not-found errors from the handshake are not connection
    /// problems and fail immediately. On exhaustion the final error is
    /// stored as the remembered failure and returned.
    pub(crate) fn connect_with<T>(
        &self,
        handshake: impl Fn(&RemoteSession) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.lock_state()?;
        let spec = match state.spec.clone() {
            Some(spec) => spec,
            None => return Err(Error::Internal("linked table is invalidated".into())),
        };
        state.connect_error = None;
        state.session = None;

        let mut last_err = Error::Internal("connect loop made no attempt".into());
        for attempt in 0..=CONNECT_MAX_RETRY {
            if attempt > 0 {
                tracing::warn!(
                    url = %spec.url,
                    attempt = attempt + 1,
                    error = %last_err,
                    "retrying remote connect"
                );
            }
            match self.pool.acquire(&spec) {
                Ok(session) => match handshake(&session) {
                    Ok(value) => {
                        state.session = Some(session);
                        return Ok(value);
                    }
                    Err(e) => {
                        session.close();
                        if matches!(
                            e,
                            Error::AmbiguousRemoteObject { .. } | Error::ObjectNotFound { .. }
                        ) {
                            state.connect_error = Some(e.clone());
                            return Err(e);
                        }
                        last_err = e;
                    }
                },
                Err(e) => {
                    last_err = e;
                }
            }
        }

        let err = Error::ConnectFailure {
            url: spec.url,
            message: last_err.to_string(),
        };
        state.connect_error = Some(err.clone());
        Err(err)
    }

    /// Current session, or the remembered failure while disconnected.
    pub(crate) fn session(&self) -> Result<Arc<RemoteSession>> {
        let state = self.lock_state()?;
        if state.spec.is_none() {
            return Err(Error::Internal("linked table is invalidated".into()));
        }
        match &state.session {
            Some(session) => Ok(Arc::clone(session)),
            None => Err(state
                .connect_error
                .clone()
                .unwrap_or_else(|| Error::Internal("linked table has no remote session".into()))),
        }
    }

    /// Force-close the current session (invalidating its statement cache).
    /// Does not set a remembered failure; callers reconnect right after.
    pub(crate) fn discard_session(&self) -> Result<()> {
        let mut state = self.lock_state()?;
        if let Some(session) = state.session.take() {
            session.close();
        }
        Ok(())
    }

    /// Close the session, keeping the spec so the table could reconnect.
    pub(crate) fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(session) = state.session.take() {
                session.close();
            }
        }
    }

    /// Teardown: close and clear the spec. Idempotent; the manager cannot
    /// be used afterwards.
    pub(crate) fn shutdown(&self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(session) = state.session.take() {
                session.close();
            }
            state.spec = None;
            state.connect_error = None;
        }
    }

    /// Connection parameters, for DDL synthesis.
    pub(crate) fn spec(&self) -> Result<ConnectionSpec> {
        let state = self.lock_state()?;
        state
            .spec
            .clone()
            .ok_or_else(|| Error::Internal("linked table is invalidated".into()))
    }
}
