// /////////////////////////////////////////////////////////////////////////////
// Validex
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A bounded pool of reusable, non-`Sync` connections, gated by a
//! [`tokio::sync::Semaphore`] the same way the pipeline crate this project
//! grew from gates CPU/IO tokens: acquiring a permit before taking work is
//! the backpressure mechanism, not a queue length check.

use std::sync::{Arc, Mutex};
use tokio::sync::{Semaphore, SemaphorePermit};
use validex_domain::error::{Result, ValidationError};

/// A pooled connection, checked out for the lifetime of this guard and
/// returned to the pool on drop.
pub struct PooledConnection<'a, C> {
    conn: Option<C>,
    pool: &'a ConnectionPool<C>,
    _permit: SemaphorePermit<'a>,
}

impl<'a, C> std::ops::Deref for PooledConnection<'a, C> {
    type Target = C;
    fn deref(&self) -> &C {
        self.conn.as_ref().expect("connection taken only on drop")
    }
}

impl<'a, C> std::ops::DerefMut for PooledConnection<'a, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn.as_mut().expect("connection taken only on drop")
    }
}

impl<'a, C> Drop for PooledConnection<'a, C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.idle.lock().unwrap_or_else(|e| e.into_inner()).push(conn);
        }
    }
}

/// A fixed-capacity pool. `factory` is called to create a fresh connection
/// the first `capacity` times the pool runs dry; beyond that, callers wait on
/// the semaphore until a checked-out connection is returned.
pub struct ConnectionPool<C> {
    idle: Mutex<Vec<C>>,
    permits: Arc<Semaphore>,
    factory: Box<dyn Fn() -> Result<C> + Send + Sync>,
}

impl<C: Send + 'static> ConnectionPool<C> {
    pub fn new(capacity: usize, factory: impl Fn() -> Result<C> + Send + Sync + 'static) -> Self {
        ConnectionPool { idle: Mutex::new(Vec::with_capacity(capacity)), permits: Arc::new(Semaphore::new(capacity)), factory: Box::new(factory) }
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for a free slot, then returns either an idle connection or a
    /// freshly created one.
    pub async fn acquire(&self) -> Result<PooledConnection<'_, C>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ValidationError::Internal("connection pool semaphore closed".to_string()))?;

        let conn = self.idle.lock().unwrap_or_else(|e| e.into_inner()).pop();
        let conn = match conn {
            Some(c) => c,
            None => (self.factory)()?,
        };

        Ok(PooledConnection { conn: Some(conn), pool: self, _permit: permit })
    }
}
