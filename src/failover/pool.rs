//! Semaphore-gated connection pool (§4.G.2).
//!
//! Acquire returns a [`PooledHandle`] that releases back to the idle
//! list on drop — success or failure, mirroring "guarantees release on
//! scope exit" in the spec.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};

#[async_trait::async_trait]
pub trait ConnectionFactory<C>: Send + Sync {
    async fn build(&self) -> Result<C, crate::error::NetworkError>;
}

struct PoolInner<C> {
    idle: VecDeque<C>,
}

pub struct ConnectionPool<C> {
    max_size: usize,
    semaphore: Arc<Semaphore>,
    inner: Arc<Mutex<PoolInner<C>>>,
    factory: Arc<dyn ConnectionFactory<C>>,
}

impl<C: Send + 'static> ConnectionPool<C> {
    pub fn new(max_size: usize, factory: Arc<dyn ConnectionFactory<C>>) -> Self {
        Self {
            max_size,
            semaphore: Arc::new(Semaphore::new(max_size)),
            inner: Arc::new(Mutex::new(PoolInner { idle: VecDeque::new() })),
            factory,
        }
    }

    pub async fn acquire(&self) -> Result<PooledHandle<C>, crate::error::NetworkError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("pool semaphore never closed");

        let existing = {
            let mut inner = self.inner.lock().await;
            inner.idle.pop_front()
        };
        let conn = match existing {
            Some(c) => c,
            None => self.factory.build().await?,
        };

        Ok(PooledHandle {
            conn: Some(conn),
            inner: self.inner.clone(),
            max_size: self.max_size,
            _permit: permit,
        })
    }
}

pub struct PooledHandle<C> {
    conn: Option<C>,
    inner: Arc<Mutex<PoolInner<C>>>,
    max_size: usize,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl<C> std::ops::Deref for PooledHandle<C> {
    type Target = C;
    fn deref(&self) -> &C {
        self.conn.as_ref().expect("connection taken only on drop")
    }
}

impl<C> std::ops::DerefMut for PooledHandle<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn.as_mut().expect("connection taken only on drop")
    }
}

impl<C> Drop for PooledHandle<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let inner = self.inner.clone();
            let max_size = self.max_size;
            tokio::spawn(async move {
                let mut inner = inner.lock().await;
                if inner.idle.len() < max_size {
                    inner.idle.push_back(conn);
                }
                // else: dropped, beyond cap.
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CounterFactory {
        built: AtomicU32,
    }

    #[async_trait::async_trait]
    impl ConnectionFactory<u32> for CounterFactory {
        async fn build(&self) -> Result<u32, crate::error::NetworkError> {
            Ok(self.built.fetch_add(1, Ordering::SeqCst))
        }
    }

    #[tokio::test]
    async fn reuses_released_connection() {
        let factory = Arc::new(CounterFactory { built: AtomicU32::new(0) });
        let pool = ConnectionPool::new(1, factory.clone());
        {
            let handle = pool.acquire().await.unwrap();
            assert_eq!(*handle, 0);
        }
        tokio::task::yield_now().await;
        let handle = pool.acquire().await.unwrap();
        assert_eq!(*handle, 0);
        assert_eq!(factory.built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn acquire_blocks_when_pool_exhausted() {
        let factory = Arc::new(CounterFactory { built: AtomicU32::new(0) });
        let pool = Arc::new(ConnectionPool::new(1, factory));
        let handle = pool.acquire().await.unwrap();
        let pool2 = pool.clone();
        let acquired = tokio::time::timeout(std::time::Duration::from_millis(20), pool2.acquire()).await;
        assert!(acquired.is_err());
        drop(handle);
    }
}
