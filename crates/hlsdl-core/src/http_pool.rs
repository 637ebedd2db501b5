//! Bounded, reusable HTTP client handle pool (C3).
//!
//! Handles are `curl::easy::Easy` instances kept warm for connection reuse.
//! The pool is bounded by `max_size`; `acquire()` waits cooperatively (via a
//! `tokio::sync::Semaphore`) until a handle is available, and prefers the
//! most recently released handle (LIFO) to favour warm keep-alive
//! connections, mirroring the scheduler's own connection-budget idiom.

use curl::easy::Easy;
use std::sync::Mutex;
use tokio::sync::{Semaphore, SemaphorePermit};

pub struct HttpClientPool {
    idle: Mutex<Vec<Easy>>,
    semaphore: Semaphore,
    max_size: usize,
}

impl HttpClientPool {
    pub fn new(max_size: usize) -> Self {
        HttpClientPool {
            idle: Mutex::new(Vec::with_capacity(max_size)),
            semaphore: Semaphore::new(max_size),
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Acquire a handle, waiting if the pool is exhausted. Returns a guard
    /// that returns the handle to the pool (LIFO) when dropped.
    pub async fn acquire(&self) -> PooledHandle<'_> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("http pool semaphore is never closed while the pool is alive");
        let handle = {
            let mut idle = self.idle.lock().expect("http pool mutex poisoned");
            idle.pop()
        }
        .unwrap_or_else(Easy::new);

        PooledHandle {
            pool: self,
            handle: Some(handle),
            _permit: permit,
        }
    }

    fn release(&self, handle: Easy) {
        // `Easy::url()` overwrites per-request state on next use; the
        // connection cache inside the handle stays warm across requests,
        // which is the whole point of pooling rather than constructing a
        // fresh `Easy` per fetch.
        let mut idle = self.idle.lock().expect("http pool mutex poisoned");
        idle.push(handle);
    }

    /// Drains all idle handles. Outstanding (acquired) handles are dropped
    /// by their owners as usual; this only clears the warm pool.
    pub fn close_all(&self) {
        let mut idle = self.idle.lock().expect("http pool mutex poisoned");
        idle.clear();
    }
}

/// RAII guard around a pooled handle; returns it to the pool on drop.
pub struct PooledHandle<'a> {
    pool: &'a HttpClientPool,
    handle: Option<Easy>,
    _permit: SemaphorePermit<'a>,
}

impl PooledHandle<'_> {
    pub fn get_mut(&mut self) -> &mut Easy {
        self.handle.as_mut().expect("handle taken before drop")
    }

    /// Run `f` against this handle on the blocking thread pool, the bridge
    /// the engine uses to keep `curl`'s synchronous transfer loop off the
    /// async scheduler. The handle travels into the blocking task and back;
    /// `self` (and the permit it holds) stays put, so the slot isn't released
    /// until the blocking work actually finishes.
    pub async fn with_blocking<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Easy) -> R + Send + 'static,
        R: Send + 'static,
    {
        let mut easy = self.handle.take().expect("handle taken before drop");
        let (easy, result) = tokio::task::spawn_blocking(move || {
            let result = f(&mut easy);
            (easy, result)
        })
        .await
        .expect("blocking segment-fetch task panicked");
        self.handle = Some(easy);
        result
    }
}

impl Drop for PooledHandle<'_> {
    fn drop(&mut self) {
        if let Some(h) = self.handle.take() {
            self.pool.release(h);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_blocks_until_capacity_is_released() {
        let pool = HttpClientPool::new(1);
        let h1 = pool.acquire().await;
        assert_eq!(pool.semaphore.available_permits(), 0);
        drop(h1);
        let _h2 = pool.acquire().await;
        assert_eq!(pool.semaphore.available_permits(), 0);
    }

    #[tokio::test]
    async fn released_handles_are_reused_lifo() {
        let pool = HttpClientPool::new(2);
        {
            let _a = pool.acquire().await;
            let _b = pool.acquire().await;
        }
        assert_eq!(pool.idle.lock().unwrap().len(), 2);
        let _c = pool.acquire().await;
        assert_eq!(pool.idle.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn with_blocking_returns_the_handle_afterwards() {
        let pool = HttpClientPool::new(1);
        {
            let mut h = pool.acquire().await;
            let doubled = h.with_blocking(|_easy| 21 * 2).await;
            assert_eq!(doubled, 42);
        }
        assert_eq!(pool.idle.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn close_all_drains_idle_handles() {
        let pool = HttpClientPool::new(2);
        {
            let _a = pool.acquire().await;
        }
        assert_eq!(pool.idle.lock().unwrap().len(), 1);
        pool.close_all();
        assert_eq!(pool.idle.lock().unwrap().len(), 0);
    }
}
