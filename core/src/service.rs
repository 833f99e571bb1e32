// Copyright 2025 HEM Sp. z o.o.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Shutdown side given to a background task spawned with [`spawn_service`].
pub struct StopHandle {
    shutdown_rx: oneshot::Receiver<()>,
}

impl StopHandle {
    fn new(shutdown_rx: oneshot::Receiver<()>) -> Self {
        Self { shutdown_rx }
    }

    /// Resolves once shutdown is requested or the owning [`ServiceHandle`] is dropped.
    ///
    /// Cancel-safe, so it can sit in a `tokio::select!` branch of an event loop:
    ///
    /// ```rust
    /// use sitmon_core::spawn_service;
    ///
    /// async fn run() {
    ///     let handle = spawn_service(|mut stop| async move {
    ///         stop.signaled().await;
    ///     });
    ///     handle.shutdown().await.unwrap();
    /// }
    /// ```
    pub async fn signaled(&mut self) {
        (&mut self.shutdown_rx).await.unwrap_or_default();
    }
}

pub struct ServiceHandle {
    join: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ServiceHandle {
    pub fn new(join: JoinHandle<()>, shutdown_tx: oneshot::Sender<()>) -> Self {
        Self { join, shutdown_tx: Some(shutdown_tx) }
    }

    /// Signals the task to stop without waiting for it.
    pub fn request_shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn await_join(self) -> Result<(), tokio::task::JoinError> {
        self.join.await
    }

    /// Signals the task to stop and waits until it has cleaned up.
    pub async fn shutdown(mut self) -> Result<(), tokio::task::JoinError> {
        self.request_shutdown();
        self.await_join().await
    }
}

pub fn spawn_service<Fut, Func>(f: Func) -> ServiceHandle
where
    Fut: Future<Output = ()> + Send + 'static,
    Func: FnOnce(StopHandle) -> Fut + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let stop = StopHandle::new(shutdown_rx);
    let join = tokio::spawn(async move {
        f(stop).await;
    });
    ServiceHandle::new(join, shutdown_tx)
}

/// Group of services stopped together.
#[derive(Default)]
pub struct MultiServiceHandle {
    handles: Vec<ServiceHandle>,
}

impl MultiServiceHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, handle: ServiceHandle) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Requests shutdown of every service first, then joins them in order.
    /// Returns the first join error, after all services have been awaited.
    pub async fn shutdown(mut self) -> Result<(), tokio::task::JoinError> {
        for h in &mut self.handles {
            h.request_shutdown();
        }
        let mut first_err = None;
        for h in self.handles {
            if let Err(e) = h.await_join().await {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn shutdown_waits_for_cleanup() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let c = cleaned.clone();
        let handle = spawn_service(move |mut stop| async move {
            stop.signaled().await;
            c.fetch_add(1, Ordering::SeqCst);
        });
        handle.shutdown().await.unwrap();
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_the_handle_releases_the_task() {
        let (done_tx, done_rx) = oneshot::channel();
        let handle = spawn_service(move |mut stop| async move {
            stop.signaled().await;
            let _ = done_tx.send(());
        });
        drop(handle);
        done_rx.await.unwrap();
    }

    #[tokio::test]
    async fn multi_handle_stops_every_service() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let mut group = MultiServiceHandle::new();
        for _ in 0..3 {
            let s = stopped.clone();
            group.add(spawn_service(move |mut stop| async move {
                stop.signaled().await;
                s.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(group.len(), 3);
        group.shutdown().await.unwrap();
        assert_eq!(stopped.load(Ordering::SeqCst), 3);
    }
}
