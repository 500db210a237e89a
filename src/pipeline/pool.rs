//! Bounded batch execution.
//!
//! Units of a batch run as futures on the current task, at most `concurrency` at a
//! time. The batch completes when every unit has finished, whatever each returned.

use futures::future::join_all;
use std::future::Future;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy)]
pub struct BatchPool {
    concurrency: usize,
}

impl BatchPool {
    /// A ceiling of zero is treated as one.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `work` for every item, returning outputs in input order.
    pub async fn run<I, T, F, Fut>(&self, items: I, work: F) -> Vec<T>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = T>,
    {
        let semaphore = Semaphore::new(self.concurrency);
        let semaphore = &semaphore;
        let work = &work;
        join_all(items.into_iter().map(|item| async move {
            // The semaphore is local and never closed
            let _permit = semaphore.acquire().await.ok();
            work(item).await
        }))
        .await
    }
}
