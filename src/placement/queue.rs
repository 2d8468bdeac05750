use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Worker index for a key. Equal keys always land on the same worker.
pub fn worker_for<K: Hash>(key: &K, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % workers.max(1) as u64) as usize
}

/// Run `handler` over `jobs` on a small pool of workers, routing each job by
/// its key. Jobs sharing a key run one after another, in submission order, on
/// one worker; jobs with different keys may run concurrently.
///
/// Results come back in completion order. A worker that panics loses the
/// results it had gathered; callers must tolerate missing results.
pub async fn run_keyed<K, J, R, F, Fut>(jobs: Vec<(K, J)>, workers: usize, handler: F) -> Vec<R>
where
    K: Hash,
    J: Send + 'static,
    R: Send + 'static,
    F: Fn(J) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    if jobs.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, jobs.len());

    let mut set = JoinSet::new();
    let mut senders = Vec::with_capacity(workers);
    for worker in 0..workers {
        let (tx, mut rx) = mpsc::unbounded_channel::<J>();
        senders.push(tx);
        let handler = handler.clone();
        set.spawn(async move {
            let mut results = Vec::new();
            while let Some(job) = rx.recv().await {
                let pending = handler(job);
                results.push(pending.await);
            }
            debug!(worker, handled = results.len(), "worker drained");
            results
        });
    }

    for (key, job) in jobs {
        let worker = worker_for(&key, workers);
        if senders[worker].send(job).is_err() {
            warn!(worker, "worker stopped before accepting a job");
        }
    }
    // Closing the channels lets each worker finish once its queue is empty.
    drop(senders);

    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(worker_results) => results.extend(worker_results),
            Err(err) => error!(error = %err, "worker task failed"),
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_worker_for_is_stable() {
        let key = ("src/a.rs", 12usize);
        let first = worker_for(&key, 4);
        assert!(first < 4);
        for _ in 0..20 {
            assert_eq!(worker_for(&key, 4), first);
        }
        assert_eq!(worker_for(&key, 0), 0);
    }

    #[tokio::test]
    async fn test_all_jobs_are_handled() {
        let jobs: Vec<(usize, usize)> = (0..25).map(|i| (i % 7, i)).collect();
        let mut results = run_keyed(jobs, 4, |n: usize| async move { n * 2 }).await;
        results.sort_unstable();
        assert_eq!(results, (0..25).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_same_key_runs_in_submission_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let jobs: Vec<(&str, (&str, usize))> = (0..12)
            .map(|i| {
                let key = if i % 2 == 0 { "even" } else { "odd" };
                (key, (key, i))
            })
            .collect();

        let handler_log = Arc::clone(&log);
        run_keyed(jobs, 4, move |(key, seq): (&'static str, usize)| {
            let log = Arc::clone(&handler_log);
            async move {
                // Later jobs sleep less so reordering would show up.
                tokio::time::sleep(Duration::from_millis((12 - seq) as u64)).await;
                log.lock().unwrap().push((key, seq));
            }
        })
        .await;

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 12);
        for key in ["even", "odd"] {
            let seqs: Vec<usize> = log.iter().filter(|(k, _)| *k == key).map(|(_, s)| *s).collect();
            let mut sorted = seqs.clone();
            sorted.sort_unstable();
            assert_eq!(seqs, sorted, "jobs for {key} ran out of order");
        }
    }

    #[tokio::test]
    async fn test_empty_job_list() {
        let results: Vec<u8> = run_keyed(Vec::<(u8, u8)>::new(), 4, |n: u8| async move { n }).await;
        assert!(results.is_empty());
    }
}
