//! Bounded fan-out over independent per-resource tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;

use cirrus_contracts::error::{CirrusError, CirrusResult};

/// Run `task` once per item on at most `workers` scoped threads.
///
/// Each task gets exclusive access to its own item. The first failure stops
/// workers from picking up new items and is returned once every in-flight
/// task has finished. Items are handed out in order; completion order is
/// unspecified.
pub fn fan_out<T, F>(items: &mut [T], workers: usize, task: F) -> CirrusResult<()>
where
    T: Send,
    F: Fn(&mut T) -> CirrusResult<()> + Sync,
{
    let workers = workers.max(1).min(items.len());
    if workers <= 1 {
        return items.iter_mut().try_for_each(task);
    }

    let queue = Mutex::new(items.iter_mut());
    let failure: Mutex<Option<CirrusError>> = Mutex::new(None);
    let aborted = AtomicBool::new(false);

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                if aborted.load(Ordering::Acquire) {
                    break;
                }
                let next = match queue.lock() {
                    Ok(mut pending) => pending.next(),
                    Err(_) => None,
                };
                let Some(item) = next else {
                    break;
                };
                if let Err(e) = task(item) {
                    aborted.store(true, Ordering::Release);
                    if let Ok(mut slot) = failure.lock() {
                        slot.get_or_insert(e);
                    }
                    break;
                }
            });
        }
    });

    match failure.into_inner() {
        Ok(None) => Ok(()),
        Ok(Some(e)) => Err(e),
        Err(_) => Err(CirrusError::Execution {
            reason: "worker pool state was poisoned".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn every_item_is_visited_once() {
        let mut items: Vec<u32> = (0..20).collect();
        fan_out(&mut items, 3, |n| {
            *n *= 2;
            Ok(())
        })
        .unwrap();
        assert_eq!(items, (0..20).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn first_failure_is_returned() {
        let mut items: Vec<u32> = (0..10).collect();
        let err = fan_out(&mut items, 3, |n| {
            if *n == 4 {
                Err(CirrusError::service("functiongraph", "list_triggers", "boom"))
            } else {
                Ok(())
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn single_worker_stops_at_first_failure() {
        let visited = AtomicUsize::new(0);
        let mut items = vec![1, 2, 3];
        let result = fan_out(&mut items, 1, |n| {
            visited.fetch_add(1, Ordering::SeqCst);
            if *n == 2 {
                Err(CirrusError::Execution { reason: "stop".into() })
            } else {
                Ok(())
            }
        });
        assert!(result.is_err());
        assert_eq!(visited.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_input_is_ok() {
        let mut items: Vec<u8> = vec![];
        fan_out(&mut items, 3, |_| Ok(())).unwrap();
    }
}
