//! Fan-out helper used inside once-guarded sections.
//!
//! Nested fan-out runs on scoped threads rather than the rayon pool: a rayon
//! worker waiting on a join may steal a job that blocks on the very once-guard
//! that worker is initializing.

/// Runs `work` for every item, one worker per item, and joins them all.
///
/// The first item runs on the calling thread.
pub fn fan_out<T, F>(items: &[T], work: F)
where
    T: Sync,
    F: Fn(&T) + Sync,
{
    match items {
        [] => {}
        [only] => work(only),
        [first, rest @ ..] => std::thread::scope(|scope| {
            let work = &work;
            for item in rest {
                scope.spawn(move || work(item));
            }
            work(first);
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn visits_every_item_once() {
        let hits = AtomicUsize::new(0);
        let items: Vec<usize> = (1..=8).collect();
        fan_out(&items, |n| {
            hits.fetch_add(*n, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 36);
    }

    #[test]
    fn empty_is_noop() {
        let items: [u8; 0] = [];
        fan_out(&items, |_| panic!("no work expected"));
    }
}
