/// Apply `f` to every item with at most `limit` calls in flight.
///
/// Results come back in input order regardless of completion order. Items are
/// processed in windows of `limit` on scoped threads; `limit <= 1` runs inline.
pub fn map_ordered<T, R, F>(items: &[T], limit: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    if limit <= 1 || items.len() <= 1 {
        return items.iter().enumerate().map(|(i, item)| f(i, item)).collect();
    }

    let f = &f;
    let mut results = Vec::with_capacity(items.len());
    for (window_index, window) in items.chunks(limit).enumerate() {
        let base = window_index * limit;
        let window_results: Vec<R> = std::thread::scope(|scope| {
            let handles: Vec<_> = window
                .iter()
                .enumerate()
                .map(|(offset, item)| scope.spawn(move || f(base + offset, item)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        });
        results.extend(window_results);
    }
    results
}
