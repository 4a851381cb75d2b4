/// Evenly spaced frame indices over `[0, num_frames - 1]`.
///
/// Index `i` lands on `round(i * num_frames / (n - 1))` clamped to the last
/// frame, then collisions are pushed apart so the result always holds
/// `min(n, num_frames)` distinct, strictly increasing indices with the first
/// frame and the last frame included (for `n >= 2`).
pub fn uniform_indices(num_frames: usize, n: usize) -> Vec<usize> {
    if num_frames == 0 || n == 0 {
        return Vec::new();
    }
    if n >= num_frames {
        return (0..num_frames).collect();
    }
    if n == 1 {
        return vec![0];
    }

    let last = num_frames - 1;
    let step = num_frames as f64 / (n - 1) as f64;
    let mut indices: Vec<usize> = (0..n)
        .map(|i| ((i as f64 * step).round() as usize).min(last))
        .collect();
    indices[0] = 0;
    indices[n - 1] = last;

    for i in 1..n {
        if indices[i] <= indices[i - 1] {
            indices[i] = indices[i - 1] + 1;
        }
    }
    indices[n - 1] = last;
    for i in (0..n - 1).rev() {
        if indices[i] >= indices[i + 1] {
            indices[i] = indices[i + 1] - 1;
        }
    }
    indices
}

/// Picks `n` items spread evenly over `items`, keeping their order.
pub fn uniform_sample<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    uniform_indices(items.len(), n)
        .into_iter()
        .map(|i| items[i].clone())
        .collect()
}
