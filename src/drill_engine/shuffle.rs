use rand::{seq::index, Rng};

/// In-place Fisher-Yates shuffle.
pub fn shuffle<T, R: Rng>(rng: &mut R, items: &mut [T]) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Take `n` items without replacement, in random order. `n` is clamped to
/// the list length.
pub fn sample<T: Clone, R: Rng>(rng: &mut R, items: &[T], n: usize) -> Vec<T> {
    let n = n.min(items.len());
    index::sample(rng, items.len(), n)
        .into_iter()
        .map(|i| items[i].clone())
        .collect()
}
