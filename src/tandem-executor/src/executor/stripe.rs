use std::vec::IntoIter;

/// The cells of a result container owned by a single worker.
///
/// Yields `(index, cell)` pairs in ascending index order.
#[derive(Debug)]
pub struct Stripe<'a, T> {
    worker: usize,
    cells: Vec<(usize, &'a mut T)>,
}

impl<'a, T> Stripe<'a, T> {
    /// The worker this stripe belongs to.
    #[inline]
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// The number of cells in this stripe.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterates over the indices covered by this stripe.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells.iter().map(|(i, _)| *i)
    }
}

impl<'a, T> IntoIterator for Stripe<'a, T> {
    type Item = (usize, &'a mut T);
    type IntoIter = IntoIter<(usize, &'a mut T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}

/// Deals the cells of `out` into `workers` disjoint stripes.
///
/// Worker `w` receives exactly the indices `i` with `i % workers == w`.
/// Always returns `workers` stripes (at least one), some of which may be
/// empty when `out` is shorter than the worker count.
pub fn stripes<T>(out: &mut [T], workers: usize) -> Vec<Stripe<'_, T>> {
    let workers = workers.max(1);
    let per_worker = out.len().div_ceil(workers);

    let mut stripes: Vec<_> = (0..workers)
        .map(|worker| Stripe {
            worker,
            cells: Vec::with_capacity(per_worker),
        })
        .collect();

    for (index, cell) in out.iter_mut().enumerate() {
        stripes[index % workers].cells.push((index, cell));
    }

    stripes
}
