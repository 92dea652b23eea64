//! Sparse real vector used for parameters, gradients and regularization terms.

use alloc::vec::Vec;

use hashbrown::HashMap;

/// A real vector of fixed dimension that only stores populated entries.
///
/// Writing `0.0` to an index removes it, so [`SparseVector::indices()`] always enumerates the
/// non-zero entries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SparseVector {
    dimension: usize,
    entries: HashMap<usize, f64>,
}

impl SparseVector {
    /// Creates a zero vector of the given dimension.
    #[inline(always)]
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: HashMap::new(),
        }
    }

    /// Creates a vector from dense values. Zeros are not stored.
    #[must_use]
    pub fn from_dense(values: &[f64]) -> Self {
        let mut v = Self::new(values.len());
        for (i, &x) in values.iter().enumerate() {
            v.set(i, x);
        }
        v
    }

    /// Creates a vector from `(index, value)` pairs. Later pairs overwrite earlier ones.
    ///
    /// # Panics
    ///
    /// Every index must be less than `dimension`.
    #[must_use]
    pub fn from_entries<I>(dimension: usize, entries: I) -> Self
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let mut v = Self::new(dimension);
        for (i, x) in entries {
            v.set(i, x);
        }
        v
    }

    /// Returns the dimension of the vector.
    #[inline(always)]
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the number of populated entries.
    #[inline(always)]
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Gets the value at `index`; unpopulated entries are `0.0`.
    #[inline(always)]
    #[must_use]
    pub fn get(&self, index: usize) -> f64 {
        self.entries.get(&index).copied().unwrap_or(0.0)
    }

    /// Sets the value at `index`.
    ///
    /// # Panics
    ///
    /// `index` must be less than the dimension.
    #[inline(always)]
    pub fn set(&mut self, index: usize, value: f64) {
        assert!(index < self.dimension, "index out of range");
        if value == 0.0 {
            self.entries.remove(&index);
        } else {
            self.entries.insert(index, value);
        }
    }

    /// Adds `value` to the entry at `index`.
    ///
    /// # Panics
    ///
    /// `index` must be less than the dimension.
    #[inline(always)]
    pub fn add_to(&mut self, index: usize, value: f64) {
        let x = self.get(index) + value;
        self.set(index, x);
    }

    /// Iterates over populated `(index, value)` pairs in arbitrary order.
    #[inline(always)]
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().map(|(&i, &x)| (i, x))
    }

    /// Returns the populated indices in ascending order.
    #[must_use]
    pub fn indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.entries.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Dot product.
    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        let (small, large) = if self.nnz() <= other.nnz() {
            (self, other)
        } else {
            (other, self)
        };
        small.iter().map(|(i, x)| x * large.get(i)).sum()
    }

    /// Returns `self + other`.
    #[must_use]
    pub fn plus(&self, other: &Self) -> Self {
        self.plus_scaled(other, 1.0)
    }

    /// Returns `self - other`.
    #[must_use]
    pub fn minus(&self, other: &Self) -> Self {
        self.plus_scaled(other, -1.0)
    }

    /// Returns `self * factor`.
    #[must_use]
    pub fn times(&self, factor: f64) -> Self {
        let mut v = Self::new(self.dimension);
        for (i, x) in self.iter() {
            v.set(i, x * factor);
        }
        v
    }

    /// Returns `self + other * factor`.
    #[must_use]
    pub fn plus_scaled(&self, other: &Self, factor: f64) -> Self {
        let mut v = self.clone();
        v.add_scaled(other, factor);
        v
    }

    /// Adds `other * factor` to `self` in place.
    pub fn add_scaled(&mut self, other: &Self, factor: f64) {
        for (i, x) in other.iter() {
            self.add_to(i, x * factor);
        }
    }

    /// Number of non-zero entries.
    #[inline(always)]
    #[must_use]
    pub fn l0_norm(&self) -> f64 {
        self.nnz() as f64
    }

    /// Sum of absolute values.
    #[must_use]
    pub fn l1_norm(&self) -> f64 {
        self.iter().map(|(_, x)| x.abs()).sum()
    }

    /// Euclidean norm.
    #[must_use]
    pub fn l2_norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Largest absolute value.
    #[must_use]
    pub fn linf_norm(&self) -> f64 {
        self.iter().fold(0.0, |acc, (_, x)| acc.max(x.abs()))
    }

    /// Expands the vector into a dense `Vec`.
    #[must_use]
    pub fn to_dense(&self) -> Vec<f64> {
        let mut v = vec![0.0; self.dimension];
        for (i, x) in self.iter() {
            v[i] = x;
        }
        v
    }

    /// Keeps only the entries for which `f` returns `true`.
    #[inline(always)]
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, &mut f64) -> bool,
    {
        self.entries.retain(|&i, x| f(i, x) && *x != 0.0);
    }
}

impl From<Vec<f64>> for SparseVector {
    fn from(v: Vec<f64>) -> Self {
        Self::from_dense(&v)
    }
}

impl From<SparseVector> for Vec<f64> {
    fn from(v: SparseVector) -> Self {
        v.to_dense()
    }
}
