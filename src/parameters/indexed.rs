//! Index-validated storage for per-order coefficients and their covariance.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectrumFitError};

/// A fixed-length container whose accessors validate the index.
///
/// Reads return `None` and writes return an error for indices outside the
/// container, leaving the stored data untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedStore<T> {
    #[serde(skip)]
    what: &'static str,
    items: Vec<T>,
}

impl<T: Clone> IndexedStore<T> {
    /// A store of `len` copies of `fill`.
    pub fn filled(what: &'static str, len: usize, fill: T) -> Self {
        Self {
            what,
            items: vec![fill; len],
        }
    }
}

impl<T> IndexedStore<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        let len = self.items.len();
        match self.items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(SpectrumFitError::IndexOutOfRange {
                what: self.what,
                index,
                len,
            }),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

/// How a [`LowerTriangle`] element was addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// `(i, j)` with `j <= i`.
    Direct,
    /// `(i, j)` with `j > i`; the element `(j, i)` was used instead.
    Swapped,
}

/// Symmetric matrix stored as its lower triangle, diagonal included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowerTriangle {
    dim: usize,
    data: Vec<f64>,
}

impl LowerTriangle {
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            data: vec![0.0; dim * (dim + 1) / 2],
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn locate(&self, i: usize, j: usize) -> Result<(usize, Access)> {
        let (row, col, access) = if j > i {
            (j, i, Access::Swapped)
        } else {
            (i, j, Access::Direct)
        };
        if row >= self.dim {
            return Err(SpectrumFitError::IndexOutOfRange {
                what: "covariance",
                index: row,
                len: self.dim,
            });
        }
        Ok((row * (row + 1) / 2 + col, access))
    }

    /// The element at `(i, j)` and how it was reached.
    pub fn get(&self, i: usize, j: usize) -> Result<(f64, Access)> {
        let (offset, access) = self.locate(i, j)?;
        Ok((self.data[offset], access))
    }

    /// The element at `(i, j)`, or zero outside the matrix.
    pub fn value(&self, i: usize, j: usize) -> f64 {
        self.get(i, j).map(|(v, _)| v).unwrap_or(0.0)
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) -> Result<Access> {
        let (offset, access) = self.locate(i, j)?;
        self.data[offset] = value;
        Ok(access)
    }
}
