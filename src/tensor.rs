// --- File: src/tensor.rs ---

//! Dense 2-D tensors and strided vector views.
//!
//! `Tensor` is the single value type of the crate: samples, activations,
//! parameters and gradients are all matrices, and column vectors are simply
//! `n × 1` tensors. Storage is an `ndarray::Array2<f64>` that is always kept
//! in standard (row-major) layout, so element `(i, j)` sits at flat offset
//! `i * cols + j`.
//!
//! Every operation allocates a new `Tensor`; inputs are never mutated.
//! Shape violations are returned as [`TensorError`] values carrying both
//! shapes, so they can be propagated with `?` up to whoever built the model.

use ndarray::{Array2, ArrayView1, Axis};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

/// `(rows, cols)`
pub type Shape = (usize, usize);

/// Contract violations detected by tensor operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TensorError {
    #[error("{op}: shape mismatch, left is {left:?}, right is {right:?}")]
    ShapeMismatch {
        op: &'static str,
        left: Shape,
        right: Shape,
    },

    #[error("multiply: lhs {lhs:?} has {} columns but rhs {rhs:?} has {} rows", .lhs.1, .rhs.0)]
    DimensionMismatch { lhs: Shape, rhs: Shape },

    #[error("index ({row}, {col}) out of bounds for tensor of shape {shape:?}")]
    IndexOutOfBounds { row: usize, col: usize, shape: Shape },

    #[error("region at ({row}, {col}) of shape {size:?} exceeds tensor of shape {shape:?}")]
    RegionOutOfBounds {
        row: usize,
        col: usize,
        size: Shape,
        shape: Shape,
    },

    #[error("shape {shape:?} needs {expected} elements, got {actual}")]
    ElementCount {
        shape: Shape,
        expected: usize,
        actual: usize,
    },

    #[error("{0}: nothing to stack")]
    EmptyStack(&'static str),

    #[error("vector views differ in size: {left} vs {right}")]
    VectorSize { left: usize, right: usize },

    #[error("ndarray layout error: {0}")]
    Layout(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, TensorError>;

/// Dense matrix of `f64` in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TensorRecord", into = "TensorRecord")]
pub struct Tensor {
    data: Array2<f64>,
}

/// Serialized form of a [`Tensor`]: explicit dimensions plus the flat
/// row-major element list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorRecord {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl TryFrom<TensorRecord> for Tensor {
    type Error = TensorError;

    fn try_from(record: TensorRecord) -> Result<Self> {
        Tensor::from_vec(record.rows, record.cols, record.data)
    }
}

impl From<Tensor> for TensorRecord {
    fn from(tensor: Tensor) -> Self {
        TensorRecord {
            rows: tensor.rows(),
            cols: tensor.cols(),
            data: tensor.to_vec(),
        }
    }
}

impl Tensor {
    // --- Construction ---

    fn wrap(data: Array2<f64>) -> Self {
        if data.is_standard_layout() {
            Self { data }
        } else {
            Self {
                data: data.as_standard_layout().into_owned(),
            }
        }
    }

    /// Zero-filled tensor.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::wrap(Array2::zeros((rows, cols)))
    }

    /// Tensor with every element set to `value`.
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self::wrap(Array2::from_elem((rows, cols), value))
    }

    /// `n × n` identity matrix.
    pub fn identity(n: usize) -> Self {
        Self::wrap(Array2::eye(n))
    }

    /// Tensor of independent standard-normal samples drawn from `rng`.
    pub fn gaussian<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Self {
        Self::wrap(Array2::random_using((rows, cols), StandardNormal, rng))
    }

    /// Builds a tensor from row-major values.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(TensorError::ElementCount {
                shape: (rows, cols),
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self::wrap(Array2::from_shape_vec((rows, cols), data)?))
    }

    /// `n × 1` column vector.
    pub fn column(values: &[f64]) -> Self {
        Self::wrap(Array2::from_shape_fn((values.len(), 1), |(i, _)| values[i]))
    }

    /// `1 × n` row vector.
    pub fn row_vector(values: &[f64]) -> Self {
        Self::wrap(Array2::from_shape_fn((1, values.len()), |(_, j)| values[j]))
    }

    // --- Inspection ---

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> Shape {
        self.data.dim()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Elements in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }

    /// Underlying array, always in standard layout.
    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }

    fn check_index(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(TensorError::IndexOutOfBounds {
                row,
                col,
                shape: self.shape(),
            });
        }
        Ok(())
    }

    /// Bounds-checked element read.
    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.check_index(row, col)?;
        Ok(self.data[[row, col]])
    }

    /// Bounds-checked element write.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.check_index(row, col)?;
        self.data[[row, col]] = value;
        Ok(())
    }

    /// Strided view over row `i`.
    pub fn row(&self, i: usize) -> Result<VectorView<'_>> {
        if i >= self.rows() {
            return Err(TensorError::IndexOutOfBounds {
                row: i,
                col: 0,
                shape: self.shape(),
            });
        }
        Ok(VectorView {
            view: self.data.row(i),
        })
    }

    /// Strided view over column `j`.
    pub fn col(&self, j: usize) -> Result<VectorView<'_>> {
        if j >= self.cols() {
            return Err(TensorError::IndexOutOfBounds {
                row: 0,
                col: j,
                shape: self.shape(),
            });
        }
        Ok(VectorView {
            view: self.data.column(j),
        })
    }

    /// Sum of all elements.
    pub fn sum(&self) -> f64 {
        self.data.sum()
    }

    /// Row-major index of the largest element; the first one wins on ties.
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, x) in self.iter().enumerate() {
            match best {
                Some((_, b)) if x <= b => {}
                _ => best = Some((i, x)),
            }
        }
        best.map(|(i, _)| i)
    }

    // --- Algebra ---

    /// Matrix product. Each output element is the dot product of a row view
    /// of `self` and a column view of `rhs`.
    pub fn multiply(&self, rhs: &Tensor) -> Result<Tensor> {
        if self.cols() != rhs.rows() {
            return Err(TensorError::DimensionMismatch {
                lhs: self.shape(),
                rhs: rhs.shape(),
            });
        }
        let mut out = Vec::with_capacity(self.rows() * rhs.cols());
        for i in 0..self.rows() {
            let row = self.row(i)?;
            for j in 0..rhs.cols() {
                out.push(row.dot(&rhs.col(j)?)?);
            }
        }
        Tensor::from_vec(self.rows(), rhs.cols(), out)
    }

    fn zip_with(&self, op: &'static str, rhs: &Tensor, f: impl Fn(f64, f64) -> f64) -> Result<Tensor> {
        if self.shape() != rhs.shape() {
            return Err(TensorError::ShapeMismatch {
                op,
                left: self.shape(),
                right: rhs.shape(),
            });
        }
        let mut out = self.data.clone();
        out.zip_mut_with(&rhs.data, |a, &b| *a = f(*a, b));
        Ok(Self::wrap(out))
    }

    pub fn add(&self, rhs: &Tensor) -> Result<Tensor> {
        self.zip_with("add", rhs, |a, b| a + b)
    }

    pub fn subtract(&self, rhs: &Tensor) -> Result<Tensor> {
        self.zip_with("subtract", rhs, |a, b| a - b)
    }

    /// Hadamard product.
    pub fn elementwise_multiply(&self, rhs: &Tensor) -> Result<Tensor> {
        self.zip_with("elementwise_multiply", rhs, |a, b| a * b)
    }

    pub fn scale(&self, k: f64) -> Tensor {
        self.map(|x| x * k)
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Tensor {
        Self::wrap(self.data.mapv(f))
    }

    pub fn exp(&self) -> Tensor {
        self.map(f64::exp)
    }

    /// New tensor with swapped dimensions and physically permuted storage.
    /// The result never aliases `self`.
    pub fn transpose(&self) -> Tensor {
        let (rows, cols) = self.shape();
        Self::wrap(Array2::from_shape_fn((cols, rows), |(i, j)| {
            self.data[[j, i]]
        }))
    }

    /// Bounds-checked copy of the `rows × cols` region starting at
    /// `(row_offset, col_offset)`.
    pub fn submatrix(
        &self,
        row_offset: usize,
        col_offset: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Tensor> {
        if row_offset + rows > self.rows() || col_offset + cols > self.cols() {
            return Err(TensorError::RegionOutOfBounds {
                row: row_offset,
                col: col_offset,
                size: (rows, cols),
                shape: self.shape(),
            });
        }
        let region = self.data.slice(ndarray::s![
            row_offset..row_offset + rows,
            col_offset..col_offset + cols
        ]);
        Ok(Self::wrap(region.to_owned()))
    }

    /// Same elements in the same row-major order, new dimensions.
    pub fn reshape(&self, rows: usize, cols: usize) -> Result<Tensor> {
        Tensor::from_vec(rows, cols, self.to_vec())
    }

    // --- Composition ---

    /// Concatenates tensors top to bottom. All parts need the same column count.
    pub fn vstack<T: Borrow<Tensor>>(parts: &[T]) -> Result<Tensor> {
        let first: &Tensor = parts.first().ok_or(TensorError::EmptyStack("vstack"))?.borrow();
        let mut views = Vec::with_capacity(parts.len());
        for part in parts {
            let part: &Tensor = part.borrow();
            if part.cols() != first.cols() {
                return Err(TensorError::ShapeMismatch {
                    op: "vstack",
                    left: first.shape(),
                    right: part.shape(),
                });
            }
            views.push(part.data.view());
        }
        Ok(Self::wrap(ndarray::concatenate(Axis(0), &views)?))
    }

    /// Concatenates tensors left to right. All parts need the same row count.
    pub fn hstack<T: Borrow<Tensor>>(parts: &[T]) -> Result<Tensor> {
        let first: &Tensor = parts.first().ok_or(TensorError::EmptyStack("hstack"))?.borrow();
        let mut views = Vec::with_capacity(parts.len());
        for part in parts {
            let part: &Tensor = part.borrow();
            if part.rows() != first.rows() {
                return Err(TensorError::ShapeMismatch {
                    op: "hstack",
                    left: first.shape(),
                    right: part.shape(),
                });
            }
            views.push(part.data.view());
        }
        Ok(Self::wrap(ndarray::concatenate(Axis(1), &views)?))
    }

    /// Tiles a grid of tensors: each inner slice is hstacked into a band and
    /// the bands are vstacked.
    pub fn grid<T: Borrow<Tensor>>(tiles: &[Vec<T>]) -> Result<Tensor> {
        let bands = tiles
            .iter()
            .map(|row| Tensor::hstack(row.as_slice()))
            .collect::<Result<Vec<_>>>()?;
        Tensor::vstack(&bands)
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, row) in self.data.rows().into_iter().enumerate() {
            if i > 0 {
                write!(f, "\n ")?;
            }
            write!(f, "{}", VectorView { view: row })?;
        }
        write!(f, "]")
    }
}

/// Non-owning strided projection of one row or column of a [`Tensor`].
///
/// The lifetime ties the view to the tensor it was taken from.
#[derive(Debug, Clone, Copy)]
pub struct VectorView<'a> {
    view: ArrayView1<'a, f64>,
}

impl<'a> VectorView<'a> {
    pub fn size(&self) -> usize {
        self.view.len()
    }

    /// Distance between consecutive elements in the parent's flat storage.
    pub fn stride(&self) -> usize {
        self.view.strides()[0].unsigned_abs()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.view.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + 'a {
        self.view.into_iter().copied()
    }

    pub fn dot(&self, other: &VectorView<'_>) -> Result<f64> {
        if self.size() != other.size() {
            return Err(TensorError::VectorSize {
                left: self.size(),
                right: other.size(),
            });
        }
        Ok(self.view.dot(&other.view))
    }

    /// Copies the view into a new `size × 1` tensor.
    pub fn to_column(&self) -> Tensor {
        Tensor::wrap(self.view.to_owned().insert_axis(Axis(1)))
    }

    /// Copies the view into a new `1 × size` tensor.
    pub fn to_row(&self) -> Tensor {
        Tensor::wrap(self.view.to_owned().insert_axis(Axis(0)))
    }
}

impl fmt::Display for VectorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, x) in self.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:.6}", x)?;
        }
        write!(f, "]")
    }
}
