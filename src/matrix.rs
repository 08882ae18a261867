//! Dense parameter matrices shared between training workers.
//!
//! Every cell is an `f32` stored in an `AtomicU32` and accessed with relaxed
//! loads and stores. `Matrix::add_to_row` reads, adds and writes back as
//! separate steps, so two workers updating the same row at the same time can
//! lose one of the updates. Training tolerates that noise (the "Hogwild"
//! scheme) and the matrices are never locked.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use aligned_box::AlignedBox;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::real;

#[derive(Default)]
#[repr(transparent)]
struct Real {
    bits: AtomicU32,
}

impl Real {
    fn get(&self) -> real {
        real::from_bits(self.bits.load(Ordering::Relaxed))
    }

    fn set(&self, value: real) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    fn add(&self, x: real) {
        let a = self.get();
        self.set(a + x);
    }
}

/// A row-major `rows × cols` matrix of `real`s that can be mutated through a
/// shared reference.
pub struct Matrix {
    rows: usize,
    cols: usize,
    /// `data[i * cols..(i+1) * cols]` is row `i`.
    data: AlignedBox<[Real]>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        // Never ask for a zero-sized allocation.
        let data = AlignedBox::slice_from_default(128, (rows * cols).max(1))
            .expect("Memory allocation failed");
        Matrix { rows, cols, data }
    }

    /// Matrix with every cell drawn uniformly from `[-bound, bound)`.
    pub fn uniform(rows: usize, cols: usize, bound: real, seed: u64) -> Self {
        let m = Matrix::zeros(rows, cols);
        if bound > 0.0 {
            let mut rng = StdRng::seed_from_u64(seed);
            for cell in m.cells() {
                cell.set(rng.gen_range(-bound..bound));
            }
        }
        m
    }

    /// Build a matrix from row-major values. Panics if `values.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, values: Vec<real>) -> Self {
        assert_eq!(values.len(), rows * cols, "matrix data has the wrong length");
        let m = Matrix::zeros(rows, cols);
        for (cell, v) in m.cells().iter().zip(values) {
            cell.set(v);
        }
        m
    }

    /// Build a matrix from equal-length rows.
    pub fn from_rows(rows: &[Vec<real>]) -> Self {
        let cols = rows.first().map_or(0, Vec::len);
        assert!(rows.iter().all(|r| r.len() == cols), "ragged rows");
        Matrix::from_vec(rows.len(), cols, rows.concat())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    fn cells(&self) -> &[Real] {
        &self.data[..self.rows * self.cols]
    }

    fn row_cells(&self, i: usize) -> &[Real] {
        assert!(i < self.rows, "row {i} out of range for {} rows", self.rows);
        &self.data[i * self.cols..][..self.cols]
    }

    pub fn get(&self, i: usize, j: usize) -> real {
        assert!(j < self.cols);
        self.row_cells(i)[j].get()
    }

    pub fn set(&self, i: usize, j: usize, value: real) {
        assert!(j < self.cols);
        self.row_cells(i)[j].set(value);
    }

    /// A snapshot of row `i`.
    pub fn row(&self, i: usize) -> Vec<real> {
        self.row_cells(i).iter().map(Real::get).collect()
    }

    /// A snapshot of the whole matrix in row-major order.
    pub fn to_vec(&self) -> Vec<real> {
        self.cells().iter().map(Real::get).collect()
    }

    /// Dot product of `v` with row `i`.
    pub fn dot_row(&self, v: &[real], i: usize) -> real {
        let row = self.row_cells(i);
        assert_eq!(v.len(), row.len());
        row.iter().zip(v).map(|(w, &x)| w.get() * x).sum()
    }

    /// `out += scale * row i`
    pub fn add_row_to(&self, out: &mut [real], i: usize, scale: real) {
        let row = self.row_cells(i);
        assert_eq!(out.len(), row.len());
        for (o, w) in out.iter_mut().zip(row) {
            *o += scale * w.get();
        }
    }

    /// `row i += scale * v`
    ///
    /// Cells whose step is zero are not written, so a zero step leaves the
    /// row bit-for-bit unchanged (`-0.0 + 0.0` would otherwise become `+0.0`).
    pub fn add_to_row(&self, i: usize, v: &[real], scale: real) {
        let row = self.row_cells(i);
        assert_eq!(v.len(), row.len());
        if scale == 0.0 {
            return;
        }
        for (w, &x) in row.iter().zip(v) {
            let step = scale * x;
            if step != 0.0 {
                w.add(step);
            }
        }
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish_non_exhaustive()
    }
}
