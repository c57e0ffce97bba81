use rand::Rng;

use crate::config::MIN_TEMPERATURE;
use crate::error::{Result, RnnError};

// ============================================================================
// DENSE ROW-MAJOR MATRIX
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix { rows, cols, data: vec![0.0; rows * cols] }
    }

    /// Uniform values in `[-scale, scale)`.
    pub fn random(rows: usize, cols: usize, scale: f32, rng: &mut impl Rng) -> Self {
        let data = (0..rows * cols)
            .map(|_| if scale > 0.0 { rng.gen_range(-scale..scale) } else { 0.0 })
            .collect();
        Matrix { rows, cols, data }
    }

    /// Builds from nested rows, rejecting ragged or mis-sized input.
    pub fn from_rows(name: &str, rows: &[Vec<f32>], expect_rows: usize, expect_cols: usize) -> Result<Self> {
        if rows.len() != expect_rows {
            return Err(RnnError::Artifact(format!("{} has {} rows, expected {}", name, rows.len(), expect_rows)));
        }
        let mut data = Vec::with_capacity(expect_rows * expect_cols);
        for (i, r) in rows.iter().enumerate() {
            if r.len() != expect_cols {
                return Err(RnnError::Artifact(format!("{} row {} has {} columns, expected {}", name, i, r.len(), expect_cols)));
            }
            data.extend_from_slice(r);
        }
        Ok(Matrix { rows: expect_rows, cols: expect_cols, data })
    }

    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        self.data.chunks(self.cols.max(1)).take(self.rows).map(<[f32]>::to_vec).collect()
    }

    pub fn rows(&self) -> usize { self.rows }
    pub fn cols(&self) -> usize { self.cols }
    pub fn as_slice(&self) -> &[f32] { &self.data }
    pub fn as_mut_slice(&mut self) -> &mut [f32] { &mut self.data }

    /// `out += self[:, col]`; out-of-range columns add nothing.
    #[inline]
    pub fn add_column_into(&self, col: usize, out: &mut [f32]) {
        assert_eq!(out.len(), self.rows);
        if col >= self.cols { return; }
        for (i, o) in out.iter_mut().enumerate() { *o += self.data[i * self.cols + col]; }
    }

    /// `self[:, col] += v`; out-of-range columns are ignored.
    #[inline]
    pub fn add_to_column(&mut self, col: usize, v: &[f32]) {
        assert_eq!(v.len(), self.rows);
        if col >= self.cols { return; }
        for (i, &x) in v.iter().enumerate() { self.data[i * self.cols + col] += x; }
    }
}

// ============================================================================
// MATRIX-VECTOR KERNELS (matrixmultiply sgemm with n = 1)
// ============================================================================

/// `out = w · v`
pub fn matvec_into(w: &Matrix, v: &[f32], out: &mut [f32]) {
    assert_eq!(v.len(), w.cols, "matvec [{},{}] · [{}]", w.rows, w.cols, v.len());
    assert_eq!(out.len(), w.rows);
    unsafe {
        matrixmultiply::sgemm(
            w.rows, w.cols, 1,
            1.0,
            w.data.as_ptr(), w.cols as isize, 1,
            v.as_ptr(), 1, 1,
            0.0,
            out.as_mut_ptr(), 1, 1,
        );
    }
}

pub fn matvec(w: &Matrix, v: &[f32]) -> Vec<f32> {
    let mut out = vec![0.0; w.rows];
    matvec_into(w, v, &mut out);
    out
}

/// `out = wᵀ · v`
pub fn matvec_t_into(w: &Matrix, v: &[f32], out: &mut [f32]) {
    assert_eq!(v.len(), w.rows, "matvecᵀ [{},{}]ᵀ · [{}]", w.rows, w.cols, v.len());
    assert_eq!(out.len(), w.cols);
    unsafe {
        matrixmultiply::sgemm(
            w.cols, w.rows, 1,
            1.0,
            w.data.as_ptr(), 1, w.cols as isize,  // wᵀ: swapped strides
            v.as_ptr(), 1, 1,
            0.0,
            out.as_mut_ptr(), 1, 1,
        );
    }
}

/// `w += u ⊗ v`
pub fn add_outer(w: &mut Matrix, u: &[f32], v: &[f32]) {
    assert_eq!(u.len(), w.rows);
    assert_eq!(v.len(), w.cols);
    unsafe {
        matrixmultiply::sgemm(
            w.rows, 1, w.cols,
            1.0,
            u.as_ptr(), 1, 1,
            v.as_ptr(), w.cols as isize, 1,
            1.0,
            w.data.as_mut_ptr(), w.cols as isize, 1,
        );
    }
}

// ============================================================================
// VECTOR OPERATIONS
// ============================================================================

#[inline]
pub fn vec_add(a: &[f32], b: &[f32]) -> Vec<f32> {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x + y).collect()
}

#[inline]
pub fn vec_add_inplace(a: &mut [f32], b: &[f32]) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter_mut().zip(b.iter()) { *x += y; }
}

#[inline]
pub fn vec_tanh(a: &[f32]) -> Vec<f32> {
    a.iter().map(|&x| x.tanh()).collect()
}

#[inline]
pub fn vec_tanh_inplace(a: &mut [f32]) {
    for x in a.iter_mut() { *x = x.tanh(); }
}

#[inline]
pub fn vec_max(a: &[f32]) -> f32 {
    a.iter().cloned().fold(f32::NEG_INFINITY, f32::max)
}

/// Unit vector at `idx`; all zeros when `idx >= len`.
pub fn one_hot(idx: usize, len: usize) -> Vec<f32> {
    let mut v = vec![0.0; len];
    if idx < len { v[idx] = 1.0; }
    v
}

#[inline]
pub fn clip_inplace(a: &mut [f32], bound: f32) {
    for x in a.iter_mut() { *x = x.clamp(-bound, bound); }
}

/// Max-shifted softmax of `logits / max(temperature, 0.1)`.
pub fn softmax_into(logits: &[f32], temperature: f32, out: &mut [f32]) {
    assert_eq!(logits.len(), out.len());
    let t = temperature.max(MIN_TEMPERATURE);
    let mx = vec_max(logits);
    let mut sum = 0.0f32;
    for (o, &l) in out.iter_mut().zip(logits.iter()) {
        *o = ((l - mx) / t).exp();
        sum += *o;
    }
    if !(sum > 0.0) { sum = 1.0; }
    for o in out.iter_mut() { *o /= sum; }
}

pub fn softmax(logits: &[f32], temperature: f32) -> Vec<f32> {
    let mut out = vec![0.0; logits.len()];
    softmax_into(logits, temperature, &mut out);
    out
}
