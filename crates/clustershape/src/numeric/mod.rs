//! Numerical services used by the shape and helix code.
//!
//! Everything here is stateless: matrices in, decompositions or solutions
//! out. The callers never touch nalgebra decompositions directly, so a
//! different backend can be dropped in behind these functions.

pub mod lm;

use nalgebra::{Matrix2, Matrix3, Matrix4, SymmetricEigen, Vector2, Vector3, Vector4};

/// Eigen-decomposition of a symmetric 3×3 matrix, sorted by ascending
/// absolute eigenvalue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortedEigen3 {
    /// Eigenvalues, `|values[0]| <= |values[1]| <= |values[2]|`.
    pub values: [f64; 3],
    /// Unit eigenvectors as columns; column `i` belongs to `values[i]`.
    pub vectors: Matrix3<f64>,
}

/// Diagonalize a symmetric 3×3 matrix and sort the pairs by `|λ|` ascending.
pub fn symmetric_eigen_abs_ascending(m: &Matrix3<f64>) -> SortedEigen3 {
    let eig = SymmetricEigen::new(*m);

    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| {
        eig.eigenvalues[a]
            .abs()
            .total_cmp(&eig.eigenvalues[b].abs())
    });

    let mut values = [0.0; 3];
    let mut vectors = Matrix3::<f64>::zeros();
    for (dst, &src) in order.iter().enumerate() {
        values[dst] = eig.eigenvalues[src];
        let col: Vector3<f64> = eig.eigenvectors.column(src).into_owned();
        vectors.set_column(dst, &col);
    }
    SortedEigen3 { values, vectors }
}

/// Solve `a · x = b` for a 2×2 system. `None` when singular.
pub fn solve_2x2(a: &Matrix2<f64>, b: &Vector2<f64>) -> Option<Vector2<f64>> {
    let x = a.lu().solve(b)?;
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Solve `a · x = b` for a 4×4 system. `None` when singular.
pub fn solve_4x4(a: &Matrix4<f64>, b: &Vector4<f64>) -> Option<Vector4<f64>> {
    let x = a.lu().solve(b)?;
    x.iter().all(|v| v.is_finite()).then_some(x)
}
