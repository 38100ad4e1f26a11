use ndarray::ArrayViewMut2;

use super::pivot::Pivot;

/// In-place Householder QR with greedy column pivoting.
///
/// On return the first `min(rows, cols)` rows hold the (upper
/// trapezoidal) factor R with all entries below the main diagonal
/// zeroed, and `pivot[k]` is the original index of the column standing
/// at position `k`. Columns are selected by largest residual norm, ties
/// to the lower index, so `|R[k,k]|` is non-increasing. Rows past the
/// factor are zeroed by the eliminations and carry no information.
pub fn triangularize(mut a: ArrayViewMut2<'_, f64>) -> Pivot {
    let (rows, cols) = a.dim();
    let steps = rows.min(cols);

    let mut pivot: Pivot = (0..cols).collect();
    // Householder vector for the current column
    let mut reflector = vec![0.0; rows];

    for k in 0..steps {
        // Select the column with the largest residual norm below row k.
        let mut best = k;
        let mut best_norm_sq = residual_norm_sq(&a, k, k);
        for j in k + 1..cols {
            let norm_sq = residual_norm_sq(&a, j, k);
            if norm_sq > best_norm_sq {
                best = j;
                best_norm_sq = norm_sq;
            }
        }
        if best != k {
            for i in 0..rows {
                a.swap([i, k], [i, best]);
            }
            pivot.swap(k, best);
        }

        let norm = residual_norm_sq(&a, k, k).sqrt();
        if norm == 0.0 {
            // Residual column is exactly zero; R[k,k] stays zero.
            continue;
        }

        // Reflect so that the column collapses onto alpha * e_k.
        let alpha = if a[[k, k]] >= 0.0 { -norm } else { norm };
        for i in k..rows {
            reflector[i] = a[[i, k]];
        }
        reflector[k] -= alpha;
        let vtv: f64 = reflector[k..rows].iter().map(|v| v * v).sum();
        if vtv > 0.0 {
            for j in k + 1..cols {
                let w: f64 = (k..rows).map(|i| reflector[i] * a[[i, j]]).sum();
                let factor = 2.0 * w / vtv;
                for i in k..rows {
                    a[[i, j]] -= factor * reflector[i];
                }
            }
        }
        a[[k, k]] = alpha;
        for i in k + 1..rows {
            a[[i, k]] = 0.0;
        }
    }

    pivot
}

fn residual_norm_sq(a: &ArrayViewMut2<'_, f64>, col: usize, from_row: usize) -> f64 {
    (from_row..a.nrows())
        .map(|i| a[[i, col]] * a[[i, col]])
        .sum()
}
