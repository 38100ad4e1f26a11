use ndarray::ArrayViewMut2;

/// A permutation of column indices in the order they were selected
pub type Pivot = Vec<usize>;

/// Inverse permutation: `invert_pivot(p)[p[i]] == i`
pub fn invert_pivot(pivot: &[usize]) -> Pivot {
    let mut inverse = vec![0; pivot.len()];
    for (i, &p) in pivot.iter().enumerate() {
        inverse[p] = i;
    }
    inverse
}

/// Gather rows so that row `i` of the result is row `order[i]` of the
/// input. Applying a pivot's inverse restores original sample order
/// after a pivoted triangularization.
pub fn apply_row_order(mut a: ArrayViewMut2<'_, f64>, order: &[usize]) {
    debug_assert_eq!(a.nrows(), order.len());
    let cols = a.ncols();
    let mut gathered = Vec::with_capacity(order.len() * cols);
    for &src in order {
        gathered.extend(a.row(src).iter());
    }
    for (dst, value) in a.iter_mut().zip(gathered) {
        *dst = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn invert_pivot_round_trips() {
        let pivot = vec![2, 0, 3, 1];
        assert_eq!(invert_pivot(&invert_pivot(&pivot)), pivot);
        let inverse = invert_pivot(&pivot);
        for (i, &p) in pivot.iter().enumerate() {
            assert_eq!(inverse[p], i);
        }
    }

    #[test]
    fn gather_then_inverse_gather_is_identity() {
        let original = arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let pivot = vec![2, 0, 1];

        let mut a = original.clone();
        apply_row_order(a.view_mut(), &pivot);
        assert_eq!(a.row(0).to_vec(), vec![5.0, 6.0]);

        apply_row_order(a.view_mut(), &invert_pivot(&pivot));
        assert_eq!(a, original);
    }
}
