//! External/internal index permutation for articulation dofs and links
//!
//! The solver numbers links and dofs by its own traversal. Users see them in
//! authoring order: links in the order they were created, each link's joint
//! dofs contiguous in link order. [`DofIndexMap`] holds both permutations and
//! their inverses and converts vectors and Jacobians between the two orders
//! with plain gathers.

use super::ArticulationError;
use crate::foundation::math::Matrix;

/// Bidirectional dof and link permutation of one articulation
///
/// Built once after the topology is final; never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofIndexMap {
    /// `e2i[e]` is the internal dof holding external dof `e`
    e2i: Vec<usize>,
    i2e: Vec<usize>,
    link_e2i: Vec<usize>,
    link_i2e: Vec<usize>,
}

impl DofIndexMap {
    /// Build the map from per-link data in authoring order.
    ///
    /// `link_dofs[l]` is the dof count of the joint moving link `l` and
    /// `link_internal[l]` its internal link index. Returns `None` if the
    /// slices differ in length or `link_internal` is not a permutation.
    pub fn new(link_dofs: &[usize], link_internal: &[usize]) -> Option<Self> {
        let link_count = link_dofs.len();
        if link_internal.len() != link_count {
            return None;
        }
        let mut link_i2e = vec![usize::MAX; link_count];
        for (external, &internal) in link_internal.iter().enumerate() {
            if internal >= link_count || link_i2e[internal] != usize::MAX {
                return None;
            }
            link_i2e[internal] = external;
        }

        // Internal dofs are laid out in internal link order
        let mut internal_start = vec![0; link_count];
        let mut offset = 0;
        for &external in &link_i2e {
            internal_start[external] = offset;
            offset += link_dofs[external];
        }

        let mut e2i = Vec::with_capacity(offset);
        for (link, &count) in link_dofs.iter().enumerate() {
            e2i.extend((0..count).map(|axis| internal_start[link] + axis));
        }
        let mut i2e = vec![0; e2i.len()];
        for (external, &internal) in e2i.iter().enumerate() {
            i2e[internal] = external;
        }

        Some(Self {
            e2i,
            i2e,
            link_e2i: link_internal.to_vec(),
            link_i2e,
        })
    }

    /// Identity map for `dof` dofs on `links` links
    pub fn identity(dof: usize, links: usize) -> Self {
        Self {
            e2i: (0..dof).collect(),
            i2e: (0..dof).collect(),
            link_e2i: (0..links).collect(),
            link_i2e: (0..links).collect(),
        }
    }

    /// Number of dofs
    pub fn dof(&self) -> usize {
        self.e2i.len()
    }

    /// Number of links
    pub fn link_count(&self) -> usize {
        self.link_e2i.len()
    }

    /// External to internal dof permutation
    pub fn external_to_internal(&self) -> &[usize] {
        &self.e2i
    }

    /// Internal to external dof permutation
    pub fn internal_to_external(&self) -> &[usize] {
        &self.i2e
    }

    /// External to internal link permutation
    pub fn link_external_to_internal(&self) -> &[usize] {
        &self.link_e2i
    }

    /// Internal to external link permutation
    pub fn link_internal_to_external(&self) -> &[usize] {
        &self.link_i2e
    }

    fn check(&self, len: usize) -> Result<(), ArticulationError> {
        if len == self.dof() {
            Ok(())
        } else {
            Err(ArticulationError::ShapeMismatch {
                expected: self.dof(),
                actual: len,
            })
        }
    }

    /// Reorder an external-order vector into internal order
    pub fn to_internal<T: Copy>(&self, external: &[T]) -> Result<Vec<T>, ArticulationError> {
        self.check(external.len())?;
        Ok(self.i2e.iter().map(|&e| external[e]).collect())
    }

    /// Reorder an internal-order vector into external order
    pub fn to_external<T: Copy>(&self, internal: &[T]) -> Result<Vec<T>, ArticulationError> {
        self.check(internal.len())?;
        Ok(self.e2i.iter().map(|&i| internal[i]).collect())
    }

    /// Permute a Jacobian from internal to external link and dof order.
    ///
    /// The input has 6 rows per link and `root_columns` leading columns
    /// (6 for a floating base, 0 for a fixed one) that are kept in place.
    pub fn jacobian_to_external(
        &self,
        internal: &Matrix,
        root_columns: usize,
    ) -> Result<Matrix, ArticulationError> {
        let rows = 6 * self.link_count();
        let cols = root_columns + self.dof();
        if internal.nrows() != rows || internal.ncols() != cols {
            return Err(ArticulationError::JacobianShape {
                expected: (rows, cols),
                actual: (internal.nrows(), internal.ncols()),
            });
        }
        let column_source = |c: usize| {
            if c < root_columns {
                c
            } else {
                root_columns + self.e2i[c - root_columns]
            }
        };
        Ok(Matrix::from_fn(rows, cols, |r, c| {
            let link = self.link_e2i[r / 6];
            internal[(6 * link + r % 6, column_source(c))]
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Three links authored root, a, b; solver order root, b, a
    fn swapped() -> DofIndexMap {
        DofIndexMap::new(&[0, 1, 2], &[0, 2, 1]).unwrap()
    }

    #[test]
    fn test_two_joint_swap() {
        let map = DofIndexMap::new(&[0, 1, 1], &[0, 2, 1]).unwrap();
        let internal = map.to_internal(&[1.5, -2.0]).unwrap();
        assert_eq!(internal, vec![-2.0, 1.5]);
        assert_eq!(map.to_external(&internal).unwrap(), vec![1.5, -2.0]);
    }

    #[test]
    fn test_multi_dof_joints_stay_contiguous() {
        let map = swapped();
        // internal: [b0, b1, a0]
        assert_eq!(map.external_to_internal(), &[2, 0, 1]);
        assert_eq!(map.internal_to_external(), &[1, 2, 0]);
        assert_eq!(map.to_internal(&['a', 'x', 'y']).unwrap(), vec!['x', 'y', 'a']);
    }

    #[test]
    fn test_round_trips_are_exact() {
        let map = swapped();
        let v = [0.1f32, -7.25, 3.0e-8];
        assert_eq!(map.to_external(&map.to_internal(&v).unwrap()).unwrap(), v);
        assert_eq!(map.to_internal(&map.to_external(&v).unwrap()).unwrap(), v);
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        let map = swapped();
        assert_eq!(
            map.to_internal(&[1.0, 2.0]),
            Err(ArticulationError::ShapeMismatch { expected: 3, actual: 2 })
        );
        assert!(map.to_external(&[0.0; 4]).is_err());
    }

    #[test]
    fn test_rejects_non_permutation() {
        assert!(DofIndexMap::new(&[0, 1], &[0, 0]).is_none());
        assert!(DofIndexMap::new(&[0, 1], &[0, 2]).is_none());
        assert!(DofIndexMap::new(&[0, 1], &[0]).is_none());
    }

    /// Dense permutation matrix `P` with `P * internal = external` for dof vectors
    fn dof_permutation(map: &DofIndexMap) -> Matrix {
        let n = map.dof();
        let mut p = Matrix::zeros(n, n);
        for (e, &i) in map.external_to_internal().iter().enumerate() {
            p[(e, i)] = 1.0;
        }
        p
    }

    fn link_row_permutation(map: &DofIndexMap) -> Matrix {
        let n = 6 * map.link_count();
        let mut p = Matrix::zeros(n, n);
        for (e, &i) in map.link_external_to_internal().iter().enumerate() {
            for r in 0..6 {
                p[(6 * e + r, 6 * i + r)] = 1.0;
            }
        }
        p
    }

    #[test]
    fn test_jacobian_gather_matches_permutation_matrices() {
        let map = swapped();
        for root_columns in [0, 6] {
            let rows = 6 * map.link_count();
            let cols = root_columns + map.dof();
            let internal = Matrix::from_fn(rows, cols, |r, c| (r * 100 + c) as f32);

            let mut column_p = Matrix::identity(cols, cols);
            let dof_p = dof_permutation(&map);
            column_p
                .view_mut((root_columns, root_columns), (map.dof(), map.dof()))
                .copy_from(&dof_p);
            let expected = link_row_permutation(&map) * &internal * column_p.transpose();

            let gathered = map.jacobian_to_external(&internal, root_columns).unwrap();
            assert_eq!(gathered, expected);
        }
    }

    #[test]
    fn test_jacobian_shape_is_checked() {
        let map = swapped();
        let wrong = Matrix::zeros(18, 4);
        assert!(matches!(
            map.jacobian_to_external(&wrong, 0),
            Err(ArticulationError::JacobianShape { .. })
        ));
    }
}
