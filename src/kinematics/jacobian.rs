use log::debug;
use nalgebra::{DMatrix, Vector3};

use super::{bindings, compute_symbolic_pose, FkError};
use crate::symbolic::{Bindings, Expr, Symbol};
use crate::KinematicChain;

/// Numeric Jacobian at one configuration: task-space rows, one column per joint.
pub type JacobianEstimate = DMatrix<f64>;

/// A position coordinate of the end effector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coordinate {
    X,
    Y,
    Z,
}

impl Coordinate {
    pub const ALL: [Coordinate; 3] = [Coordinate::X, Coordinate::Y, Coordinate::Z];

    pub fn index(self) -> usize {
        match self {
            Coordinate::X => 0,
            Coordinate::Y => 1,
            Coordinate::Z => 2,
        }
    }
}

/// `∂p/∂q_i` of the end-effector position, one symbolic column per joint.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionJacobian {
    columns: Vec<Vector3<Expr>>,
}

impl PositionJacobian {
    pub fn column(&self, joint: usize) -> Option<&Vector3<Expr>> {
        self.columns.get(joint)
    }

    pub fn dof(&self) -> usize {
        self.columns.len()
    }

    /// Evaluates one row per coordinate in `rows`, in that order.
    pub fn evaluate(
        &self,
        bindings: &Bindings,
        rows: &[Coordinate],
    ) -> Result<JacobianEstimate, Symbol> {
        let mut val = DMatrix::zeros(rows.len(), self.columns.len());
        for (c, column) in self.columns.iter().enumerate() {
            for (r, row) in rows.iter().enumerate() {
                val[(r, c)] = column[row.index()].eval(bindings)?;
            }
        }
        Ok(val)
    }
}

/// Differentiates the cached symbolic pose; the result is cached as well.
pub fn position_jacobian(chain: &KinematicChain) -> &PositionJacobian {
    chain.position_jacobian.get_or_init(|| {
        let position = compute_symbolic_pose(chain).position();
        let columns = chain
            .joint_symbols()
            .iter()
            .map(|q| position.map(|e| e.derivative(q).simplify()))
            .collect();
        debug!("differentiated position for {} joints", chain.dof());
        PositionJacobian { columns }
    })
}

/// The full 3 x N position Jacobian at `joints`.
pub fn evaluate_jacobian(
    chain: &KinematicChain,
    joints: &[f64],
    links: &[f64],
) -> Result<JacobianEstimate, FkError> {
    let bindings = bindings(chain, joints, links)?;
    position_jacobian(chain)
        .evaluate(&bindings, &Coordinate::ALL)
        .map_err(FkError::UnboundSymbol)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kinematics::evaluate_numeric_pose_chopped;
    use crate::reference::planar_2dof_chain;
    use approx::assert_relative_eq;

    #[test]
    fn test_jacobian_planar() {
        let chain = planar_2dof_chain().unwrap();
        let (q1, q2, l1, l2): (f64, f64, f64, f64) = (0.4, 1.1, 1.3, 0.7);
        let res = evaluate_jacobian(&chain, &[q1, q2], &[l1, l2]).unwrap();
        assert_eq!(res.shape(), (3, 2));
        // x = -L1 cos q1 - L2 cos(q1+q2), y = -L1 sin q1 - L2 sin(q1+q2)
        let s12 = (q1 + q2).sin();
        let c12 = (q1 + q2).cos();
        let expected = DMatrix::from_row_slice(
            3,
            2,
            &[
                l1 * q1.sin() + l2 * s12,
                l2 * s12,
                -l1 * q1.cos() - l2 * c12,
                -l2 * c12,
                0.,
                0.,
            ],
        );
        assert_relative_eq!(res, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_jacobian_finite_difference() {
        let chain = planar_2dof_chain().unwrap();
        let joints = [-0.6, 2.1];
        let links = [0.9, 1.4];
        let res = evaluate_jacobian(&chain, &joints, &links).unwrap();
        let h = 1e-6;
        for j in 0..2 {
            let mut plus = joints;
            let mut minus = joints;
            plus[j] += h;
            minus[j] -= h;
            let p = evaluate_numeric_pose_chopped(&chain, &plus, &links, 0.).unwrap().position();
            let m = evaluate_numeric_pose_chopped(&chain, &minus, &links, 0.).unwrap().position();
            let column = (p - m) / (2. * h);
            for r in 0..3 {
                assert_relative_eq!(res[(r, j)], column[r], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_jacobian_cached() {
        let chain = planar_2dof_chain().unwrap();
        let first = position_jacobian(&chain);
        let second = position_jacobian(&chain);
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.dof(), 2);
        assert!(first.column(2).is_none());
    }

    #[test]
    fn test_jacobian_rows() {
        let chain = planar_2dof_chain().unwrap();
        let values = bindings(&chain, &[0.4, 1.1], &[1.3, 0.7]).unwrap();
        let jacobian = position_jacobian(&chain);
        let full = jacobian.evaluate(&values, &Coordinate::ALL).unwrap();

        let z = jacobian.evaluate(&values, &[Coordinate::Z]).unwrap();
        assert_eq!(z.shape(), (1, 2));
        assert!(z.iter().all(|v| *v == 0.));

        let yx = jacobian
            .evaluate(&values, &[Coordinate::Y, Coordinate::X])
            .unwrap();
        assert_eq!(yx.row(0), full.row(1));
        assert_eq!(yx.row(1), full.row(0));
    }

    #[test]
    fn test_jacobian_arity() {
        let chain = planar_2dof_chain().unwrap();
        assert!(matches!(
            evaluate_jacobian(&chain, &[0.1, 0.2], &[1.]),
            Err(FkError::ArityMismatch { .. })
        ));
    }
}
