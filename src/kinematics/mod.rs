mod inverse;
mod jacobian;

use std::fmt;

use approx::{AbsDiffEq, RelativeEq};
use log::debug;
use nalgebra::{Matrix3, Matrix4, Vector3};
use thiserror::Error;

use crate::symbolic::{evaluate_matrix, simplify_matrix, Bindings, Expr, Symbol};
use crate::twist::{exp_twist, twist_matrix};
use crate::KinematicChain;

pub use inverse::{solve_ik, IkError, IkSolution, IkSolveParam, IkSolver, IkState, IkTarget};
pub use jacobian::{
    evaluate_jacobian, position_jacobian, Coordinate, JacobianEstimate, PositionJacobian,
};

/// Entries of a numeric pose smaller than this are set to zero.
pub const CHOP_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Joint,
    Link,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Joint => f.write_str("joint"),
            ValueKind::Link => f.write_str("link"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FkError {
    #[error("expected {expected} {kind} values, got {found}")]
    ArityMismatch {
        kind: ValueKind,
        expected: usize,
        found: usize,
    },
    /// The pose mentions a symbol with no value. Chains from
    /// [`KinematicChain::new`] only mention declared symbols and [`bindings`]
    /// binds all of them, so this does not occur for them.
    #[error("no value bound to `{0}`")]
    UnboundSymbol(Symbol),
}

/// Simplified end-effector pose as a function of joint and link symbols.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolicPose(Matrix4<Expr>);

impl SymbolicPose {
    pub fn matrix(&self) -> &Matrix4<Expr> {
        &self.0
    }

    pub fn position(&self) -> Vector3<Expr> {
        self.0.fixed_view::<3, 1>(0, 3).into_owned()
    }

    pub fn rotation(&self) -> Matrix3<Expr> {
        self.0.fixed_view::<3, 3>(0, 0).into_owned()
    }
}

impl fmt::Display for SymbolicPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in 0..4 {
            let row: Vec<String> = (0..4).map(|c| self.0[(r, c)].to_string()).collect();
            writeln!(f, "[{}]", row.join(", "))?;
        }
        Ok(())
    }
}

/// A pose with every symbol substituted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericPose(Matrix4<f64>);

impl NumericPose {
    pub fn as_matrix(&self) -> &Matrix4<f64> {
        &self.0
    }

    pub fn into_inner(self) -> Matrix4<f64> {
        self.0
    }

    pub fn position(&self) -> Vector3<f64> {
        self.0.fixed_view::<3, 1>(0, 3).into_owned()
    }

    pub fn rotation(&self) -> Matrix3<f64> {
        self.0.fixed_view::<3, 3>(0, 0).into_owned()
    }
}

impl fmt::Display for NumericPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AbsDiffEq for NumericPose {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.0.abs_diff_eq(&other.0, epsilon)
    }
}

impl RelativeEq for NumericPose {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f64, max_relative: f64) -> bool {
        self.0.relative_eq(&other.0, epsilon, max_relative)
    }
}

/// Composes `exp([S_1] q_1) · ... · exp([S_n] q_n) · M` once per chain.
///
/// Joints are applied base to tip. The result is simplified and cached on the
/// chain; later calls return the cached pose.
pub fn compute_symbolic_pose(chain: &KinematicChain) -> &SymbolicPose {
    chain.symbolic_pose.get_or_init(|| {
        let mut pose = Matrix4::<Expr>::identity();
        for (screw, q) in chain.screws().iter().zip(chain.joint_symbols()) {
            pose *= exp_twist(&twist_matrix(screw), q);
            pose = simplify_matrix(&pose);
        }
        pose *= chain.home().matrix().clone();
        let pose = simplify_matrix(&pose);
        debug!(
            "composed symbolic pose for {} joints ({} terms)",
            chain.dof(),
            pose.iter().map(Expr::term_count).sum::<usize>()
        );
        SymbolicPose(pose)
    })
}

/// Maps joint symbols to `joints` and link symbols to `links`, in order.
pub fn bindings(
    chain: &KinematicChain,
    joints: &[f64],
    links: &[f64],
) -> Result<Bindings, FkError> {
    check_arity(ValueKind::Joint, chain.joint_symbols(), joints)?;
    check_arity(ValueKind::Link, chain.link_symbols(), links)?;
    Ok(chain
        .joint_symbols()
        .iter()
        .cloned()
        .zip(joints.iter().copied())
        .chain(
            chain
                .link_symbols()
                .iter()
                .cloned()
                .zip(links.iter().copied()),
        )
        .collect())
}

fn check_arity(kind: ValueKind, symbols: &[Symbol], values: &[f64]) -> Result<(), FkError> {
    if symbols.len() != values.len() {
        return Err(FkError::ArityMismatch {
            kind,
            expected: symbols.len(),
            found: values.len(),
        });
    }
    Ok(())
}

/// Numeric forward kinematics, chopped at [`CHOP_TOLERANCE`].
pub fn evaluate_numeric_pose(
    chain: &KinematicChain,
    joints: &[f64],
    links: &[f64],
) -> Result<NumericPose, FkError> {
    evaluate_numeric_pose_chopped(chain, joints, links, CHOP_TOLERANCE)
}

pub fn evaluate_numeric_pose_chopped(
    chain: &KinematicChain,
    joints: &[f64],
    links: &[f64],
    chop: f64,
) -> Result<NumericPose, FkError> {
    let bindings = bindings(chain, joints, links)?;
    let pose = compute_symbolic_pose(chain);
    let mut numeric = evaluate_matrix(pose.matrix(), &bindings).map_err(FkError::UnboundSymbol)?;
    numeric
        .iter_mut()
        .filter(|v| v.abs() < chop)
        .for_each(|v| *v = 0.0);
    Ok(NumericPose(numeric))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reference::{planar_2dof_chain, planar_2dof_pose};
    use crate::{HomeConfiguration, JointSpec};
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use core::f64::consts::FRAC_PI_2;
    use nalgebra::{Isometry3, Vector3};
    use num_traits::Zero;

    fn link(name: &str) -> Expr {
        Expr::symbol(&Symbol::new(name))
    }

    /// Yaw joint at the base, then two pitch joints stacked along z.
    fn spatial_3dof_chain() -> KinematicChain {
        let (l1, l2, l3) = (link("L1"), link("L2"), link("L3"));
        let joints = vec![
            JointSpec::fixed_anchor(Vector3::z(), Vector3::zeros()),
            JointSpec::new(
                Vector3::y(),
                Vector3::new(Expr::zero(), Expr::zero(), l1.clone()),
            ),
            JointSpec::new(
                Vector3::y(),
                Vector3::new(Expr::zero(), Expr::zero(), l1.clone() + l2.clone()),
            ),
        ];
        let home =
            HomeConfiguration::from_translation(Vector3::new(Expr::zero(), Expr::zero(), l1 + l2 + l3));
        KinematicChain::new(
            joints,
            home,
            vec!["q1".into(), "q2".into(), "q3".into()],
            vec!["L1".into(), "L2".into(), "L3".into()],
        )
        .unwrap()
    }

    fn spatial_3dof_expected(q: [f64; 3], l: [f64; 3]) -> Matrix4<f64> {
        let pose = Isometry3::rotation(Vector3::z() * q[0])
            * Isometry3::translation(0., 0., l[0])
            * Isometry3::rotation(Vector3::y() * q[1])
            * Isometry3::translation(0., 0., l[1])
            * Isometry3::rotation(Vector3::y() * q[2])
            * Isometry3::translation(0., 0., l[2]);
        pose.to_homogeneous()
    }

    #[test]
    fn test_fk_home() {
        let chain = planar_2dof_chain().unwrap();
        let links = [1.5, 0.75];
        let res = evaluate_numeric_pose(&chain, &[0., 0.], &links).unwrap();
        let values = bindings(&chain, &[0., 0.], &links).unwrap();
        let home = evaluate_matrix(chain.home().matrix(), &values).unwrap();
        assert_abs_diff_eq!(*res.as_matrix(), home, epsilon = 1e-12);
        assert_relative_eq!(res.position(), Vector3::new(-2.25, 0., 0.));

        let chain = spatial_3dof_chain();
        let links = [0.5, 0.4, 0.3];
        let res = evaluate_numeric_pose(&chain, &[0., 0., 0.], &links).unwrap();
        let values = bindings(&chain, &[0., 0., 0.], &links).unwrap();
        let home = evaluate_matrix(chain.home().matrix(), &values).unwrap();
        assert_abs_diff_eq!(*res.as_matrix(), home, epsilon = 1e-12);
    }

    #[test]
    fn test_fk_planar() {
        let chain = planar_2dof_chain().unwrap();
        let res = evaluate_numeric_pose(&chain, &[FRAC_PI_2, 0.], &[1., 1.]).unwrap();
        assert_abs_diff_eq!(res.position(), Vector3::new(0., -2., 0.), epsilon = 1e-12);
        let res = evaluate_numeric_pose(&chain, &[0., FRAC_PI_2], &[1., 1.]).unwrap();
        assert_abs_diff_eq!(res.position(), Vector3::new(-1., -1., 0.), epsilon = 1e-12);
    }

    #[test]
    fn test_fk_matches_closed_form() {
        let chain = planar_2dof_chain().unwrap();
        let samples = [
            (1.57, 1.57, 1.0, 1.0),
            (0.0, 0.0, 1.0, 1.0),
            (0.3, -0.8, 0.5, 1.2),
            (-1.1, 2.4, 2.0, 0.3),
            (3.0, 3.0, 1.0, 2.0),
            (-2.7, 0.1, 0.25, 0.25),
            (0.9, 0.9, 10.0, 5.0),
            (1.2, -1.2, 0.8, 0.8),
            (-0.4, -2.9, 1.7, 0.6),
            (2.2, 0.6, 0.05, 3.5),
            (-3.1, 1.9, 1.0, 0.01),
        ];
        for (q1, q2, l1, l2) in samples {
            let res = evaluate_numeric_pose(&chain, &[q1, q2], &[l1, l2]).unwrap();
            let (x, y) = planar_2dof_pose((q1, q2), (l1, l2));
            assert_abs_diff_eq!(res.position()[0], x, epsilon = 1e-6);
            assert_abs_diff_eq!(res.position()[1], y, epsilon = 1e-6);
            assert_abs_diff_eq!(res.position()[2], 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_fk_spatial() {
        let chain = spatial_3dof_chain();
        let links = [0.5, 0.4, 0.3];
        for q in [[0.3, 0.5, 0.7], [-1.2, 2.0, -0.4], [2.8, -0.9, 1.6]] {
            let res = evaluate_numeric_pose(&chain, &q, &links).unwrap();
            assert_relative_eq!(
                *res.as_matrix(),
                spatial_3dof_expected(q, links),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_symbolic_pose_simplified() {
        let chain = planar_2dof_chain().unwrap();
        let pose = compute_symbolic_pose(&chain);
        assert_eq!(pose.matrix()[(0, 0)].to_string(), "cos(q1 + q2)");
        assert_eq!(pose.matrix()[(1, 0)].to_string(), "sin(q1 + q2)");
        assert_eq!(pose.matrix()[(0, 3)].to_string(), "-L1*cos(q1) - L2*cos(q1 + q2)");
        assert_eq!(pose.matrix()[(1, 3)].to_string(), "-L1*sin(q1) - L2*sin(q1 + q2)");
        assert!(pose.position()[2].is_zero());
        println!("{pose}");
    }

    #[test]
    fn test_symbolic_pose_cached() {
        let chain = spatial_3dof_chain();
        let first = compute_symbolic_pose(&chain);
        let second = compute_symbolic_pose(&chain);
        assert!(std::ptr::eq(first, second));
        assert_eq!(first, second);
    }

    #[test]
    fn test_composition_order() {
        let chain = planar_2dof_chain().unwrap();
        let swapped = KinematicChain::new(
            chain.joints().iter().rev().cloned().collect(),
            chain.home().clone(),
            chain.joint_symbols().to_vec(),
            chain.link_symbols().to_vec(),
        )
        .unwrap();
        let joints = [0.3, 0.7];
        let links = [1., 1.];
        let res = evaluate_numeric_pose(&chain, &joints, &links).unwrap();
        let res_swapped = evaluate_numeric_pose(&swapped, &joints, &links).unwrap();
        assert!((res.position() - res_swapped.position()).norm() > 1e-3);
    }

    #[test]
    fn test_arity_mismatch() {
        let chain = planar_2dof_chain().unwrap();
        assert_eq!(
            evaluate_numeric_pose(&chain, &[0.1], &[1., 1.]),
            Err(FkError::ArityMismatch {
                kind: ValueKind::Joint,
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            evaluate_numeric_pose(&chain, &[0.1, 0.2, 0.3], &[1., 1.]),
            Err(FkError::ArityMismatch {
                kind: ValueKind::Joint,
                expected: 2,
                found: 3
            })
        );
        assert_eq!(
            evaluate_numeric_pose(&chain, &[0.1, 0.2], &[1.]),
            Err(FkError::ArityMismatch {
                kind: ValueKind::Link,
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_chop() {
        let chain = planar_2dof_chain().unwrap();
        let res = evaluate_numeric_pose(&chain, &[FRAC_PI_2, 0.], &[1., 1.]).unwrap();
        // cos(π/2) is ~6e-17 before chopping
        assert_eq!(res.as_matrix()[(0, 0)], 0.0);
        assert_eq!(res.position()[0], 0.0);
        let raw = evaluate_numeric_pose_chopped(&chain, &[FRAC_PI_2, 0.], &[1., 1.], 0.0).unwrap();
        assert!(raw.as_matrix()[(0, 0)] != 0.0);
    }
}
