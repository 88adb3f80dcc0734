//! Closed-form forward kinematics of one planar 2-link layout.
//!
//! Only valid for the chain built by [`planar_2dof_chain`]: both joints
//! rotate about `z`, joint 1 sits at the origin, joint 2 at `(-L1, 0, 0)` and
//! the tool at `(-(L1 + L2), 0, 0)` in the home configuration. The arm
//! therefore points along `-x` at zero, which gives
//!
//! ```text
//! x = -L1 cos q1 - L2 cos(q1 + q2)
//! y = -L1 sin q1 - L2 sin(q1 + q2)
//! ```

use nalgebra::Vector3;
use num_traits::Zero;

use crate::symbolic::{Expr, Symbol};
use crate::{ChainError, HomeConfiguration, JointSpec, KinematicChain};

/// End-effector `(x, y)` for `(q1, q2)` and `(L1, L2)`.
pub fn planar_2dof_pose(joints: (f64, f64), links: (f64, f64)) -> (f64, f64) {
    let (q1, q2) = joints;
    let (l1, l2) = links;
    let x = -l1 * q1.cos() - l2 * (q1 + q2).cos();
    let y = -l1 * q1.sin() - l2 * (q1 + q2).sin();
    (x, y)
}

/// The layout [`planar_2dof_pose`] encodes, with joint symbols `q1, q2` and
/// link symbols `L1, L2`.
pub fn planar_2dof_chain() -> Result<KinematicChain, ChainError> {
    let (q1, q2) = (Symbol::new("q1"), Symbol::new("q2"));
    let (l1, l2) = (Symbol::new("L1"), Symbol::new("L2"));
    let joints = vec![
        JointSpec::fixed_anchor(Vector3::z(), Vector3::zeros()),
        JointSpec::new(
            Vector3::z(),
            Vector3::new(-Expr::symbol(&l1), Expr::zero(), Expr::zero()),
        ),
    ];
    let home = HomeConfiguration::from_translation(Vector3::new(
        -(Expr::symbol(&l1) + Expr::symbol(&l2)),
        Expr::zero(),
        Expr::zero(),
    ));
    KinematicChain::new(joints, home, vec![q1, q2], vec![l1, l2])
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use core::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_planar_2dof_pose() {
        let (x, y) = planar_2dof_pose((0., 0.), (1., 2.));
        assert_relative_eq!(x, -3.);
        assert_relative_eq!(y, 0.);

        let (x, y) = planar_2dof_pose((FRAC_PI_2, 0.), (1., 2.));
        assert_relative_eq!(x, 0., epsilon = 1e-12);
        assert_relative_eq!(y, -3.);

        // folded back onto itself
        let (x, y) = planar_2dof_pose((0., PI), (1., 1.));
        assert_relative_eq!(x, 0., epsilon = 1e-12);
        assert_relative_eq!(y, 0., epsilon = 1e-12);

        let (x, y) = planar_2dof_pose((1.57, 1.57), (1., 1.));
        assert_relative_eq!(x, -(1.57f64).cos() - (3.14f64).cos());
        assert_relative_eq!(y, -(1.57f64).sin() - (3.14f64).sin());
    }

    #[test]
    fn test_planar_2dof_chain() {
        let chain = planar_2dof_chain().unwrap();
        assert_eq!(chain.dof(), 2);
        assert_eq!(chain.link_symbols(), &[Symbol::new("L1"), Symbol::new("L2")]);
    }
}
