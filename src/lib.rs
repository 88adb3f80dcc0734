//! # symkin is a library for symbolic kinematics of serial chains.
//! symkin = symbolic + kinematics
//!
//! A [`KinematicChain`] holds revolute screw axes and a home configuration
//! whose geometry may depend on link-length symbols. Forward kinematics is
//! composed once as a product of exponentials, simplified and cached on the
//! chain, then evaluated for concrete joint and link values. Inverse
//! kinematics runs a Newton iteration on the position using the symbolic
//! Jacobian.

#![deny(unsafe_code)]

pub mod config;
mod geometry;
mod kinematics;
pub mod reference;
pub mod symbolic;
pub mod twist;

pub use geometry::{
    derive_screw_axes, ChainError, HomeConfiguration, JointSpec, KinematicChain, ScrewAxis,
};
pub use kinematics::{
    bindings, compute_symbolic_pose, evaluate_jacobian, evaluate_numeric_pose,
    evaluate_numeric_pose_chopped, position_jacobian, solve_ik, Coordinate, FkError, IkError, IkSolution,
    IkSolveParam, IkSolver, IkState, IkTarget, JacobianEstimate, NumericPose, PositionJacobian,
    SymbolicPose, ValueKind, CHOP_TOLERANCE,
};
