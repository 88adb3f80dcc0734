use std::collections::BTreeSet;
use std::sync::OnceLock;

use log::debug;
use nalgebra::{Matrix4, Vector3, Vector6};
use thiserror::Error;

use crate::kinematics::{PositionJacobian, SymbolicPose};
use crate::symbolic::{lift, Expr, Symbol};

/// Malformed chain geometry.
#[derive(Debug, Error, PartialEq)]
pub enum ChainError {
    #[error("got {axes} axes, {anchors} anchors and {joint_symbols} joint symbols")]
    CountMismatch {
        axes: usize,
        anchors: usize,
        joint_symbols: usize,
    },
    #[error("a chain needs at least one joint")]
    NoJoints,
    #[error("joint {joint} has a zero-length axis")]
    ZeroAxis { joint: usize },
    #[error("home configuration must end with the row [0 0 0 1]")]
    InvalidHome,
    #[error("symbol `{0}` is declared more than once")]
    DuplicateSymbol(Symbol),
    #[error("geometry references `{0}`, which is not a link symbol")]
    UnknownSymbol(Symbol),
}

/// A revolute joint at the home configuration: rotation axis and a point on it,
/// both in the base frame.
#[derive(Debug, Clone, PartialEq)]
pub struct JointSpec {
    pub axis: Vector3<f64>,
    pub anchor: Vector3<Expr>,
}

impl JointSpec {
    pub fn new(axis: Vector3<f64>, anchor: Vector3<Expr>) -> Self {
        Self { axis, anchor }
    }

    /// A joint whose anchor has no link parameters.
    pub fn fixed_anchor(axis: Vector3<f64>, anchor: Vector3<f64>) -> Self {
        Self::new(axis, lift(&anchor))
    }
}

/// Space-frame screw axis `[ω; v]` with `v = -ω × q`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrewAxis(Vector6<Expr>);

impl ScrewAxis {
    /// Expects `joint.axis` to be unit length.
    pub fn from_joint(joint: &JointSpec) -> Self {
        let omega = lift(&joint.axis);
        // -ω × q == q × ω
        let v = joint.anchor.cross(&omega);
        Self(Vector6::new(
            omega[0].clone(),
            omega[1].clone(),
            omega[2].clone(),
            v[0].clone(),
            v[1].clone(),
            v[2].clone(),
        ))
    }

    pub fn angular(&self) -> Vector3<Expr> {
        Vector3::new(self.0[0].clone(), self.0[1].clone(), self.0[2].clone())
    }

    pub fn linear(&self) -> Vector3<Expr> {
        Vector3::new(self.0[3].clone(), self.0[4].clone(), self.0[5].clone())
    }

    pub fn as_vector(&self) -> &Vector6<Expr> {
        &self.0
    }
}

pub fn derive_screw_axes(joints: &[JointSpec]) -> Vec<ScrewAxis> {
    joints.iter().map(ScrewAxis::from_joint).collect()
}

/// End-effector pose with every joint variable at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct HomeConfiguration(Matrix4<Expr>);

impl HomeConfiguration {
    pub fn new(matrix: Matrix4<Expr>) -> Result<Self, ChainError> {
        let bottom = [0.0, 0.0, 0.0, 1.0];
        let homogeneous = (0..4).all(|c| matrix[(3, c)].as_constant() == Some(bottom[c]));
        if !homogeneous {
            return Err(ChainError::InvalidHome);
        }
        Ok(Self(matrix))
    }

    /// Pure translation, identity orientation.
    pub fn from_translation(translation: Vector3<Expr>) -> Self {
        let mut matrix = Matrix4::<Expr>::identity();
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
        Self(matrix)
    }

    pub fn matrix(&self) -> &Matrix4<Expr> {
        &self.0
    }
}

/// Serial chain in PoE form: one screw axis per joint, ordered base to tip.
///
/// The geometry is fixed at construction. The symbolic pose and position
/// Jacobian are composed on first use and cached here.
#[derive(Debug, Clone)]
pub struct KinematicChain {
    joints: Vec<JointSpec>,
    screws: Vec<ScrewAxis>,
    home: HomeConfiguration,
    joint_symbols: Vec<Symbol>,
    link_symbols: Vec<Symbol>,
    pub(crate) symbolic_pose: OnceLock<SymbolicPose>,
    pub(crate) position_jacobian: OnceLock<PositionJacobian>,
}

impl KinematicChain {
    pub fn new(
        joints: Vec<JointSpec>,
        home: HomeConfiguration,
        joint_symbols: Vec<Symbol>,
        link_symbols: Vec<Symbol>,
    ) -> Result<Self, ChainError> {
        if joints.len() != joint_symbols.len() {
            return Err(ChainError::CountMismatch {
                axes: joints.len(),
                anchors: joints.len(),
                joint_symbols: joint_symbols.len(),
            });
        }
        if joints.is_empty() {
            return Err(ChainError::NoJoints);
        }

        let mut declared = BTreeSet::new();
        for symbol in joint_symbols.iter().chain(link_symbols.iter()) {
            if !declared.insert(symbol.clone()) {
                return Err(ChainError::DuplicateSymbol(symbol.clone()));
            }
        }

        let links: BTreeSet<_> = link_symbols.iter().cloned().collect();
        let referenced = joints
            .iter()
            .flat_map(|joint| joint.anchor.iter())
            .chain(home.matrix().iter())
            .flat_map(|e| e.symbols());
        for symbol in referenced {
            if !links.contains(&symbol) {
                return Err(ChainError::UnknownSymbol(symbol));
            }
        }

        let joints = joints
            .into_iter()
            .enumerate()
            .map(|(i, joint)| {
                let norm = joint.axis.norm();
                if norm <= f64::EPSILON {
                    return Err(ChainError::ZeroAxis { joint: i });
                }
                Ok(JointSpec::new(joint.axis / norm, joint.anchor))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let screws = derive_screw_axes(&joints);
        debug!(
            "derived {} screw axes over link symbols {:?}",
            screws.len(),
            link_symbols
        );

        Ok(Self {
            joints,
            screws,
            home,
            joint_symbols,
            link_symbols,
            symbolic_pose: OnceLock::new(),
            position_jacobian: OnceLock::new(),
        })
    }

    /// Builds the chain from parallel axis and anchor lists.
    pub fn from_parts(
        axes: Vec<Vector3<f64>>,
        anchors: Vec<Vector3<Expr>>,
        home: HomeConfiguration,
        joint_symbols: Vec<Symbol>,
        link_symbols: Vec<Symbol>,
    ) -> Result<Self, ChainError> {
        if axes.len() != anchors.len() || axes.len() != joint_symbols.len() {
            return Err(ChainError::CountMismatch {
                axes: axes.len(),
                anchors: anchors.len(),
                joint_symbols: joint_symbols.len(),
            });
        }
        let joints = axes
            .into_iter()
            .zip(anchors)
            .map(|(axis, anchor)| JointSpec::new(axis, anchor))
            .collect();
        Self::new(joints, home, joint_symbols, link_symbols)
    }

    /// Number of joints.
    pub fn dof(&self) -> usize {
        self.screws.len()
    }

    pub fn joints(&self) -> &[JointSpec] {
        &self.joints
    }

    pub fn screws(&self) -> &[ScrewAxis] {
        &self.screws
    }

    pub fn home(&self) -> &HomeConfiguration {
        &self.home
    }

    pub fn joint_symbols(&self) -> &[Symbol] {
        &self.joint_symbols
    }

    pub fn link_symbols(&self) -> &[Symbol] {
        &self.link_symbols
    }
}
