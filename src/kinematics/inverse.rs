use log::{trace, warn};
use nalgebra::{DVector, Vector2, Vector3};
use serde::Deserialize;
use thiserror::Error;

use super::{bindings, evaluate_numeric_pose, position_jacobian, Coordinate, FkError};
use crate::KinematicChain;

#[derive(Debug, Error, PartialEq)]
pub enum IkError {
    #[error(transparent)]
    Fk(#[from] FkError),
    #[error("singular jacobian at iteration {iteration}, joints {joints:?}; try another initial guess")]
    SingularJacobian { iteration: usize, joints: Vec<f64> },
    #[error("no convergence after {iterations} iterations (residual {residual:e})")]
    NonConvergence {
        joints: Vec<f64>,
        iterations: usize,
        residual: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IkSolveParam {
    /// Largest accepted norm of the task-space error.
    pub tolerance: f64,
    pub max_iter: usize,
    /// Singular values at or below this make the Jacobian singular.
    pub pinv_eps: f64,
}

impl Default for IkSolveParam {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iter: 1000,
            pinv_eps: 1e-10,
        }
    }
}

/// Desired end-effector position.
#[derive(Debug, Clone, PartialEq)]
pub enum IkTarget {
    /// x, y and z.
    Position(Vector3<f64>),
    /// x and y only, for chains that move in the base xy-plane.
    Planar(Vector2<f64>),
}

impl IkTarget {
    fn rows(&self) -> &'static [Coordinate] {
        match self {
            IkTarget::Position(_) => &Coordinate::ALL,
            IkTarget::Planar(_) => &[Coordinate::X, Coordinate::Y],
        }
    }

    fn coordinates(&self) -> DVector<f64> {
        match self {
            IkTarget::Position(p) => DVector::from_column_slice(p.as_slice()),
            IkTarget::Planar(p) => DVector::from_column_slice(p.as_slice()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IkState {
    Iterating,
    Converged,
    MaxIterationsExceeded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IkSolution {
    pub joints: Vec<f64>,
    /// Newton updates applied before convergence.
    pub iterations: usize,
    pub residual: f64,
}

/// Newton iteration on the position: `q += pinv(J(q)) * (target - p(q))`.
pub struct IkSolver<'a> {
    chain: &'a KinematicChain,
    target: IkTarget,
    links: Vec<f64>,
    param: IkSolveParam,
    joints: Vec<f64>,
    iteration: usize,
    residual: f64,
    state: IkState,
}

impl<'a> IkSolver<'a> {
    pub fn new(
        chain: &'a KinematicChain,
        target: IkTarget,
        init_joints: &[f64],
        links: &[f64],
        param: IkSolveParam,
    ) -> Result<Self, IkError> {
        bindings(chain, init_joints, links)?;
        Ok(Self {
            chain,
            target,
            links: links.to_vec(),
            param,
            joints: init_joints.to_vec(),
            iteration: 0,
            residual: f64::INFINITY,
            state: IkState::Iterating,
        })
    }

    pub fn state(&self) -> IkState {
        self.state
    }

    pub fn joints(&self) -> &[f64] {
        &self.joints
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Norm of the last measured task-space error.
    pub fn residual(&self) -> f64 {
        self.residual
    }

    /// Checks the current guess and, while still iterating, applies one update.
    /// Terminal states are returned unchanged.
    pub fn step(&mut self) -> Result<IkState, IkError> {
        if self.state != IkState::Iterating {
            return Ok(self.state);
        }

        let rows = self.target.rows();
        let position = evaluate_numeric_pose(self.chain, &self.joints, &self.links)?.position();
        let current = DVector::from_iterator(rows.len(), rows.iter().map(|r| position[r.index()]));
        let error = self.target.coordinates() - current;
        self.residual = error.norm();
        trace!(
            "ik iteration {}: joints {:?}, residual {:e}",
            self.iteration,
            self.joints,
            self.residual
        );

        if self.residual <= self.param.tolerance {
            self.state = IkState::Converged;
            return Ok(self.state);
        }
        if self.iteration >= self.param.max_iter {
            warn!(
                "ik gave up after {} iterations, residual {:e}",
                self.iteration, self.residual
            );
            self.state = IkState::MaxIterationsExceeded;
            return Ok(self.state);
        }

        let bindings = bindings(self.chain, &self.joints, &self.links)?;
        let jacobian = position_jacobian(self.chain)
            .evaluate(&bindings, rows)
            .map_err(FkError::UnboundSymbol)?;
        let singular = jacobian
            .clone()
            .svd(false, false)
            .singular_values
            .iter()
            .any(|s| *s <= self.param.pinv_eps);
        let pinv = match jacobian.pseudo_inverse(self.param.pinv_eps) {
            Ok(pinv) if !singular => pinv,
            _ => {
                warn!("singular jacobian at joints {:?}", self.joints);
                return Err(IkError::SingularJacobian {
                    iteration: self.iteration,
                    joints: self.joints.clone(),
                });
            }
        };

        let update = pinv * error;
        for (j, u) in self.joints.iter_mut().zip(update.iter()) {
            *j += *u;
        }
        self.iteration += 1;
        Ok(self.state)
    }

    /// Steps until a terminal state; running out of iterations is an error.
    pub fn run(mut self) -> Result<IkSolution, IkError> {
        loop {
            match self.step()? {
                IkState::Iterating => {}
                IkState::Converged => {
                    return Ok(IkSolution {
                        joints: self.joints,
                        iterations: self.iteration,
                        residual: self.residual,
                    })
                }
                IkState::MaxIterationsExceeded => {
                    return Err(IkError::NonConvergence {
                        joints: self.joints,
                        iterations: self.iteration,
                        residual: self.residual,
                    })
                }
            }
        }
    }
}

pub fn solve_ik(
    chain: &KinematicChain,
    target: IkTarget,
    init_joints: &[f64],
    links: &[f64],
    param: IkSolveParam,
) -> Result<IkSolution, IkError> {
    IkSolver::new(chain, target, init_joints, links, param)?.run()
}
