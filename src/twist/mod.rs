//! se(3) helpers: skew matrices, twist matrices and their exponential.

use std::ops::Neg;

use nalgebra::{Matrix3, Matrix4, Scalar, Vector3};
use num_traits::{One, Zero};

use crate::geometry::ScrewAxis;
use crate::symbolic::{simplify_matrix, Angle, Expr, Symbol};

/// `skew(w) * x == w × x`
pub fn skew<T>(w: &Vector3<T>) -> Matrix3<T>
where
    T: Scalar + Zero + Neg<Output = T>,
{
    Matrix3::new(
        T::zero(),
        -w[2].clone(),
        w[1].clone(),
        w[2].clone(),
        T::zero(),
        -w[0].clone(),
        -w[1].clone(),
        w[0].clone(),
        T::zero(),
    )
}

/// `[[skew(ω), v], [0, 0, 0, 0]]`
pub fn twist_matrix(screw: &ScrewAxis) -> Matrix4<Expr> {
    let mut m = Matrix4::<Expr>::zeros();
    m.fixed_view_mut::<3, 3>(0, 0)
        .copy_from(&skew(&screw.angular()));
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(&screw.linear());
    m
}

fn scaled(m: &Matrix3<Expr>, k: &Expr) -> Matrix3<Expr> {
    m.map(|e| &e * k)
}

/// `exp(twist * theta)` for a revolute twist, exact in `theta`.
///
/// With `W` the rotation block of `twist` (unit axis) and `v` its translation
/// column:
///
/// ```text
/// R = I + sin θ W + (1 - cos θ) W²
/// p = (I θ + (1 - cos θ) W + (θ - sin θ) W²) v
/// ```
pub fn exp_twist(twist: &Matrix4<Expr>, theta: &Symbol) -> Matrix4<Expr> {
    let w: Matrix3<Expr> = twist.fixed_view::<3, 3>(0, 0).into_owned();
    let v: Vector3<Expr> = twist.fixed_view::<3, 1>(0, 3).into_owned();
    let w2 = &w * &w;

    let t = Expr::symbol(theta);
    let s = Expr::sin(Angle::of(theta));
    let c = Expr::cos(Angle::of(theta));
    let one_minus_c = Expr::one() - c;
    let identity = Matrix3::<Expr>::identity();

    let rotation = identity.clone() + scaled(&w, &s) + scaled(&w2, &one_minus_c);
    let g = scaled(&identity, &t) + scaled(&w, &one_minus_c) + scaled(&w2, &(t.clone() - s));
    let translation = g * v;

    let mut out = Matrix4::<Expr>::identity();
    out.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
    out.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
    simplify_matrix(&out)
}
