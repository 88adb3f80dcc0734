use approx::relative_eq;

use super::{Atom, Expr, Monomial};

/// Coefficients smaller than this are cancellation residue.
const RESIDUE: f64 = 1e-12;

pub(super) fn simplify(expr: &Expr) -> Expr {
    let mut out = expr.chopped(RESIDUE);
    // every rewrite removes at least one term, so this terminates
    loop {
        if !(pythagorean(&mut out) || angle_sum(&mut out)) {
            break;
        }
    }
    out.chopped(RESIDUE)
}

fn same(a: f64, b: f64) -> bool {
    relative_eq!(a, b, epsilon = RESIDUE, max_relative = 1e-9)
}

fn snapshot(expr: &Expr) -> Vec<(Monomial, f64)> {
    expr.terms
        .iter()
        .map(|(monomial, coef)| (monomial.clone(), *coef))
        .collect()
}

/// k·X·sin²(a) + k·X·cos²(a) -> k·X
fn pythagorean(expr: &mut Expr) -> bool {
    for (monomial, coef) in snapshot(expr) {
        for (atom, power) in &monomial.0 {
            let Atom::Sin(angle) = atom else { continue };
            if *power < 2 {
                continue;
            }
            let cos = Atom::Cos(angle.clone());
            let base = monomial.without(atom).without(atom);
            let partner = base.with(&cos).with(&cos);
            match expr.terms.get(&partner) {
                Some(other) if same(*other, coef) => {}
                _ => continue,
            }
            expr.terms.remove(&monomial);
            expr.terms.remove(&partner);
            expr.add_term(base, coef);
            return true;
        }
    }
    false
}

/// Folds the two-term expansions of `cos(a ± b)` and `sin(a ± b)`.
fn angle_sum(expr: &mut Expr) -> bool {
    for (monomial, coef) in snapshot(expr) {
        let trig: Vec<&Atom> = monomial
            .0
            .keys()
            .filter(|atom| !matches!(atom, Atom::Var(_)))
            .collect();
        for first in &trig {
            for second in &trig {
                let (a, b, sine) = match (*first, *second) {
                    (Atom::Cos(a), Atom::Cos(b)) if a < b => (a, b, false),
                    (Atom::Sin(a), Atom::Cos(b)) if a != b => (a, b, true),
                    _ => continue,
                };
                let base = monomial.without(first).without(second);
                let partner = if sine {
                    base.with(&Atom::Cos(a.clone())).with(&Atom::Sin(b.clone()))
                } else {
                    base.with(&Atom::Sin(a.clone())).with(&Atom::Sin(b.clone()))
                };
                let Some(other) = expr.terms.get(&partner).copied() else {
                    continue;
                };
                let folded = match (sine, same(other, coef), same(other, -coef)) {
                    // cos a cos b - sin a sin b
                    (false, _, true) => Expr::cos(a.sum(b)),
                    // cos a cos b + sin a sin b
                    (false, true, _) => Expr::cos(a.difference(b)),
                    // sin a cos b + cos a sin b
                    (true, true, _) => Expr::sin(a.sum(b)),
                    // sin a cos b - cos a sin b
                    (true, _, true) => Expr::sin(a.difference(b)),
                    _ => continue,
                };
                expr.terms.remove(&monomial);
                expr.terms.remove(&partner);
                *expr += Expr::from_monomial(base, coef) * folded;
                return true;
            }
        }
    }
    false
}
