//! Symbolic scalars for kinematic formulas.
//!
//! An [`Expr`] is kept in a normal form: a sum of monomials with `f64`
//! coefficients, where each monomial is a product of powers of atoms. An atom
//! is a free [`Symbol`] or `sin`/`cos` of an [`Angle`], which is an integer
//! linear combination of symbols. Like terms are merged by every operation, so
//! two expressions built from the same atoms compare equal when they are equal
//! as polynomials.
//!
//! `Expr` implements [`Zero`], [`One`] and the closed arithmetic operators,
//! which lets nalgebra matrices (`Matrix4<Expr>`, `Vector3<Expr>`, ...) carry
//! symbolic entries through the ordinary matrix products.

mod simplify;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use nalgebra::SMatrix;
use num_traits::{One, Zero};

/// Values substituted for symbols during numeric evaluation.
pub type Bindings = HashMap<Symbol, f64>;

/// Name of a joint variable or link parameter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Integer linear combination of symbols, the argument of `sin` and `cos`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Angle(BTreeMap<Symbol, i32>);

impl Angle {
    pub fn of(symbol: &Symbol) -> Self {
        Self(BTreeMap::from([(symbol.clone(), 1)]))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn coefficient(&self, symbol: &Symbol) -> i32 {
        self.0.get(symbol).copied().unwrap_or(0)
    }

    pub fn sum(&self, other: &Angle) -> Angle {
        self.combine(other, 1)
    }

    pub fn difference(&self, other: &Angle) -> Angle {
        self.combine(other, -1)
    }

    pub fn eval(&self, bindings: &Bindings) -> Result<f64, Symbol> {
        self.0.iter().try_fold(0.0, |acc, (symbol, coef)| {
            bindings
                .get(symbol)
                .map(|value| acc + f64::from(*coef) * value)
                .ok_or_else(|| symbol.clone())
        })
    }

    fn combine(&self, other: &Angle, sign: i32) -> Angle {
        let mut out = self.0.clone();
        for (symbol, coef) in &other.0 {
            let value = out.get(symbol).copied().unwrap_or(0) + sign * coef;
            if value == 0 {
                out.remove(symbol);
            } else {
                out.insert(symbol.clone(), value);
            }
        }
        Angle(out)
    }

    /// Leading coefficient made positive; the flag reports a sign flip.
    fn canonical(self) -> (Angle, bool) {
        match self.0.values().next() {
            Some(coef) if *coef < 0 => (
                Angle(self.0.into_iter().map(|(s, c)| (s, -c)).collect()),
                true,
            ),
            _ => (self, false),
        }
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("0");
        }
        for (i, (symbol, coef)) in self.0.iter().enumerate() {
            let magnitude = coef.abs();
            match (i, *coef < 0) {
                (0, true) => f.write_str("-")?,
                (0, false) => {}
                (_, true) => f.write_str(" - ")?,
                (_, false) => f.write_str(" + ")?,
            }
            if magnitude != 1 {
                write!(f, "{magnitude}*")?;
            }
            write!(f, "{symbol}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Atom {
    Var(Symbol),
    Sin(Angle),
    Cos(Angle),
}

impl Atom {
    fn eval(&self, bindings: &Bindings) -> Result<f64, Symbol> {
        match self {
            Atom::Var(symbol) => bindings.get(symbol).copied().ok_or_else(|| symbol.clone()),
            Atom::Sin(angle) => Ok(angle.eval(bindings)?.sin()),
            Atom::Cos(angle) => Ok(angle.eval(bindings)?.cos()),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Var(symbol) => write!(f, "{symbol}"),
            Atom::Sin(angle) => write!(f, "sin({angle})"),
            Atom::Cos(angle) => write!(f, "cos({angle})"),
        }
    }
}

/// Product of atom powers; the empty product is the unit monomial.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Monomial(BTreeMap<Atom, u32>);

impl Monomial {
    fn of(atom: Atom) -> Self {
        Self(BTreeMap::from([(atom, 1)]))
    }

    fn is_unit(&self) -> bool {
        self.0.is_empty()
    }

    fn times(&self, other: &Monomial) -> Monomial {
        let mut out = self.0.clone();
        for (atom, power) in &other.0 {
            *out.entry(atom.clone()).or_insert(0) += power;
        }
        Monomial(out)
    }

    fn with(&self, atom: &Atom) -> Monomial {
        let mut out = self.0.clone();
        *out.entry(atom.clone()).or_insert(0) += 1;
        Monomial(out)
    }

    fn without(&self, atom: &Atom) -> Monomial {
        let mut out = self.0.clone();
        match out.get(atom).copied() {
            Some(power) if power > 1 => {
                out.insert(atom.clone(), power - 1);
            }
            Some(_) => {
                out.remove(atom);
            }
            None => {}
        }
        Monomial(out)
    }

    fn eval(&self, bindings: &Bindings) -> Result<f64, Symbol> {
        self.0.iter().try_fold(1.0, |acc, (atom, power)| {
            Ok(acc * atom.eval(bindings)?.powi(*power as i32))
        })
    }
}

impl fmt::Display for Monomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (atom, power)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("*")?;
            }
            write!(f, "{atom}")?;
            if *power > 1 {
                write!(f, "^{power}")?;
            }
        }
        Ok(())
    }
}

/// Symbolic scalar in trigonometric-polynomial normal form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expr {
    terms: BTreeMap<Monomial, f64>,
}

impl Expr {
    pub fn constant(value: f64) -> Self {
        Self::from_monomial(Monomial::default(), value)
    }

    pub fn symbol(symbol: &Symbol) -> Self {
        Self::from_monomial(Monomial::of(Atom::Var(symbol.clone())), 1.0)
    }

    pub fn sin(angle: Angle) -> Self {
        if angle.is_zero() {
            return Self::zero();
        }
        let (angle, flipped) = angle.canonical();
        let sign = if flipped { -1.0 } else { 1.0 };
        Self::from_monomial(Monomial::of(Atom::Sin(angle)), sign)
    }

    pub fn cos(angle: Angle) -> Self {
        if angle.is_zero() {
            return Self::one();
        }
        let (angle, _) = angle.canonical();
        Self::from_monomial(Monomial::of(Atom::Cos(angle)), 1.0)
    }

    fn from_monomial(monomial: Monomial, coef: f64) -> Self {
        let mut out = Self::default();
        out.add_term(monomial, coef);
        out
    }

    fn add_term(&mut self, monomial: Monomial, coef: f64) {
        if coef == 0.0 {
            return;
        }
        let value = self.terms.get(&monomial).copied().unwrap_or(0.0) + coef;
        if value == 0.0 {
            self.terms.remove(&monomial);
        } else {
            self.terms.insert(monomial, value);
        }
    }

    /// Number of monomials in the normal form.
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// The value of a symbol-free expression.
    pub fn as_constant(&self) -> Option<f64> {
        match self.terms.len() {
            0 => Some(0.0),
            1 => self
                .terms
                .iter()
                .next()
                .filter(|(monomial, _)| monomial.is_unit())
                .map(|(_, coef)| *coef),
            _ => None,
        }
    }

    pub fn scale(&self, factor: f64) -> Expr {
        let mut out = Expr::zero();
        for (monomial, coef) in &self.terms {
            out.add_term(monomial.clone(), coef * factor);
        }
        out
    }

    /// Every symbol the expression mentions, inside trig arguments included.
    pub fn symbols(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        for atom in self.terms.keys().flat_map(|monomial| monomial.0.keys()) {
            match atom {
                Atom::Var(symbol) => {
                    out.insert(symbol.clone());
                }
                Atom::Sin(angle) | Atom::Cos(angle) => out.extend(angle.0.keys().cloned()),
            }
        }
        out
    }

    /// Substitutes every symbol; fails with the first symbol left unbound.
    pub fn eval(&self, bindings: &Bindings) -> Result<f64, Symbol> {
        self.terms.iter().try_fold(0.0, |acc, (monomial, coef)| {
            Ok(acc + coef * monomial.eval(bindings)?)
        })
    }

    /// Partial derivative with respect to `symbol`.
    pub fn derivative(&self, symbol: &Symbol) -> Expr {
        let mut out = Expr::zero();
        for (monomial, coef) in &self.terms {
            for (atom, power) in &monomial.0 {
                let rest = monomial.without(atom);
                let scale = coef * f64::from(*power);
                match atom {
                    Atom::Var(var) if var == symbol => out.add_term(rest, scale),
                    Atom::Var(_) => {}
                    Atom::Sin(angle) => {
                        let k = f64::from(angle.coefficient(symbol));
                        out.add_term(rest.with(&Atom::Cos(angle.clone())), scale * k);
                    }
                    Atom::Cos(angle) => {
                        let k = f64::from(angle.coefficient(symbol));
                        out.add_term(rest.with(&Atom::Sin(angle.clone())), -scale * k);
                    }
                }
            }
        }
        out
    }

    /// Drops every term whose coefficient magnitude is below `tolerance`.
    pub fn chopped(&self, tolerance: f64) -> Expr {
        let mut out = self.clone();
        out.terms.retain(|_, coef| coef.abs() >= tolerance);
        out
    }

    /// Trigonometric normalization: cancellation residue is dropped,
    /// `sin²+cos²` collapses to one and products of sines and cosines are
    /// folded into sines and cosines of angle sums and differences.
    pub fn simplify(&self) -> Expr {
        simplify::simplify(self)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl From<&Symbol> for Expr {
    fn from(symbol: &Symbol) -> Self {
        Self::symbol(symbol)
    }
}

impl Zero for Expr {
    fn zero() -> Self {
        Self::default()
    }

    fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }
}

impl One for Expr {
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(mut self, rhs: Expr) -> Expr {
        self += rhs;
        self
    }
}

impl AddAssign for Expr {
    fn add_assign(&mut self, rhs: Expr) {
        for (monomial, coef) in rhs.terms {
            self.add_term(monomial, coef);
        }
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(mut self, rhs: Expr) -> Expr {
        self -= rhs;
        self
    }
}

impl SubAssign for Expr {
    fn sub_assign(&mut self, rhs: Expr) {
        for (monomial, coef) in rhs.terms {
            self.add_term(monomial, -coef);
        }
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        self.scale(-1.0)
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        &self * &rhs
    }
}

impl<'a> Mul<&'a Expr> for &'a Expr {
    type Output = Expr;

    fn mul(self, rhs: &'a Expr) -> Expr {
        let mut out = Expr::zero();
        for (lhs_monomial, lhs_coef) in &self.terms {
            for (rhs_monomial, rhs_coef) in &rhs.terms {
                out.add_term(lhs_monomial.times(rhs_monomial), lhs_coef * rhs_coef);
            }
        }
        out
    }
}

impl MulAssign for Expr {
    fn mul_assign(&mut self, rhs: Expr) {
        *self = &*self * &rhs;
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return f.write_str("0");
        }
        for (i, (monomial, coef)) in self.terms.iter().enumerate() {
            let magnitude = coef.abs();
            match (i, *coef < 0.0) {
                (0, true) => f.write_str("-")?,
                (0, false) => {}
                (_, true) => f.write_str(" - ")?,
                (_, false) => f.write_str(" + ")?,
            }
            if monomial.is_unit() {
                write!(f, "{magnitude}")?;
            } else if magnitude == 1.0 {
                write!(f, "{monomial}")?;
            } else {
                write!(f, "{magnitude}*{monomial}")?;
            }
        }
        Ok(())
    }
}

/// Lifts a numeric matrix into constant symbolic entries.
pub fn lift<const R: usize, const C: usize>(m: &SMatrix<f64, R, C>) -> SMatrix<Expr, R, C> {
    m.map(Expr::constant)
}

pub fn simplify_matrix<const R: usize, const C: usize>(
    m: &SMatrix<Expr, R, C>,
) -> SMatrix<Expr, R, C> {
    m.map(|e| e.simplify())
}

/// Evaluates every entry; fails with the first unbound symbol.
pub fn evaluate_matrix<const R: usize, const C: usize>(
    m: &SMatrix<Expr, R, C>,
    bindings: &Bindings,
) -> Result<SMatrix<f64, R, C>, Symbol> {
    let mut out = SMatrix::<f64, R, C>::zeros();
    for (dst, src) in out.iter_mut().zip(m.iter()) {
        *dst = src.eval(bindings)?;
    }
    Ok(out)
}
