use good_lp::solvers::highs::highs;
use good_lp::{
    variable, variables, Expression, ResolutionError, Solution as LpSolution, SolverModel,
    Variable,
};
use log::{debug, warn};
use std::time::{Duration, Instant};

/// Feasibility tolerance handed to HiGHS. Coefficients are satoshi amounts:
/// at 1e-6 a near-binary value can move a balance by hundreds of satoshis.
const FEASIBILITY_TOLERANCE: f64 = 1e-9;

/// Handle of a variable in a [`ConstraintStore`].
///
/// Ids are handed out in creation order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Domain of a variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarKind {
    Binary,
    Integer { lo: f64, hi: f64 },
    /// Used for quantities that are integral whenever the binaries are.
    Continuous { lo: f64, hi: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Leq,
    Geq,
    Eq,
}

/// Sum of `coefficient × variable` terms. Constants live on the right-hand
/// side of the constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn term(var: VarId, coefficient: f64) -> Self {
        Self {
            terms: vec![(var, coefficient)],
        }
    }

    /// `Σ vars` with unit coefficients.
    pub fn sum(vars: impl IntoIterator<Item = VarId>) -> Self {
        Self {
            terms: vars.into_iter().map(|v| (v, 1.0)).collect(),
        }
    }

    pub fn push(&mut self, var: VarId, coefficient: f64) -> &mut Self {
        self.terms.push((var, coefficient));
        self
    }

    pub fn with(mut self, var: VarId, coefficient: f64) -> Self {
        self.terms.push((var, coefficient));
        self
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    expr: LinearExpr,
    relation: Relation,
    rhs: f64,
}

impl LinearConstraint {
    pub fn expr(&self) -> &LinearExpr {
        &self.expr
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn rhs(&self) -> f64 {
        self.rhs
    }
}

/// Variable values of an optimal solve, indexed by [`VarId`].
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    values: Vec<f64>,
}

impl Assignment {
    pub fn value(&self, var: VarId) -> f64 {
        self.values[var.0]
    }

    /// Binary variables are read with a 0.5 threshold.
    pub fn is_set(&self, var: VarId) -> bool {
        self.values[var.0] > 0.5
    }

    pub fn integer(&self, var: VarId) -> i64 {
        self.values[var.0].round() as i64
    }
}

/// Outcome of one solver call.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Optimal(Assignment),
    Infeasible,
    TimedOut,
    Failed(String),
}

impl SolveOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            SolveOutcome::Optimal(_) => "optimal",
            SolveOutcome::Infeasible => "infeasible",
            SolveOutcome::TimedOut => "time limit",
            SolveOutcome::Failed(_) => "failed",
        }
    }
}

/// Append-only integer program.
///
/// Variables and constraints are only ever added, so a [`VarId`] handed out
/// once stays valid for the life of the store. Every [`solve`](Self::solve)
/// builds a fresh HiGHS problem from the store, which lets the caller keep
/// appending cuts between solves.
#[derive(Debug, Clone, Default)]
pub struct ConstraintStore {
    vars: Vec<VarKind>,
    constraints: Vec<LinearConstraint>,
}

impl ConstraintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_binary(&mut self) -> VarId {
        self.add_var(VarKind::Binary)
    }

    pub fn add_integer(&mut self, lo: f64, hi: f64) -> VarId {
        self.add_var(VarKind::Integer { lo, hi })
    }

    pub fn add_continuous(&mut self, lo: f64, hi: f64) -> VarId {
        self.add_var(VarKind::Continuous { lo, hi })
    }

    fn add_var(&mut self, kind: VarKind) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(kind);
        id
    }

    pub fn add_constraint(&mut self, expr: LinearExpr, relation: Relation, rhs: f64) {
        self.constraints.push(LinearConstraint {
            expr,
            relation,
            rhs,
        });
    }

    pub fn leq(&mut self, expr: LinearExpr, rhs: f64) {
        self.add_constraint(expr, Relation::Leq, rhs);
    }

    pub fn geq(&mut self, expr: LinearExpr, rhs: f64) {
        self.add_constraint(expr, Relation::Geq, rhs);
    }

    pub fn eq(&mut self, expr: LinearExpr, rhs: f64) {
        self.add_constraint(expr, Relation::Eq, rhs);
    }

    pub fn n_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn n_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn var_kind(&self, var: VarId) -> VarKind {
        self.vars[var.0]
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    /// Solve the store with HiGHS, stopping after `time_limit`.
    ///
    /// The objective is constant: any feasible point is optimal. HiGHS
    /// reports a run that hit its limit like a finished one, so the returned
    /// point is checked against every constraint; a point that fails the
    /// check after the limit elapsed is [`SolveOutcome::TimedOut`].
    pub fn solve(&self, time_limit: Duration) -> SolveOutcome {
        let started = Instant::now();
        let outcome = match self.solve_highs(time_limit) {
            Ok(assignment) if self.is_feasible(&assignment) => SolveOutcome::Optimal(assignment),
            Ok(_) if started.elapsed() >= time_limit => {
                warn!("Solver exceeded the {:?} limit", time_limit);
                SolveOutcome::TimedOut
            }
            Ok(_) => SolveOutcome::Failed("solver returned an infeasible point".to_string()),
            Err(ResolutionError::Infeasible) => SolveOutcome::Infeasible,
            Err(_) if started.elapsed() >= time_limit => {
                warn!("Solver exceeded the {:?} limit", time_limit);
                SolveOutcome::TimedOut
            }
            Err(e) => SolveOutcome::Failed(e.to_string()),
        };

        debug!(
            "Solve over {} vars / {} constraints: {} in {:?}",
            self.n_vars(),
            self.n_constraints(),
            outcome.status(),
            started.elapsed()
        );
        outcome
    }

    fn solve_highs(&self, time_limit: Duration) -> Result<Assignment, ResolutionError> {
        let mut vars = variables!();
        let handles: Vec<Variable> = self
            .vars
            .iter()
            .map(|kind| match *kind {
                VarKind::Binary => vars.add(variable().binary()),
                VarKind::Integer { lo, hi } => vars.add(variable().integer().min(lo).max(hi)),
                VarKind::Continuous { lo, hi } => vars.add(variable().min(lo).max(hi)),
            })
            .collect();

        let mut problem = vars
            .minimise(Expression::default())
            .using(highs)
            .set_verbose(false)
            .set_option("time_limit", time_limit.as_secs_f64())
            .set_option("mip_feasibility_tolerance", FEASIBILITY_TOLERANCE)
            .set_option("primal_feasibility_tolerance", FEASIBILITY_TOLERANCE);
        for constraint in &self.constraints {
            let mut expr = Expression::with_capacity(constraint.expr.terms.len());
            for &(var, coefficient) in &constraint.expr.terms {
                expr.add_mul(coefficient, handles[var.0]);
            }
            problem = problem.with(match constraint.relation {
                Relation::Leq => expr.leq(constraint.rhs),
                Relation::Geq => expr.geq(constraint.rhs),
                Relation::Eq => expr.eq(constraint.rhs),
            });
        }

        let solution = problem.solve()?;
        Ok(Assignment {
            values: handles.iter().map(|var| solution.value(*var)).collect(),
        })
    }

    /// Whether `values` meets every domain and constraint, with integral
    /// variables read rounded.
    fn is_feasible(&self, values: &Assignment) -> bool {
        let out_of_domain = self.vars.iter().enumerate().any(|(idx, kind)| {
            let v = values.values[idx];
            match *kind {
                VarKind::Binary => {
                    (v - v.round()).abs() > 1e-6 || !(-1e-6..=1.0 + 1e-6).contains(&v)
                }
                VarKind::Integer { lo, hi } => {
                    (v - v.round()).abs() > 1e-6 || v < lo - 1e-6 || v > hi + 1e-6
                }
                VarKind::Continuous { lo, hi } => v < lo - 1e-6 || v > hi + 1e-6,
            }
        });
        if out_of_domain {
            return false;
        }

        self.constraints.iter().all(|constraint| {
            let mut lhs = 0.0;
            let mut scale = constraint.rhs.abs();
            for &(var, coefficient) in &constraint.expr.terms {
                let v = match self.vars[var.0] {
                    VarKind::Continuous { .. } => values.values[var.0],
                    _ => values.values[var.0].round(),
                };
                lhs += coefficient * v;
                scale += coefficient.abs();
            }
            let slack = 1e-6 * (1.0 + scale);
            match constraint.relation {
                Relation::Leq => lhs <= constraint.rhs + slack,
                Relation::Geq => lhs >= constraint.rhs - slack,
                Relation::Eq => (lhs - constraint.rhs).abs() <= slack,
            }
        })
    }
}
