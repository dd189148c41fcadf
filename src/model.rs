//! A system together with its optional precomputed tables

use crate::boehl::{self, Precalc, Solution, DEFAULT_K_MAX};
use crate::error::Result;
use crate::system::LinearSystem;
use nalgebra::DVector;
use ndarray::Array2;
use tracing::{debug, info};

/// Solvable model. Without tables the search recomputes matrix powers.
#[derive(Clone, Debug)]
pub struct Model {
    system: LinearSystem,
    precalc: Option<Precalc>,
    k_max: usize,
}

impl Model {
    /// Model without tables, searching up to [`DEFAULT_K_MAX`].
    pub fn new(system: LinearSystem) -> Self {
        Self { system, precalc: None, k_max: DEFAULT_K_MAX }
    }

    /// Bound for direct (table-free) searches.
    pub fn with_k_max(mut self, k_max: usize) -> Self {
        self.k_max = k_max;
        self
    }

    /// Builds and attaches tables of size `ll_max × kk_max`.
    pub fn preprocess(&mut self, ll_max: usize, kk_max: usize) -> Result<()> {
        self.precalc = Some(Precalc::new(&self.system, ll_max, kk_max)?);
        info!(ll_max, kk_max, "precalc attached");
        Ok(())
    }

    /// Swaps in another system. Tables are kept when they fit its shape,
    /// since they do not depend on `x_bar`.
    pub fn with_system(mut self, system: LinearSystem) -> Self {
        if self.precalc.as_ref().is_some_and(|pre| !pre.fits(&system)) {
            debug!("precalc dropped, system shape changed");
            self.precalc = None;
        }
        self.system = system;
        self
    }

    /// The underlying linear system.
    pub fn system(&self) -> &LinearSystem { &self.system }

    /// Attached tables, if any.
    pub fn precalc(&self) -> Option<&Precalc> { self.precalc.as_ref() }

    /// One step of the (l, k) search from state `v`.
    pub fn boehlgorithm(&self, v: &DVector<f64>) -> Result<Solution> {
        match &self.precalc {
            Some(pre) => boehl::boehlgorithm_pp(&self.system, v, pre),
            None => boehl::boehlgorithm_jit(&self.system, v, self.k_max),
        }
    }

    /// Iterates the search for `periods` steps starting at `v0`.
    pub fn simulate(&self, v0: &DVector<f64>, periods: usize) -> Result<Simulation> {
        self.system.check_state(v0)?;
        let mut states = Vec::with_capacity(periods);
        let mut regimes = Vec::with_capacity(periods);
        let mut warnings = 0;
        let mut v = v0.clone();
        for t in 0..periods {
            let sol = self.boehlgorithm(&v)?;
            if sol.k_capped || sol.budget_exhausted {
                warnings += 1;
            }
            debug!(t, l = sol.l, k = sol.k, "simulated period");
            states.push(v);
            regimes.push((sol.l, sol.k));
            v = sol.v_next;
        }
        Ok(Simulation { dim_v: self.system.dim_v(), states, regimes, warnings })
    }
}

/// Path produced by [`Model::simulate`].
#[derive(Clone, Debug)]
pub struct Simulation {
    dim_v: usize,
    states: Vec<DVector<f64>>,
    regimes: Vec<(usize, usize)>,
    warnings: usize,
}

impl Simulation {
    /// `periods × dim_v`; row `t` is the state at the start of period `t`.
    pub fn states(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.states.len(), self.dim_v), |(t, i)| self.states[t][i])
    }

    /// `(l, k)` chosen in each period.
    pub fn regimes(&self) -> &[(usize, usize)] { &self.regimes }

    /// Periods in which a search hit one of its limits.
    pub fn warnings(&self) -> usize { self.warnings }

    /// Number of simulated periods.
    pub fn len(&self) -> usize { self.states.len() }

    /// True for a zero-period simulation.
    pub fn is_empty(&self) -> bool { self.states.is_empty() }
}
