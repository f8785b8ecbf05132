//! Multi-rate Adams-Bashforth integrator.
//!
//! Level `l` advances with step `2^l dt`. One coarse step consists of
//! `2^(L-1)` ticks of the finest step. At every tick:
//!
//! 1. traces are exchanged with the halo (split-phase, overlapping the
//!    volume kernel)
//! 2. every level due at this tick (`tick % 2^l == 0`) computes its RHS
//!    into the current generation
//! 3. the due levels complete their step and publish traces
//! 4. every slower level publishes the traces of its state at the next
//!    tick, rewound from the end of its step
//!
//! Each level ramps up through AB1 and AB2 until three generations exist.

use log::{debug, info};

use super::adams_bashforth::AdamsBashforth;
use crate::error::{MrabError, Result};
use crate::mesh::{MeshTopology, MrabLevels, TimeSchedule};
use crate::operators::ReferenceTables;
use crate::parallel::HaloExchange;
use crate::physics::WavePhysics;
use crate::solver::{self, FieldNorms, KernelContext, SolverConfig, SolverState, WaveSpeed};
use crate::source::{PmlAxes, PmlConfig, PmlProfile, SourcePatch};
use crate::types::{ElementIndex, LevelIndex};

/// MRAB time integrator over one rank's elements.
pub struct MrabIntegrator<'a> {
    topo: &'a MeshTopology,
    tables: &'a ReferenceTables,
    physics: &'a dyn WavePhysics,
    levels: MrabLevels,
    config: SolverConfig,
    source: Option<SourcePatch>,
    wave_speed: Option<WaveSpeed>,
    pml: Option<PmlProfile>,
    state: SolverState,
    updates: Vec<usize>,
    time: f64,
    dt: f64,
}

impl<'a> MrabIntegrator<'a> {
    /// Set up the integrator.
    ///
    /// PML elements (type codes `k * 100`) are split from the level lists
    /// and their damping profile is built with `pml_config` (or the
    /// default).
    ///
    /// # Arguments
    /// * `topo` - Mesh topology with assigned degrees
    /// * `tables` - Reference operators up to the highest degree
    /// * `physics` - Physics evaluated by the kernels
    /// * `levels` - MRAB levels of the local elements
    /// * `config` - Flux parameters
    /// * `pml_config` - PML damping strength
    /// * `halo` - Halo exchanger (PML bounding boxes)
    ///
    /// # Errors
    /// `DimensionMismatch` when physics and mesh disagree, `PmlUnsupported`
    /// when PML elements exist but the physics has no split form,
    /// `InvalidTimeStep` for a non-positive base step.
    pub fn new<H: HaloExchange>(
        topo: &'a MeshTopology,
        tables: &'a ReferenceTables,
        physics: &'a dyn WavePhysics,
        mut levels: MrabLevels,
        config: SolverConfig,
        pml_config: Option<&PmlConfig>,
        halo: &H,
    ) -> Result<Self> {
        if physics.dim() != topo.dim() {
            return Err(MrabError::dimension_mismatch(
                format!("{:?} physics", topo.dim()),
                format!("{:?}", physics.dim()),
            ));
        }
        let dt = levels.dt();
        if !(dt.is_finite() && dt > 0.0) {
            return Err(MrabError::InvalidTimeStep(dt));
        }

        levels.split_pml(|e| PmlAxes::from_element_type(topo.element_type(e)).is_some());
        let (pml, pml_layout) = if levels.n_pml() > 0 {
            let pml_physics = physics
                .pml()
                .ok_or(MrabError::PmlUnsupported(physics.name()))?;
            let default = PmlConfig::default();
            let profile = PmlProfile::build(
                topo,
                tables,
                &levels,
                pml_config.unwrap_or(&default),
                halo,
            )?;
            (
                Some(profile),
                Some((levels.n_pml(), pml_physics.n_pml_fields())),
            )
        } else {
            (None, None)
        };

        let n_levels = levels.n_levels();
        let state = SolverState::new(topo, physics.n_fields(), n_levels, pml_layout);
        info!(
            "MRAB: {} on {} elements, {} levels, dt = {:.4e}, {} PML elements",
            physics.name(),
            topo.n_elements(),
            n_levels,
            dt,
            levels.n_pml()
        );

        Ok(Self {
            topo,
            tables,
            physics,
            levels,
            config,
            source: None,
            wave_speed: None,
            pml,
            state,
            updates: vec![0; n_levels],
            time: 0.0,
            dt,
        })
    }

    /// Attach a point source and its scattered-field patch.
    pub fn with_source(mut self, source: SourcePatch) -> Result<Self> {
        if self.physics.source_fields().is_none() {
            return Err(MrabError::InvalidConfig(format!(
                "physics '{}' does not accept point sources",
                self.physics.name()
            )));
        }
        self.source = Some(source);
        Ok(self)
    }

    /// Attach a variable wave speed.
    pub fn with_wave_speed(mut self, wave_speed: WaveSpeed) -> Result<Self> {
        if self.physics.wave_speed_field().is_none() {
            return Err(MrabError::InvalidConfig(format!(
                "physics '{}' has no field scaled by the wave speed",
                self.physics.name()
            )));
        }
        self.wave_speed = Some(wave_speed);
        Ok(self)
    }

    /// Kernel inputs and the mutable state, borrowed side by side.
    fn parts(&mut self) -> (KernelContext<'_>, &mut SolverState, &MrabLevels) {
        let ctx = KernelContext {
            topo: self.topo,
            tables: self.tables,
            physics: self.physics,
            lambda2: self.config.lambda2,
            source: self.source.as_ref(),
            wave_speed: self.wave_speed.as_ref(),
            pml: self.pml.as_ref(),
        };
        (ctx, &mut self.state, &self.levels)
    }

    /// Interpolate an initial condition and reset the history.
    ///
    /// `init(x, q)` writes the fields at position `x`. Split PML fields
    /// are initialised from the regular ones and the traces are rebuilt.
    pub fn set_initial(&mut self, t0: f64, init: impl Fn(&[f64; 3], &mut [f64])) {
        let nf = self.physics.n_fields();
        let mut nodal = vec![0.0; self.topo.np_max() * nf];
        for e in ElementIndex::iter(self.topo.n_elements()) {
            let ops = self.tables.degree(self.topo.degree(e));
            for i in 0..ops.np {
                init(&self.topo.node(e, i), &mut nodal[i * nf..(i + 1) * nf]);
            }
            let start = self.state.volume_index(e, 0, 0);
            ops.volume_vandermonde.nodal_to_bb(
                &nodal[..ops.np * nf],
                &mut self.state.q[start..start + ops.np * nf],
                nf,
            );
        }

        if let (Some(pml_physics), Some(pml)) = (self.physics.pml(), self.state.pml.as_mut()) {
            let npf = pml.n_fields;
            let np_max = self.topo.np_max();
            for lev in LevelIndex::iter(self.levels.n_levels()) {
                let elems = self.levels.elements(lev);
                for (&e, &id) in elems.pml_element_ids.iter().zip(&elems.pml_ids) {
                    for i in 0..self.topo.np(e) {
                        let q = (e.get() * np_max + i) * nf;
                        let p = (id * np_max + i) * npf;
                        pml_physics
                            .init_split(&self.state.q[q..q + nf], &mut pml.q[p..p + npf]);
                    }
                }
            }
        }

        self.state.reset_history();
        self.updates.fill(0);
        self.time = t0;
        self.refresh_traces();
    }

    /// Rebuild the traces of every level from the current `q`.
    fn refresh_traces(&mut self) {
        let (t, dt) = (self.time, self.dt);
        for lev in LevelIndex::iter(self.levels.n_levels()) {
            self.project_only(lev, [0.0; 3], t, dt);
        }
    }

    /// Volume and surface RHS of one level into its current generation.
    ///
    /// Traces must be current (see [`MrabIntegrator::exchange_traces`]).
    pub fn compute_rhs(&mut self, lev: LevelIndex, t: f64) {
        self.volume_rhs(lev);
        self.surface_rhs(lev, t);
    }

    fn volume_rhs(&mut self, lev: LevelIndex) {
        let (ctx, state, levels) = self.parts();
        let slot = state.shift(lev).current();
        let elems = levels.elements(lev);
        #[cfg(feature = "parallel")]
        solver::volume_rhs_parallel(&ctx, state, elems, slot);
        #[cfg(not(feature = "parallel"))]
        solver::volume_rhs(&ctx, state, elems, slot);
    }

    fn surface_rhs(&mut self, lev: LevelIndex, t: f64) {
        let (ctx, state, levels) = self.parts();
        let slot = state.shift(lev).current();
        let elems = levels.elements(lev);
        #[cfg(feature = "parallel")]
        solver::surface_rhs_parallel(&ctx, state, elems, slot, t);
        #[cfg(not(feature = "parallel"))]
        solver::surface_rhs(&ctx, state, elems, slot, t);
        state.wadg_pending[lev.get()] = ctx.wave_speed.is_some();
    }

    /// Complete a step of one level and publish its traces.
    pub fn advance_and_project(&mut self, lev: LevelIndex, weights: [f64; 3], t: f64, dt: f64) {
        let (ctx, state, levels) = self.parts();
        let elems = levels.elements(lev);
        #[cfg(feature = "parallel")]
        solver::advance_and_project_parallel(&ctx, state, elems, lev, weights, t, dt);
        #[cfg(not(feature = "parallel"))]
        solver::advance_and_project(&ctx, state, elems, lev, weights, t, dt);
    }

    /// Publish the traces of an intermediate state of one level.
    pub fn project_only(&mut self, lev: LevelIndex, weights: [f64; 3], t: f64, dt: f64) {
        let (ctx, state, levels) = self.parts();
        let elems = levels.elements(lev);
        #[cfg(feature = "parallel")]
        solver::project_only_parallel(&ctx, state, elems, lev, weights, t, dt);
        #[cfg(not(feature = "parallel"))]
        solver::project_only(&ctx, state, elems, lev, weights, t, dt);
    }

    /// Fill the halo tail of the projected traces.
    pub fn exchange_traces<H: HaloExchange>(&mut self, halo: &mut H) {
        let stride = self.state.trace_stride();
        halo.exchange(self.state.fqp_mut(), stride);
    }

    /// Advance every level by one coarse step.
    pub fn step<H: HaloExchange>(&mut self, halo: &mut H) {
        let n_levels = self.levels.n_levels();
        let ticks = 1usize << (n_levels - 1);
        let t0 = self.time;
        let dt = self.dt;
        let stride = self.state.trace_stride();

        for tick in 0..ticks {
            let t = t0 + tick as f64 * dt;
            let due: Vec<LevelIndex> = LevelIndex::iter(n_levels)
                .filter(|lev| tick % (1usize << lev.get()) == 0)
                .collect();

            halo.exchange_start(self.state.fqp(), stride);
            for &lev in &due {
                self.volume_rhs(lev);
            }
            halo.exchange_finish(self.state.fqp_mut(), stride);
            for &lev in &due {
                self.surface_rhs(lev, t);
            }

            for &lev in &due {
                let ab = AdamsBashforth::startup(self.updates[lev.get()]);
                let dt_lev = dt * lev.step_factor();
                self.advance_and_project(lev, ab.full_step(), t + dt_lev, dt_lev);
                self.updates[lev.get()] += 1;
            }

            let next = tick + 1;
            for lev in LevelIndex::iter(n_levels).skip(1) {
                let span = 1usize << lev.get();
                let start = (tick / span) * span;
                let tau = (next - start) as f64 / span as f64;
                let ab = AdamsBashforth::startup(self.updates[lev.get()].saturating_sub(1));
                let dt_lev = dt * lev.step_factor();
                self.project_only(lev, ab.rewind(tau), t0 + next as f64 * dt, dt_lev);
            }
        }

        self.time = t0 + ticks as f64 * dt;
        debug!("MRAB: step complete at t = {:.6e}", self.time);
    }

    /// Integrate until `final_time`.
    ///
    /// Before the first step the base step is shrunk so that a whole
    /// number of coarse steps lands exactly on `final_time`; once the
    /// history exists the step is kept and the count rounded.
    pub fn run<H: HaloExchange>(&mut self, final_time: f64, halo: &mut H) -> Result<TimeSchedule> {
        let span = final_time - self.time;
        let schedule = if self.updates.iter().all(|&u| u == 0) {
            let schedule = self.levels.schedule(span)?;
            self.dt = schedule.dt;
            schedule
        } else {
            if !(span.is_finite() && span > 0.0) {
                return Err(MrabError::InvalidTimeStep(span));
            }
            let factor = LevelIndex::new(self.levels.n_levels() - 1).step_factor();
            let coarse_dt = factor * self.dt;
            TimeSchedule {
                dt: self.dt,
                n_steps: (span / coarse_dt).round().max(1.0) as usize,
                coarse_dt,
            }
        };

        info!(
            "MRAB: {} coarse steps of {:.4e} to t = {:.4e}",
            schedule.n_steps, schedule.coarse_dt, final_time
        );
        let report = (schedule.n_steps / 10).max(1);
        for n in 0..schedule.n_steps {
            self.step(halo);
            if (n + 1) % report == 0 {
                info!(
                    "MRAB: step {}/{}, t = {:.4e}",
                    n + 1,
                    schedule.n_steps,
                    self.time
                );
            }
        }
        Ok(schedule)
    }

    /// Field norms of the current state.
    pub fn norms(&self) -> FieldNorms {
        FieldNorms::compute(self.topo, self.tables, &self.state)
    }

    /// Solver state.
    pub fn state(&self) -> &SolverState {
        &self.state
    }

    /// Solver state, mutable.
    pub fn state_mut(&mut self) -> &mut SolverState {
        &mut self.state
    }

    /// Current time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Finest step.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// MRAB levels (with PML elements split out).
    pub fn levels(&self) -> &MrabLevels {
        &self.levels
    }

    /// Completed updates of a level.
    pub fn n_updates(&self, lev: LevelIndex) -> usize {
        self.updates[lev.get()]
    }

    /// PML damping profile, when PML elements exist.
    pub fn pml_profile(&self) -> Option<&PmlProfile> {
        self.pml.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{LevelConfig, RectangleMesh};
    use crate::parallel::SerialHalo;
    use crate::physics::{Acoustics, BoltzmannBgk2D};
    use crate::types::Dimension;
    use approx::assert_relative_eq;

    fn topo(tables: &ReferenceTables, n: usize, nx: usize) -> MeshTopology {
        let mesh = RectangleMesh::new(0.0, 1.0, 0.0, 1.0, nx, nx).build().unwrap();
        let n_total = mesh.n_total();
        MeshTopology::new(mesh, vec![n; n_total], tables).unwrap()
    }

    fn levels(topo: &MeshTopology, dt: impl Fn(ElementIndex) -> f64, max: usize) -> MrabLevels {
        let e_to_dt: Vec<f64> = ElementIndex::iter(topo.n_elements()).map(dt).collect();
        MrabLevels::build(topo.mesh(), &e_to_dt, &LevelConfig::new(max), &mut SerialHalo).unwrap()
    }

    #[test]
    fn test_rest_state_stays_at_rest() {
        let tables = ReferenceTables::new(Dimension::Two, 2).unwrap();
        let topo = topo(&tables, 2, 2);
        let physics = Acoustics::two_d();
        let levels = levels(&topo, |_| 0.01, 1);
        let mut mrab = MrabIntegrator::new(
            &topo,
            &tables,
            &physics,
            levels,
            SolverConfig::default(),
            None,
            &SerialHalo,
        )
        .unwrap();
        mrab.set_initial(0.0, |_, q| {
            q.fill(0.0);
            q[2] = 1.0;
        });
        let mut halo = SerialHalo;
        for _ in 0..5 {
            mrab.step(&mut halo);
        }
        assert_relative_eq!(mrab.time(), 0.05, epsilon = 1e-15);
        assert_eq!(mrab.n_updates(LevelIndex::ZERO), 5);
        for e in ElementIndex::iter(topo.n_elements()) {
            for i in 0..topo.np(e) {
                assert_relative_eq!(mrab.state().value(e, i, 2), 1.0, epsilon = 1e-12);
                assert_relative_eq!(mrab.state().value(e, i, 0), 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_two_levels_update_counts() {
        let tables = ReferenceTables::new(Dimension::Two, 1).unwrap();
        let topo = topo(&tables, 1, 4);
        let physics = Acoustics::two_d();
        // left half steps at dt, right half at 2 dt
        let levels = levels(
            &topo,
            |e| if topo.mesh().centroid(e)[0] < 0.5 { 0.01 } else { 0.02 },
            2,
        );
        assert_eq!(levels.n_levels(), 2);
        let mut mrab = MrabIntegrator::new(
            &topo,
            &tables,
            &physics,
            levels,
            SolverConfig::default(),
            None,
            &SerialHalo,
        )
        .unwrap();
        mrab.set_initial(0.0, |x, q| {
            q.fill(0.0);
            q[2] = (-20.0 * ((x[0] - 0.5).powi(2) + (x[1] - 0.5).powi(2))).exp();
        });

        let mut halo = SerialHalo;
        mrab.step(&mut halo);
        mrab.step(&mut halo);
        assert_eq!(mrab.n_updates(LevelIndex::new(0)), 4);
        assert_eq!(mrab.n_updates(LevelIndex::new(1)), 2);
        assert_relative_eq!(mrab.time(), 0.04, epsilon = 1e-15);
        assert!(crate::solver::first_non_finite(mrab.state()).is_none());
    }

    #[test]
    fn test_pml_requires_split_physics() {
        let tables = ReferenceTables::new(Dimension::Two, 1).unwrap();
        let mut mesh = RectangleMesh::new(0.0, 1.0, 0.0, 1.0, 2, 2).build().unwrap();
        mesh.set_element_type(ElementIndex::new(0), 100);
        let n_total = mesh.n_total();
        let topo = MeshTopology::new(mesh, vec![1; n_total], &tables).unwrap();
        let physics = BoltzmannBgk2D::default();
        let levels = levels(&topo, |_| 0.01, 1);
        let err = MrabIntegrator::new(
            &topo,
            &tables,
            &physics,
            levels,
            SolverConfig::default(),
            None,
            &SerialHalo,
        )
        .err()
        .unwrap();
        assert!(matches!(err, MrabError::PmlUnsupported(_)));
    }

    #[test]
    fn test_run_lands_on_final_time() {
        let tables = ReferenceTables::new(Dimension::Two, 1).unwrap();
        let topo = topo(&tables, 1, 2);
        let physics = Acoustics::two_d();
        let levels = levels(&topo, |_| 0.03, 1);
        let mut mrab = MrabIntegrator::new(
            &topo,
            &tables,
            &physics,
            levels,
            SolverConfig::default(),
            None,
            &SerialHalo,
        )
        .unwrap();
        mrab.set_initial(0.0, |_, q| q.fill(0.0));
        let schedule = mrab.run(0.1, &mut SerialHalo).unwrap();
        assert_eq!(schedule.n_steps, 4);
        assert_relative_eq!(mrab.time(), 0.1, epsilon = 1e-14);
        assert!(mrab.dt() <= 0.03);
    }
}
