//! MRAB level bucketing.
//!
//! Elements are grouped by their stable time step: level l advances with
//! step 2^l dt where dt is the global minimum. Face neighbours are kept
//! within one level of each other so every level only exchanges history
//! with adjacent levels.

use super::simplex::SimplexMesh;
use crate::error::{MrabError, Result};
use crate::parallel::HaloExchange;
use crate::types::{ElementIndex, LevelIndex};

/// Level builder parameters.
#[derive(Clone, Debug)]
pub struct LevelConfig {
    /// Upper bound on the number of levels
    pub max_levels: usize,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self { max_levels: 100 }
    }
}

impl LevelConfig {
    /// Create config with a level cap.
    pub fn new(max_levels: usize) -> Self {
        Self { max_levels }
    }
}

/// Elements of one level.
#[derive(Clone, Debug, Default)]
pub struct LevelElements {
    /// Regular (non-PML) local elements
    pub element_ids: Vec<ElementIndex>,
    /// PML local elements
    pub pml_element_ids: Vec<ElementIndex>,
    /// Dense PML numbering of `pml_element_ids`
    pub pml_ids: Vec<usize>,
    /// Halo elements at this level
    pub halo_ids: Vec<ElementIndex>,
}

impl LevelElements {
    /// Regular plus PML elements.
    pub fn n_local(&self) -> usize {
        self.element_ids.len() + self.pml_element_ids.len()
    }
}

/// Coarse-step schedule for a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeSchedule {
    /// Adjusted finest step
    pub dt: f64,
    /// Number of coarsest-level steps
    pub n_steps: usize,
    /// Step of the coarsest level, 2^(L-1) dt
    pub coarse_dt: f64,
}

/// Level assignment and per-level element lists.
#[derive(Clone, Debug)]
pub struct MrabLevels {
    level: Vec<usize>,
    n_levels: usize,
    dt: f64,
    per_level: Vec<LevelElements>,
    pml_index: Vec<Option<usize>>,
    n_pml: usize,
}

impl MrabLevels {
    /// Assign levels from per-element stable time steps.
    ///
    /// # Arguments
    /// * `mesh` - Mesh providing face neighbours
    /// * `e_to_dt` - Stable step of every local element
    /// * `config` - Level cap
    /// * `halo` - Halo exchanger for neighbour levels and reductions
    pub fn build<H: HaloExchange>(
        mesh: &SimplexMesh,
        e_to_dt: &[f64],
        config: &LevelConfig,
        halo: &mut H,
    ) -> Result<Self> {
        let n_elements = mesh.n_elements();
        if e_to_dt.len() != n_elements {
            return Err(MrabError::dimension_mismatch(
                format!("{} time steps", n_elements),
                e_to_dt.len().to_string(),
            ));
        }
        if let Some(&bad) = e_to_dt.iter().find(|dt| !(dt.is_finite() && **dt > 0.0)) {
            return Err(MrabError::InvalidTimeStep(bad));
        }
        if config.max_levels == 0 {
            return Err(MrabError::InvalidConfig("max_levels must be >= 1".into()));
        }

        let local_min = e_to_dt.iter().copied().fold(f64::INFINITY, f64::min);
        let dt = halo.all_reduce_min(local_min);

        let mut level = vec![0; mesh.n_total()];
        for (e, &dte) in e_to_dt.iter().enumerate() {
            let lev = (dte / dt).log2().floor().max(0.0) as usize;
            level[e] = lev.min(config.max_levels - 1);
        }

        // Lower levels until face neighbours differ by at most one.
        let nf = mesh.dim().n_faces();
        loop {
            halo.exchange_indices(&mut level, 1);
            let mut changed = 0;
            for e in ElementIndex::iter(n_elements) {
                for f in 0..nf {
                    if let Some(ep) = mesh.neighbor(e, f) {
                        if level[e.get()] > level[ep.get()] + 1 {
                            level[e.get()] = level[ep.get()] + 1;
                            changed += 1;
                        }
                    }
                }
            }
            if halo.all_reduce_sum(changed) == 0 {
                break;
            }
        }

        let local_max = level[..n_elements].iter().copied().max().unwrap_or(0);
        let n_levels = halo.all_reduce_max(local_max as f64) as usize + 1;

        let mut per_level = vec![LevelElements::default(); n_levels];
        for e in ElementIndex::iter(mesh.n_total()) {
            let lev = level[e.get()].min(n_levels - 1);
            if e.get() < n_elements {
                per_level[lev].element_ids.push(e);
            } else {
                per_level[lev].halo_ids.push(e);
            }
        }

        log::info!("MRAB: {} levels, dt = {:e}", n_levels, dt);
        for (lev, elems) in per_level.iter().enumerate() {
            let count = halo.all_reduce_sum(elems.element_ids.len());
            log::info!("  level {}: {} elements", lev, count);
        }

        Ok(Self {
            level,
            n_levels,
            dt,
            per_level,
            pml_index: vec![None; mesh.n_total()],
            n_pml: 0,
        })
    }

    /// Move PML elements out of the regular lists and number them densely.
    pub fn split_pml(&mut self, is_pml: impl Fn(ElementIndex) -> bool) {
        self.pml_index.fill(None);
        let mut next = 0;
        for elems in &mut self.per_level {
            let mut all: Vec<ElementIndex> = elems
                .element_ids
                .drain(..)
                .chain(elems.pml_element_ids.drain(..))
                .collect();
            all.sort_unstable();
            elems.pml_ids.clear();
            for e in all {
                if is_pml(e) {
                    self.pml_index[e.get()] = Some(next);
                    elems.pml_element_ids.push(e);
                    elems.pml_ids.push(next);
                    next += 1;
                } else {
                    elems.element_ids.push(e);
                }
            }
        }
        self.n_pml = next;
        log::debug!("MRAB: {} PML elements split from level lists", next);
    }

    /// Level of element `e`.
    #[inline]
    pub fn level(&self, e: ElementIndex) -> LevelIndex {
        LevelIndex::new(self.level[e.get()])
    }

    /// Raw level array (locals then halo).
    pub fn levels(&self) -> &[usize] {
        &self.level
    }

    /// Number of levels.
    pub fn n_levels(&self) -> usize {
        self.n_levels
    }

    /// Finest step.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Elements of one level.
    pub fn elements(&self, lev: LevelIndex) -> &LevelElements {
        &self.per_level[lev.get()]
    }

    /// Dense PML id of `e`.
    #[inline]
    pub fn pml_index(&self, e: ElementIndex) -> Option<usize> {
        self.pml_index[e.get()]
    }

    /// Number of local PML elements.
    pub fn n_pml(&self) -> usize {
        self.n_pml
    }

    /// Number of coarse steps reaching `final_time`, with `dt` shrunk so the
    /// run ends exactly on it.
    pub fn schedule(&self, final_time: f64) -> Result<TimeSchedule> {
        if !(final_time.is_finite() && final_time > 0.0) {
            return Err(MrabError::InvalidTimeStep(final_time));
        }
        let factor = LevelIndex::new(self.n_levels - 1).step_factor();
        let n_steps = (final_time / (factor * self.dt)).ceil().max(1.0) as usize;
        let coarse_dt = final_time / n_steps as f64;
        Ok(TimeSchedule {
            dt: coarse_dt / factor,
            n_steps,
            coarse_dt,
        })
    }
}
