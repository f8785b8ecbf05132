//! Reference operator tables for every polynomial degree.
//!
//! Built once at setup and shared read-only by all kernels.

use super::bernstein::{BernsteinBasis, derivative_matrix};
use super::cubature::CubatureOps;
use super::lift::{BbLift, SparseRows, face_extraction};
use super::modal::BbVandermonde;
use super::trace::TraceProjector;
use crate::error::{MrabError, Result};
use crate::types::Dimension;

/// Operators for one polynomial degree.
#[derive(Clone, Debug)]
pub struct DegreeOps {
    /// Polynomial degree
    pub degree: usize,
    /// Volume nodes
    pub np: usize,
    /// Nodes per face
    pub nfp: usize,
    /// Barycentric coordinates of the volume domain points
    pub domain_points: Vec<Vec<f64>>,
    /// Volume node of each face node, per face
    pub face_nodes: Vec<Vec<usize>>,
    /// Reference derivatives ∂/∂r, ∂/∂s (, ∂/∂t)
    pub derivatives: Vec<SparseRows>,
    /// Surface lift
    pub lift: BbLift,
    /// Cubature interpolation and projection
    pub cubature: CubatureOps,
    /// Face nodal-to-Bernstein map
    pub face_vandermonde: BbVandermonde,
    /// Volume nodal-to-Bernstein map
    pub volume_vandermonde: BbVandermonde,
}

impl DegreeOps {
    fn new(dim: Dimension, n: usize) -> Result<Self> {
        let d = dim.n_dims();
        let volume = BernsteinBasis::new(d, n);
        let face = BernsteinBasis::new(d - 1, n);

        let derivatives = (0..d)
            .map(|axis| SparseRows::from_dense(&derivative_matrix(d, n, axis), 1e-14))
            .collect();

        Ok(Self {
            degree: n,
            np: volume.len(),
            nfp: face.len(),
            domain_points: (0..volume.len()).map(|i| volume.domain_point(i)).collect(),
            face_nodes: face_extraction(dim, n, &volume, &face),
            derivatives,
            lift: BbLift::new(dim, n)?,
            cubature: CubatureOps::new(dim, n)?,
            face_vandermonde: BbVandermonde::new(d - 1, n)?,
            volume_vandermonde: BbVandermonde::new(d, n)?,
        })
    }
}

/// All reference operators for degrees `1..=n_max`.
#[derive(Clone, Debug)]
pub struct ReferenceTables {
    dim: Dimension,
    n_max: usize,
    degrees: Vec<DegreeOps>,
    trace: TraceProjector,
}

impl ReferenceTables {
    /// Build tables for a dimension up to degree `n_max`.
    pub fn new(dim: Dimension, n_max: usize) -> Result<Self> {
        if n_max == 0 {
            return Err(MrabError::InvalidDegree { degree: 0, max: n_max });
        }
        let degrees = (1..=n_max)
            .map(|n| DegreeOps::new(dim, n))
            .collect::<Result<Vec<_>>>()?;
        let trace = TraceProjector::new(dim.n_dims() - 1, n_max)?;

        log::debug!(
            "Reference tables {:?} up to N={}: EL nnz/row at N_max = {}",
            dim,
            n_max,
            degrees.last().map(|d| d.lift.max_nnz()).unwrap_or(0)
        );

        Ok(Self {
            dim,
            n_max,
            degrees,
            trace,
        })
    }

    /// Spatial dimension.
    pub fn dim(&self) -> Dimension {
        self.dim
    }

    /// Highest degree.
    pub fn n_max(&self) -> usize {
        self.n_max
    }

    /// Largest volume node count.
    pub fn np_max(&self) -> usize {
        self.dim.np(self.n_max)
    }

    /// Largest face node count.
    pub fn nfp_max(&self) -> usize {
        self.dim.nfp(self.n_max)
    }

    /// Largest cubature size.
    pub fn n_cub_max(&self) -> usize {
        self.degree(self.n_max).cubature.n_cub()
    }

    /// Operators of degree `n` (1..=n_max).
    ///
    /// # Panics
    /// If `n` is outside `1..=n_max`. Degrees are validated when the mesh
    /// topology is built.
    #[inline]
    pub fn degree(&self, n: usize) -> &DegreeOps {
        &self.degrees[n - 1]
    }

    /// Trace raise/lower tables.
    #[inline]
    pub fn trace(&self) -> &TraceProjector {
        &self.trace
    }

    /// Check that a degree is supported.
    pub fn check_degree(&self, n: usize) -> Result<()> {
        if n == 0 || n > self.n_max {
            Err(MrabError::InvalidDegree {
                degree: n,
                max: self.n_max,
            })
        } else {
            Ok(())
        }
    }
}
