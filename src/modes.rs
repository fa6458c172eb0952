use nalgebra::{DMatrix, DVector};

use crate::error::TLineError;

/// One physical mode expressed as a weighting of the port quantities
#[derive(Debug, Clone, PartialEq)]
pub struct ModeVector {
    pub name: String,
    /// One weight per port, indexed by port id (ground included)
    pub weights: DVector<f64>,
    /// Reference impedance scale of the mode
    pub normalization: f64,
}

/// Raw per-port-pair result of the external field solver, indexed by port id
#[derive(Debug, Clone, PartialEq)]
pub enum PortResult {
    Impedance(DMatrix<f64>),
    Admittance(DMatrix<f64>),
}

impl PortResult {
    pub fn matrix(&self) -> &DMatrix<f64> {
        match self {
            PortResult::Impedance(m) | PortResult::Admittance(m) => m,
        }
    }
}

/// Characteristic impedance recovered for one named mode
#[derive(Debug, Clone, PartialEq)]
pub struct ModeResult {
    pub name: String,
    pub impedance: f64,
    pub weights: DVector<f64>,
}

/// The ordered modes of one family, all over the same number of ports
#[derive(Debug, Clone, PartialEq)]
pub struct ModeSet {
    port_count: usize,
    modes: Vec<ModeVector>,
}

impl ModeSet {
    /// Builds the mode table of a family
    ///
    /// # Arguments
    /// * `port_count` - Number of ports allocated by the builder
    /// * `names` - One name per mode
    /// * `weights` - Row-major weights, `port_count` entries per mode
    /// * `normalizations` - One reference scale per mode
    ///
    /// # Returns
    /// The mode set, or a geometry error if the table shapes disagree or a
    /// mode has no non-zero weight
    pub fn new(
        port_count: usize,
        names: &[&str],
        weights: &[f64],
        normalizations: &[f64],
    ) -> Result<ModeSet, TLineError> {
        if port_count == 0
            || names.len() != normalizations.len()
            || weights.len() != names.len() * port_count
        {
            return Err(TLineError::Geometry(format!(
                "Mode table does not match {} ports: {} names, {} weights, {} normalizations",
                port_count,
                names.len(),
                weights.len(),
                normalizations.len()
            )));
        }

        let mut modes = Vec::with_capacity(names.len());
        for ((name, row), normalization) in names
            .iter()
            .zip(weights.chunks(port_count))
            .zip(normalizations)
        {
            if row.iter().all(|w| *w == 0.0) {
                return Err(TLineError::Geometry(format!(
                    "Mode '{name}' has no non-zero weight"
                )));
            }
            modes.push(ModeVector {
                name: name.to_string(),
                weights: DVector::from_vec(row.to_vec()),
                normalization: *normalization,
            });
        }

        Ok(ModeSet { port_count, modes })
    }

    pub fn port_count(&self) -> usize {
        self.port_count
    }

    pub fn modes(&self) -> &[ModeVector] {
        &self.modes
    }

    pub fn names(&self) -> Vec<&str> {
        self.modes.iter().map(|m| m.name.as_str()).collect()
    }

    /// Projects a solver result onto every mode
    ///
    /// For a mode `v` with normalization `n` the impedance is
    /// `n * (v' Z v) / (v' v)` for an impedance matrix and
    /// `n * (v' v) / (v' Y v)` for an admittance matrix.
    ///
    /// # Arguments
    /// * `result` - Square port matrix of size `port_count`
    ///
    /// # Returns
    /// One result per mode, in mode order
    pub fn project(&self, result: &PortResult) -> Result<Vec<ModeResult>, TLineError> {
        let matrix = result.matrix();
        if matrix.nrows() != self.port_count || matrix.ncols() != self.port_count {
            return Err(TLineError::Solver(format!(
                "Port result is {}x{}, expected {}x{}",
                matrix.nrows(),
                matrix.ncols(),
                self.port_count,
                self.port_count
            )));
        }

        let mut results = Vec::with_capacity(self.modes.len());

        for mode in &self.modes {
            let v = &mode.weights;
            let norm_sq = v.dot(v);
            let quadratic = v.dot(&(matrix * v));

            let (numerator, denominator) = match result {
                PortResult::Impedance(_) => (quadratic, norm_sq),
                PortResult::Admittance(_) => (norm_sq, quadratic),
            };
            if denominator == 0.0 {
                return Err(TLineError::Solver(format!(
                    "Port result is singular for mode '{}'",
                    mode.name
                )));
            }

            let impedance = mode.normalization * numerator / denominator;
            if !impedance.is_finite() {
                return Err(TLineError::Solver(format!(
                    "Mode '{}' has a non-finite impedance",
                    mode.name
                )));
            }

            results.push(ModeResult {
                name: mode.name.clone(),
                impedance,
                weights: v.clone(),
            });
        }

        Ok(results)
    }
}
