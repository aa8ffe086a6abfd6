//! A small Gaussian process for modeling configuration runtimes.

use crate::options::AcquisitionKind;
use nalgebra::{DMatrix, DVector};

/// Gaussian process with zero prior mean, squared-exponential kernel and
/// fixed observation noise.
///
/// Evidence is a set of input/output pairs of a blackbox function; the model
/// predicts mean and variance of the output at unseen inputs.
#[derive(Debug)]
pub struct GaussianProcess {
    inputs: Vec<DVector<f64>>,
    outputs: Vec<f64>,
    /// Prior variance.
    theta: f64,
    /// Per-dimension distance scaling applied inside the kernel.
    dim_scale: DVector<f64>,
    /// Fixed noise added to the covariance diagonal.
    sigma: f64,
    cov_mat_inv: DMatrix<f64>,
    weights: DVector<f64>,
}

impl GaussianProcess {
    /// Fresh process.
    ///
    /// # Arguments
    /// * `theta` - Prior variance.
    /// * `dim_scale` - Scales each input dimension before the kernel.
    /// * `sigma` - Fixed observation noise.
    pub fn new(theta: f64, dim_scale: Vec<f64>, sigma: f64) -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            theta,
            dim_scale: DVector::from_vec(dim_scale),
            sigma,
            cov_mat_inv: DMatrix::zeros(0, 0),
            weights: DVector::zeros(0),
        }
    }

    /// Discard all evidence.
    pub fn clear(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
        self.cov_mat_inv = DMatrix::zeros(0, 0);
        self.weights = DVector::zeros(0);
    }

    /// Number of stored evidence pairs.
    pub fn num_evidence(&self) -> usize {
        self.inputs.len()
    }

    fn kernel(&self, a: &DVector<f64>, b: &DVector<f64>) -> f64 {
        let r = a - b;
        let scaled = r.component_mul(&r).dot(&self.dim_scale);
        self.theta * (-scaled).exp()
    }

    fn kernel_vector(&self, input: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.inputs.len(),
            self.inputs.iter().map(|stored| self.kernel(input, stored)),
        )
    }

    /// Record one observation of the blackbox function.
    pub fn add_evidence(&mut self, input: DVector<f64>, output: f64) {
        self.inputs.push(input);
        self.outputs.push(output);
        let n = self.inputs.len();
        let mut cov = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                cov[(i, j)] = self.kernel(&self.inputs[i], &self.inputs[j]);
            }
            // fixed noise on the diagonal keeps the matrix invertible
            cov[(i, i)] += self.sigma;
        }
        match cov.try_inverse() {
            Some(inv) => {
                self.weights = &inv * DVector::from_vec(self.outputs.clone());
                self.cov_mat_inv = inv;
            }
            None => {
                tracing::warn!(
                    evidence = n,
                    "covariance matrix not invertible, dropping newest evidence"
                );
                self.inputs.pop();
                self.outputs.pop();
            }
        }
    }

    /// Expected output at `input` given the evidence so far.
    pub fn predict_mean(&self, input: &DVector<f64>) -> f64 {
        if self.inputs.is_empty() {
            return 0.0;
        }
        self.kernel_vector(input).dot(&self.weights)
    }

    /// Variance of the prediction at `input`.
    pub fn predict_var(&self, input: &DVector<f64>) -> f64 {
        if self.inputs.is_empty() {
            return self.kernel(input, input);
        }
        let k = self.kernel_vector(input);
        self.kernel(input, input) - k.dot(&(&self.cov_mat_inv * &k))
    }

    /// Evaluate the acquisition function at `input`.
    pub fn acquisition(&self, kind: AcquisitionKind, input: &DVector<f64>) -> f64 {
        match kind {
            AcquisitionKind::UpperConfidenceBound => {
                self.predict_mean(input) + self.predict_var(input).max(0.0).sqrt()
            }
            AcquisitionKind::LowerConfidenceBound => {
                self.predict_mean(input) - self.predict_var(input).max(0.0).sqrt()
            }
            AcquisitionKind::Mean => self.predict_mean(input),
        }
    }

    /// Index of the sample minimizing the acquisition function.
    pub fn sample_acquisition_min(
        &self,
        kind: AcquisitionKind,
        samples: &[DVector<f64>],
    ) -> Option<usize> {
        samples
            .iter()
            .enumerate()
            .map(|(i, s)| (i, self.acquisition(kind, s)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn v(values: &[f64]) -> DVector<f64> {
        DVector::from_vec(values.to_vec())
    }

    #[test]
    fn test_prediction_recovers_evidence() {
        let mut gp = GaussianProcess::new(1.0, vec![1.0], 1e-9);
        gp.add_evidence(v(&[0.0]), 2.0);
        gp.add_evidence(v(&[1.0]), 4.0);
        gp.add_evidence(v(&[2.0]), 3.0);
        // near-noiseless GP reproduces its own evidence
        assert_relative_eq!(gp.predict_mean(&v(&[1.0])), 4.0, epsilon = 1e-4);
        // variance collapses at observed points
        assert!(gp.predict_var(&v(&[1.0])).abs() < 1e-4);
        // and grows far away
        assert!(gp.predict_var(&v(&[10.0])) > 0.5);
    }

    #[test]
    fn test_acquisition_min_prefers_low_mean() {
        let mut gp = GaussianProcess::new(1.0, vec![1.0], 1e-6);
        gp.add_evidence(v(&[0.0]), 10.0);
        gp.add_evidence(v(&[1.0]), 1.0);
        let samples = vec![v(&[0.0]), v(&[1.0])];
        let best = gp
            .sample_acquisition_min(AcquisitionKind::Mean, &samples)
            .unwrap();
        assert_eq!(best, 1);
    }

    #[test]
    fn test_empty_process_predicts_prior() {
        let gp = GaussianProcess::new(2.0, vec![1.0], 1e-6);
        assert_relative_eq!(gp.predict_mean(&v(&[3.0])), 0.0);
        assert_relative_eq!(gp.predict_var(&v(&[3.0])), 2.0);
    }
}
