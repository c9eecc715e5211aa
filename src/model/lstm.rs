use crate::{Error, Result};
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Parameters of a single-layer LSTM followed by a linear head.
///
/// Gate rows in `w_ih`, `w_hh` and `bias` are stacked as input, forget,
/// cell, output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmParams {
    pub(crate) w_ih: Array2<f64>,
    pub(crate) w_hh: Array2<f64>,
    pub(crate) bias: Array1<f64>,
    pub(crate) w_out: Array2<f64>,
    pub(crate) b_out: Array1<f64>,
}

/// Activations kept from one timestep for backpropagation
#[derive(Debug, Clone)]
struct StepCache {
    x: Array1<f64>,
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    input_gate: Array1<f64>,
    forget_gate: Array1<f64>,
    cell_candidate: Array1<f64>,
    output_gate: Array1<f64>,
    tanh_c: Array1<f64>,
}

/// Result of a forward pass over a whole sequence
#[derive(Debug, Clone)]
pub struct ForwardPass {
    steps: Vec<StepCache>,
    h_last: Array1<f64>,
    output: Array1<f64>,
}

impl ForwardPass {
    pub fn output(&self) -> &Array1<f64> {
        &self.output
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    a.view()
        .insert_axis(Axis(1))
        .dot(&b.view().insert_axis(Axis(0)))
}

fn uniform2(rng: &mut StdRng, shape: (usize, usize), bound: f64) -> Array2<f64> {
    Array2::from_shape_fn(shape, |_| rng.gen_range(-bound..bound))
}

fn uniform1(rng: &mut StdRng, len: usize, bound: f64) -> Array1<f64> {
    Array1::from_shape_fn(len, |_| rng.gen_range(-bound..bound))
}

impl LstmParams {
    /// Initialise uniformly in `±1/sqrt(hidden)` from a seeded generator
    pub fn init(input_size: usize, hidden_size: usize, output_size: usize, seed: u64) -> Self {
        let bound = 1.0 / (hidden_size.max(1) as f64).sqrt();
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            w_ih: uniform2(&mut rng, (4 * hidden_size, input_size), bound),
            w_hh: uniform2(&mut rng, (4 * hidden_size, hidden_size), bound),
            bias: uniform1(&mut rng, 4 * hidden_size, bound),
            w_out: uniform2(&mut rng, (output_size, hidden_size), bound),
            b_out: uniform1(&mut rng, output_size, bound),
        }
    }

    pub fn zeros_like(&self) -> Self {
        Self {
            w_ih: Array2::zeros(self.w_ih.raw_dim()),
            w_hh: Array2::zeros(self.w_hh.raw_dim()),
            bias: Array1::zeros(self.bias.raw_dim()),
            w_out: Array2::zeros(self.w_out.raw_dim()),
            b_out: Array1::zeros(self.b_out.raw_dim()),
        }
    }

    pub fn input_size(&self) -> usize {
        self.w_ih.ncols()
    }

    pub fn hidden_size(&self) -> usize {
        self.w_hh.ncols()
    }

    pub fn output_size(&self) -> usize {
        self.w_out.nrows()
    }

    /// Check every tensor against the expected architecture
    ///
    /// # Errors
    ///
    /// Returns `Error::ModelShape` naming the first mismatching tensor
    pub fn validate(&self, input_size: usize, hidden_size: usize, output_size: usize) -> Result<()> {
        let gates = 4 * hidden_size;
        let checks: [(&str, &[usize], Vec<usize>); 5] = [
            ("w_ih", self.w_ih.shape(), vec![gates, input_size]),
            ("w_hh", self.w_hh.shape(), vec![gates, hidden_size]),
            ("bias", self.bias.shape(), vec![gates]),
            ("w_out", self.w_out.shape(), vec![output_size, hidden_size]),
            ("b_out", self.b_out.shape(), vec![output_size]),
        ];
        for (name, actual, expected) in checks {
            if actual != expected.as_slice() {
                return Err(Error::ModelShape(format!(
                    "{name} has shape {actual:?}, expected {expected:?}"
                )));
            }
        }
        Ok(())
    }

    /// Run the sequence (one row per timestep) from a zero hidden and cell state
    pub fn forward(&self, inputs: ArrayView2<'_, f64>) -> ForwardPass {
        let hidden = self.hidden_size();
        let mut h_t = Array1::<f64>::zeros(hidden);
        let mut c_t = Array1::<f64>::zeros(hidden);
        let mut steps = Vec::with_capacity(inputs.nrows());

        for x in inputs.rows() {
            let z = self.w_ih.dot(&x) + self.w_hh.dot(&h_t) + &self.bias;
            let input_gate = z.slice(s![0..hidden]).mapv(sigmoid);
            let forget_gate = z.slice(s![hidden..2 * hidden]).mapv(sigmoid);
            let cell_candidate = z.slice(s![2 * hidden..3 * hidden]).mapv(f64::tanh);
            let output_gate = z.slice(s![3 * hidden..4 * hidden]).mapv(sigmoid);

            let c_next = &forget_gate * &c_t + &input_gate * &cell_candidate;
            let tanh_c = c_next.mapv(f64::tanh);
            let h_next = &output_gate * &tanh_c;

            steps.push(StepCache {
                x: x.to_owned(),
                h_prev: h_t,
                c_prev: c_t,
                input_gate,
                forget_gate,
                cell_candidate,
                output_gate,
                tanh_c,
            });
            h_t = h_next;
            c_t = c_next;
        }

        let output = self.w_out.dot(&h_t) + &self.b_out;
        ForwardPass {
            steps,
            h_last: h_t,
            output,
        }
    }

    /// Backpropagate `d_output` (gradient of the loss w.r.t. the head output) through time
    pub fn backward(&self, pass: &ForwardPass, d_output: &Array1<f64>) -> Self {
        let hidden = self.hidden_size();
        let mut grads = self.zeros_like();
        grads.w_out = outer(d_output, &pass.h_last);
        grads.b_out = d_output.clone();

        let mut dh = self.w_out.t().dot(d_output);
        let mut dc = Array1::<f64>::zeros(hidden);
        let mut dz = Array1::<f64>::zeros(4 * hidden);

        for step in pass.steps.iter().rev() {
            let d_output_gate = &dh * &step.tanh_c;
            dc = dc + &dh * &step.output_gate * step.tanh_c.mapv(|t| 1.0 - t * t);

            let d_input_gate = &dc * &step.cell_candidate;
            let d_forget_gate = &dc * &step.c_prev;
            let d_candidate = &dc * &step.input_gate;

            dz.slice_mut(s![0..hidden])
                .assign(&(d_input_gate * step.input_gate.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![hidden..2 * hidden])
                .assign(&(d_forget_gate * step.forget_gate.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![2 * hidden..3 * hidden])
                .assign(&(d_candidate * step.cell_candidate.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![3 * hidden..4 * hidden])
                .assign(&(d_output_gate * step.output_gate.mapv(|v| v * (1.0 - v))));

            grads.w_ih += &outer(&dz, &step.x);
            grads.w_hh += &outer(&dz, &step.h_prev);
            grads.bias += &dz;

            dh = self.w_hh.t().dot(&dz);
            dc = dc * &step.forget_gate;
        }

        grads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sequence() -> Array2<f64> {
        array![[0.5, 0.4, 0.2, 0.3], [0.6, 0.4, 0.2, 0.3], [0.7, 0.45, 0.2, 0.3]]
    }

    fn mse(params: &LstmParams, inputs: &Array2<f64>, target: &Array1<f64>) -> f64 {
        let out = params.forward(inputs.view()).output;
        (&out - target).mapv(|d| d * d).mean().unwrap_or(0.0)
    }

    #[test]
    fn test_shapes() {
        let params = LstmParams::init(4, 8, 2, 1);
        assert!(params.validate(4, 8, 2).is_ok());
        assert!(params.validate(4, 16, 2).is_err());
        assert_eq!(params.forward(sequence().view()).output().len(), 2);
    }

    #[test]
    fn test_same_seed_same_weights() {
        assert_eq!(LstmParams::init(4, 8, 2, 7), LstmParams::init(4, 8, 2, 7));
        assert_ne!(LstmParams::init(4, 8, 2, 7), LstmParams::init(4, 8, 2, 8));
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let params = LstmParams::init(4, 5, 2, 3);
        let inputs = sequence();
        let target = array![0.05, -0.06];

        let pass = params.forward(inputs.view());
        let d_output = (pass.output() - &target).mapv(|d| d * 2.0 / 2.0);
        let grads = params.backward(&pass, &d_output);

        let eps = 1e-6;
        let probes = [(0usize, 0usize), (3, 2), (7, 1), (12, 3), (19, 0)];
        for (row, col) in probes {
            let mut plus = params.clone();
            plus.w_ih[[row, col]] += eps;
            let mut minus = params.clone();
            minus.w_ih[[row, col]] -= eps;
            let numeric = (mse(&plus, &inputs, &target) - mse(&minus, &inputs, &target)) / (2.0 * eps);
            let analytic = grads.w_ih[[row, col]];
            assert!(
                (numeric - analytic).abs() < 1e-6,
                "w_ih[{row},{col}]: numeric {numeric} analytic {analytic}"
            );
        }

        for (row, col) in [(0usize, 0usize), (9, 4), (15, 2)] {
            let mut plus = params.clone();
            plus.w_hh[[row, col]] += eps;
            let mut minus = params.clone();
            minus.w_hh[[row, col]] -= eps;
            let numeric = (mse(&plus, &inputs, &target) - mse(&minus, &inputs, &target)) / (2.0 * eps);
            assert!((numeric - grads.w_hh[[row, col]]).abs() < 1e-6);
        }

        let mut plus = params.clone();
        plus.b_out[1] += eps;
        let mut minus = params.clone();
        minus.b_out[1] -= eps;
        let numeric = (mse(&plus, &inputs, &target) - mse(&minus, &inputs, &target)) / (2.0 * eps);
        assert!((numeric - grads.b_out[1]).abs() < 1e-6);
    }
}
