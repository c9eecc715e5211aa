use super::lstm::LstmParams;
use crate::constants::{ADAM_BETA1, ADAM_BETA2, ADAM_EPSILON};
use crate::Result;
use ndarray::{Array, Dimension, Zip};
use serde::{Deserialize, Serialize};

/// Adam optimizer with first and second moment estimates per parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    step: u64,
    first_moment: LstmParams,
    second_moment: LstmParams,
}

#[derive(Clone, Copy)]
struct StepScale {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    correction1: f64,
    correction2: f64,
}

fn update_tensor<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    scale: StepScale,
) {
    Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, m, v| {
            *m = scale.beta1 * *m + (1.0 - scale.beta1) * g;
            *v = scale.beta2 * *v + (1.0 - scale.beta2) * g * g;
            let m_hat = *m / scale.correction1;
            let v_hat = *v / scale.correction2;
            *p -= scale.learning_rate * m_hat / (v_hat.sqrt() + scale.epsilon);
        });
}

impl Adam {
    pub fn new(params: &LstmParams, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: ADAM_BETA1,
            beta2: ADAM_BETA2,
            epsilon: ADAM_EPSILON,
            step: 0,
            first_moment: params.zeros_like(),
            second_moment: params.zeros_like(),
        }
    }

    pub const fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Number of updates applied so far
    pub const fn steps(&self) -> u64 {
        self.step
    }

    /// Moment tensors must match the parameters they will update
    ///
    /// # Errors
    ///
    /// Returns `Error::ModelShape` when a moment tensor disagrees with the model
    pub fn validate(&self, input_size: usize, hidden_size: usize, output_size: usize) -> Result<()> {
        self.first_moment.validate(input_size, hidden_size, output_size)?;
        self.second_moment.validate(input_size, hidden_size, output_size)
    }

    /// Apply one bias-corrected update
    pub fn step(&mut self, params: &mut LstmParams, grads: &LstmParams) {
        self.step += 1;
        let t = self.step as f64;
        let scale = StepScale {
            learning_rate: self.learning_rate,
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
            correction1: 1.0 - self.beta1.powf(t),
            correction2: 1.0 - self.beta2.powf(t),
        };

        let m = &mut self.first_moment;
        let v = &mut self.second_moment;
        update_tensor(&mut params.w_ih, &grads.w_ih, &mut m.w_ih, &mut v.w_ih, scale);
        update_tensor(&mut params.w_hh, &grads.w_hh, &mut m.w_hh, &mut v.w_hh, scale);
        update_tensor(&mut params.bias, &grads.bias, &mut m.bias, &mut v.bias, scale);
        update_tensor(&mut params.w_out, &grads.w_out, &mut m.w_out, &mut v.w_out, scale);
        update_tensor(&mut params.b_out, &grads.b_out, &mut m.b_out, &mut v.b_out, scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        let mut params = LstmParams::init(4, 3, 2, 11);
        let before = params.clone();
        let mut grads = params.zeros_like();
        grads.b_out[0] = 0.5;
        grads.b_out[1] = -2.0;

        let mut adam = Adam::new(&params, 0.01);
        adam.step(&mut params, &grads);

        // bias-corrected Adam moves each touched weight by ~lr on the first step
        assert!((before.b_out[0] - params.b_out[0] - 0.01).abs() < 1e-6);
        assert!((params.b_out[1] - before.b_out[1] - 0.01).abs() < 1e-6);
        assert_eq!(before.w_ih, params.w_ih);
        assert_eq!(adam.steps(), 1);
    }
}
