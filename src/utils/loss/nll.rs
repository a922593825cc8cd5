use burn::module::Module;
use burn::nn::loss::Reduction;
use burn::prelude::*;

/// Calculate the negative log likelihood loss from log-probabilities and class targets.
///
/// `loss = -(1 / batch_size) * sum(log_probs[i, targets[i]])`
#[derive(Module, Clone, Debug)]
pub struct NllLoss;

impl Default for NllLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl NllLoss {
    /// Create the criterion.
    pub fn new() -> Self {
        Self
    }

    /// Compute the criterion on the input tensor.
    ///
    /// # Shapes
    ///
    /// - log_probs: [batch_size, num_classes]
    /// - targets: [batch_size]
    pub fn forward<B: Backend>(
        &self,
        log_probs: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
        reduction: Reduction,
    ) -> Tensor<B, 1> {
        let tensor = self.forward_no_reduction(log_probs, targets);
        match reduction {
            Reduction::Mean | Reduction::Auto => tensor.mean(),
            Reduction::Sum => tensor.sum(),
        }
    }

    /// Compute the per-example loss without reducing.
    ///
    /// # Shapes
    ///
    /// - log_probs: [batch_size, num_classes]
    /// - targets: [batch_size]
    /// - output: [batch_size]
    pub fn forward_no_reduction<B: Backend>(
        &self,
        log_probs: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> Tensor<B, 1> {
        let [batch_size, _num_classes] = log_probs.dims();
        assert_eq!([batch_size], targets.dims());

        let picked = log_probs.gather(1, targets.reshape([batch_size, 1]));
        picked.reshape([batch_size]).neg()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn averages_the_correct_class_log_probs() {
        let device = Default::default();
        let log_probs = Tensor::<B, 2>::from_floats(
            [[-0.1, -2.0, -3.0], [-1.0, -0.5, -4.0]],
            &device,
        );
        let targets = Tensor::<B, 1, Int>::from_ints([0, 2], &device);

        let mean = NllLoss::new()
            .forward(log_probs.clone(), targets.clone(), Reduction::Mean)
            .into_scalar();
        assert!((mean - 2.05).abs() < 1e-6, "{mean}");

        let sum = NllLoss::new()
            .forward(log_probs, targets, Reduction::Sum)
            .into_scalar();
        assert!((sum - 4.1).abs() < 1e-6, "{sum}");
    }
}
