use crate::error::Error;
use burn::prelude::*;
use rand::{Rng, RngCore};

/// Configuration to create a [Dropout](Dropout) layer using the [init function](DropoutConfig::init).
#[derive(Config, Debug)]
pub struct DropoutConfig {
    /// The probability of zeroing each activation. Must be in `[0, 1)`.
    pub prob: f64,
}

impl DropoutConfig {
    /// Initialize a new [dropout](Dropout) module.
    pub fn init(&self) -> crate::Result<Dropout> {
        if !(0.0..1.0).contains(&self.prob) {
            return Err(Error::InvalidConfig(format!(
                "dropout probability must be in [0, 1), got {}",
                self.prob
            )));
        }
        Ok(Dropout { prob: self.prob })
    }
}

/// Randomly zeroes activations during training.
///
/// Unlike [burn::nn::Dropout], the random source is supplied by the caller, and whether it
/// applies is decided by the caller rather than by the backend being differentiable.
#[derive(Module, Clone, Debug)]
pub struct Dropout {
    pub prob: f64,
}

impl Dropout {
    /// Applies the forward pass on the input tensor.
    ///
    /// Each activation is dropped with probability `prob`, and survivors are scaled by `1 / (1 - prob)`.
    /// Without a random source, this is the identity.
    ///
    /// # Shapes
    ///
    /// - input: `[..., any]`
    /// - output: `[..., any]`
    pub fn forward<B: Backend, const D: usize>(
        &self,
        input: Tensor<B, D>,
        rng: Option<&mut (dyn RngCore + '_)>,
    ) -> Tensor<B, D> {
        let Some(rng) = rng else {
            return input;
        };
        if self.prob == 0.0 {
            return input;
        }

        let shape = input.shape();
        let keep = (1.0 - self.prob) as f32;
        let mask: Vec<f32> = (0..shape.num_elements())
            .map(|_| {
                if rng.random_bool(self.prob) {
                    0.0
                } else {
                    1.0 / keep
                }
            })
            .collect();
        let mask = TensorData::new(mask, shape).convert::<B::FloatElem>();
        let mask = Tensor::<B, D>::from_data(mask, &input.device());

        input * mask
    }
}
