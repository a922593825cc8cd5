use crate::network::Network;
use burn::module::ParamId;
use burn::optim::GradientsParams;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

/// Per-parameter gradients that persist between backward passes.
///
/// Every [backward](GradientBuffer::backward) adds into the stored gradients, so the buffer must be
/// [reset](GradientBuffer::zero_grad) before each training step, otherwise gradients from previous
/// batches leak into the update.
pub struct GradientBuffer {
    grads: GradientsParams,
}

impl Default for GradientBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl GradientBuffer {
    pub fn new() -> Self {
        Self {
            grads: GradientsParams::new(),
        }
    }

    /// Sets the gradient of every parameter of `model` to zero.
    pub fn zero_grad<AutoB: AutodiffBackend>(&mut self, model: &Network<AutoB>) {
        let mut grads = GradientsParams::new();
        for (_name, linear) in model.layers() {
            let weight = linear.weight.val().inner();
            grads.register(linear.weight.id, weight.zeros_like());
            if let Some(bias) = &linear.bias {
                grads.register(bias.id, bias.val().inner().zeros_like());
            }
        }
        self.grads = grads;
    }

    /// Computes the gradients of `loss` and adds them to the stored ones.
    pub fn backward<AutoB: AutodiffBackend>(
        &mut self,
        loss: Tensor<AutoB, 1>,
        model: &Network<AutoB>,
    ) {
        let mut fresh = GradientsParams::from_grads(loss.backward(), model);
        for (_name, linear) in model.layers() {
            self.accumulate::<AutoB::InnerBackend, 2>(&mut fresh, linear.weight.id);
            if let Some(bias) = &linear.bias {
                self.accumulate::<AutoB::InnerBackend, 1>(&mut fresh, bias.id);
            }
        }
    }

    fn accumulate<B: Backend, const D: usize>(&mut self, fresh: &mut GradientsParams, id: ParamId) {
        let Some(grad) = fresh.remove::<B, D>(id) else {
            return;
        };
        let sum = match self.grads.remove::<B, D>(id) {
            Some(previous) => previous + grad,
            None => grad,
        };
        self.grads.register(id, sum);
    }

    /// The stored gradient of a parameter, if any.
    pub fn get<B: Backend, const D: usize>(&self, id: ParamId) -> Option<Tensor<B, D>> {
        self.grads.get::<B, D>(id)
    }

    /// Number of parameters holding a gradient.
    pub fn len(&self) -> usize {
        self.grads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grads.is_empty()
    }

    /// A copy of the stored gradients, for an optimizer step.
    ///
    /// The buffer keeps its gradients until the next [reset](GradientBuffer::zero_grad).
    pub fn to_params<AutoB: AutodiffBackend>(&self, model: &Network<AutoB>) -> GradientsParams {
        let mut params = GradientsParams::new();
        for (_name, linear) in model.layers() {
            if let Some(grad) = self.get::<AutoB::InnerBackend, 2>(linear.weight.id) {
                params.register(linear.weight.id, grad);
            }
            if let Some(bias) = &linear.bias {
                if let Some(grad) = self.get::<AutoB::InnerBackend, 1>(bias.id) {
                    params.register(bias.id, grad);
                }
            }
        }
        params
    }
}
