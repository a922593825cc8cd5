//! Feed-forward classifier: hidden affine layers with ReLU and dropout, followed by a
//! log-softmax output layer.

use crate::dropout::{Dropout, DropoutConfig};
use crate::error::Error;
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::tensor::activation::log_softmax;
use rand::RngCore;

#[derive(Config, Debug)]
pub struct NetworkConfig {
    /// Number of features of each flattened input.
    pub input_size: usize,
    /// Number of classes.
    pub output_size: usize,
    /// Widths of the hidden layers, in order. May be empty.
    #[config(default = "Vec::new()")]
    pub hidden_layers: Vec<usize>,
    /// Dropout probability applied after each hidden layer during training.
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl NetworkConfig {
    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::Result<Network<B>> {
        if self.input_size == 0 {
            return Err(Error::InvalidConfig("input_size must be non-zero".into()));
        }
        if self.output_size == 0 {
            return Err(Error::InvalidConfig("output_size must be non-zero".into()));
        }
        if let Some(i) = self.hidden_layers.iter().position(|width| *width == 0) {
            return Err(Error::InvalidConfig(format!(
                "hidden layer {i} must have a non-zero width"
            )));
        }

        let mut hidden = Vec::with_capacity(self.hidden_layers.len());
        let mut d_input = self.input_size;
        for &d_output in &self.hidden_layers {
            hidden.push(LinearConfig::new(d_input, d_output).init(device));
            d_input = d_output;
        }
        let output = LinearConfig::new(d_input, self.output_size).init(device);
        let dropout = DropoutConfig::new(self.dropout).init()?;

        Network::new(hidden, output, dropout)
    }
}

#[derive(Module, Debug)]
pub struct Network<B: Backend> {
    /// # Shape
    /// [n_hidden_layers]
    pub hidden: Vec<Linear<B>>,
    pub output: Linear<B>,
    pub activation: Relu,
    pub dropout: Dropout,
}

impl<B: Backend> Network<B> {
    /// Assembles a network from already initialized layers.
    ///
    /// Fails if a layer's input width differs from the previous layer's output width.
    pub fn new(
        hidden: Vec<Linear<B>>,
        output: Linear<B>,
        dropout: Dropout,
    ) -> crate::Result<Self> {
        let mut previous: Option<(String, usize)> = None;
        for (name, linear) in hidden
            .iter()
            .enumerate()
            .map(|(i, linear)| (format!("hidden.{i}"), linear))
            .chain(std::iter::once(("output".to_string(), &output)))
        {
            let [d_input, d_output] = linear.weight.dims();
            if let Some((previous_name, previous_output)) = previous {
                if d_input != previous_output {
                    return Err(Error::ShapeMismatch {
                        name: format!("{name}.weight (after {previous_name})"),
                        expected: vec![previous_output, d_output],
                        found: vec![d_input, d_output],
                    });
                }
            }
            previous = Some((name, d_output));
        }

        Ok(Self {
            hidden,
            output,
            activation: Relu::new(),
            dropout,
        })
    }

    pub fn input_size(&self) -> usize {
        let first = self.hidden.first().unwrap_or(&self.output);
        let [d_input, _d_output] = first.weight.dims();
        d_input
    }

    pub fn output_size(&self) -> usize {
        let [_d_input, d_output] = self.output.weight.dims();
        d_output
    }

    pub fn hidden_layers(&self) -> Vec<usize> {
        self.hidden
            .iter()
            .map(|linear| {
                let [_d_input, d_output] = linear.weight.dims();
                d_output
            })
            .collect()
    }

    /// The configuration that reconstructs this network's architecture.
    pub fn config(&self) -> NetworkConfig {
        NetworkConfig::new(self.input_size(), self.output_size())
            .with_hidden_layers(self.hidden_layers())
            .with_dropout(self.dropout.prob)
    }

    /// Named affine layers, in evaluation order.
    ///
    /// Names are `hidden.{i}` for the hidden layers and `output` for the last one.
    pub fn layers(&self) -> impl Iterator<Item = (String, &Linear<B>)> {
        self.hidden
            .iter()
            .enumerate()
            .map(|(i, linear)| (format!("hidden.{i}"), linear))
            .chain(std::iter::once(("output".to_string(), &self.output)))
    }

    /// Returns per-example log-probabilities over the classes.
    ///
    /// When `train` is set, dropout is applied with randomness drawn from `rng`.
    /// Otherwise `rng` is left untouched.
    ///
    /// # Shapes
    ///   - Input [batch_size, input_size]
    ///   - Output [batch_size, output_size]
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
        train: bool,
        rng: &mut dyn RngCore,
    ) -> Tensor<B, 2> {
        self.forward_with(input, train.then_some(rng))
    }

    /// Evaluation-mode forward pass (no dropout).
    ///
    /// # Shapes
    ///   - Input [batch_size, input_size]
    ///   - Output [batch_size, output_size]
    pub fn infer(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.forward_with(input, None)
    }

    fn forward_with(
        &self,
        input: Tensor<B, 2>,
        mut rng: Option<&mut (dyn RngCore + '_)>,
    ) -> Tensor<B, 2> {
        let [batch_size, input_size] = input.dims();
        assert_eq!(
            input_size,
            self.input_size(),
            "input width differs from the network's input_size"
        );

        let mut x = input;
        for linear in &self.hidden {
            x = linear.forward(x);
            x = self.activation.forward(x);
            x = self.dropout.forward(x, rng.as_deref_mut());
        }
        let x = self.output.forward(x);
        debug_assert_eq!([batch_size, self.output_size()], x.dims());

        log_softmax(x, 1)
    }

    /// Class probabilities in evaluation mode.
    ///
    /// # Shapes
    ///   - Input [batch_size, input_size]
    ///   - Output [batch_size, output_size]
    pub fn probabilities(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.infer(input).exp()
    }

    /// Most likely class of each example, in evaluation mode.
    ///
    /// # Shapes
    ///   - Input [batch_size, input_size]
    ///   - Output [batch_size]
    pub fn predict(&self, input: Tensor<B, 2>) -> Tensor<B, 1, Int> {
        let [batch_size, _input_size] = input.dims();
        self.infer(input).argmax(1).reshape([batch_size])
    }
}
