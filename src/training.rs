use crate::data::{ClassBatch, ClassBatcher, ClassItem};
use crate::grads::GradientBuffer;
use crate::network::Network;
use crate::utils::loss::NllLoss;
use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use burn::data::dataset::Dataset;
use burn::module::AutodiffModule;
use burn::nn::loss::Reduction;
use burn::optim::{AdamConfig, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use rand::RngCore;
use std::sync::Arc;

#[derive(Config)]
pub struct TrainingConfig {
    pub optimizer: AdamConfig,
    #[config(default = 2)]
    pub num_epochs: usize,
    #[config(default = 64)]
    pub batch_size: usize,
    /// Loader threads. With 0, batches are built on the calling thread.
    #[config(default = 0)]
    pub num_workers: usize,
    #[config(default = 1e-3)]
    pub lr: f64,
    /// Seeds the training data shuffling and the dropout masks.
    #[config(default = 42)]
    pub seed: u64,
    /// Also run validation every this many training steps.
    #[config(default = "None")]
    pub log_every: Option<usize>,
}

impl TrainingConfig {
    /// Loader over the training split: shuffled with [seed](TrainingConfig::seed).
    pub fn train_dataloader<B: Backend>(
        &self,
        dataset: impl Dataset<ClassItem> + 'static,
        device: &B::Device,
    ) -> Dataloader<B> {
        let mut builder = DataLoaderBuilder::new(ClassBatcher::default())
            .batch_size(self.batch_size)
            .shuffle(self.seed)
            .set_device(device.clone());
        // a multi-threaded loader needs at least one thread
        if self.num_workers > 0 {
            builder = builder.num_workers(self.num_workers);
        }
        builder.build(dataset)
    }

    /// Loader over a held-out split, in dataset order.
    pub fn valid_dataloader<B: Backend>(
        &self,
        dataset: impl Dataset<ClassItem> + 'static,
        device: &B::Device,
    ) -> Dataloader<B> {
        let mut builder = DataLoaderBuilder::new(ClassBatcher::default())
            .batch_size(self.batch_size)
            .set_device(device.clone());
        if self.num_workers > 0 {
            builder = builder.num_workers(self.num_workers);
        }
        builder.build(dataset)
    }
}

pub type Dataloader<B> = Arc<dyn DataLoader<B, ClassBatch<B>>>;

/// Averaged metrics of an evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalSummary {
    /// Mean of the per-batch mean losses.
    pub loss: f64,
    /// Fraction of examples whose most likely class is the target, in between 0 and 1.
    pub accuracy: f64,
    pub num_items: usize,
}

/// Evaluation run in the middle of an epoch, every [log_every](TrainingConfig::log_every) steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSummary {
    /// Training steps done so far in the epoch.
    pub step: usize,
    /// Mean of the training losses of those steps.
    pub train_loss: f64,
    pub valid: EvalSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    pub epoch: usize,
    /// Mean of the per-batch training losses.
    pub train_loss: f64,
    pub valid: Option<EvalSummary>,
    pub steps: Vec<StepSummary>,
}

/// Trains `model` for [num_epochs](TrainingConfig::num_epochs), returning the trained model and
/// one summary per epoch.
///
/// Dropout masks are drawn from `rng`. When `dataloader_valid` is given, each epoch ends with an
/// evaluation pass over it.
pub fn train<AutoB, O>(
    mut model: Network<AutoB>,
    optim: &mut O,
    config: &TrainingConfig,
    dataloader_train: Dataloader<AutoB>,
    dataloader_valid: Option<Dataloader<AutoB::InnerBackend>>,
    rng: &mut dyn RngCore,
) -> (Network<AutoB>, Vec<EpochSummary>)
where
    AutoB: AutodiffBackend,
    O: Optimizer<Network<AutoB>, AutoB>,
{
    log::info!(
        "Training {} epochs over {} items",
        config.num_epochs,
        dataloader_train.num_items()
    );
    let mut grads = GradientBuffer::new();
    let mut history = Vec::with_capacity(config.num_epochs);

    for epoch in 1..config.num_epochs + 1 {
        let (train_loss, steps);
        (model, train_loss, steps) = epoch_train(
            Arc::clone(&dataloader_train),
            dataloader_valid.clone(),
            model,
            optim,
            &mut grads,
            config,
            epoch,
            rng,
        );

        let valid = dataloader_valid
            .as_ref()
            .map(|dataloader| evaluate(&model.valid(), dataloader));

        match &valid {
            Some(valid) => log::info!(
                "Epoch {epoch}/{}, Training Loss {train_loss:.3}, Test Loss {:.3}, Test Accuracy {:.3}",
                config.num_epochs,
                valid.loss,
                valid.accuracy,
            ),
            None => log::info!(
                "Epoch {epoch}/{}, Training Loss {train_loss:.3}",
                config.num_epochs
            ),
        }

        history.push(EpochSummary {
            epoch,
            train_loss,
            valid,
            steps,
        });
    }
    log::info!("Training finished");

    (model, history)
}

/// Runs one pass over `dataloader_train`, returning the updated model, the mean batch loss and the
/// periodic evaluations.
#[allow(clippy::too_many_arguments)]
pub fn epoch_train<AutoB, O>(
    dataloader_train: Dataloader<AutoB>,
    dataloader_valid: Option<Dataloader<AutoB::InnerBackend>>,
    mut model: Network<AutoB>,
    optim: &mut O,
    grads: &mut GradientBuffer,
    config: &TrainingConfig,
    epoch: usize,
    rng: &mut dyn RngCore,
) -> (Network<AutoB>, f64, Vec<StepSummary>)
where
    AutoB: AutodiffBackend,
    O: Optimizer<Network<AutoB>, AutoB>,
{
    let num_batches = dataloader_train.num_items().div_ceil(config.batch_size.max(1));
    let mut running_loss = 0.0;
    let mut steps = 0;
    let mut step_summaries = Vec::new();

    for batch in dataloader_train.iter() {
        let loss;
        (model, loss) = train_step(model, optim, grads, batch, config.lr, rng);
        running_loss += loss;
        steps += 1;

        log::debug!(
            "Epoch {epoch}/{}, Batch {steps:0>4}/{num_batches}, Loss {loss:.4}",
            config.num_epochs
        );

        if let (Some(log_every), Some(dataloader_valid)) = (config.log_every, &dataloader_valid) {
            if log_every > 0 && steps % log_every == 0 {
                let summary = StepSummary {
                    step: steps,
                    train_loss: running_loss / steps as f64,
                    valid: evaluate(&model.valid(), dataloader_valid),
                };
                log::info!(
                    "Epoch {epoch}/{}, Step {steps}, Training Loss {:.3}, Test Loss {:.3}, Test Accuracy {:.3}",
                    config.num_epochs,
                    summary.train_loss,
                    summary.valid.loss,
                    summary.valid.accuracy,
                );
                step_summaries.push(summary);
            }
        }
    }

    if steps == 0 {
        log::warn!("Epoch {epoch} had no training batches");
        return (model, f64::NAN, step_summaries);
    }
    (model, running_loss / steps as f64, step_summaries)
}

/// A single optimization step: forward, reset gradients, backward, update.
///
/// Returns the updated model and the batch loss.
pub fn train_step<AutoB, O>(
    model: Network<AutoB>,
    optim: &mut O,
    grads: &mut GradientBuffer,
    batch: ClassBatch<AutoB>,
    lr: f64,
    rng: &mut dyn RngCore,
) -> (Network<AutoB>, f64)
where
    AutoB: AutodiffBackend,
    O: Optimizer<Network<AutoB>, AutoB>,
{
    let log_probs = model.forward(batch.inputs, true, rng);
    let loss = NllLoss::new().forward(log_probs, batch.targets, Reduction::Mean);
    let loss_value = loss.clone().into_scalar().elem::<f64>();

    // stale gradients must not leak into this step
    grads.zero_grad(&model);
    grads.backward(loss, &model);

    let params = grads.to_params(&model);
    let model = optim.step(lr, model, params);

    (model, loss_value)
}

/// Evaluation pass without gradients and without dropout.
pub fn evaluate<B: Backend>(model: &Network<B>, dataloader: &Dataloader<B>) -> EvalSummary {
    let criterion = NllLoss::new();
    let mut loss_sum = 0.0;
    let mut batches = 0;
    let mut correct = 0;
    let mut num_items = 0;

    for batch in dataloader.iter() {
        let [batch_size] = batch.targets.dims();
        let log_probs = model.infer(batch.inputs);
        let loss = criterion.forward(log_probs.clone(), batch.targets.clone(), Reduction::Mean);
        loss_sum += loss.into_scalar().elem::<f64>();

        let predicted = log_probs.argmax(1).reshape([batch_size]);
        correct += predicted
            .equal(batch.targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>() as usize;

        batches += 1;
        num_items += batch_size;
    }

    if batches == 0 {
        log::warn!("Evaluation ran over an empty dataloader");
        return EvalSummary {
            loss: f64::NAN,
            accuracy: f64::NAN,
            num_items: 0,
        };
    }

    EvalSummary {
        loss: loss_sum / batches as f64,
        accuracy: correct as f64 / num_items as f64,
        num_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticDataset;
    use crate::network::NetworkConfig;
    use burn::backend::{Autodiff, NdArray};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    type InnerB = NdArray<f32>;
    type B = Autodiff<InnerB>;

    #[test]
    fn step_reduces_loss_on_a_fixed_batch() {
        let device = Default::default();
        let config = TrainingConfig::new(AdamConfig::new()).with_lr(1e-2);
        let mut model = NetworkConfig::new(4, 2)
            .with_hidden_layers(vec![8])
            .with_dropout(0.0)
            .init::<B>(&device)
            .unwrap();
        let mut optim = config.optimizer.init::<B, Network<B>>();
        let mut grads = GradientBuffer::new();
        let mut rng = StdRng::seed_from_u64(0);

        let batch = || ClassBatch::<B> {
            inputs: Tensor::from_floats(
                [
                    [1.0, 1.0, 0.0, 0.0],
                    [0.0, 0.0, 1.0, 1.0],
                    [1.0, 0.8, 0.1, 0.0],
                    [0.0, 0.2, 0.9, 1.0],
                ],
                &device,
            ),
            targets: Tensor::from_ints([0, 1, 0, 1], &device),
        };

        let first;
        (model, first) = train_step(model, &mut optim, &mut grads, batch(), config.lr, &mut rng);
        let mut last = first;
        for _ in 0..20 {
            (model, last) = train_step(model, &mut optim, &mut grads, batch(), config.lr, &mut rng);
        }
        assert!(last < first, "{last} >= {first}");
    }

    #[test]
    fn default_config_builds_working_loaders() {
        let device = Default::default();
        let config = TrainingConfig::new(AdamConfig::new());
        assert_eq!(0, config.num_workers);

        let train = config.train_dataloader::<InnerB>(SyntheticDataset::new(150, 3, 2, 0), &device);
        let valid = config.valid_dataloader::<InnerB>(SyntheticDataset::new(70, 3, 2, 0), &device);

        let sizes: Vec<usize> = train.iter().map(|batch| batch.targets.dims()[0]).collect();
        assert_eq!(vec![64, 64, 22], sizes);
        let sizes: Vec<usize> = valid.iter().map(|batch| batch.targets.dims()[0]).collect();
        assert_eq!(vec![64, 6], sizes);
    }

    #[test]
    fn config_survives_json() {
        let dir = temp_dir::TempDir::new().unwrap();
        let path = dir.path().join("training_config.json");
        let config = TrainingConfig::new(AdamConfig::new())
            .with_num_epochs(5)
            .with_log_every(Some(40));
        config.save(&path).unwrap();

        let loaded = TrainingConfig::load(&path).unwrap();
        assert_eq!(5, loaded.num_epochs);
        assert_eq!(64, loaded.batch_size);
        assert_eq!(Some(40), loaded.log_every);
        assert_eq!(config.seed, loaded.seed);
    }

    #[test]
    fn evaluate_counts_items() {
        let device = Default::default();
        let config = TrainingConfig::new(AdamConfig::new()).with_batch_size(16);
        let model = NetworkConfig::new(3, 4)
            .with_hidden_layers(vec![5])
            .init::<InnerB>(&device)
            .unwrap();
        let dataloader = config.valid_dataloader::<InnerB>(SyntheticDataset::new(50, 3, 4, 1), &device);

        let summary = evaluate(&model, &dataloader);
        assert_eq!(50, summary.num_items);
        assert!((0.0..=1.0).contains(&summary.accuracy));
        assert!(summary.loss.is_finite() && summary.loss > 0.0);
    }
}
