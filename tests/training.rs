use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::optim::AdamConfig;
use burn::prelude::*;
use burn_mlp::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use temp_dir::TempDir;

type InnerB = NdArray<f32>;
type B = Autodiff<InnerB>;

const NUM_ITEMS: usize = 640;
const FEATURES: usize = 20;
const CLASSES: usize = 4;

fn training_config() -> TrainingConfig {
    TrainingConfig::new(AdamConfig::new())
        .with_num_epochs(1)
        .with_batch_size(64)
        .with_lr(1e-2)
        .with_seed(7)
}

fn network() -> Network<B> {
    NetworkConfig::new(FEATURES, CLASSES)
        .with_hidden_layers(vec![32, 16])
        .with_dropout(0.2)
        .init::<B>(&Default::default())
        .unwrap()
}

#[test]
fn one_epoch_lowers_the_loss() {
    let device = Default::default();
    let config = training_config();
    let model = network();

    let dataloader_train =
        config.train_dataloader::<B>(SyntheticDataset::new(NUM_ITEMS, FEATURES, CLASSES, 0), &device);
    let dataloader_initial =
        config.valid_dataloader::<InnerB>(SyntheticDataset::new(NUM_ITEMS, FEATURES, CLASSES, 0), &device);
    let initial = evaluate(&model.valid(), &dataloader_initial);
    assert_eq!(NUM_ITEMS, initial.num_items);

    let mut optim = config.optimizer.init::<B, Network<B>>();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let (_model, history) = train(
        model,
        &mut optim,
        &config,
        dataloader_train,
        None,
        &mut rng,
    );

    assert_eq!(1, history.len());
    let epoch = &history[0];
    assert_eq!(1, epoch.epoch);
    assert!(epoch.valid.is_none());
    assert!(epoch.steps.is_empty());
    assert!(
        epoch.train_loss < initial.loss,
        "training loss {} is not below the initial loss {}",
        epoch.train_loss,
        initial.loss
    );
}

#[test]
fn epochs_report_validation() {
    let device = Default::default();
    let config = training_config().with_num_epochs(3).with_log_every(Some(5));
    let dataloader_train =
        config.train_dataloader::<B>(SyntheticDataset::new(NUM_ITEMS, FEATURES, CLASSES, 0), &device);
    let dataloader_valid =
        config.valid_dataloader::<InnerB>(SyntheticDataset::new(128, FEATURES, CLASSES, 0), &device);

    let mut optim = config.optimizer.init::<B, Network<B>>();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let (model, history) = train(
        network(),
        &mut optim,
        &config,
        dataloader_train,
        Some(dataloader_valid.clone()),
        &mut rng,
    );

    assert_eq!(3, history.len());
    for (i, epoch) in history.iter().enumerate() {
        assert_eq!(i + 1, epoch.epoch);
        let valid = epoch.valid.expect("validation ran at the end of the epoch");
        assert_eq!(128, valid.num_items);
        assert!((0.0..=1.0).contains(&valid.accuracy));

        // 10 batches per epoch, evaluated every 5 steps
        let steps: Vec<usize> = epoch.steps.iter().map(|step| step.step).collect();
        assert_eq!(vec![5, 10], steps);
        for step in &epoch.steps {
            assert_eq!(128, step.valid.num_items);
            assert!(step.train_loss.is_finite() && step.train_loss > 0.0);
        }
        // the last periodic evaluation sees the same model as the end-of-epoch one
        assert_eq!(valid, epoch.steps[1].valid);
        assert!((epoch.train_loss - epoch.steps[1].train_loss).abs() < 1e-12);
    }

    // the clusters are well separated
    let last = history[2].valid.unwrap();
    assert!(last.accuracy > 0.9, "{last:?}");
    assert_eq!(last, evaluate(&model.valid(), &dataloader_valid));
}

#[test]
fn trained_model_survives_a_checkpoint() {
    let device = Default::default();
    let config = training_config();
    let dataloader_train =
        config.train_dataloader::<B>(SyntheticDataset::new(NUM_ITEMS, FEATURES, CLASSES, 0), &device);
    let mut optim = config.optimizer.init::<B, Network<B>>();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let (model, _history) = train(
        network(),
        &mut optim,
        &config,
        dataloader_train,
        None,
        &mut rng,
    );
    let model = model.valid();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint");
    save(&model, &path).unwrap();
    let loaded = load::<InnerB>(&path, &device).unwrap();
    assert_eq!(vec![32, 16], loaded.hidden_layers());

    let input = Tensor::<InnerB, 2>::random(
        [9, FEATURES],
        burn::tensor::Distribution::Normal(0.0, 1.0),
        &device,
    );
    let a = model.infer(input.clone()).into_data().to_vec::<f32>().unwrap();
    let b = loaded.infer(input.clone()).into_data().to_vec::<f32>().unwrap();
    for (a, b) in a.iter().zip(&b) {
        assert!((a - b).abs() < 1e-6, "{a} {b}");
    }

    // architecture with other widths refuses the checkpoint
    let other = NetworkConfig::new(FEATURES, CLASSES)
        .with_hidden_layers(vec![24, 16])
        .init::<InnerB>(&device)
        .unwrap();
    assert!(matches!(
        other.load_checkpoint(&path, &device),
        Err(Error::ShapeMismatch { .. })
    ));
}
