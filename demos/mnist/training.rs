use crate::common::cli::AppArgs;
use crate::common::mnist::dataset::ImageDataset;
use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn_mlp::prelude::*;
use burn_mlp::training;
use rand::SeedableRng;
use rand::rngs::StdRng;

pub fn train<AutoB: AutodiffBackend>(
    training_config: &TrainingConfig,
    model_config: &NetworkConfig,
    training_device: AutoB::Device,
    app_args: &AppArgs,
) {
    AutoB::seed(training_config.seed);
    let mut rng = StdRng::seed_from_u64(training_config.seed);

    // load (or init and save) the model
    let model: Network<AutoB> = app_args.load_or_save_model(model_config, &training_device);
    let mut optim = training_config.optimizer.init::<AutoB, Network<AutoB>>();

    let dataloader_train = training_config
        .train_dataloader::<AutoB>(ImageDataset::train(app_args.dataset), &training_device);
    let dataloader_valid = training_config.valid_dataloader::<AutoB::InnerBackend>(
        ImageDataset::test(app_args.dataset),
        &training_device,
    );

    println!("running initial validation...");
    let initial = training::evaluate(&model.valid(), &dataloader_valid);
    println!(
        "Untrained: Test Loss {:.3}, Test Accuracy {:.3}",
        initial.loss, initial.accuracy
    );

    let (model, history) = training::train(
        model,
        &mut optim,
        training_config,
        dataloader_train,
        Some(dataloader_valid),
        &mut rng,
    );

    app_args.save_model(&model);

    println!("epoch | train loss | test loss | test accuracy");
    for summary in history {
        let (test_loss, test_accuracy) = summary
            .valid
            .map(|valid| (valid.loss, valid.accuracy))
            .unwrap_or((f64::NAN, f64::NAN));
        println!(
            "{:>5} | {:>10.3} | {:>9.3} | {:>13.3}",
            summary.epoch, summary.train_loss, test_loss, test_accuracy
        );
    }
}
