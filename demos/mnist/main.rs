use burn::optim::AdamConfig;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn_mlp::prelude::*;
use tracing_subscriber::EnvFilter;

pub mod inference;
pub mod training;

#[path = "../common/mod.rs"]
pub mod common;

use common::backend::{MainAutoBackend, MainBackend, MainDevice};
use common::cli::AppArgs;
use common::mnist::dataset::{HEIGHT, NUM_CLASSES, WIDTH};

/// 784 inputs, three hidden layers, 10 classes.
pub fn model_config() -> NetworkConfig {
    NetworkConfig::new(WIDTH * HEIGHT, NUM_CLASSES)
        .with_hidden_layers(vec![512, 256, 128])
        .with_dropout(0.5)
}

pub fn training_config() -> TrainingConfig {
    TrainingConfig::new(AdamConfig::new())
        .with_num_epochs(2)
        .with_batch_size(64)
        .with_num_workers(2)
        .with_lr(1e-3)
        .with_log_every(Some(40))
}

pub fn launch<B, AutoB>(app_args: &AppArgs)
where
    B: Backend + MainDevice,
    AutoB: AutodiffBackend + MainDevice,
{
    app_args.create_artifact_dir::<B>();

    // setup training and model configs
    let training_config = app_args
        .load_training_config()
        .unwrap_or_else(training_config);
    let model_config = app_args.load_model_config().unwrap_or_else(model_config);
    // save configs
    app_args.save_training_config(&training_config);
    app_args.save_model_config(&model_config);

    if app_args.training {
        let training_device = AutoB::main_device();
        training::train::<AutoB>(&training_config, &model_config, training_device, app_args);
    }

    if app_args.inference {
        let infer_device = B::main_device();
        inference::infer::<B>(&model_config, 10, infer_device, app_args);
    }

    if !app_args.inference && !app_args.training {
        println!("neither training nor inference were enabled");
        println!("{}", common::cli::HELP);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let app_args = AppArgs::parse().unwrap();
    launch::<MainBackend, MainAutoBackend>(&app_args);
}
