use crate::common::cli::AppArgs;
use crate::common::mnist::dataset::ImageDataset;
use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use burn_mlp::prelude::*;

const BAR_WIDTH: usize = 40;

/// Prints the predicted class distribution of the first `num_items` test images.
pub fn infer<B: Backend>(
    model_config: &NetworkConfig,
    num_items: usize,
    device: B::Device,
    app_args: &AppArgs,
) {
    let model: Network<B> = app_args
        .load_model(model_config, &device)
        .expect("Trained model should exist; run training first");

    let dataset = ImageDataset::test(app_args.dataset);
    let items: Vec<ClassItem> = dataset.iter().take(num_items).collect();
    let batch: ClassBatch<B> = ClassBatcher::default().batch(items, &device);
    let num_classes = model.output_size();

    let probabilities = model
        .probabilities(batch.inputs)
        .into_data()
        .to_vec::<f32>()
        .expect("probabilities should be f32");
    let targets = batch
        .targets
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .expect("targets should be integers");

    let class_names = app_args.dataset.class_names();
    for (i, target) in targets.into_iter().enumerate() {
        let row = &probabilities[i * num_classes..(i + 1) * num_classes];
        let (predicted, _) = row
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .expect("at least one class");
        println!(
            "image {i}: predicted {}, expected {}",
            class_names[predicted], class_names[target as usize]
        );
        for (class, probability) in row.iter().enumerate() {
            let bar = "#".repeat((probability * BAR_WIDTH as f32).round() as usize);
            println!("  {:>12} {probability:.3} {bar}", class_names[class]);
        }
    }
}
