use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// A single classification example.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ClassItem {
    /// Flattened input features, already normalized.
    ///
    /// # Shape
    /// [feature_count]
    pub features: Vec<f32>,

    /// Class of the example, in between 0 and num_classes - 1.
    pub label: u8,
}

#[derive(Clone, Default)]
pub struct ClassBatcher {}

#[derive(Clone, Debug)]
pub struct ClassBatch<B: Backend> {
    /// # Shape
    /// [batch_size, feature_count]
    pub inputs: Tensor<B, 2>,
    /// # Shape
    /// [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, ClassItem, ClassBatch<B>> for ClassBatcher {
    fn batch(&self, items: Vec<ClassItem>, device: &B::Device) -> ClassBatch<B> {
        let batch_size = items.len();
        let feature_count = items.first().map(|item| item.features.len()).unwrap_or(0);

        let mut features = Vec::with_capacity(batch_size * feature_count);
        let mut labels = Vec::with_capacity(batch_size);
        for item in items {
            assert_eq!(
                feature_count,
                item.features.len(),
                "all items of a batch must have the same feature count"
            );
            features.extend(item.features);
            labels.push(item.label as i64);
        }

        let inputs = TensorData::new(features, [batch_size, feature_count]).convert::<B::FloatElem>();
        let targets = TensorData::new(labels, [batch_size]).convert::<B::IntElem>();

        ClassBatch {
            inputs: Tensor::from_data(inputs, device),
            targets: Tensor::from_data(targets, device),
        }
    }
}

/// Deterministic, linearly separable clusters.
///
/// Item `i` belongs to class `i % num_classes`. Each class has its own center, drawn once from the
/// seed, and items scatter uniformly around it.
///
/// # Panics
///
/// [new](SyntheticDataset::new) panics unless `num_classes` is in between 1 and 256, so that every
/// label fits in a `u8`.
pub struct SyntheticDataset {
    items: Vec<ClassItem>,
}

impl SyntheticDataset {
    pub fn new(num_items: usize, feature_count: usize, num_classes: usize, seed: u64) -> Self {
        assert!(
            num_classes > 0 && num_classes <= u8::MAX as usize + 1,
            "num_classes must be in between 1 and 256, got {num_classes}"
        );
        let mut rng = StdRng::seed_from_u64(seed);

        let centers: Vec<Vec<f32>> = (0..num_classes)
            .map(|_| {
                (0..feature_count)
                    .map(|_| rng.random_range(-2.0f32..2.0))
                    .collect()
            })
            .collect();

        let items = (0..num_items)
            .map(|i| {
                let label = i % num_classes;
                let features = centers[label]
                    .iter()
                    .map(|center| center + rng.random_range(-0.5f32..0.5))
                    .collect();
                ClassItem {
                    features,
                    label: label as u8,
                }
            })
            .collect();

        Self { items }
    }
}

impl Dataset<ClassItem> for SyntheticDataset {
    fn get(&self, index: usize) -> Option<ClassItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn batches_items() {
        let device = Default::default();
        let items = vec![
            ClassItem {
                features: vec![0.0, 1.0, 2.0],
                label: 2,
            },
            ClassItem {
                features: vec![3.0, 4.0, 5.0],
                label: 0,
            },
        ];
        let batch: ClassBatch<B> = ClassBatcher::default().batch(items, &device);
        assert_eq!([2, 3], batch.inputs.dims());
        assert_eq!(
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            batch.inputs.into_data().to_vec::<f32>().unwrap()
        );
        assert_eq!(vec![2, 0], batch.targets.into_data().to_vec::<i64>().unwrap());
    }

    #[test]
    fn synthetic_is_deterministic() {
        let a = SyntheticDataset::new(40, 5, 4, 3);
        let b = SyntheticDataset::new(40, 5, 4, 3);
        assert_eq!(40, a.len());
        for i in 0..a.len() {
            let (x, y) = (a.get(i).unwrap(), b.get(i).unwrap());
            assert_eq!(x.features, y.features);
            assert_eq!((i % 4) as u8, x.label);
            assert_eq!(5, x.features.len());
        }
        assert!(a.get(40).is_none());
    }

    #[test]
    #[should_panic(expected = "num_classes must be in between 1 and 256")]
    fn synthetic_rejects_zero_classes() {
        SyntheticDataset::new(10, 3, 0, 0);
    }
}
