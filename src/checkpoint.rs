//! Single-file checkpoints holding a [Network]'s architecture next to its parameters.
//!
//! The file is written by burn's named MessagePack recorder and contains the fields
//! `input_size`, `output_size`, `hidden_layers` and `state_dict`. It is tied to this crate's
//! layout and is not meant to be portable.

use crate::error::{Error, Result};
use crate::network::{Network, NetworkConfig, NetworkRecord};
use burn::nn::LinearRecord;
use burn::prelude::*;
use burn::record::{FileRecorder, FullPrecisionSettings, NamedMpkFileRecorder, Record, Recorder};
use std::path::{Path, PathBuf};

pub type RecorderTy = NamedMpkFileRecorder<FullPrecisionSettings>;

#[derive(Record)]
pub struct CheckpointRecord<B: Backend> {
    pub input_size: usize,
    pub output_size: usize,
    pub hidden_layers: Vec<usize>,
    pub state_dict: NetworkRecord<B>,
}

impl<B: Backend> CheckpointRecord<B> {
    pub fn from_network(network: &Network<B>) -> Self {
        Self {
            input_size: network.input_size(),
            output_size: network.output_size(),
            hidden_layers: network.hidden_layers(),
            state_dict: network.clone().into_record(),
        }
    }

    /// Reconstructs the network described by the architecture fields, then loads `state_dict`.
    ///
    /// Dropout is not part of the record; the reconstructed network uses the default probability.
    pub fn into_network(self, device: &B::Device) -> Result<Network<B>> {
        let network = NetworkConfig::new(self.input_size, self.output_size)
            .with_hidden_layers(self.hidden_layers)
            .init::<B>(device)?;
        load_state_dict(network, self.state_dict)
    }
}

/// Path of the checkpoint file, with the recorder's extension.
pub fn file_path<B: Backend>(path: &Path) -> PathBuf {
    let file_ext = <RecorderTy as FileRecorder<B>>::file_extension();
    path.with_extension(file_ext)
}

/// Saves `network` at `path` (the recorder's extension is added automatically).
pub fn save<B: Backend>(network: &Network<B>, path: impl Into<PathBuf>) -> Result<()> {
    let path = path.into();
    log::info!("Saving checkpoint to {:?}", file_path::<B>(&path));
    RecorderTy::new().record(CheckpointRecord::from_network(network), path)?;
    Ok(())
}

/// Loads the checkpoint at `path`, rebuilding the network from its recorded architecture.
pub fn load<B: Backend>(path: impl Into<PathBuf>, device: &B::Device) -> Result<Network<B>> {
    let record = load_record::<B>(path.into(), device)?;
    record.into_network(device)
}

fn load_record<B: Backend>(path: PathBuf, device: &B::Device) -> Result<CheckpointRecord<B>> {
    log::info!("Loading checkpoint from {:?}", file_path::<B>(&path));
    let record: CheckpointRecord<B> = RecorderTy::new().load(path, device)?;
    Ok(record)
}

impl<B: Backend> Network<B> {
    /// Replaces this network's parameters by the ones of the checkpoint at `path`.
    ///
    /// Fails unless every recorded parameter has exactly the shape of its counterpart in `self`.
    pub fn load_checkpoint(self, path: impl Into<PathBuf>, device: &B::Device) -> Result<Self> {
        let record = load_record::<B>(path.into(), device)?;
        load_state_dict(self, record.state_dict)
    }
}

/// Loads `state_dict` into `network`, after checking every parameter's shape.
pub fn load_state_dict<B: Backend>(
    network: Network<B>,
    state_dict: NetworkRecord<B>,
) -> Result<Network<B>> {
    check_state_dict(&network, &state_dict)?;
    Ok(network.load_record(state_dict))
}

fn check_state_dict<B: Backend>(network: &Network<B>, state_dict: &NetworkRecord<B>) -> Result<()> {
    if network.hidden.len() != state_dict.hidden.len() {
        return Err(Error::LayerCountMismatch {
            expected: network.hidden.len(),
            found: state_dict.hidden.len(),
        });
    }

    let records = state_dict
        .hidden
        .iter()
        .chain(std::iter::once(&state_dict.output));
    for ((name, linear), record) in network.layers().zip(records) {
        check_linear(&name, linear, record)?;
    }
    Ok(())
}

fn check_linear<B: Backend>(
    name: &str,
    linear: &nn::Linear<B>,
    record: &LinearRecord<B>,
) -> Result<()> {
    check_shape(
        format!("{name}.weight"),
        linear.weight.dims().to_vec(),
        record.weight.dims().to_vec(),
    )?;

    let expected = linear.bias.as_ref().map(|bias| bias.dims().to_vec());
    let found = record.bias.as_ref().map(|bias| bias.dims().to_vec());
    check_shape(
        format!("{name}.bias"),
        expected.unwrap_or_default(),
        found.unwrap_or_default(),
    )
}

fn check_shape(name: String, expected: Vec<usize>, found: Vec<usize>) -> Result<()> {
    if expected != found {
        return Err(Error::ShapeMismatch {
            name,
            expected,
            found,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use temp_dir::TempDir;

    type B = NdArray<f32>;

    fn network(hidden_layers: Vec<usize>) -> Network<B> {
        NetworkConfig::new(12, 4)
            .with_hidden_layers(hidden_layers)
            .init::<B>(&Default::default())
            .unwrap()
    }

    #[test]
    fn save_load_round_trip() {
        let device = Default::default();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint");

        let original = network(vec![10, 6]);
        save(&original, &path).unwrap();
        assert!(file_path::<B>(&path).exists());

        let loaded = load::<B>(&path, &device).unwrap();
        assert_eq!(original.input_size(), loaded.input_size());
        assert_eq!(original.output_size(), loaded.output_size());
        assert_eq!(original.hidden_layers(), loaded.hidden_layers());

        let input = Tensor::<B, 2>::random(
            [5, 12],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &device,
        );
        let a = original.infer(input.clone()).into_data().to_vec::<f32>().unwrap();
        let b = loaded.infer(input).into_data().to_vec::<f32>().unwrap();
        for (a, b) in a.iter().zip(&b) {
            assert!((a - b).abs() < 1e-6, "{a} {b}");
        }
    }

    #[test]
    fn load_into_other_widths_fails() {
        let device = Default::default();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint");
        save(&network(vec![10, 6]), &path).unwrap();

        let err = network(vec![8, 6]).load_checkpoint(&path, &device).unwrap_err();
        match err {
            Error::ShapeMismatch {
                name,
                expected,
                found,
            } => {
                assert_eq!("hidden.0.weight", name);
                assert_eq!(vec![12, 8], expected);
                assert_eq!(vec![12, 10], found);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_into_other_depth_fails() {
        let device = Default::default();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint");
        save(&network(vec![10, 6]), &path).unwrap();

        let err = network(vec![10]).load_checkpoint(&path, &device).unwrap_err();
        assert!(
            matches!(err, Error::LayerCountMismatch { expected: 1, found: 2 }),
            "{err}"
        );
    }

    #[test]
    fn load_into_same_architecture() {
        let device = Default::default();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint");
        let original = network(vec![]);
        save(&original, &path).unwrap();

        let loaded = network(vec![]).load_checkpoint(&path, &device).unwrap();
        let input = Tensor::<B, 2>::ones([2, 12], &device);
        let a = original.infer(input.clone()).into_data().to_vec::<f32>().unwrap();
        let b = loaded.infer(input).into_data().to_vec::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_file_is_a_recorder_error() {
        let dir = TempDir::new().unwrap();
        let err = load::<B>(dir.path().join("absent"), &Default::default()).unwrap_err();
        assert!(matches!(err, Error::Recorder(_)), "{err}");
    }
}
