use crate::common::mnist::dataset::Source;
use burn::prelude::*;
use burn_mlp::checkpoint;
use burn_mlp::network::{Network, NetworkConfig};
use std::path::{Path, PathBuf};

pub const HELP: &str = "\
Burn MLP Example

A command-line tool for training and/or running inference with a feed-forward classifier
on MNIST or Fashion-MNIST.
Checkpoints and configurations are persisted in an artifacts directory.

USAGE:
    mnist [OPTIONS]

When no --training or --inference flag is provided, the program exits after handling configuration logic.

BEHAVIOR OVERVIEW
- The program manages two configurations: training config and model config.
- If --training-config or --model-config is given, the corresponding config is loaded from the specified file and saved to the artifacts directory (overwriting any existing file).
- If no explicit config file is provided for a component, the program attempts to load it from the artifacts directory; if absent, a default configuration is created and saved.
- The artifacts directory (--artifacts-path) is used to read/write the checkpoint and configurations. If not specified, a new temporary directory is created and its path is printed.
- With --remove-artifacts, any existing checkpoint in the artifacts directory is deleted before training (if --training is active).
- The model is loaded from the checkpoint if present; otherwise a new one is created and saved.
- If both --training and --inference are specified, training executes first, followed by inference using the trained model.

FLAGS:
    -h, --help                  Show this help message and exit

OPTIONS:
    -t, --training              Run training (creates or updates the checkpoint)
    -i, --inference             Show class probabilities for a few test images
    -r, --remove-artifacts      Delete the existing checkpoint from the artifacts directory before training
                                (has no effect if --training is not used)
    -c, --training-config <PATH>
                                Load training configuration from this file (overrides any config in artifacts directory)
    -m, --model-config <PATH>   Load model configuration from this file (overrides any config in artifacts directory)
    -a, --artifacts-path <PATH>
                                Directory where configurations and the checkpoint are saved and loaded.
                                If the directory does not exist, it will be created.
                                Defaults to a newly created temporary directory (path will be printed).
    -d, --dataset <NAME>        Either mnist (default) or fashion
";

#[derive(Debug)]
pub struct AppArgs {
    pub training: bool,
    pub inference: bool,
    pub remove_artifacts: bool,
    pub training_config: Option<PathBuf>,
    pub model_config: Option<PathBuf>,
    pub artifacts_path: PathBuf,
    pub dataset: Source,
}

impl AppArgs {
    pub fn parse() -> Result<Self, pico_args::Error> {
        let mut pargs = pico_args::Arguments::from_env();

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            println!("{}", HELP);
            std::process::exit(0);
        }

        let args = AppArgs {
            training_config: pargs
                .opt_value_from_os_str(["-c", "--training-config"], parse_path)?,
            model_config: pargs.opt_value_from_os_str(["-m", "--model-config"], parse_path)?,
            artifacts_path: pargs
                .opt_value_from_os_str(["-a", "--artifacts-path"], parse_path)?
                .unwrap_or_else(|| {
                    // e.g. /tmp/burn-mlp-mnist-abcd-0
                    let name = format!(
                        "{}-{}-",
                        std::env!("CARGO_PKG_NAME"), // burn-mlp
                        std::env!("CARGO_BIN_NAME")  // mnist
                    );
                    let tmp = temp_dir::TempDir::with_prefix(name)
                        .expect("Failed to create the temporary directory")
                        .dont_delete_on_drop();
                    let path = tmp.path();
                    println!("new artifacts directory: {path:?}");
                    path.into()
                }),
            dataset: pargs
                .opt_value_from_str(["-d", "--dataset"])?
                .unwrap_or(Source::Mnist),
            // must parse flags after values
            training: pargs.contains(["-t", "--training"]),
            inference: pargs.contains(["-i", "--inference"]),
            remove_artifacts: pargs.contains(["-r", "--remove-artifacts"]),
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            panic!("unused arguments: {remaining:?}");
        }

        Ok(args)
    }

    pub fn create_artifact_dir<B: Backend>(&self) {
        create_artifact_dir::<B>(&self.artifacts_path, self.remove_artifacts && self.training)
    }

    pub fn save_training_config(&self, training_config: &impl Config) {
        let path = self
            .artifacts_path
            .join(TRAINING_CONFIG_NAME)
            .with_extension("json");
        save_config(&path, training_config)
    }

    pub fn load_training_config<C: Config>(&self) -> Option<C> {
        self.load_config(self.training_config.as_deref(), TRAINING_CONFIG_NAME)
    }

    pub fn save_model_config(&self, model_config: &NetworkConfig) {
        let path = self
            .artifacts_path
            .join(MODEL_CONFIG_NAME)
            .with_extension("json");
        save_config(&path, model_config)
    }

    pub fn load_model_config(&self) -> Option<NetworkConfig> {
        self.load_config(self.model_config.as_deref(), MODEL_CONFIG_NAME)
    }

    /// An explicitly given config file wins over the one in the artifacts directory.
    fn load_config<C: Config>(&self, explicit: Option<&Path>, name: &str) -> Option<C> {
        match explicit {
            Some(path) => Some(
                load_config(path)
                    .unwrap_or_else(|| panic!("Failed to find the config file {path:?}")),
            ),
            None => load_config(&self.artifacts_path.join(name).with_extension("json")),
        }
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.artifacts_path.join(CHECKPOINT_NAME)
    }

    pub fn save_model<B: Backend>(&self, model: &Network<B>) {
        checkpoint::save(model, self.checkpoint_path()).expect("Failed to save the checkpoint");
    }

    pub fn load_model<B: Backend>(
        &self,
        model_config: &NetworkConfig,
        device: &B::Device,
    ) -> Option<Network<B>> {
        let path = self.checkpoint_path();
        let exists = std::fs::exists(checkpoint::file_path::<B>(&path))
            .expect("failed to check the checkpoint");
        if exists {
            let model_init = init_model(model_config, device);
            let model = model_init
                .load_checkpoint(path, device)
                .expect("Failed to load the checkpoint");
            Some(model)
        } else {
            None
        }
    }

    pub fn load_or_save_model<B: Backend>(
        &self,
        model_config: &NetworkConfig,
        device: &B::Device,
    ) -> Network<B> {
        self.load_model(model_config, device).unwrap_or_else(|| {
            println!("Initializing new model");
            let model_init = init_model(model_config, device);
            self.save_model(&model_init);
            model_init
        })
    }
}

fn parse_path(s: &std::ffi::OsStr) -> Result<std::path::PathBuf, &'static str> {
    Ok(s.into())
}

// Create the directory to save the checkpoint and configs
pub fn create_artifact_dir<B: Backend>(artifact_dir: &Path, delete: bool) {
    if delete {
        let path = checkpoint::file_path::<B>(&artifact_dir.join(CHECKPOINT_NAME));
        println!("removing {path:?}");
        if let Err(err) = std::fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                panic!("failed to remove the checkpoint: {err}");
            }
        }
    }
    std::fs::create_dir_all(artifact_dir).ok();
}

pub const TRAINING_CONFIG_NAME: &str = "training_config";
pub const MODEL_CONFIG_NAME: &str = "model_config";
pub const CHECKPOINT_NAME: &str = "checkpoint";

pub fn save_config(path: &Path, config: &impl Config) {
    println!("Saving config into {path:?}");
    config.save(path).expect("Failed to save the config");
}

pub fn load_config<C: Config>(path: &Path) -> Option<C> {
    let exists = std::fs::exists(path).expect("failed to check the config path");
    if exists {
        println!("Loading config from {path:?}");
        let config = C::load(path).expect("Failed to load the config");
        Some(config)
    } else {
        None
    }
}

pub fn init_model<B: Backend>(model_config: &NetworkConfig, device: &B::Device) -> Network<B> {
    model_config
        .init(device)
        .expect("The model config should describe a valid network")
}
