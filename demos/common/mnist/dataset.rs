use burn::data::dataset::{
    Dataset, InMemDataset,
    transform::{Mapper, MapperDataset},
};
use burn_common::network::downloader::download_file_as_bytes;
use burn_mlp::data::ClassItem;
use flate2::read::GzDecoder;
use num_traits::AsPrimitive;
use serde::Deserialize;
use std::fs::{File, create_dir_all};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

pub const WIDTH: usize = 28;
pub const HEIGHT: usize = 28;
pub const NUM_CLASSES: usize = 10;

/// Which 28x28 grayscale, 10-classes collection to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Handwritten digits.
    Mnist,
    /// Zalando article images.
    Fashion,
}

impl Source {
    fn url(&self) -> &'static str {
        match self {
            // CVDF mirror of http://yann.lecun.com/exdb/mnist/
            Source::Mnist => "https://storage.googleapis.com/cvdf-datasets/mnist/",
            Source::Fashion => "http://fashion-mnist.s3-website.eu-central-1.amazonaws.com/",
        }
    }

    fn cache_name(&self) -> &'static str {
        match self {
            Source::Mnist => "mnist",
            Source::Fashion => "fashion-mnist",
        }
    }

    /// Human-readable class names, in label order.
    pub fn class_names(&self) -> [&'static str; NUM_CLASSES] {
        match self {
            Source::Mnist => ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"],
            Source::Fashion => [
                "T-shirt/top",
                "Trouser",
                "Pullover",
                "Dress",
                "Coat",
                "Sandal",
                "Shirt",
                "Sneaker",
                "Bag",
                "Ankle Boot",
            ],
        }
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mnist" => Ok(Source::Mnist),
            "fashion" | "fashion-mnist" => Ok(Source::Fashion),
            other => Err(format!("unknown dataset {other:?}, expected mnist or fashion")),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
struct ImageItemRaw {
    pub image_bytes: Vec<u8>,
    pub label: u8,
}

struct BytesToFeatures;

impl Mapper<ImageItemRaw, ClassItem> for BytesToFeatures {
    /// Flatten a raw image into features in between -1.0 and 1.0.
    fn map(&self, item: &ImageItemRaw) -> ClassItem {
        debug_assert_eq!(item.image_bytes.len(), WIDTH * HEIGHT);

        // Normalize: scale between [0,1], then mean=0.5,std=0.5
        let features = item
            .image_bytes
            .iter()
            .map(|brightness| {
                let value: f32 = (*brightness).as_();
                (value / 255.0 - 0.5) / 0.5
            })
            .collect();

        ClassItem {
            features,
            label: item.label,
        }
    }
}

type MappedDataset = MapperDataset<InMemDataset<ImageItemRaw>, BytesToFeatures, ImageItemRaw>;

/// 70,000 28x28 grayscale images in 10 classes: 60,000 training images and 10,000 test images.
///
/// The files are downloaded once into `~/.cache/burn-dataset/`.
pub struct ImageDataset {
    dataset: MappedDataset,
}

impl Dataset<ClassItem> for ImageDataset {
    fn get(&self, index: usize) -> Option<ClassItem> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl ImageDataset {
    /// Creates a new train dataset.
    pub fn train(source: Source) -> Self {
        Self::new(source, "train")
    }

    /// Creates a new test dataset.
    pub fn test(source: Source) -> Self {
        Self::new(source, "test")
    }

    fn new(source: Source, split: &str) -> Self {
        let root = ImageDataset::download(source, split);

        // small enough to live in memory
        let images = ImageDataset::read_images(&root, split);
        let labels = ImageDataset::read_labels(&root, split);

        let items: Vec<_> = images
            .into_iter()
            .zip(labels)
            .map(|(image_bytes, label)| ImageItemRaw { image_bytes, label })
            .collect();

        let dataset = InMemDataset::new(items);
        let dataset = MapperDataset::new(dataset, BytesToFeatures);

        Self { dataset }
    }

    /// Download the dataset files from the web.
    /// Panics if the download cannot be completed or the content of the file cannot be written to disk.
    fn download(source: Source, split: &str) -> PathBuf {
        let cache_dir = dirs::home_dir()
            .expect("Could not get home directory")
            .join(".cache")
            .join("burn-dataset");
        let split_dir = cache_dir.join(source.cache_name()).join(split);

        if !split_dir.exists() {
            create_dir_all(&split_dir).expect("Failed to create base directory");
        }

        match split {
            "train" => {
                ImageDataset::download_file(source, TRAIN_IMAGES, &split_dir);
                ImageDataset::download_file(source, TRAIN_LABELS, &split_dir);
            }
            "test" => {
                ImageDataset::download_file(source, TEST_IMAGES, &split_dir);
                ImageDataset::download_file(source, TEST_LABELS, &split_dir);
            }
            _ => panic!("Invalid split specified {split}"),
        };

        split_dir
    }

    fn download_file<P: AsRef<Path>>(source: Source, name: &str, dest_dir: &P) -> PathBuf {
        let file_name = dest_dir.as_ref().join(name);

        if !file_name.exists() {
            let bytes = download_file_as_bytes(&format!("{}{name}.gz", source.url()), name);

            let mut output_file = File::create(&file_name).expect("Failed to create the file");

            let mut gz_buffer = GzDecoder::new(&bytes[..]);
            std::io::copy(&mut gz_buffer, &mut output_file).expect("Failed to decompress the file");
        }

        file_name
    }

    fn read_images<P: AsRef<Path>>(root: &P, split: &str) -> Vec<Vec<u8>> {
        let file_name = if split == "train" {
            TRAIN_IMAGES
        } else {
            TEST_IMAGES
        };
        let file_name = root.as_ref().join(file_name);

        // 16-byte header, the image count at offset 4
        let mut f = File::open(file_name).expect("Failed to open the images file");
        let mut buf = [0u8; 4];
        f.seek(SeekFrom::Start(4)).expect("Failed to seek the header");
        f.read_exact(&mut buf)
            .expect("Should be able to read image file header");
        let size = u32::from_be_bytes(buf);

        let mut buf_images: Vec<u8> = vec![0u8; WIDTH * HEIGHT * (size as usize)];
        f.seek(SeekFrom::Start(16)).expect("Failed to seek the images");
        f.read_exact(&mut buf_images)
            .expect("Should be able to read the images");

        buf_images
            .chunks(WIDTH * HEIGHT)
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    fn read_labels<P: AsRef<Path>>(root: &P, split: &str) -> Vec<u8> {
        let file_name = if split == "train" {
            TRAIN_LABELS
        } else {
            TEST_LABELS
        };
        let file_name = root.as_ref().join(file_name);

        // 8-byte header, the label count at offset 4
        let mut f = File::open(file_name).expect("Failed to open the labels file");
        let mut buf = [0u8; 4];
        f.seek(SeekFrom::Start(4)).expect("Failed to seek the header");
        f.read_exact(&mut buf)
            .expect("Should be able to read label file header");
        let size = u32::from_be_bytes(buf);

        let mut buf_labels: Vec<u8> = vec![0u8; size as usize];
        f.seek(SeekFrom::Start(8)).expect("Failed to seek the labels");
        f.read_exact(&mut buf_labels)
            .expect("Should be able to read labels from file");

        buf_labels
    }
}
