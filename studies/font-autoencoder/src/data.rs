use std::fs::File;
use std::io::{ BufReader, Read };
use std::path::{ Path, PathBuf };
use std::sync::Arc;

use burn::prelude::*;
use image::imageops::FilterType;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{ Deserialize, Serialize };
use serde_bytes::ByteBuf;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to unpickle {path}: {source}")]
    Pickle {
        path: PathBuf,
        #[source]
        source: serde_pickle::Error,
    },
    #[error("record {index}: failed to decode glyph image: {source}")]
    Image {
        index: usize,
        #[source]
        source: image::ImageError,
    },
    #[error("record {index}: expected {expected} pixels, got {len}")]
    PixelCount {
        index: usize,
        len: usize,
        expected: usize,
    },
    #[error("record {index}: {field} index {value} out of range 0..{size}")]
    OutOfRange {
        index: usize,
        field: &'static str,
        value: i64,
        size: usize,
    },
}

/// Sizes every sample of a dataset must agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetShape {
    pub image_size: usize,
    pub category_size: usize,
    pub alpha_size: usize,
}

/// One pickled record: `(category_index, alphabet_index, encoded_image)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlyphRecord(pub i64, pub i64, pub ByteBuf);

/// A top-level pickle holds either one record or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum PickledEntry {
    Record(GlyphRecord),
    Records(Vec<GlyphRecord>),
}

/// Reads pickles back to back until end of input. Files written with one
/// `pickle.dump` per record and files holding a single list both load.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<GlyphRecord>, serde_pickle::Error> {
    let mut de = serde_pickle::Deserializer::new(reader, serde_pickle::DeOptions::new());
    let mut records = Vec::new();
    loop {
        match PickledEntry::deserialize(&mut de) {
            Ok(PickledEntry::Record(record)) => records.push(record),
            Ok(PickledEntry::Records(list)) => records.extend(list),
            Err(serde_pickle::Error::Eval(serde_pickle::ErrorCode::EOFWhileParsing, _)) => {
                break;
            }
            Err(e) => {
                return Err(e);
            }
        }
    }
    Ok(records)
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlyphSample {
    pub category: usize,
    pub alphabet: usize,
    /// Row-major luma pixels, `image_size * image_size` of them.
    pub pixels: Vec<u8>,
}

pub struct GlyphDataset {
    samples: Vec<GlyphSample>,
    shape: DatasetShape,
}

impl GlyphDataset {
    /// Reads a split of pickled `(category, alphabet, image bytes)` tuples.
    pub fn from_pickle<P: AsRef<Path>>(path: P, shape: DatasetShape) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let records = read_records(BufReader::new(file)).map_err(|source| DatasetError::Pickle {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_records(records, shape)
    }

    pub fn from_records(records: Vec<GlyphRecord>, shape: DatasetShape) -> Result<Self, DatasetError> {
        let samples = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| decode_record(index, record, &shape))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GlyphDataset { samples, shape })
    }

    /// Builds a dataset from already decoded samples, checked against `shape`.
    pub fn from_samples(samples: Vec<GlyphSample>, shape: DatasetShape) -> Result<Self, DatasetError> {
        let expected = shape.image_size * shape.image_size;
        for (index, sample) in samples.iter().enumerate() {
            let as_i64 = |v: usize| i64::try_from(v).unwrap_or(i64::MAX);
            check_range(index, "category", as_i64(sample.category), shape.category_size)?;
            check_range(index, "alphabet", as_i64(sample.alphabet), shape.alpha_size)?;
            if sample.pixels.len() != expected {
                return Err(DatasetError::PixelCount { index, len: sample.pixels.len(), expected });
            }
        }
        Ok(GlyphDataset { samples, shape })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn shape(&self) -> DatasetShape {
        self.shape
    }

    pub fn get(&self, idx: usize) -> Option<&GlyphSample> {
        self.samples.get(idx)
    }

    pub fn category_histogram(&self) -> Vec<usize> {
        let mut counts = vec![0; self.shape.category_size];
        for sample in &self.samples {
            counts[sample.category] += 1;
        }
        counts
    }

    pub fn alphabet_histogram(&self) -> Vec<usize> {
        let mut counts = vec![0; self.shape.alpha_size];
        for sample in &self.samples {
            counts[sample.alphabet] += 1;
        }
        counts
    }

    /// Stacks the given samples into tensors: pixels scaled to `[0, 1]`, indices one-hot encoded.
    pub fn batch<B: Backend>(&self, indices: &[usize], device: &B::Device) -> GlyphBatch<B> {
        let n = indices.len();
        let size = self.shape.image_size;
        let mut images = Vec::with_capacity(n * size * size);
        let mut alphabet = vec![0.0f32; n * self.shape.alpha_size];
        let mut category = vec![0.0f32; n * self.shape.category_size];

        for (row, &idx) in indices.iter().enumerate() {
            let sample = &self.samples[idx];
            images.extend(sample.pixels.iter().map(|&p| (p as f32) / 255.0));
            alphabet[row * self.shape.alpha_size + sample.alphabet] = 1.0;
            category[row * self.shape.category_size + sample.category] = 1.0;
        }

        GlyphBatch {
            images: Tensor::from_data(TensorData::new(images, [n, size, size]), device),
            alphabet: Tensor::from_data(
                TensorData::new(alphabet, [n, self.shape.alpha_size]),
                device
            ),
            category: Tensor::from_data(
                TensorData::new(category, [n, self.shape.category_size]),
                device
            ),
        }
    }

    pub fn print(&self, name: &str) {
        println!("DATASET ({})", name);
        println!("Size: {}", self.len());
        println!("Categories: {:?}", self.category_histogram());
        println!("Alphabet: {:?}", self.alphabet_histogram());
    }
}

fn decode_record(
    index: usize,
    GlyphRecord(category, alphabet, encoded): GlyphRecord,
    shape: &DatasetShape
) -> Result<GlyphSample, DatasetError> {
    let category = check_range(index, "category", category, shape.category_size)?;
    let alphabet = check_range(index, "alphabet", alphabet, shape.alpha_size)?;

    let img = image::load_from_memory(&encoded)
        .map_err(|source| DatasetError::Image { index, source })?
        .to_luma8();

    let size = shape.image_size as u32;
    let img = if img.dimensions() == (size, size) {
        img
    } else {
        image::imageops::resize(&img, size, size, FilterType::Triangle)
    };

    Ok(GlyphSample { category, alphabet, pixels: img.into_raw() })
}

fn check_range(
    index: usize,
    field: &'static str,
    value: i64,
    size: usize
) -> Result<usize, DatasetError> {
    usize::try_from(value)
        .ok()
        .filter(|v| *v < size)
        .ok_or(DatasetError::OutOfRange { index, field, value, size })
}

#[derive(Debug, Clone)]
pub struct GlyphBatch<B: Backend> {
    /// `[N, H, W]`
    pub images: Tensor<B, 3>,
    /// `[N, alpha_size]`
    pub alphabet: Tensor<B, 2>,
    /// `[N, category_size]`
    pub category: Tensor<B, 2>,
}

impl<B: Backend> GlyphBatch<B> {
    pub fn len(&self) -> usize {
        self.images.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mini-batches over a shared dataset. A shuffling loader starts from a seeded
/// permutation and redraws its order at the start of every pass.
pub struct DataLoader {
    dataset: Arc<GlyphDataset>,
    indices: Vec<usize>,
    batch_size: usize,
    shuffle: bool,
    rng: StdRng,
}

impl DataLoader {
    pub fn new(dataset: Arc<GlyphDataset>, batch_size: usize, shuffle: bool, seed: u64) -> DataLoader {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut indices: Vec<usize> = (0..dataset.len()).collect();
        if shuffle {
            indices.shuffle(&mut rng);
        }

        DataLoader {
            dataset,
            indices,
            batch_size: batch_size.max(1),
            shuffle,
            rng,
        }
    }

    /// Unshuffled loader yielding the whole dataset as one batch.
    pub fn full_batch(dataset: Arc<GlyphDataset>) -> DataLoader {
        let batch_size = dataset.len();
        DataLoader::new(dataset, batch_size, false, 0)
    }

    /// Total number of samples in the dataset
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of batches based on the dataset size and batch size
    pub fn len_batch(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn dataset(&self) -> &GlyphDataset {
        &self.dataset
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// One pass over the data.
    pub fn iter<B: Backend>(&mut self, device: &B::Device) -> BatchIter<'_, B> {
        if self.shuffle {
            self.indices.shuffle(&mut self.rng);
        }
        BatchIter {
            dataset: &self.dataset,
            chunks: self.indices.chunks(self.batch_size),
            device: device.clone(),
        }
    }
}

pub struct BatchIter<'a, B: Backend> {
    dataset: &'a GlyphDataset,
    chunks: std::slice::Chunks<'a, usize>,
    device: B::Device,
}

impl<'a, B: Backend> Iterator for BatchIter<'a, B> {
    type Item = GlyphBatch<B>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.chunks.next()?;
        Some(self.dataset.batch(chunk, &self.device))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<'a, B: Backend> ExactSizeIterator for BatchIter<'a, B> {}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use image::{ GrayImage, ImageFormat, Luma };
    use std::io::Cursor;

    type TestBackend = NdArray<f32>;

    const SHAPE: DatasetShape = DatasetShape { image_size: 4, category_size: 3, alpha_size: 5 };

    fn png(size: u32, value: u8) -> ByteBuf {
        let img = GrayImage::from_pixel(size, size, Luma([value]));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageFormat::Png).unwrap();
        ByteBuf::from(bytes.into_inner())
    }

    fn dataset(n: usize) -> Arc<GlyphDataset> {
        let samples = (0..n)
            .map(|i| GlyphSample {
                category: i % SHAPE.category_size,
                alphabet: i % SHAPE.alpha_size,
                pixels: vec![(i * 10) as u8; 16],
            })
            .collect();
        Arc::new(GlyphDataset::from_samples(samples, SHAPE).unwrap())
    }

    fn pickled(value: &impl Serialize) -> Vec<u8> {
        serde_pickle::to_vec(value, serde_pickle::SerOptions::new()).unwrap()
    }

    #[test]
    fn reads_one_pickle_per_record() {
        let mut stream = Vec::new();
        for i in 0..3 {
            stream.extend(pickled(&GlyphRecord(i, i + 1, png(4, 0))));
        }
        let records = read_records(stream.as_slice()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!((records[2].0, records[2].1), (2, 3));
    }

    #[test]
    fn reads_a_single_list_pickle() {
        let list = vec![GlyphRecord(0, 0, png(4, 0)), GlyphRecord(1, 4, png(4, 9))];
        let records = read_records(pickled(&list).as_slice()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].2.as_slice(), png(4, 9).as_slice());
    }

    #[test]
    fn empty_input_has_no_records() {
        assert!(read_records(std::io::empty()).unwrap().is_empty());
    }

    #[test]
    fn from_samples_validates_indices_and_pixels() {
        let sample = |category, alphabet, len| GlyphSample { category, alphabet, pixels: vec![0; len] };

        let err = GlyphDataset::from_samples(vec![sample(0, 0, 16), sample(3, 0, 16)], SHAPE)
            .err()
            .unwrap();
        assert!(matches!(err, DatasetError::OutOfRange { index: 1, field: "category", .. }));

        let err = GlyphDataset::from_samples(vec![sample(0, 5, 16)], SHAPE).err().unwrap();
        assert!(matches!(err, DatasetError::OutOfRange { field: "alphabet", value: 5, .. }));

        let err = GlyphDataset::from_samples(vec![sample(0, 0, 15)], SHAPE).err().unwrap();
        assert!(matches!(err, DatasetError::PixelCount { len: 15, expected: 16, .. }));
    }

    #[test]
    fn decodes_and_resizes_records() {
        let records = vec![GlyphRecord(2, 4, png(4, 255)), GlyphRecord(0, 1, png(8, 0))];
        let dataset = GlyphDataset::from_records(records, SHAPE).unwrap();

        assert_eq!(dataset.len(), 2);
        let first = dataset.get(0).unwrap();
        assert_eq!((first.category, first.alphabet), (2, 4));
        assert!(first.pixels.iter().all(|&p| p == 255));
        assert_eq!(dataset.get(1).unwrap().pixels.len(), 16);
        assert_eq!(dataset.category_histogram(), vec![1, 0, 1]);
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let records = vec![GlyphRecord(3, 0, png(4, 0))];
        let err = GlyphDataset::from_records(records, SHAPE).err().unwrap();
        assert!(matches!(err, DatasetError::OutOfRange { field: "category", value: 3, .. }));

        let records = vec![GlyphRecord(0, -1, png(4, 0))];
        let err = GlyphDataset::from_records(records, SHAPE).err().unwrap();
        assert!(matches!(err, DatasetError::OutOfRange { field: "alphabet", .. }));
    }

    #[test]
    fn rejects_undecodable_images() {
        let records = vec![GlyphRecord(0, 0, ByteBuf::from(vec![1, 2, 3]))];
        let err = GlyphDataset::from_records(records, SHAPE).err().unwrap();
        assert!(matches!(err, DatasetError::Image { index: 0, .. }));
    }

    #[test]
    fn batch_one_hot_encodes_indices() {
        let dataset = dataset(4);
        let device = Default::default();
        let batch = dataset.batch::<TestBackend>(&[1, 3], &device);

        assert_eq!(batch.images.dims(), [2, 4, 4]);
        let alphabet = batch.alphabet.into_data().to_vec::<f32>().unwrap();
        assert_eq!(alphabet, vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        let category = batch.category.into_data().to_vec::<f32>().unwrap();
        assert_eq!(category, vec![0.0, 1.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn seeded_shuffle_is_a_reproducible_permutation() {
        let a = DataLoader::new(dataset(50), 8, true, 42);
        let b = DataLoader::new(dataset(50), 8, true, 42);
        assert_eq!(a.indices(), b.indices());

        let mut sorted = a.indices().to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert_ne!(a.indices(), sorted.as_slice());
    }

    #[test]
    fn unshuffled_loader_keeps_order() {
        let mut loader = DataLoader::new(dataset(5), 2, false, 42);
        let device = Default::default();
        let _ = loader.iter::<TestBackend>(&device).count();
        assert_eq!(loader.indices(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn full_batch_covers_everything() {
        let mut loader = DataLoader::full_batch(dataset(7));
        assert_eq!(loader.len_batch(), 1);
        let device = Default::default();
        let batches: Vec<_> = loader.iter::<TestBackend>(&device).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 7);
    }

    #[test]
    fn empty_dataset_has_no_batches() {
        let mut loader = DataLoader::full_batch(dataset(0));
        assert_eq!(loader.len_batch(), 0);
        let device = Default::default();
        assert_eq!(loader.iter::<TestBackend>(&device).count(), 0);
    }
}
