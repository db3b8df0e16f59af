mod common;

use burn::backend::NdArray;
use font_autoencoder::train::save_checkpoint;
use font_autoencoder::{ eval_step, load_checkpoint, GlyphDataset };

type TestBackend = NdArray<f32>;

#[test]
fn checkpoint_round_trips_into_same_architecture() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("AE_base_lr_0.0002_epochs_1.mpk");
    let device = Default::default();
    let config = common::small_config();

    let model = config.model.init::<TestBackend>(&device);
    save_checkpoint(&model, &path).unwrap();
    assert!(path.exists());

    let loaded = load_checkpoint::<TestBackend>(&config.model, &path, &device).unwrap();

    let dataset = GlyphDataset::from_records(common::records(3), common::shape()).unwrap();
    let (_, expected) = eval_step(&model, dataset.batch::<TestBackend>(&[0, 1, 2], &device));
    let (_, actual) = eval_step(&loaded, dataset.batch::<TestBackend>(&[0, 1, 2], &device));

    let expected = expected.into_data().to_vec::<f32>().unwrap();
    let actual = actual.into_data().to_vec::<f32>().unwrap();
    assert_eq!(expected, actual);
}

#[test]
fn missing_checkpoint_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let device = Default::default();
    let config = common::small_config();
    let path = dir.path().join("AE_base_lr_0.0002_epochs_30.mpk");
    assert!(load_checkpoint::<TestBackend>(&config.model, &path, &device).is_err());
}
