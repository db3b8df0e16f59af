mod common;

use std::sync::Arc;

use burn::backend::{ Autodiff, NdArray };
use burn::module::AutodiffModule;
use burn::optim::AdamConfig;
use font_autoencoder::{ eval_step, evaluate, train_step, DataLoader, GlyphDataset };

type TestBackend = NdArray<f32>;
type TestAutodiffBackend = Autodiff<TestBackend>;

fn dataset(n: usize) -> Arc<GlyphDataset> {
    Arc::new(GlyphDataset::from_records(common::records(n), common::shape()).unwrap())
}

#[test]
fn training_step_overfits_a_small_batch() {
    let device = Default::default();
    let config = common::small_config();
    let dataset = dataset(4);
    let mut model = config.model.init::<TestAutodiffBackend>(&device);
    let mut optim = AdamConfig::new().init();

    let mut losses = Vec::new();
    for _ in 0..60 {
        let batch = dataset.batch::<TestAutodiffBackend>(&[0, 1, 2, 3], &device);
        let (updated, loss) = train_step(model, &mut optim, batch, 1e-2);
        model = updated;
        losses.push(loss);
    }

    let first = losses[0];
    let last = *losses.last().unwrap();
    assert!(last.is_finite());
    assert!(last < first * 0.8, "loss did not drop: {first} -> {last}");
}

#[test]
fn evaluation_step_matches_input_shape() {
    let device = Default::default();
    let config = common::small_config();
    let model = config.model.init::<TestAutodiffBackend>(&device).valid();
    let batch = dataset(5).batch::<TestBackend>(&[0, 2, 4], &device);

    let (real, fake) = eval_step(&model, batch);
    assert_eq!(real.dims(), [3, common::SIZE, common::SIZE]);
    assert_eq!(fake.dims(), real.dims());
}

#[test]
fn evaluation_averages_over_samples() {
    let device = Default::default();
    let config = common::small_config();
    let model = config.model.init::<TestBackend>(&device);

    let mut batched = DataLoader::new(dataset(9), 4, false, 0);
    let mut whole = DataLoader::full_batch(dataset(9));

    let batched = evaluate(&model, &mut batched, &device).unwrap();
    let whole = evaluate(&model, &mut whole, &device).unwrap();
    assert!((batched.mse - whole.mse).abs() < 1e-6);
    assert_eq!(batched.output.0.dims()[0], 1);
    assert_eq!(whole.output.0.dims()[0], 9);
}

#[test]
fn evaluating_an_empty_loader_fails() {
    let device = Default::default();
    let config = common::small_config();
    let model = config.model.init::<TestBackend>(&device);
    let mut loader = DataLoader::full_batch(dataset(0));
    assert!(evaluate(&model, &mut loader, &device).is_err());
}
