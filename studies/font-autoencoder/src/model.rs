use burn::{
    nn::{ Linear, LinearConfig, Relu },
    prelude::*,
    tensor::activation::sigmoid,
};

#[derive(Config, Debug)]
pub struct GlyphAutoencoderConfig {
    #[config(default = 5)]
    pub category_size: usize,
    #[config(default = 52)]
    pub alpha_size: usize,
    /// Number of pixels in one glyph (height * width).
    #[config(default = 16384)]
    pub font_size: usize,
    #[config(default = 32)]
    pub z_size: usize,
    #[config(default = 512)]
    pub hidden_size: usize,
}

impl GlyphAutoencoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GlyphAutoencoder<B> {
        let bottleneck = (self.hidden_size / 4).max(1);
        let condition_size = self.z_size + self.alpha_size + self.category_size;

        GlyphAutoencoder {
            enc1: LinearConfig::new(self.font_size, self.hidden_size).init(device),
            enc2: LinearConfig::new(self.hidden_size, bottleneck).init(device),
            enc3: LinearConfig::new(bottleneck, self.z_size).init(device),
            dec1: LinearConfig::new(condition_size, bottleneck).init(device),
            dec2: LinearConfig::new(bottleneck, self.hidden_size).init(device),
            dec3: LinearConfig::new(self.hidden_size, self.font_size).init(device),
            activation: Relu::new(),
        }
    }
}

/// Autoencoder whose decoder sees the latent code together with the
/// alphabet and category one-hot vectors.
#[derive(Module, Debug)]
pub struct GlyphAutoencoder<B: Backend> {
    enc1: Linear<B>,
    enc2: Linear<B>,
    enc3: Linear<B>,
    dec1: Linear<B>,
    dec2: Linear<B>,
    dec3: Linear<B>,
    activation: Relu,
}

impl<B: Backend> GlyphAutoencoder<B> {
    /// Glyphs `[N, H, W]` to latent codes `[N, z_size]`.
    pub fn encode(&self, images: Tensor<B, 3>) -> Tensor<B, 2> {
        let [n, h, w] = images.dims();
        let x = images.reshape([n, h * w]);

        let x = self.activation.forward(self.enc1.forward(x));
        let x = self.activation.forward(self.enc2.forward(x));
        self.enc3.forward(x)
    }

    /// Latent codes plus conditioning vectors to glyphs `[N, height, width]` in `[0, 1]`.
    pub fn decode(
        &self,
        z: Tensor<B, 2>,
        alphabet: Tensor<B, 2>,
        category: Tensor<B, 2>,
        [height, width]: [usize; 2]
    ) -> Tensor<B, 3> {
        let n = z.dims()[0];
        let x = Tensor::cat(vec![z, alphabet, category], 1);

        let x = self.activation.forward(self.dec1.forward(x));
        let x = self.activation.forward(self.dec2.forward(x));
        sigmoid(self.dec3.forward(x)).reshape([n, height, width])
    }

    /// Returns the reconstruction and the latent code.
    pub fn forward(
        &self,
        images: Tensor<B, 3>,
        alphabet: Tensor<B, 2>,
        category: Tensor<B, 2>
    ) -> (Tensor<B, 3>, Tensor<B, 2>) {
        let [_, h, w] = images.dims();
        let z = self.encode(images);
        let reconstruction = self.decode(z.clone(), alphabet, category, [h, w]);
        (reconstruction, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn forward_keeps_image_shape() {
        let device = Default::default();
        let config = GlyphAutoencoderConfig::new()
            .with_font_size(8 * 8)
            .with_hidden_size(32)
            .with_z_size(4);
        let model = config.init::<TestBackend>(&device);

        let images = Tensor::<TestBackend, 3>::ones([3, 8, 8], &device);
        let alphabet = Tensor::<TestBackend, 2>::zeros([3, config.alpha_size], &device);
        let category = Tensor::<TestBackend, 2>::zeros([3, config.category_size], &device);

        let (reconstruction, z) = model.forward(images, alphabet, category);
        assert_eq!(reconstruction.dims(), [3, 8, 8]);
        assert_eq!(z.dims(), [3, 4]);

        let values = reconstruction.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
