//! Latent <-> RGB codecs.

use burn::prelude::*;

/// Maps between pixel RGB and the guidance model's latent space.
pub trait LatentCodec<B: Backend> {
    /// Channels of a latent image.
    fn latent_channels(&self) -> usize;

    /// Pixel RGB in `[0, 1]` (`[B, H, W, 3]`) to latents (`[B, H, W, C]`).
    fn encode(&self, rgb: Tensor<B, 4>) -> Tensor<B, 4>;

    /// Latents (`[B, H, W, C]`) to pixel RGB in `[0, 1]` (`[B, H, W, 3]`).
    fn decode(&self, latents: Tensor<B, 4>) -> Tensor<B, 4>;

    /// Fixed tensors, for state dicts.
    fn buffers(&self) -> Vec<(String, Tensor<B, 2>)> {
        Vec::new()
    }
}

/// Per-channel RGB contribution of each of the four latent channels.
///
/// A linear approximation of a latent-diffusion VAE decoder, applied to
/// latents before the `[-1, 1] -> [0, 1]` remap.
pub const LATENT_RGB_FACTORS: [[f32; 3]; 4] = [
    [0.3512, 0.2297, 0.3227],
    [0.3250, 0.4974, 0.2350],
    [-0.2829, 0.1762, 0.2721],
    [-0.2120, -0.2616, -0.7177],
];

/// Left pseudo-inverse `(FᵀF)⁻¹Fᵀ` of the 4x3 factor matrix, as 3x4.
fn pseudo_inverse(f: &[[f32; 3]; 4]) -> [[f32; 4]; 3] {
    let mut ftf = [[0f64; 3]; 3];
    for row in f {
        for i in 0..3 {
            for j in 0..3 {
                ftf[i][j] += row[i] as f64 * row[j] as f64;
            }
        }
    }

    let m = ftf;
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    let inv_det = 1.0 / det;
    let inv = [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ];

    let mut out = [[0f32; 4]; 3];
    for i in 0..3 {
        for (k, row) in f.iter().enumerate() {
            out[i][k] = (0..3).map(|j| inv[i][j] * row[j] as f64).sum::<f64>() as f32;
        }
    }
    out
}

/// Fixed linear codec built from [`LATENT_RGB_FACTORS`].
#[derive(Debug, Clone)]
pub struct LinearLatentCodec<B: Backend> {
    decode_matrix: Tensor<B, 2>,
    encode_matrix: Tensor<B, 2>,
}

impl<B: Backend> LinearLatentCodec<B> {
    /// Create the codec on a device.
    pub fn new(device: &B::Device) -> Self {
        let decode: Vec<f32> = LATENT_RGB_FACTORS.iter().flatten().copied().collect();
        let encode: Vec<f32> = pseudo_inverse(&LATENT_RGB_FACTORS)
            .iter()
            .flatten()
            .copied()
            .collect();
        Self {
            decode_matrix: Tensor::from_data(TensorData::new(decode, [4, 3]), device),
            encode_matrix: Tensor::from_data(TensorData::new(encode, [3, 4]), device),
        }
    }
}

impl<B: Backend> LatentCodec<B> for LinearLatentCodec<B> {
    fn latent_channels(&self) -> usize {
        4
    }

    fn encode(&self, rgb: Tensor<B, 4>) -> Tensor<B, 4> {
        let [b, h, w, _] = rgb.dims();
        let signed = rgb.reshape([b * h * w, 3]) * 2.0 - 1.0;
        signed
            .matmul(self.encode_matrix.clone())
            .reshape([b, h, w, 4])
    }

    fn decode(&self, latents: Tensor<B, 4>) -> Tensor<B, 4> {
        let [b, h, w, _] = latents.dims();
        let signed = latents
            .reshape([b * h * w, 4])
            .matmul(self.decode_matrix.clone());
        ((signed + 1.0) * 0.5).clamp(0.0, 1.0).reshape([b, h, w, 3])
    }

    fn buffers(&self) -> Vec<(String, Tensor<B, 2>)> {
        vec![
            ("decode_matrix".to_string(), self.decode_matrix.clone()),
            ("encode_matrix".to_string(), self.encode_matrix.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::to_vec_f32;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_pseudo_inverse_is_left_inverse() {
        let pinv = pseudo_inverse(&LATENT_RGB_FACTORS);
        for i in 0..3 {
            for j in 0..3 {
                let v: f32 = (0..4).map(|k| pinv[i][k] * LATENT_RGB_FACTORS[k][j]).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((v - expected).abs() < 1e-4, "({i}, {j}) = {v}");
            }
        }
    }

    #[test]
    fn test_decode_encode_identity() {
        let device = Default::default();
        let codec = LinearLatentCodec::<TestBackend>::new(&device);
        let rgb = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![0.1, 0.5, 0.9, 0.3, 0.3, 0.3, 0.8, 0.2, 0.6, 0.0, 1.0, 0.5], [1, 2, 2, 3]),
            &device,
        );
        let latents = codec.encode(rgb.clone());
        assert_eq!(latents.dims(), [1, 2, 2, 4]);

        let back = to_vec_f32(codec.decode(latents));
        for (a, b) in back.iter().zip(to_vec_f32(rgb)) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_decode_clamps() {
        let device = Default::default();
        let codec = LinearLatentCodec::<TestBackend>::new(&device);
        let latents = Tensor::<TestBackend, 4>::full([1, 1, 1, 4], 10.0, &device);
        for v in to_vec_f32(codec.decode(latents)) {
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
