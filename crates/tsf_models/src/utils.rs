//! Small building blocks shared by the models.

use burn::prelude::*;
use burn::tensor::TensorData;
use burn_ndarray::NdArrayDevice;

/// Swap the time and channel axes: `(batch, steps, channels)` to
/// `(batch, channels, steps)` and back.
///
/// Convolutions and pooling work channel-first while the models keep
/// sequences time-first.
#[derive(Module, Clone, Debug, Default)]
pub struct Permute;

impl Permute {
    /// Create a new permutation.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Swap axes 1 and 2.
    pub fn forward<B: Backend>(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        x.swap_dims(1, 2)
    }
}

/// Causal mask for self-attention: `true` strictly above the diagonal, so
/// step `i` never attends to a step `j > i`.
///
/// Shape `(batch, size, size)`.
pub fn generate_square_subsequent_mask<B: Backend>(
    batch: usize,
    size: usize,
    device: &B::Device,
) -> Tensor<B, 3, Bool> {
    let mut mask = Vec::with_capacity(batch * size * size);
    for _ in 0..batch {
        for i in 0..size {
            mask.extend((0..size).map(|j| j > i));
        }
    }
    Tensor::from_data(TensorData::new(mask, [batch, size, size]), device)
}

/// Device used for training and inference.
///
/// Only the CPU backend is wired in.
#[must_use]
pub fn get_device() -> NdArrayDevice {
    let device = NdArrayDevice::Cpu;
    tracing::info!(?device, "using device");
    device
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_permute() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 3>::zeros([2, 5, 3], &device);
        let permute = Permute::new();
        let y = permute.forward(x);
        assert_eq!(y.dims(), [2, 3, 5]);
        assert_eq!(permute.forward(y).dims(), [2, 5, 3]);
    }

    #[test]
    fn test_square_subsequent_mask() {
        let device = Default::default();
        let mask = generate_square_subsequent_mask::<TestBackend>(2, 3, &device);
        assert_eq!(mask.dims(), [2, 3, 3]);
        let values = mask.into_data().to_vec::<bool>().unwrap();
        let expected = [false, true, true, false, false, true, false, false, false];
        assert_eq!(&values[..9], &expected);
        assert_eq!(&values[9..], &expected);
    }

    #[test]
    fn test_get_device() {
        assert_eq!(get_device(), NdArrayDevice::Cpu);
    }
}
