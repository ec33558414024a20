use candle_core::safetensors::MmapedSafetensors;
use candle_core::{DType, Device, Result as CandleResult, Tensor};
use candle_nn::var_builder::SimpleBackend;

use crate::llm::layer::Layer;

/// `y = x W^T + b`, with `W` stored as `(out_features, in_features)`.
pub struct LinearLayer {
    weights: Tensor,
    bias: Option<Tensor>,
    device: Device,
}

impl LinearLayer {
    /// Loads a `torch.nn.Linear` (`{prefix}.weight`, optional `{prefix}.bias`).
    pub fn new(
        weights_map: &MmapedSafetensors,
        prefix: &str,
        device: &Device,
        dtype: DType,
    ) -> CandleResult<Self> {
        let weights = weights_map
            .load(&format!("{}.weight", prefix), device)?
            .to_dtype(dtype)?;
        let bias = load_bias(weights_map, prefix, device, dtype)?;

        Ok(Self {
            weights,
            bias,
            device: device.clone(),
        })
    }

    /// Loads a GPT-2 `Conv1D`, whose weight is stored as `(in_features, out_features)`.
    pub fn from_conv1d(
        weights_map: &MmapedSafetensors,
        prefix: &str,
        device: &Device,
        dtype: DType,
    ) -> CandleResult<Self> {
        let weights = weights_map
            .load(&format!("{}.weight", prefix), device)?
            .to_dtype(dtype)?
            .t()?
            .contiguous()?;
        let bias = load_bias(weights_map, prefix, device, dtype)?;

        Ok(Self {
            weights,
            bias,
            device: device.clone(),
        })
    }

    /// Wraps an already loaded weight, e.g. an LM head tied to the token embedding.
    pub fn from_weights(weights: Tensor, bias: Option<Tensor>) -> Self {
        let device = weights.device().clone();
        Self {
            weights,
            bias,
            device,
        }
    }
}

fn load_bias(
    weights_map: &MmapedSafetensors,
    prefix: &str,
    device: &Device,
    dtype: DType,
) -> CandleResult<Option<Tensor>> {
    let name = format!("{}.bias", prefix);
    if weights_map.contains_tensor(&name) {
        Ok(Some(weights_map.load(&name, device)?.to_dtype(dtype)?))
    } else {
        Ok(None)
    }
}

impl Layer for LinearLayer {
    fn forward(&self, input: &Tensor) -> CandleResult<Tensor> {
        let input = input.to_device(&self.device)?;
        let mut output = input.broadcast_matmul(&self.weights.t()?)?;
        if let Some(bias) = &self.bias {
            output = output.broadcast_add(bias)?
        }
        Ok(output)
    }
}
