use candle_core::{safetensors::MmapedSafetensors, DType, Device, Result as CandleResult, Tensor};

use crate::llm::layer::Layer;

/// LayerNorm with learned scale and shift, computed in F32.
pub struct LayerNormLayer {
    weights: Tensor,
    bias: Tensor,
    eps: f64,
    device: Device,
}

impl LayerNormLayer {
    pub fn new(
        weights_map: &MmapedSafetensors,
        prefix: &str,
        device: &Device,
        dtype: DType,
        eps: f64,
    ) -> CandleResult<Self> {
        let weights = weights_map
            .load(&format!("{}.weight", prefix), device)?
            .to_dtype(dtype)?;
        let bias = weights_map
            .load(&format!("{}.bias", prefix), device)?
            .to_dtype(dtype)?;

        Ok(Self {
            weights,
            bias,
            eps,
            device: device.clone(),
        })
    }
}

impl Layer for LayerNormLayer {
    fn forward(&self, input: &Tensor) -> CandleResult<Tensor> {
        let dtype = input.dtype();
        let input = input.to_device(&self.device)?.to_dtype(DType::F32)?;
        let mean = input.mean_keepdim(candle_core::D::Minus1)?;
        let centered = input.broadcast_sub(&mean)?;
        let variance = centered.sqr()?.mean_keepdim(candle_core::D::Minus1)?;
        let std = variance.affine(1.0, self.eps)?.sqrt()?;

        let norm_x = centered.broadcast_div(&std)?.to_dtype(dtype)?;

        norm_x
            .broadcast_mul(&self.weights)?
            .broadcast_add(&self.bias)
    }
}
