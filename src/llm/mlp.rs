use candle_core::safetensors::MmapedSafetensors;
use candle_core::{DType, Device, Result as CandleResult, Tensor};

use crate::llm::activation::Activation;
use crate::llm::layer::Layer;
use crate::llm::linear::LinearLayer;

/// Llama feed-forward: `down(act(gate(x)) * up(x))`.
pub struct GatedMlpLayer {
    gate_proj: LinearLayer,
    up_proj: LinearLayer,
    down_proj: LinearLayer,
    activation: Activation,
}

impl GatedMlpLayer {
    pub fn new(
        weights_map: &MmapedSafetensors,
        prefix: &str,
        device: &Device,
        dtype: DType,
        activation: Activation,
    ) -> CandleResult<Self> {
        let gate_proj =
            LinearLayer::new(weights_map, &format!("{}.gate_proj", prefix), device, dtype)?;
        let up_proj = LinearLayer::new(weights_map, &format!("{}.up_proj", prefix), device, dtype)?;
        let down_proj =
            LinearLayer::new(weights_map, &format!("{}.down_proj", prefix), device, dtype)?;
        Ok(Self {
            gate_proj,
            up_proj,
            down_proj,
            activation,
        })
    }
}

impl Layer for GatedMlpLayer {
    fn forward(&self, input: &Tensor) -> CandleResult<Tensor> {
        let gate_output = self.gate_proj.forward(input)?;
        let up_output = self.up_proj.forward(input)?;
        let activated = self.activation.apply(&gate_output)?;
        let multiplied = activated.mul(&up_output)?;
        self.down_proj.forward(&multiplied)
    }
}

/// GPT-2 feed-forward: `c_proj(act(c_fc(x)))`, both projections stored as `Conv1D`.
pub struct MlpLayer {
    c_fc: LinearLayer,
    c_proj: LinearLayer,
    activation: Activation,
}

impl MlpLayer {
    pub fn new(
        weights_map: &MmapedSafetensors,
        prefix: &str,
        device: &Device,
        dtype: DType,
        activation: Activation,
    ) -> CandleResult<Self> {
        let c_fc = LinearLayer::from_conv1d(weights_map, &format!("{}.c_fc", prefix), device, dtype)?;
        let c_proj =
            LinearLayer::from_conv1d(weights_map, &format!("{}.c_proj", prefix), device, dtype)?;
        Ok(Self {
            c_fc,
            c_proj,
            activation,
        })
    }
}

impl Layer for MlpLayer {
    fn forward(&self, input: &Tensor) -> CandleResult<Tensor> {
        let hidden = self.c_fc.forward(input)?;
        let activated = self.activation.apply(&hidden)?;
        self.c_proj.forward(&activated)
    }
}
