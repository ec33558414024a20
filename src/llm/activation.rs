use std::str::FromStr;

use candle_core::{Result as CandleResult, Tensor};

use crate::error::LoadError;

/// Activation functions named by HuggingFace `hidden_act` / `activation_function`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// tanh approximation (`gelu_new`, `gelu_pytorch_tanh`)
    GeluTanh,
    /// exact erf form (`gelu`)
    Gelu,
    Relu,
    Silu,
}

impl FromStr for Activation {
    type Err = LoadError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "gelu_new" | "gelu_fast" | "gelu_pytorch_tanh" => Ok(Activation::GeluTanh),
            "gelu" => Ok(Activation::Gelu),
            "relu" => Ok(Activation::Relu),
            "silu" | "swish" => Ok(Activation::Silu),
            other => Err(LoadError::UnsupportedActivation(other.to_string())),
        }
    }
}

impl Activation {
    pub fn apply(&self, input: &Tensor) -> CandleResult<Tensor> {
        match self {
            Activation::GeluTanh => input.gelu(),
            Activation::Gelu => input.gelu_erf(),
            Activation::Relu => input.relu(),
            Activation::Silu => input.silu(),
        }
    }
}
