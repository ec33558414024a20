use candle_core::Tensor;
use candle_core::Result as CandleResult;

/// A module with a single-input forward pass.
pub trait Layer {
    fn forward(&self, input: &Tensor) -> CandleResult<Tensor>;
}
