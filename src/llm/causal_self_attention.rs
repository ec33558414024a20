use candle_core::safetensors::MmapedSafetensors;
use candle_core::{DType, Device, Result as CandleResult, Tensor, D};

use crate::llm::layer::Layer;
use crate::llm::linear::LinearLayer;

/// KV cache for storing key and value tensors across generation steps
#[derive(Clone, Default)]
pub struct KVCache {
    pub k_cache: Option<Tensor>,
    pub v_cache: Option<Tensor>,
}

impl KVCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends new `(batch, kv_heads, seq, head_dim)` keys and values along the
    /// sequence axis and returns the full cached tensors.
    pub fn append(&mut self, k: Tensor, v: Tensor) -> CandleResult<(Tensor, Tensor)> {
        let k = match &self.k_cache {
            Some(k_cached) => Tensor::cat(&[k_cached, &k], 2)?,
            None => k,
        };
        let v = match &self.v_cache {
            Some(v_cached) => Tensor::cat(&[v_cached, &v], 2)?,
            None => v,
        };
        self.k_cache = Some(k.clone());
        self.v_cache = Some(v.clone());
        Ok((k, v))
    }
}

/// `(1, 1, seq_len, total_len)` additive mask; query `i` sits at absolute
/// position `total_len - seq_len + i` and may attend to keys up to it.
fn causal_mask(seq_len: usize, total_len: usize, device: &Device, dtype: DType) -> CandleResult<Tensor> {
    let offset = total_len - seq_len;
    let mask = (0..seq_len)
        .flat_map(|i| {
            (0..total_len).map(move |j| if j > i + offset { f32::NEG_INFINITY } else { 0.0 })
        })
        .collect::<Vec<f32>>();

    Tensor::from_vec(mask, (seq_len, total_len), device)?
        .to_dtype(dtype)?
        .unsqueeze(0)?
        .unsqueeze(0)
}

fn repeat_kv(x: Tensor, n_rep: usize) -> CandleResult<Tensor> {
    if n_rep == 1 {
        return Ok(x);
    }

    let (b_sz, n_kv_heads, seq_len, head_dim) = x.dims4()?;
    x.unsqueeze(2)?
        .expand((b_sz, n_kv_heads, n_rep, seq_len, head_dim))?
        .reshape((b_sz, n_kv_heads * n_rep, seq_len, head_dim))
}

/// Masked scaled dot-product attention over `(batch, heads, seq, head_dim)`
/// tensors; returns `(batch, seq, heads * head_dim)`.
fn attend(q: &Tensor, k: &Tensor, v: &Tensor) -> CandleResult<Tensor> {
    let (b_sz, n_heads, seq_len, head_dim) = q.dims4()?;
    let total_len = k.dim(2)?;

    let scaling = 1.0 / (head_dim as f64).sqrt();
    let mut attn_scores = q.matmul(&k.t()?.contiguous()?)?.affine(scaling, 0.0)?;

    if seq_len > 1 {
        let mask = causal_mask(seq_len, total_len, q.device(), q.dtype())?;
        attn_scores = attn_scores.broadcast_add(&mask)?;
    }

    let attn_probs = candle_nn::ops::softmax_last_dim(&attn_scores)?;

    attn_probs
        .matmul(v)?
        .transpose(1, 2)?
        .reshape((b_sz, seq_len, n_heads * head_dim))
}

/// `(batch, seq, heads * head_dim)` -> `(batch, heads, seq, head_dim)`
fn split_heads(x: &Tensor, n_heads: usize, head_dim: usize) -> CandleResult<Tensor> {
    let (b_sz, seq_len, _) = x.dims3()?;
    x.reshape((b_sz, seq_len, n_heads, head_dim))?
        .transpose(1, 2)?
        .contiguous()
}

/// Llama attention: separate projections, rotary position embeddings and
/// grouped-query key/value heads.
pub struct LlamaAttentionLayer {
    q_proj: LinearLayer,
    k_proj: LinearLayer,
    v_proj: LinearLayer,
    o_proj: LinearLayer,
    n_heads: usize,
    n_kv_heads: usize,
    head_dim: usize,
    rope_theta: f32,
}

impl LlamaAttentionLayer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        weights: &MmapedSafetensors,
        prefix: &str,
        n_heads: usize,
        n_kv_heads: usize,
        hidden_size: usize,
        rope_theta: f32,
        device: &Device,
        dtype: DType,
    ) -> CandleResult<Self> {
        let q_proj = LinearLayer::new(weights, &format!("{}.q_proj", prefix), device, dtype)?;
        let k_proj = LinearLayer::new(weights, &format!("{}.k_proj", prefix), device, dtype)?;
        let v_proj = LinearLayer::new(weights, &format!("{}.v_proj", prefix), device, dtype)?;
        let o_proj = LinearLayer::new(weights, &format!("{}.o_proj", prefix), device, dtype)?;

        Ok(Self {
            q_proj,
            k_proj,
            v_proj,
            o_proj,
            n_heads,
            n_kv_heads,
            head_dim: hidden_size / n_heads,
            rope_theta,
        })
    }

    fn rotate_half(x: &Tensor) -> CandleResult<Tensor> {
        let last_dim = x.dim(D::Minus1)?;

        let xs1 = x.narrow(D::Minus1, 0, last_dim / 2)?;
        let xs2 = x.narrow(D::Minus1, last_dim / 2, last_dim - last_dim / 2)?;

        Tensor::cat(&[&xs2.neg()?, &xs1], D::Minus1)
    }

    /// Rotates `x` for absolute positions `position..position + seq_len`.
    fn apply_rotary_emb(&self, x: &Tensor, position: usize) -> CandleResult<Tensor> {
        let seq_len = x.dim(2)?;
        let device = x.device();

        let inv_freq: Vec<f32> = (0..self.head_dim / 2)
            .map(|i| 1.0 / self.rope_theta.powf(2.0 * i as f32 / self.head_dim as f32))
            .collect();
        let inv_freq = Tensor::new(inv_freq.as_slice(), device)?;

        let t = Tensor::arange(position as u32, (position + seq_len) as u32, device)?
            .to_dtype(DType::F32)?;

        // (seq_len, head_dim / 2)
        let freqs = t.unsqueeze(1)?.broadcast_mul(&inv_freq.unsqueeze(0)?)?;
        let emb = Tensor::cat(&[&freqs, &freqs], 1)?;

        let cos = emb.cos()?.to_dtype(x.dtype())?;
        let sin = emb.sin()?.to_dtype(x.dtype())?;

        x.broadcast_mul(&cos)? + Self::rotate_half(x)?.broadcast_mul(&sin)?
    }

    pub fn forward_with_cache(
        &self,
        input: &Tensor,
        kv_cache: &mut KVCache,
        position: usize,
    ) -> CandleResult<Tensor> {
        let q = split_heads(&self.q_proj.forward(input)?, self.n_heads, self.head_dim)?;
        let k = split_heads(&self.k_proj.forward(input)?, self.n_kv_heads, self.head_dim)?;
        let v = split_heads(&self.v_proj.forward(input)?, self.n_kv_heads, self.head_dim)?;

        let q = self.apply_rotary_emb(&q, position)?;
        let k = self.apply_rotary_emb(&k, position)?;

        let (k, v) = kv_cache.append(k, v)?;

        let n_rep = self.n_heads / self.n_kv_heads;
        let k = repeat_kv(k, n_rep)?;
        let v = repeat_kv(v, n_rep)?;

        let context = attend(&q, &k, &v)?;
        self.o_proj.forward(&context)
    }
}

/// GPT-2 attention: fused `c_attn` query/key/value projection, no rotary
/// embeddings (positions are added to the token embeddings instead).
pub struct Gpt2AttentionLayer {
    c_attn: LinearLayer,
    c_proj: LinearLayer,
    n_heads: usize,
    hidden_size: usize,
}

impl Gpt2AttentionLayer {
    pub fn new(
        weights: &MmapedSafetensors,
        prefix: &str,
        n_heads: usize,
        hidden_size: usize,
        device: &Device,
        dtype: DType,
    ) -> CandleResult<Self> {
        let c_attn = LinearLayer::from_conv1d(weights, &format!("{}.c_attn", prefix), device, dtype)?;
        let c_proj = LinearLayer::from_conv1d(weights, &format!("{}.c_proj", prefix), device, dtype)?;

        Ok(Self {
            c_attn,
            c_proj,
            n_heads,
            hidden_size,
        })
    }

    pub fn forward_with_cache(&self, input: &Tensor, kv_cache: &mut KVCache) -> CandleResult<Tensor> {
        let head_dim = self.hidden_size / self.n_heads;
        let qkv = self.c_attn.forward(input)?;

        let q = qkv.narrow(D::Minus1, 0, self.hidden_size)?;
        let k = qkv.narrow(D::Minus1, self.hidden_size, self.hidden_size)?;
        let v = qkv.narrow(D::Minus1, 2 * self.hidden_size, self.hidden_size)?;

        let q = split_heads(&q, self.n_heads, head_dim)?;
        let k = split_heads(&k, self.n_heads, head_dim)?;
        let v = split_heads(&v, self.n_heads, head_dim)?;

        let (k, v) = kv_cache.append(k, v)?;

        let context = attend(&q, &k, &v)?;
        self.c_proj.forward(&context)
    }
}
