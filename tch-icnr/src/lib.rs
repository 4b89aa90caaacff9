//! ICNR weight initialization for sub-pixel convolutions on top of [tch].
//!
//! The weight of a convolution that feeds `pixel_shuffle(r)` is initialized so
//! that every `r²` output channels folded into one upscaled channel start from
//! identical kernels, which removes the checkerboard pattern at step zero.
//! See [Aitken et al., 2017](https://arxiv.org/abs/1707.02937).

mod common;
pub mod icnr;
pub mod init;
pub mod tensor;

pub use icnr::*;
pub use init::*;
pub use tensor::*;
