//! Sub-pixel convolution modules for [tch].
//!
//! [Conv2DPixelShuffle] is a convolution producing `out_c * r²` channels followed by
//! `pixel_shuffle(r)`, with its weight ICNR initialized at construction.

mod common;
pub mod conv_2d;
pub mod conv_pixel_shuffle_2d;
pub mod padding;

pub use conv_2d::*;
pub use conv_pixel_shuffle_2d::*;
pub use padding::*;
pub use tch_icnr;
