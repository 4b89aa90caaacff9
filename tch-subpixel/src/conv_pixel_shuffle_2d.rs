//! Convolution followed by pixel shuffle, ICNR initialized.

use crate::{common::*, conv_2d::*, padding::*};
use tch_icnr::{check_icnr_uniformity, f_icnr_init_, upscale_area};

pub use conv_pixel_shuffle_2d_::*;
pub use conv_pixel_shuffle_2d_grad::*;
pub use conv_pixel_shuffle_2d_init::*;
pub use uninit_conv_pixel_shuffle_2d::*;

mod conv_pixel_shuffle_2d_init {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct Conv2DPixelShuffleInit {
        pub in_c: usize,
        /// Number of channels after pixel shuffle.
        pub out_c: usize,
        #[serde(default = "default_upscale_factor")]
        pub upscale_factor: usize,
        #[serde(default = "default_ksize")]
        pub k: Size2D,
        #[serde(default = "unit_size")]
        pub s: Size2D,
        #[serde(default)]
        pub p: Padding,
        #[serde(default = "unit_size")]
        pub d: Size2D,
        #[serde(default = "default_groups")]
        pub g: usize,
        #[serde(default = "default_bias")]
        pub bias: bool,
        #[serde(default)]
        pub padding_mode: PaddingMode,
        #[serde(default)]
        pub initializer: Init,
    }

    fn default_upscale_factor() -> usize {
        2
    }

    fn default_ksize() -> Size2D {
        Size2D::square(3)
    }

    fn unit_size() -> Size2D {
        Size2D::square(1)
    }

    fn default_groups() -> usize {
        1
    }

    fn default_bias() -> bool {
        true
    }

    impl Conv2DPixelShuffleInit {
        pub fn new(in_c: usize, out_c: usize) -> Self {
            Self {
                in_c,
                out_c,
                upscale_factor: default_upscale_factor(),
                k: default_ksize(),
                s: unit_size(),
                p: Padding::Same,
                d: unit_size(),
                g: default_groups(),
                bias: default_bias(),
                padding_mode: PaddingMode::Zeros,
                initializer: Init::default(),
            }
        }

        /// Loads the configuration from a JSON5 file.
        pub fn load(path: impl AsRef<Path>) -> Result<Self> {
            let path = path.as_ref();
            let text = fs::read_to_string(path)
                .with_context(|| format!("cannot open {}", path.display()))?;
            let init: Self = json5::from_str(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            Ok(init)
        }

        /// Allocates the convolution without running ICNR initialization.
        pub fn build_uninit<'p, P>(self, path: P) -> Result<UninitConv2DPixelShuffle>
        where
            P: Borrow<nn::Path<'p>>,
        {
            let path = path.borrow();

            let Self {
                in_c,
                out_c,
                upscale_factor,
                k,
                s,
                p,
                d,
                g,
                bias,
                padding_mode,
                initializer,
            } = self;

            let area = upscale_area(upscale_factor)?;
            if upscale_factor == 1 {
                warn!("upscale_factor is 1, the pixel shuffle does not upsample");
            }

            let expanded_c = usize::try_from(area)
                .ok()
                .and_then(|area| out_c.checked_mul(area))
                .ok_or_else(|| {
                    format_err!(
                        "out_c {} times upscale_factor² {} overflows",
                        out_c,
                        area
                    )
                })?;
            let conv = Conv2DInit {
                ksize: k.0,
                stride: s.0,
                padding: p,
                padding_mode,
                dilation: d.0,
                groups: g,
                bias,
                ws_init: nn::Init::Const(0.0),
                bs_init: nn::Init::Const(0.0),
            }
            .build(path / "conv", in_c, expanded_c)?;

            debug!(
                "allocate conv pixel shuffle {} -> {} -> {} channels, upscale factor {}",
                in_c, expanded_c, out_c, upscale_factor
            );

            Ok(UninitConv2DPixelShuffle {
                conv,
                upscale_factor,
                initializer,
            })
        }

        /// Allocates the convolution and ICNR initializes its weight.
        pub fn build<'p, P>(self, path: P) -> Result<Conv2DPixelShuffle>
        where
            P: Borrow<nn::Path<'p>>,
        {
            self.build_uninit(path)?.initialize()
        }
    }
}

mod uninit_conv_pixel_shuffle_2d {
    use super::*;

    /// An allocated [Conv2DPixelShuffle] whose weight is not initialized yet.
    #[derive(Debug)]
    pub struct UninitConv2DPixelShuffle {
        pub(super) conv: Conv2D,
        pub(super) upscale_factor: usize,
        pub(super) initializer: Init,
    }

    impl UninitConv2DPixelShuffle {
        /// Initializes the weight with the configured initializer.
        pub fn initialize(self) -> Result<Conv2DPixelShuffle> {
            let initializer = self.initializer;
            self.initialize_with(&initializer)
        }

        /// Initializes the weight with a custom base initializer.
        pub fn initialize_with<I>(self, init: &I) -> Result<Conv2DPixelShuffle>
        where
            I: WeightInit + ?Sized,
        {
            let Self {
                mut conv,
                upscale_factor,
                ..
            } = self;

            f_icnr_init_(conv.weight_mut(), upscale_factor, init)?;

            Ok(Conv2DPixelShuffle {
                conv,
                upscale_factor,
            })
        }

        pub fn upscale_factor(&self) -> usize {
            self.upscale_factor
        }
    }
}

mod conv_pixel_shuffle_2d_ {
    use super::*;

    #[derive(Debug, Getters, CopyGetters)]
    pub struct Conv2DPixelShuffle {
        #[getset(get = "pub")]
        pub(super) conv: Conv2D,
        #[getset(get_copy = "pub")]
        pub(super) upscale_factor: usize,
    }

    impl Conv2DPixelShuffle {
        pub fn f_forward(&self, xs: &Tensor) -> Result<Tensor> {
            let Self {
                ref conv,
                upscale_factor,
            } = *self;

            conv.f_forward(xs)?
                .f_pixel_shuffle_checked(upscale_factor)
                .context("pixel shuffle failed")
        }

        pub fn in_c(&self) -> usize {
            self.conv.in_dim() as usize
        }

        pub fn out_c(&self) -> usize {
            self.conv.out_dim() as usize / (self.upscale_factor * self.upscale_factor)
        }

        /// Computes the output `[height, width]` for an input of spatial size `[height, width]`.
        pub fn output_size(&self, input_size: [usize; 2]) -> Result<[usize; 2]> {
            let [h, w] = self.conv.output_size(input_size)?;
            let r = self.upscale_factor;
            Ok([h * r, w * r])
        }

        /// Checks whether the weight still holds the ICNR pattern.
        pub fn is_icnr_uniform(&self) -> Result<bool> {
            check_icnr_uniformity(self.conv.weight(), self.upscale_factor)
        }

        pub fn set_trainable(&self, trainable: bool) {
            self.conv.set_trainable(trainable);
        }

        pub fn grad(&self) -> Conv2DPixelShuffleGrad {
            Conv2DPixelShuffleGrad {
                conv: self.conv.grad(),
            }
        }
    }

    impl nn::Module for Conv2DPixelShuffle {
        fn forward(&self, xs: &Tensor) -> Tensor {
            self.f_forward(xs).unwrap()
        }
    }
}

mod conv_pixel_shuffle_2d_grad {
    use super::*;

    #[derive(Debug, TensorLike)]
    pub struct Conv2DPixelShuffleGrad {
        pub conv: Conv2DGrad,
    }
}
