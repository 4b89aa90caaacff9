use crate::{common::*, padding::*};

pub use conv_2d_::*;
pub use conv_2d_grad::*;
pub use conv_init::*;
pub use conv_param::*;

mod conv_param {
    use super::*;

    /// A `[height, width]` convolution parameter.
    ///
    /// Serialized as a single integer applied to both dimensions, or a pair.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(from = "Size2DRepr", into = "Size2DRepr")]
    pub struct Size2D(pub [usize; 2]);

    impl Size2D {
        pub fn square(size: usize) -> Self {
            Self([size; 2])
        }

        pub fn to_i64(&self) -> Result<[i64; 2]> {
            let [h, w] = self.0;
            Ok([i64::try_from(h)?, i64::try_from(w)?])
        }
    }

    impl From<usize> for Size2D {
        fn from(size: usize) -> Self {
            Self::square(size)
        }
    }

    impl From<[usize; 2]> for Size2D {
        fn from(size: [usize; 2]) -> Self {
            Self(size)
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(untagged)]
    enum Size2DRepr {
        Scalar(usize),
        Pair([usize; 2]),
    }

    impl From<Size2DRepr> for Size2D {
        fn from(from: Size2DRepr) -> Self {
            match from {
                Size2DRepr::Scalar(size) => Self::square(size),
                Size2DRepr::Pair(size) => Self(size),
            }
        }
    }

    impl From<Size2D> for Size2DRepr {
        fn from(from: Size2D) -> Self {
            match from.0 {
                [h, w] if h == w => Self::Scalar(h),
                size => Self::Pair(size),
            }
        }
    }
}

mod conv_init {
    use super::*;

    #[derive(Debug, Clone)]
    pub struct Conv2DInit {
        pub ksize: [usize; 2],
        pub stride: [usize; 2],
        pub padding: Padding,
        pub padding_mode: PaddingMode,
        pub dilation: [usize; 2],
        pub groups: usize,
        pub bias: bool,
        pub ws_init: nn::Init,
        pub bs_init: nn::Init,
    }

    impl Conv2DInit {
        pub fn new(ksize: usize) -> Self {
            Self {
                ksize: [ksize; 2],
                stride: [1; 2],
                padding: Padding::Same,
                padding_mode: PaddingMode::Zeros,
                dilation: [1; 2],
                groups: 1,
                bias: true,
                ws_init: nn::Init::KaimingUniform,
                bs_init: nn::Init::Const(0.0),
            }
        }

        pub fn build<'a>(
            self,
            path: impl Borrow<nn::Path<'a>>,
            in_dim: usize,
            out_dim: usize,
        ) -> Result<Conv2D> {
            let Self {
                ksize,
                stride,
                padding,
                padding_mode,
                dilation,
                groups,
                bias,
                ws_init,
                bs_init,
            } = self;

            ensure!(
                in_dim > 0 && out_dim > 0,
                "in_dim and out_dim must be positive, but get {} and {}",
                in_dim,
                out_dim
            );
            ensure!(
                ksize.iter().chain(&stride).chain(&dilation).all(|&val| val > 0),
                "ksize, stride and dilation must be positive, but get {:?}, {:?} and {:?}",
                ksize,
                stride,
                dilation
            );
            ensure!(
                groups > 0 && in_dim % groups == 0,
                "in_dim must be multiple of group"
            );
            ensure!(
                out_dim % groups == 0,
                "out_dim must be multiple of group"
            );

            let [(top, bottom), (left, right)] = padding.resolve(ksize, stride, dilation)?;
            let pad = DynamicPad2D::new(padding_mode, [left, right, top, bottom]);

            let path = path.borrow();
            let in_dim = i64::try_from(in_dim)?;
            let out_dim = i64::try_from(out_dim)?;
            let groups = i64::try_from(groups)?;
            let ksize = Size2D(ksize).to_i64()?;
            let stride = Size2D(stride).to_i64()?;
            let dilation = Size2D(dilation).to_i64()?;

            let bs = bias.then(|| path.var("bias", &[out_dim], bs_init));
            let ws = path.var(
                "weight",
                &[out_dim, in_dim / groups, ksize[0], ksize[1]],
                ws_init,
            );

            Ok(Conv2D {
                in_dim,
                ksize,
                stride,
                dilation,
                groups,
                pad,
                weight: ws,
                bias: bs,
            })
        }
    }
}

mod conv_2d_ {
    use super::*;

    /// A 2D convolution which pads its input explicitly before convolving.
    #[derive(Debug, Getters, CopyGetters)]
    pub struct Conv2D {
        #[getset(get_copy = "pub")]
        pub(super) in_dim: i64,
        pub(super) ksize: [i64; 2],
        pub(super) stride: [i64; 2],
        pub(super) dilation: [i64; 2],
        #[getset(get_copy = "pub")]
        pub(super) groups: i64,
        #[getset(get = "pub")]
        pub(super) pad: DynamicPad2D,
        #[getset(get = "pub")]
        pub(super) weight: Tensor,
        #[getset(get = "pub")]
        pub(super) bias: Option<Tensor>,
    }

    impl Conv2D {
        /// Enables or disables gradient tracking on the weight and bias.
        pub fn set_trainable(&self, trainable: bool) {
            iter::once(&self.weight)
                .chain(self.bias.as_ref())
                .for_each(|param| {
                    let _ = param.set_requires_grad(trainable);
                });
        }

        pub fn ksize(&self) -> &[i64] {
            &self.ksize
        }

        pub fn stride(&self) -> &[i64] {
            &self.stride
        }

        pub fn dilation(&self) -> &[i64] {
            &self.dilation
        }

        pub fn out_dim(&self) -> i64 {
            self.weight.size()[0]
        }

        pub(crate) fn weight_mut(&mut self) -> &mut Tensor {
            &mut self.weight
        }

        /// Computes the output `[height, width]` for an input of spatial size `[height, width]`.
        pub fn output_size(&self, input_size: [usize; 2]) -> Result<[usize; 2]> {
            let [pl, pr, pt, pb] = self.pad.padding();
            let [in_h, in_w] = input_size;
            let [stride_h, stride_w] = self.stride;
            let [dilation_h, dilation_w] = self.dilation;
            let [ksize_h, ksize_w] = self.ksize;

            let out_len = |len: usize,
                           ksize: i64,
                           pad: i64,
                           stride: i64,
                           dilation: i64|
             -> Result<usize> {
                let padded = len as i64 + pad;
                let field = dilation * (ksize - 1) + 1;
                ensure!(
                    padded >= field,
                    "input length {} is smaller than the kernel receptive field {}",
                    padded,
                    field
                );
                Ok(((padded - field) / stride + 1) as usize)
            };

            Ok([
                out_len(in_h, ksize_h, pt + pb, stride_h, dilation_h)?,
                out_len(in_w, ksize_w, pl + pr, stride_w, dilation_w)?,
            ])
        }

        pub fn f_forward(&self, input: &Tensor) -> Result<Tensor> {
            let Self {
                in_dim,
                ref stride,
                ref dilation,
                groups,
                ref pad,
                ref weight,
                ref bias,
                ..
            } = *self;

            let (_, channels, _, _) = input.size4().map_err(|_| {
                format_err!(
                    "expect a [batch, channel, height, width] input, but get shape {:?}",
                    input.size()
                )
            })?;
            ensure!(
                channels == in_dim,
                "expect {} input channels, but get {}",
                in_dim,
                channels
            );

            let xs = pad.f_forward(input)?;
            let output = xs.f_convolution(
                weight,
                bias.as_ref(),
                stride,
                &[0, 0],
                dilation,
                false,
                &[0, 0],
                groups,
            )?;
            Ok(output)
        }

        pub fn grad(&self) -> Conv2DGrad {
            let Self { weight, bias, .. } = self;

            Conv2DGrad {
                weight: weight.grad(),
                bias: bias.as_ref().map(Tensor::grad),
            }
        }
    }

    impl nn::Module for Conv2D {
        fn forward(&self, xs: &Tensor) -> Tensor {
            self.f_forward(xs).unwrap()
        }
    }
}

mod conv_2d_grad {
    use super::*;

    #[derive(Debug, TensorLike)]
    pub struct Conv2DGrad {
        pub weight: Tensor,
        pub bias: Option<Tensor>,
    }
}
