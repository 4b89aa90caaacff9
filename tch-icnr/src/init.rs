//! Base weight initializers.
//!
//! The [WeightInit] trait is the single-method strategy used by ICNR to fill
//! the reduced sub-kernel. It is implemented by the built-in [Init] schemes
//! and by any `Fn(&Tensor) -> Result<Tensor>` closure.

use crate::common::*;

pub use fan_mode::*;
pub use init_::*;
pub use nonlinearity::*;
pub use weight_init::*;

mod weight_init {
    use super::*;

    /// A shape-preserving tensor initializer.
    pub trait WeightInit {
        /// Returns an initialized tensor with the same shape, kind and device as `tensor`.
        fn f_init(&self, tensor: &Tensor) -> Result<Tensor>;

        fn init(&self, tensor: &Tensor) -> Tensor {
            self.f_init(tensor).unwrap()
        }

        /// Like [WeightInit::f_init], but fails if the returned shape differs from the input.
        fn f_init_checked(&self, tensor: &Tensor) -> Result<Tensor> {
            let output = self.f_init(tensor)?;
            ensure!(
                output.size() == tensor.size(),
                "the initializer changed the tensor shape from {:?} to {:?}",
                tensor.size(),
                output.size()
            );
            Ok(output)
        }
    }

    impl<F> WeightInit for F
    where
        F: Fn(&Tensor) -> Result<Tensor>,
    {
        fn f_init(&self, tensor: &Tensor) -> Result<Tensor> {
            self(tensor)
        }
    }
}

mod fan_mode {
    use super::*;

    #[derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        Hash,
        Serialize,
        Deserialize,
        AsRefStr,
        Display,
        EnumString,
    )]
    #[serde(rename_all = "snake_case")]
    #[strum(serialize_all = "snake_case")]
    pub enum FanMode {
        FanIn,
        FanOut,
    }

    impl Default for FanMode {
        fn default() -> Self {
            Self::FanIn
        }
    }

    /// Computes `(fan_in, fan_out)` of a weight shape.
    ///
    /// The shape is interpreted as `[out, in, *receptive_field]`.
    pub fn fan_in_fan_out(size: &[i64]) -> Result<(i64, i64)> {
        ensure!(
            size.len() >= 2,
            "fan in and fan out can not be computed for tensor with fewer than 2 dimensions, but get shape {:?}",
            size
        );
        let receptive_field: i64 = size[2..].iter().product();
        let fan_in = size[1] * receptive_field;
        let fan_out = size[0] * receptive_field;
        Ok((fan_in, fan_out))
    }
}

mod nonlinearity {
    use super::*;

    #[derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        Hash,
        Serialize,
        Deserialize,
        AsRefStr,
        Display,
        EnumString,
    )]
    #[serde(rename_all = "snake_case")]
    #[strum(serialize_all = "snake_case")]
    pub enum Nonlinearity {
        Linear,
        Conv,
        Sigmoid,
        Tanh,
        Relu,
        LeakyRelu,
        Selu,
    }

    impl Default for Nonlinearity {
        fn default() -> Self {
            Self::LeakyRelu
        }
    }

    impl Nonlinearity {
        /// The recommended gain. `negative_slope` is only used by `leaky_relu`.
        pub fn gain(&self, negative_slope: f64) -> f64 {
            match self {
                Self::Linear | Self::Conv | Self::Sigmoid => 1.0,
                Self::Tanh => 5.0 / 3.0,
                Self::Relu => 2f64.sqrt(),
                Self::LeakyRelu => (2.0 / (1.0 + negative_slope.powi(2))).sqrt(),
                Self::Selu => 3.0 / 4.0,
            }
        }
    }
}

mod init_ {
    use super::*;

    /// Built-in initialization schemes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum Init {
        Const {
            value: R64,
        },
        Normal {
            mean: R64,
            std: R64,
        },
        Uniform {
            low: R64,
            high: R64,
        },
        KaimingNormal {
            #[serde(default = "zero")]
            a: R64,
            #[serde(default)]
            mode: FanMode,
            #[serde(default)]
            nonlinearity: Nonlinearity,
        },
        KaimingUniform {
            #[serde(default = "zero")]
            a: R64,
            #[serde(default)]
            mode: FanMode,
            #[serde(default)]
            nonlinearity: Nonlinearity,
        },
        XavierNormal {
            #[serde(default = "one")]
            gain: R64,
        },
        XavierUniform {
            #[serde(default = "one")]
            gain: R64,
        },
    }

    fn zero() -> R64 {
        r64(0.0)
    }

    fn one() -> R64 {
        r64(1.0)
    }

    impl Default for Init {
        /// Fan-in scaled normal initialization, which is the default of the pixel shuffle convolution.
        fn default() -> Self {
            Self::KaimingNormal {
                a: zero(),
                mode: FanMode::FanIn,
                nonlinearity: Nonlinearity::LeakyRelu,
            }
        }
    }

    impl Init {
        /// Standard deviation of the normal distribution for Kaiming and Xavier schemes.
        fn std(&self, size: &[i64]) -> Result<f64> {
            let std = match *self {
                Self::KaimingNormal {
                    a,
                    mode,
                    nonlinearity,
                }
                | Self::KaimingUniform {
                    a,
                    mode,
                    nonlinearity,
                } => {
                    let (fan_in, fan_out) = fan_in_fan_out(size)?;
                    let fan = match mode {
                        FanMode::FanIn => fan_in,
                        FanMode::FanOut => fan_out,
                    };
                    ensure!(fan > 0, "cannot initialize a tensor of shape {:?}", size);
                    nonlinearity.gain(a.raw()) / (fan as f64).sqrt()
                }
                Self::XavierNormal { gain } | Self::XavierUniform { gain } => {
                    let (fan_in, fan_out) = fan_in_fan_out(size)?;
                    ensure!(
                        fan_in + fan_out > 0,
                        "cannot initialize a tensor of shape {:?}",
                        size
                    );
                    gain.raw() * (2.0 / (fan_in + fan_out) as f64).sqrt()
                }
                _ => bail!("{:?} is not a variance scaling initializer", self),
            };
            Ok(std)
        }
    }

    impl WeightInit for Init {
        fn f_init(&self, tensor: &Tensor) -> Result<Tensor> {
            let size = tensor.size();

            let output = match *self {
                Self::Const { value } => tensor.f_full_like(value.raw())?,
                Self::Normal { mean, std } => {
                    ensure!(std.raw() >= 0.0, "std must be non-negative, but get {}", std);
                    tensor.f_randn_like()? * std.raw() + mean.raw()
                }
                Self::Uniform { low, high } => {
                    ensure!(
                        low <= high,
                        "low must not exceed high, but get low={} and high={}",
                        low,
                        high
                    );
                    tensor.f_rand_like()? * (high - low).raw() + low.raw()
                }
                Self::KaimingNormal { .. } | Self::XavierNormal { .. } => {
                    let std = self.std(&size)?;
                    tensor.f_randn_like()? * std
                }
                Self::KaimingUniform { .. } | Self::XavierUniform { .. } => {
                    let bound = 3f64.sqrt() * self.std(&size)?;
                    tensor.f_rand_like()? * (2.0 * bound) - bound
                }
            };

            Ok(output)
        }
    }
}
