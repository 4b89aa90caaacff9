use crate::common::*;

pub use dynamic_pad_2d::*;
pub use padding_::*;
pub use padding_mode::*;

mod padding_mode {
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
    pub enum PaddingMode {
        Zeros,
        Circular,
    }

    impl Default for PaddingMode {
        fn default() -> Self {
            Self::Zeros
        }
    }
}

mod padding_ {
    use super::*;

    /// Spatial padding of a convolution.
    ///
    /// Serialized as the string `"same"`, a non-negative integer, or a
    /// `[height, width]` pair.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(try_from = "PaddingRepr", into = "PaddingRepr")]
    pub enum Padding {
        /// Keeps the spatial size for stride 1.
        Same,
        /// Pads both sides of the height and width by the given amounts.
        Explicit([usize; 2]),
    }

    impl Default for Padding {
        fn default() -> Self {
            Self::Same
        }
    }

    impl Padding {
        /// Returns the `(before, after)` padding of the height and width.
        pub fn resolve(
            &self,
            ksize: [usize; 2],
            stride: [usize; 2],
            dilation: [usize; 2],
        ) -> Result<[(usize, usize); 2]> {
            let pads = match *self {
                Self::Same => {
                    ensure!(
                        stride == [1, 1],
                        "same padding requires stride 1, but get stride {:?}",
                        stride
                    );
                    let same = |ksize: usize, dilation: usize| {
                        let total = dilation * (ksize - 1);
                        let before = total / 2;
                        (before, total - before)
                    };
                    [same(ksize[0], dilation[0]), same(ksize[1], dilation[1])]
                }
                Self::Explicit([pad_h, pad_w]) => [(pad_h, pad_h), (pad_w, pad_w)],
            };
            Ok(pads)
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(untagged)]
    enum PaddingRepr {
        Name(String),
        Size(usize),
        Pair([usize; 2]),
    }

    impl TryFrom<PaddingRepr> for Padding {
        type Error = Error;

        fn try_from(from: PaddingRepr) -> Result<Self, Self::Error> {
            let padding = match from {
                PaddingRepr::Name(name) => match name.as_str() {
                    "same" => Self::Same,
                    _ => bail!(
                        r#"invalid padding "{}", expect "same", an integer or a pair"#,
                        name
                    ),
                },
                PaddingRepr::Size(pad) => Self::Explicit([pad, pad]),
                PaddingRepr::Pair(pads) => Self::Explicit(pads),
            };
            Ok(padding)
        }
    }

    impl From<Padding> for PaddingRepr {
        fn from(from: Padding) -> Self {
            match from {
                Padding::Same => Self::Name("same".into()),
                Padding::Explicit([pad_h, pad_w]) if pad_h == pad_w => Self::Size(pad_h),
                Padding::Explicit(pads) => Self::Pair(pads),
            }
        }
    }
}

mod dynamic_pad_2d {
    use super::*;

    /// Pads the last two dimensions of `[n, c, h, w]` inputs.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct DynamicPad2D {
        /// `[left, right, top, bottom]`
        padding: [i64; 4],
        mode: PaddingMode,
    }

    impl DynamicPad2D {
        pub fn new(mode: PaddingMode, padding: [usize; 4]) -> Self {
            let [l, r, t, b] = padding;
            Self {
                padding: [l as i64, r as i64, t as i64, b as i64],
                mode,
            }
        }

        pub fn is_noop(&self) -> bool {
            self.padding.iter().all(|&pad| pad == 0)
        }

        /// Returns `[left, right, top, bottom]`.
        pub fn padding(&self) -> [i64; 4] {
            self.padding
        }

        pub fn mode(&self) -> PaddingMode {
            self.mode
        }

        pub fn f_forward(&self, xs: &Tensor) -> Result<Tensor> {
            if self.is_noop() {
                return Ok(xs.shallow_clone());
            }

            let [l, r, t, b] = self.padding;
            let output = match self.mode {
                PaddingMode::Zeros => xs.f_constant_pad_nd(&[l, r, t, b])?,
                PaddingMode::Circular => xs.f_circular_pad2d(l, r, t, b)?,
            };
            Ok(output)
        }
    }

    impl nn::Module for DynamicPad2D {
        fn forward(&self, xs: &Tensor) -> Tensor {
            self.f_forward(xs).unwrap()
        }
    }
}
