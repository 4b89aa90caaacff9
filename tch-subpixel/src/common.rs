pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use getset::{CopyGetters, Getters};
pub use log::{debug, warn};
pub use noisy_float::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{borrow::Borrow, convert::TryFrom, fs, iter, path::Path, str::FromStr};
pub use strum::{AsRefStr, Display, EnumString};
pub use tch::{
    nn::{self, Module as _},
    Device, Kind, Tensor,
};
pub use tch_icnr::{Init, TensorExt, WeightInit};
pub use tch_tensor_like::TensorLike;
