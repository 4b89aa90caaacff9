pub use anyhow::{bail, ensure, format_err, Result};
pub use log::debug;
pub use noisy_float::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use strum::{AsRefStr, Display, EnumString};
pub use tch::{Kind, Tensor};
