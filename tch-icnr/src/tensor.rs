use crate::{common::*, icnr::upscale_area};

pub trait TensorExt {
    /// Pads the last two dimensions by wrapping around, in `(left, right, top, bottom)` order.
    fn f_circular_pad2d(&self, left: i64, right: i64, top: i64, bottom: i64) -> Result<Tensor>;

    fn circular_pad2d(&self, left: i64, right: i64, top: i64, bottom: i64) -> Tensor {
        self.f_circular_pad2d(left, right, top, bottom).unwrap()
    }

    /// Rearranges `[*, c * r², h, w]` into `[*, c, h * r, w * r]`, failing
    /// instead of aborting in libtorch when the channels do not divide.
    fn f_pixel_shuffle_checked(&self, upscale_factor: usize) -> Result<Tensor>;

    fn pixel_shuffle_checked(&self, upscale_factor: usize) -> Tensor {
        self.f_pixel_shuffle_checked(upscale_factor).unwrap()
    }
}

impl TensorExt for Tensor {
    fn f_circular_pad2d(&self, left: i64, right: i64, top: i64, bottom: i64) -> Result<Tensor> {
        let size = self.size();
        ensure!(
            size.len() >= 2,
            "expect at least 2 dimensions, but get shape {:?}",
            size
        );
        ensure!(
            [left, right, top, bottom].iter().all(|&pad| pad >= 0),
            "padding must be non-negative"
        );
        let height = size[size.len() - 2];
        let width = size[size.len() - 1];
        ensure!(
            left <= width && right <= width && top <= height && bottom <= height,
            "circular padding ({}, {}, {}, {}) exceeds the input size {}x{}",
            left,
            right,
            top,
            bottom,
            height,
            width
        );

        let hdim = size.len() as i64 - 2;
        let wdim = size.len() as i64 - 1;

        let xs = Tensor::f_cat(
            &[
                self.f_narrow(wdim, width - left, left)?,
                self.shallow_clone(),
                self.f_narrow(wdim, 0, right)?,
            ],
            wdim,
        )?;
        let xs = Tensor::f_cat(
            &[
                xs.f_narrow(hdim, height - top, top)?,
                xs.shallow_clone(),
                xs.f_narrow(hdim, 0, bottom)?,
            ],
            hdim,
        )?;

        Ok(xs)
    }

    fn f_pixel_shuffle_checked(&self, upscale_factor: usize) -> Result<Tensor> {
        let size = self.size();
        ensure!(
            size.len() >= 3,
            "pixel shuffle expects at least 3 dimensions, but get shape {:?}",
            size
        );
        let r2 = upscale_area(upscale_factor)?;
        let channels = size[size.len() - 3];
        ensure!(
            channels % r2 == 0,
            "pixel shuffle expects the number of channels {} to be divisible by upscale_factor² = {}",
            channels,
            r2
        );
        Ok(self.f_pixel_shuffle(i64::try_from(upscale_factor)?)?)
    }
}
