//! ICNR initialization of sub-pixel convolution weights.

use crate::{common::*, init::WeightInit};

/// Computes an ICNR initialized copy of a convolution weight.
///
/// The `weight` has shape `[out_c * r², in_c / groups, kh, kw]` and is
/// followed by `pixel_shuffle(r)`. A sub-kernel `[out_c, in_c / groups, kh, kw]`
/// is drawn from `init` and replicated so that output channels `c * r²` to
/// `c * r² + r² - 1` all receive the `c`-th sub-kernel. Those are exactly the
/// channels that pixel shuffle folds into the `r×r` block of channel `c`.
///
/// If `upscale_factor` is 1, the result is `init` applied to `weight` as is.
/// The input weight is only read for its shape, kind and device.
pub fn f_icnr_init<I>(weight: &Tensor, upscale_factor: usize, init: &I) -> Result<Tensor>
where
    I: WeightInit + ?Sized,
{
    let r2 = upscale_area(upscale_factor)?;

    tch::no_grad(|| -> Result<_> {
        if upscale_factor == 1 {
            return init.f_init_checked(weight);
        }

        let (out_c, in_c, kh, kw) = weight.size4().map_err(|_| {
            format_err!(
                "expect a 4 dimensional convolution weight, but get shape {:?}",
                weight.size()
            )
        })?;
        ensure!(
            out_c % r2 == 0,
            "the number of output channels {} is not divisible by upscale_factor² = {}",
            out_c,
            r2
        );
        let reduced_out_c = out_c / r2;

        debug!(
            "ICNR init weight {:?} from sub-kernel {:?} with upscale factor {}",
            weight.size(),
            [reduced_out_c, in_c, kh, kw],
            upscale_factor
        );

        let zeros = Tensor::f_zeros(
            &[reduced_out_c, in_c, kh, kw],
            (weight.kind(), weight.device()),
        )?;

        // [in_c, reduced_out_c, kh * kw]
        let sub_kernel = init
            .f_init_checked(&zeros)?
            .f_transpose(0, 1)?
            .f_reshape(&[in_c, reduced_out_c, kh * kw])?;

        // tile each kernel r² times along the flattened spatial axis, then
        // regroup so that each run of r² output channels shares one sub-kernel
        let kernel = sub_kernel
            .f_repeat(&[1, 1, r2])?
            .f_reshape(&[in_c, out_c, kh, kw])?
            .f_transpose(0, 1)?
            .f_contiguous()?;

        Ok(kernel)
    })
}

/// Returns `upscale_factor²`, the number of channels folded into one by pixel shuffle.
pub fn upscale_area(upscale_factor: usize) -> Result<i64> {
    ensure!(
        upscale_factor > 0,
        "upscale_factor must be positive, but get {}",
        upscale_factor
    );
    let area = upscale_factor
        .checked_mul(upscale_factor)
        .and_then(|area| i64::try_from(area).ok())
        .ok_or_else(|| format_err!("upscale_factor {} is too large", upscale_factor))?;
    Ok(area)
}

pub fn icnr_init<I>(weight: &Tensor, upscale_factor: usize, init: &I) -> Tensor
where
    I: WeightInit + ?Sized,
{
    f_icnr_init(weight, upscale_factor, init).unwrap()
}

/// Overwrites `weight` in place with its ICNR initialization.
pub fn f_icnr_init_<I>(weight: &mut Tensor, upscale_factor: usize, init: &I) -> Result<()>
where
    I: WeightInit + ?Sized,
{
    let kernel = f_icnr_init(weight, upscale_factor, init)?;
    tch::no_grad(|| -> Result<_> {
        weight.f_copy_(&kernel)?;
        Ok(())
    })
}

/// Checks whether every run of `upscale_factor²` output channels of `weight`
/// holds identical kernels.
pub fn check_icnr_uniformity(weight: &Tensor, upscale_factor: usize) -> Result<bool> {
    let r2 = upscale_area(upscale_factor)?;
    let size = weight.size();
    ensure!(
        size.len() >= 2,
        "expect a convolution weight, but get shape {:?}",
        size
    );
    let out_c = size[0];
    if out_c % r2 != 0 {
        return Ok(false);
    }

    let uniform = tch::no_grad(|| -> Result<_> {
        let grouped = weight.f_reshape(&[out_c / r2, r2, -1])?;
        let first = grouped.f_narrow(1, 0, 1)?.f_expand_as(&grouped)?;
        Ok(grouped.equal(&first))
    })?;
    Ok(uniform)
}
