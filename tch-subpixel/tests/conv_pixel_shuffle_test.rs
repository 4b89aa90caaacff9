use anyhow::Result;
use noisy_float::prelude::*;
use std::path::{Path, PathBuf};
use tch::{nn, Device, Kind, Tensor};
use tch_subpixel::{
    tch_icnr::{FanMode, Init, Nonlinearity},
    Conv2DPixelShuffle, Conv2DPixelShuffleInit, Padding, PaddingMode, Size2D,
};

lazy_static::lazy_static! {
    static ref CONFIG_DIR: PathBuf = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("cfg");
}

/// Checks that every r×r block of every output channel holds one value.
fn assert_uniform_blocks(output: &Tensor, upscale_factor: usize) {
    let (_, _, height, width) = output.size4().unwrap();
    let r = upscale_factor as i64;
    let anchor = output.slice(2, 0, height, r).slice(3, 0, width, r);

    for i in 0..r {
        for j in 0..r {
            let sub = output.slice(2, i, height, r).slice(3, j, width, r);
            assert!(
                sub.allclose(&anchor, 1e-5, 1e-6, false),
                "block offset ({}, {}) differs from (0, 0)",
                i,
                j
            );
        }
    }
}

fn build(init: Conv2DPixelShuffleInit) -> Result<(nn::VarStore, Conv2DPixelShuffle)> {
    let vs = nn::VarStore::new(Device::Cpu);
    let module = init.build(&vs.root() / "up")?;
    Ok((vs, module))
}

#[test]
fn load_config_test() -> Result<()> {
    let init = Conv2DPixelShuffleInit::load(CONFIG_DIR.join("upsample-x3-circular.json5"))?;
    assert_eq!(init.in_c, 16);
    assert_eq!(init.out_c, 8);
    assert_eq!(init.upscale_factor, 3);
    assert_eq!(init.k, Size2D([3, 3]));
    assert_eq!(init.p, Padding::Same);
    assert_eq!(init.padding_mode, PaddingMode::Circular);
    assert!(!init.bias);
    assert_eq!(
        init.initializer,
        Init::KaimingUniform {
            a: r64(0.0),
            mode: FanMode::FanIn,
            nonlinearity: Nonlinearity::Relu,
        }
    );

    let init = Conv2DPixelShuffleInit::load(CONFIG_DIR.join("upsample-minimal.json5"))?;
    assert_eq!(init, Conv2DPixelShuffleInit::new(4, 4));
    Ok(())
}

#[test]
fn load_missing_config_test() {
    assert!(Conv2DPixelShuffleInit::load(CONFIG_DIR.join("does-not-exist.json5")).is_err());
}

#[test]
fn unknown_config_field_test() {
    let result: Result<Conv2DPixelShuffleInit, _> =
        json5::from_str("{ in_c: 4, out_c: 4, upscale: 2 }");
    assert!(result.is_err());
}

#[test]
fn uniform_output_blocks_test() -> Result<()> {
    let _ = pretty_env_logger::try_init();
    tch::manual_seed(0);

    for upscale_factor in 2..=4 {
        let (_vs, module) = build(Conv2DPixelShuffleInit {
            upscale_factor,
            ..Conv2DPixelShuffleInit::new(4, 3)
        })?;
        assert!(module.is_icnr_uniform()?);

        let input = Tensor::randn(&[2, 4, 5, 6], tch::kind::FLOAT_CPU);
        let output = module.f_forward(&input)?;
        let r = upscale_factor as i64;
        assert_eq!(output.size(), [2, 3, 5 * r, 6 * r]);
        assert_uniform_blocks(&output, upscale_factor);
    }
    Ok(())
}

#[test]
fn circular_config_forward_test() -> Result<()> {
    tch::manual_seed(1);
    let init = Conv2DPixelShuffleInit::load(CONFIG_DIR.join("upsample-x3-circular.json5"))?;
    let (_vs, module) = build(init)?;
    assert!(module.conv().bias().is_none());

    let input = Tensor::randn(&[1, 16, 4, 4], tch::kind::FLOAT_CPU);
    let output = module.f_forward(&input)?;
    assert_eq!(output.size(), [1, 8, 12, 12]);
    assert_uniform_blocks(&output, 3);

    // wrap-around borders make the operator commute with circular shifts
    let shifted = module.f_forward(&input.roll(&[1], &[3]))?;
    assert!(shifted.allclose(&output.roll(&[3], &[3]), 1e-5, 1e-5, false));
    Ok(())
}

#[test]
fn explicit_padding_config_test() -> Result<()> {
    tch::manual_seed(2);
    let init = Conv2DPixelShuffleInit::load(CONFIG_DIR.join("upsample-explicit-padding.json5"))?;
    let (_vs, module) = build(init)?;

    let input = Tensor::randn(&[1, 3, 8, 10], tch::kind::FLOAT_CPU);
    let output = module.f_forward(&input)?;
    assert_eq!(output.size(), [1, 2, 12, 16]);
    assert_eq!(module.output_size([8, 10])?, [12, 16]);
    assert_uniform_blocks(&output, 2);
    Ok(())
}

#[test]
fn rectangular_kernel_config_test() -> Result<()> {
    tch::manual_seed(5);
    let init = Conv2DPixelShuffleInit::load(CONFIG_DIR.join("upsample-rect-kernel.json5"))?;
    assert_eq!(init.k, Size2D([3, 5]));
    assert_eq!(init.d, Size2D([1, 2]));
    assert_eq!(init.p, Padding::Same);
    let (_vs, module) = build(init)?;

    assert_eq!(module.conv().weight().size(), [12, 4, 3, 5]);
    assert_eq!(module.conv().pad().padding(), [4, 4, 1, 1]);
    assert!(module.is_icnr_uniform()?);

    let input = Tensor::randn(&[2, 4, 9, 10], tch::kind::FLOAT_CPU);
    let output = module.f_forward(&input)?;
    assert_eq!(output.size(), [2, 3, 18, 20]);
    assert_eq!(module.output_size([9, 10])?, [18, 20]);
    assert_uniform_blocks(&output, 2);
    Ok(())
}

#[test]
fn same_padding_with_stride_fails_test() {
    let result = build(Conv2DPixelShuffleInit {
        s: Size2D([1, 2]),
        ..Conv2DPixelShuffleInit::new(3, 3)
    });
    assert!(result.is_err());
}

#[test]
fn custom_initializer_groups_test() -> Result<()> {
    // fills sub-kernel channel c with the constant c + 1
    let init = |tensor: &Tensor| -> Result<Tensor> {
        let out_c = tensor.size()[0];
        let values = Tensor::arange_start(1, out_c + 1, (tensor.kind(), tensor.device()))
            .reshape(&[out_c, 1, 1, 1]);
        Ok(tensor.zeros_like() + values)
    };

    let vs = nn::VarStore::new(Device::Cpu);
    let module = Conv2DPixelShuffleInit::new(3, 2)
        .build_uninit(&vs.root() / "up")?
        .initialize_with(&init)?;

    let weight = module.conv().weight();
    assert_eq!(weight.size(), [8, 3, 3, 3]);
    let ones = Tensor::ones(&[4, 3, 3, 3], tch::kind::FLOAT_CPU);
    assert!(weight.narrow(0, 0, 4).equal(&ones));
    assert!(weight.narrow(0, 4, 4).equal(&(&ones * 2.0)));

    // the var store sees the initialized weight
    let stored = &vs.variables()["up.conv.weight"];
    assert!(stored.equal(weight));
    Ok(())
}

#[test]
fn grouped_convolution_test() -> Result<()> {
    tch::manual_seed(3);
    let (_vs, module) = build(Conv2DPixelShuffleInit {
        g: 2,
        ..Conv2DPixelShuffleInit::new(4, 2)
    })?;
    assert_eq!(module.conv().weight().size(), [8, 2, 3, 3]);
    assert!(module.is_icnr_uniform()?);

    let input = Tensor::randn(&[1, 4, 3, 3], tch::kind::FLOAT_CPU);
    let output = module.f_forward(&input)?;
    assert_eq!(output.size(), [1, 2, 6, 6]);
    assert_uniform_blocks(&output, 2);
    Ok(())
}

#[test]
fn wrong_input_channels_test() -> Result<()> {
    let (_vs, module) = build(Conv2DPixelShuffleInit::new(3, 2))?;
    let input = Tensor::randn(&[1, 4, 3, 3], tch::kind::FLOAT_CPU);
    assert!(module.f_forward(&input).is_err());
    Ok(())
}

#[test]
fn grad_test() -> Result<()> {
    tch::manual_seed(4);
    let (_vs, module) = build(Conv2DPixelShuffleInit::new(2, 2))?;

    let input = Tensor::randn(&[1, 2, 4, 4], tch::kind::FLOAT_CPU);
    module.f_forward(&input)?.sum(Kind::Float).backward();

    let grad = module.grad();
    assert_eq!(grad.conv.weight.size(), [8, 2, 3, 3]);
    assert_eq!(grad.conv.bias.map(|bias| bias.size()), Some(vec![8]));
    Ok(())
}
