use anyhow::{bail, Context, Error};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use binar::Engine;

use std::env;

// Azimuth step in degrees applied after every block
const ROTATION: i32 = 1;
// Single block size in frames
const BLOCK_LEN: usize = 128;

fn main() -> Result<(), Error> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() != 4 {
        bail!("Usage: {} MONO_WAV HRIR_BIN OUT_WAV", args[0].clone());
    }

    let wav = &args[1];
    let bin = &args[2];
    let out = &args[3];

    let mut reader = WavReader::open(wav).context("Open wav file failed")?;
    let spec = reader.spec();

    if spec.channels != 1 {
        bail!("Unsupported format, must be a mono channel");
    }

    log::info!("Wave file spec: {:?}", spec);

    let input = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let mut engine = Engine::builder(BLOCK_LEN)
        .with_sample_rate(spec.sample_rate)
        .with_itd(true)
        .with_reset_on_switch(true)
        .build()?;

    match engine.load_from_bin(bin) {
        Ok(count) => log::info!("Loaded {count} HRIR measurements from {bin}"),
        Err(err) => {
            log::warn!("{err}, falling back to manual measurements");
            add_fallback(&mut engine);
        }
    }

    if engine.sample_rate() != spec.sample_rate {
        log::warn!(
            "HRIR sample rate {} Hz differs from the input's {} Hz",
            engine.sample_rate(),
            spec.sample_rate
        );
    }

    let out_spec = WavSpec {
        channels: 2,
        sample_rate: spec.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(out, out_spec).context("Create output wav failed")?;

    let mut block = vec![0.0; BLOCK_LEN];
    let mut left = vec![0.0; BLOCK_LEN];
    let mut right = vec![0.0; BLOCK_LEN];
    let mut azimuth = 0;

    for chunk in input.chunks(BLOCK_LEN) {
        block[..chunk.len()].copy_from_slice(chunk);
        block[chunk.len()..].fill(0.0);

        engine.render(azimuth, &block, 1.0, &mut left, &mut right)?;

        for (l, r) in Iterator::zip(left.iter(), right.iter()) {
            writer.write_sample(*l)?;
            writer.write_sample(*r)?;
        }

        azimuth = (azimuth + ROTATION) % 360;
    }

    writer.finalize()?;
    log::info!("Rendered {} frames to {out}", input.len());

    Ok(())
}

/// Two Dirac measurements with explicit interaural delays.
fn add_fallback(engine: &mut Engine) {
    let dirac = |at: usize| {
        let mut taps = [0.0; 8];
        taps[at] = 1.0;
        taps
    };

    let (front_left, front_right) = (dirac(2), dirac(5));
    let (side_left, side_right) = (dirac(4), dirac(7));

    engine.add(0, &front_left, &front_right, 2, 5, 8);
    engine.add(30, &side_left, &side_right, 4, 7, 8);
}
