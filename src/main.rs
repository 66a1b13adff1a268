use std::path::PathBuf;

use clap::Parser;
use handeval::config::Config;
use handeval::detection::PrecomputedRecognizer;
use handeval::evaluate::Evaluation;
use handeval::pck::PckCalculator;
use handeval::pipeline::Rotated;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file (uses the default dataset layout if not given)
    #[arg(short, long, env = "HANDEVAL_CONFIG")]
    config: Option<PathBuf>,

    /// PCK distance threshold factor, overrides the configured value
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Write the evaluation report to this file, overrides the configured path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Don't compute the upper and lower bounds
    #[arg(long, default_value_t = false)]
    skip_bounds: bool,
}

fn main() -> anyhow::Result<()> {
    handeval::init_logger!();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(output) = args.output {
        config.report = Some(output);
    }
    log::debug!("{config:?}");

    let mut evaluation = Evaluation::new(
        PckCalculator::new(config.threshold),
        PrecomputedRecognizer::new(&config.detections),
        config.first_pipeline.to_pipeline(),
        config.second_pipeline.to_pipeline(),
    );
    if config.rotate {
        evaluation = evaluation.with_rotation(Rotated::new(&config.work_dir));
    }

    if !args.skip_bounds {
        evaluation.compute_bounds(&config.rgb, &config.ir)?;
    }
    let report = evaluation.evaluate(&config.ir)?;

    if let Some(upper) = report.upper_bound {
        println!("Upper bound: {upper:.4}");
    }
    if let Some(lower) = report.lower_bound {
        println!("Lower bound: {lower:.4}");
    }
    println!("Final PCK:   {:.4}", report.final_pck);

    if let Some(path) = &config.report {
        report.write(path)?;
        log::info!("wrote report to {}", path.display());
    }

    Ok(())
}
