//! Configuration (ambient stack): triangulation build parameters and the
//! command-line surface, grounded in the teacher's `clap`-derive CLI
//! (`examples/awused-aw-man` uses the same derive style) and in
//! `examples/original_source/src/em_steerable_sampler.hxx`'s
//! `BuildParameters` (there expressed as optional floats defaulted at
//! read-time; here as a plain struct with `Default`).

use clap::Parser;

/// Parameters governing adaptive triangulation. Field defaults match
/// spec.md section 3.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BuildParameters {
    pub max_approx_error: f32,
    pub min_subdiv: u32,
    pub max_subdiv: u32,
    pub oversampling: f32,
    pub max_triangle_span: f32,
}

impl Default for BuildParameters {
    fn default() -> Self {
        Self {
            max_approx_error: 0.1,
            min_subdiv: 5,
            max_subdiv: 7,
            oversampling: 0.7,
            max_triangle_span: 1.1,
        }
    }
}

/// Which estimator the renderer drives, per the `-a` catalog in spec.md
/// section 6.
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Algorithm {
    /// Environment light only, no BSDF sampling.
    El,
    /// Direct BSDF sampling.
    Dbs,
    /// Direct light sampling, area lights only.
    Dlsa,
    /// Direct light sampling, all strategies, no MIS weighting.
    Dlss,
    /// Direct lighting with MIS.
    Dmis,
    /// Full path tracing.
    Pt,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Bmp,
    Hdr,
}

/// Parsed command-line surface. The core consumes only the already-parsed
/// fields below; argument parsing itself is an external collaborator per
/// spec.md section 1.
#[derive(Parser, Debug, Clone)]
#[command(name = "steersky", about = "Monte Carlo renderer core with steerable environment-map sampling")]
pub struct TracingConfig {
    /// Scene selector.
    #[arg(short = 's', long, default_value_t = 0)]
    pub scene: u32,

    /// Environment map selector.
    #[arg(long = "em", default_value_t = 0)]
    pub env_map: u32,

    /// Estimator algorithm.
    #[arg(short = 'a', long, value_enum, default_value_t = Algorithm::Dmis)]
    pub algorithm: Algorithm,

    /// Wall-clock time budget in seconds; takes precedence over `--iterations`.
    #[arg(short = 't', long)]
    pub time: Option<f32>,

    /// Iteration count, used only when `--time` is unset.
    #[arg(short = 'i', long)]
    pub iterations: Option<u32>,

    /// Worker thread count; defaults to the available parallelism.
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Suppress progress logging.
    #[arg(short = 'q', long, default_value_t = false)]
    pub quiet: bool,

    /// Output image format.
    #[arg(short = 'e', long = "format", value_enum, default_value_t = OutputFormat::Bmp)]
    pub output_format: OutputFormat,

    /// Output file name, without extension.
    #[arg(short = 'o', long = "name", default_value = "output")]
    pub output_name: String,

    /// Output directory.
    #[arg(long = "od", default_value = ".")]
    pub output_dir: String,

    /// Output filename trailer.
    #[arg(long = "ot", default_value = "")]
    pub output_trail: String,

    /// Base RNG seed (worker index is added per spec.md section 5).
    #[arg(long, default_value_t = 1234)]
    pub seed: u64,
}
