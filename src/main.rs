//! CLI driver (ambient stack): wires the compiled-in scene catalog, the
//! steerable environment sampler, and the MIS direct-illumination
//! estimator into a worker-thread pool, per spec.md sections 5 and 6.
//!
//! Grounded in the teacher's `clap`-derive CLI style (`config.rs`) and in
//! `examples/original_source/src/framebuffer.hxx` (`SaveBMP`/`SaveHDR`) for
//! the gamma-corrected BMP / Radiance HDR output split. Scene/camera/ray
//! intersection genuinely have no counterpart here (spec.md section 1 lists
//! them as external collaborators with contractual interfaces only), so
//! this binary demonstrates the core end-to-end with a minimal compiled-in
//! catalog and a direct-lighting-only "irradiance dome" scene: every pixel
//! of the output is an independent shading point at the coordinate-frame
//! origin, facing outward along its own lat-long direction, lit solely by
//! the selected environment map and a diffuse BSDF.

use std::io::BufWriter;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use glam::Vec3;
use log::{error, info};
use rayon::prelude::*;

use steersky::bsdf::{Bsdf, Lambertian};
use steersky::config::{Algorithm, BuildParameters, OutputFormat, TracingConfig};
use steersky::env_image::EnvImage;
use steersky::env_sampler::EnvSampler;
use steersky::error::{Error, Result};
use steersky::framebuffer::Framebuffer;
use steersky::integrator::{AuxiliaryHit, DirectIllumination, MisHeuristic, SceneQuery};
use steersky::light::Light;
use steersky::persist;
use steersky::rng::RngState;
use steersky::sphere::uv_to_direction;
use steersky::spectrum::Spectrum;
use steersky::tree::{self, TreeNode};
use steersky::triangulate;
use steersky::vertex::VertexStorage;

/// Compiled-in environment-map catalog, keyed by `--em`. No on-disk scene
/// representation is part of the core (spec.md section 6).
const ENV_MAPS: &[&str] = &["assets/env_000.exr", "assets/env_001.exr", "assets/env_002.exr"];

/// Compiled-in scene catalog, keyed by `-s`: just the diffuse albedo the
/// demo "irradiance dome" shades with.
const SCENES: &[Spectrum] = &[Spectrum { x: 0.8, y: 0.8, z: 0.8 }, Spectrum { x: 0.9, y: 0.2, z: 0.2 }];

const OUTPUT_WIDTH: u32 = 512;
const OUTPUT_HEIGHT: u32 = 256;

/// No geometry beyond the environment: nothing ever occludes, and every
/// BSDF-sampled ray escapes straight to the background.
struct DomeScene<'a> {
    em_image: &'a EnvImage,
}

impl<'a> SceneQuery for DomeScene<'a> {
    fn occluded(&self, _point: Vec3, _dir: Vec3, _distance: f32) -> bool {
        false
    }

    fn trace_auxiliary(&self, _point: Vec3, dir: Vec3) -> AuxiliaryHit {
        AuxiliaryHit::Background { light_id: Some(0), radiance: self.em_image.eval_dir(dir) }
    }
}

fn resolve_env_map(id: u32) -> Result<&'static str> {
    ENV_MAPS.get(id as usize).copied().ok_or(Error::InvalidScene(id))
}

fn resolve_albedo(id: u32) -> Result<Spectrum> {
    SCENES.get(id as usize).copied().ok_or(Error::InvalidScene(id))
}

fn cache_path(env_map_path: &str, params: &BuildParameters, bilinear: bool) -> PathBuf {
    let mut path = PathBuf::from(env_map_path);
    let suffix = format!(
        ".bilin{}.err{:.3}.sub{}-{}.span{:.2}.over{:.2}.v1_1.cache",
        bilinear as u8, params.max_approx_error, params.min_subdiv, params.max_subdiv, params.max_triangle_span, params.oversampling
    );
    path.set_extension(format!("{}{}", path.extension().and_then(|e| e.to_str()).unwrap_or(""), suffix));
    path
}

/// Builds (or loads, if a matching cache file exists) the steerable
/// sampler for `em_image`.
fn build_or_load_sampler(
    env_map_path: &str,
    em_image: &EnvImage,
    params: &BuildParameters,
    bilinear: bool,
) -> Result<(VertexStorage, Box<TreeNode>)> {
    let cache = cache_path(env_map_path, params, bilinear);

    if cache.exists() {
        match std::fs::File::open(&cache) {
            Ok(file) => {
                let mut reader = std::io::BufReader::new(file);
                match persist::load(&mut reader, params) {
                    Ok(loaded) => {
                        info!("loaded steerable sampler cache from {}", cache.display());
                        return Ok(loaded);
                    }
                    Err(e) => {
                        info!("steerable sampler cache at {} invalid ({}), rebuilding", cache.display(), e);
                    }
                }
            }
            Err(e) => info!("could not open cache {}: {}", cache.display(), e),
        }
    }

    info!("building steerable sampler for {}", env_map_path);
    let (storage, leaves) = triangulate::build(em_image, params);
    let root = tree::build_balanced(leaves).ok_or(Error::BuildFailed { reason: "triangulation produced no triangles" })?;

    if let Ok(file) = std::fs::File::create(&cache) {
        let mut writer = BufWriter::new(file);
        if let Err(e) = persist::save(&mut writer, params, &storage, &root) {
            info!("failed to write steerable sampler cache: {}", e);
        }
    }

    Ok((storage, root))
}

fn worker_count(config: &TracingConfig) -> usize {
    let n = config.threads.unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));
    n.max(1)
}

fn iteration_count(config: &TracingConfig) -> u32 {
    config.iterations.unwrap_or(64)
}

/// Shades the demo dome: independent shading point at the origin facing
/// outward along `dir`, its own direction standing in for both normal and
/// outgoing (view) direction.
///
/// `deadline`, when set, takes precedence over `iterations` per spec.md
/// section 6: rows stop accumulating once it passes, leaving the remainder
/// of this replica's framebuffer at zero for the merge to average over.
fn render_worker(
    width: u32,
    height: u32,
    iterations: u32,
    deadline: Option<Instant>,
    lights: &[Light],
    albedo: Spectrum,
    em_image: &EnvImage,
    algorithm: Algorithm,
    base_seed: u64,
    worker_index: u32,
) -> Framebuffer {
    let mut rng = RngState::new(base_seed, worker_index);
    let mut framebuffer = Framebuffer::new(width, height);
    let bsdf = Lambertian { albedo };
    let scene = DomeScene { em_image };
    let heuristic = MisHeuristic::Balance;
    let estimator = DirectIllumination { heuristic };

    for y in 0..height {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        for x in 0..width {
            let mut accumulated = Spectrum::ZERO;
            for _ in 0..iterations {
                let jitter = rng.gen_2d();
                let u = (x as f32 + jitter.x) / width as f32;
                let v = (y as f32 + jitter.y) / height as f32;
                let normal = uv_to_direction(u, v);

                let radiance = match algorithm {
                    Algorithm::El => {
                        if let Light::Environment(sampler) = &lights[0] {
                            match sampler.sample(normal, true, false, &mut rng) {
                                Some(sample) if sample.pdf_w > 1e-9 => {
                                    sample.radiance.scale(normal.dot(sample.dir).max(0.0) / sample.pdf_w)
                                }
                                _ => Spectrum::ZERO,
                            }
                        } else {
                            Spectrum::ZERO
                        }
                    }
                    Algorithm::Dbs => {
                        let sample = bsdf.sample(normal, normal, &mut rng);
                        if sample.pdf > 1e-9 {
                            em_image.eval_dir(sample.direction).scale(1.0 / sample.pdf) * sample.f
                        } else {
                            Spectrum::ZERO
                        }
                    }
                    _ => estimator.estimate(Vec3::ZERO, normal, normal, &bsdf, Spectrum::ZERO, lights, &scene, &mut rng),
                };

                if radiance.is_finite() {
                    accumulated += radiance;
                }
            }
            framebuffer.add_radiance(x, y, accumulated.scale(1.0 / iterations as f32));
        }
    }

    framebuffer
}

fn write_output(framebuffer: &Framebuffer, config: &TracingConfig) -> Result<()> {
    let name = format!("{}{}", config.output_name, config.output_trail);
    let mut path = PathBuf::from(&config.output_dir);
    path.push(&name);

    match config.output_format {
        OutputFormat::Bmp => {
            path.set_extension("bmp");
            const GAMMA: f32 = 1.0 / 2.2;
            let mut bytes = Vec::with_capacity((framebuffer.width() * framebuffer.height() * 3) as usize);
            for pixel in framebuffer.pixels() {
                for channel in [pixel.x, pixel.y, pixel.z] {
                    let gamma_corrected = channel.max(0.0).powf(GAMMA) * 255.0;
                    bytes.push(gamma_corrected.clamp(0.0, 255.0) as u8);
                }
            }
            image::save_buffer(&path, &bytes, framebuffer.width(), framebuffer.height(), image::ColorType::Rgb8)
                .map_err(|source| Error::ImageDecode { path: path.display().to_string(), source })?;
        }
        OutputFormat::Hdr => {
            path.set_extension("hdr");
            let file = std::fs::File::create(&path).map_err(|source| Error::Io { path: path.display().to_string(), source })?;
            let writer = BufWriter::new(file);
            let rgb: Vec<image::Rgb<f32>> =
                framebuffer.pixels().iter().map(|p| image::Rgb([p.x, p.y, p.z])).collect();
            image::codecs::hdr::HdrEncoder::new(writer)
                .encode(&rgb, framebuffer.width() as usize, framebuffer.height() as usize)
                .map_err(|source| Error::ImageDecode { path: path.display().to_string(), source })?;
        }
    }

    info!("wrote {}", path.display());
    Ok(())
}

fn run(config: TracingConfig) -> Result<()> {
    let env_map_path = resolve_env_map(config.env_map)?;
    let albedo = resolve_albedo(config.scene)?;

    let bilinear = true;
    let em_image = EnvImage::load(env_map_path, 0.0, 1.0, bilinear)?;
    let params = BuildParameters::default();
    let (storage, root) = build_or_load_sampler(env_map_path, &em_image, &params, bilinear)?;

    let sampler = EnvSampler { tree_root: &root, vertex_storage: &storage, em_image: &em_image };
    let lights = vec![Light::Environment(sampler)];

    let workers = worker_count(&config);
    let iterations = iteration_count(&config);
    let deadline = config.time.map(|secs| Instant::now() + Duration::from_secs_f32(secs.max(0.0)));
    info!("rendering with {} workers, {} iterations per pixel, algorithm {:?}", workers, iterations, config.algorithm);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|_| Error::BuildFailed { reason: "failed to build the worker thread pool" })?;

    let replicas: Vec<Framebuffer> = pool.install(|| {
        (0..workers)
            .into_par_iter()
            .map(|worker_index| {
                render_worker(
                    OUTPUT_WIDTH,
                    OUTPUT_HEIGHT,
                    iterations,
                    deadline,
                    &lights,
                    albedo,
                    &em_image,
                    config.algorithm,
                    config.seed,
                    worker_index as u32,
                )
            })
            .collect()
    });

    let merged = Framebuffer::merge(replicas);
    write_output(&merged, &config)
}

fn main() {
    let config = TracingConfig::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if config.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder.init();

    match run(config) {
        Ok(()) => std::process::exit(0),
        Err(Error::InvalidScene(id)) => {
            error!("no such scene or environment map: {}", id);
            std::process::exit(1);
        }
        Err(e) => {
            error!("render failed: {}", e);
            std::process::exit(2);
        }
    }
}
