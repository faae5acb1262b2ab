//! l2rib - translate LDraw models to RenderMan RIB.
//!
//! Parts are translated once into a shared archive cache and referenced
//! from the scene by bound, so large models stay small on disk and load
//! lazily in the renderer.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use l2rib_core::{Light, Settings, ShadowMode, Translator};

mod preamble;

use preamble::Scene;

#[derive(Parser, Debug)]
#[command(name = "l2rib")]
#[command(about = "Translate LDraw models to RenderMan RIB", long_about = None)]
struct Cli {
    /// LDraw model (.ldr, .dat or .mpd)
    input: PathBuf,

    /// Write RIB to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Background colour
    #[arg(long, num_args = 3, value_names = ["R", "G", "B"])]
    bgcolor: Option<Vec<f32>>,

    /// Camera position
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    camera_from: Option<Vec<f32>>,

    /// Camera target
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    camera_to: Option<Vec<f32>>,

    /// Camera up vector
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    camera_up: Option<Vec<f32>>,

    /// Camera distance multiplier
    #[arg(long, value_name = "SCALE")]
    camera_distance: Option<f32>,

    /// Colour configuration file
    #[arg(long, visible_alias = "colorconfig", value_name = "FILE")]
    colour_config: Option<PathBuf>,

    /// Render to a TIFF file instead of the framebuffer
    #[arg(long = "file")]
    tiff: bool,

    /// Floor size multiplier
    #[arg(long, value_name = "SCALE")]
    floor: Option<f32>,

    /// Size of the render
    #[arg(long, num_args = 2, value_names = ["X", "Y"])]
    format: Option<Vec<u32>>,

    /// Add a light at (x y z) with colour (r g b), intensity i and shadow
    /// mode (none, map, cache or raytrace)
    #[arg(
        long,
        num_args = 8,
        value_names = ["X", "Y", "Z", "R", "G", "B", "I", "MODE"],
        allow_negative_numbers = true,
        action = clap::ArgAction::Append
    )]
    light: Vec<String>,

    /// Draw lines
    #[arg(long)]
    lines: bool,

    /// Ignore previously cached archives
    #[arg(long)]
    no_cache: bool,

    /// Pixel samples per axis
    #[arg(long)]
    pixel_samples: Option<u32>,

    /// Output ray-traced visibility attributes
    #[arg(long)]
    raytrace: bool,

    #[arg(long)]
    shading_rate: Option<f32>,

    /// Shadow map size
    #[arg(long, value_name = "SIZE")]
    shadow_format: Option<u32>,

    /// Output studs with displaced logo
    #[arg(long)]
    stud_logo: bool,

    /// Settings file (default: platform config directory)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings.
    fn apply(&self, settings: &mut Settings) -> Result<()> {
        if let Some(v) = &self.bgcolor {
            settings.background = triple(v, "--bgcolor")?;
        }
        if let Some(v) = &self.camera_from {
            settings.camera_from = triple(v, "--camera-from")?;
        }
        if let Some(v) = &self.camera_to {
            settings.camera_to = triple(v, "--camera-to")?;
        }
        if let Some(v) = &self.camera_up {
            settings.camera_up = triple(v, "--camera-up")?;
        }
        if let Some(distance) = self.camera_distance {
            settings.camera_distance = distance;
        }
        if let Some(path) = &self.colour_config {
            settings.colour_config = Some(path.clone());
        }
        if let Some(floor) = self.floor {
            settings.floor = floor;
        }
        if let Some(format) = &self.format {
            settings.format =
                <[u32; 2]>::try_from(format.as_slice()).context("--format expects two values")?;
        }
        if !self.light.is_empty() {
            settings.lights = parse_lights(&self.light)?;
        }
        if let Some(samples) = self.pixel_samples {
            settings.pixel_samples = samples;
        }
        if let Some(rate) = self.shading_rate {
            settings.shading_rate = rate;
        }
        if let Some(size) = self.shadow_format {
            settings.shadow_format = size;
        }

        settings.tiff |= self.tiff;
        settings.lines |= self.lines;
        settings.raytrace |= self.raytrace;
        settings.stud_logo |= self.stud_logo;
        if self.no_cache {
            settings.use_cache = false;
        }
        Ok(())
    }
}

fn triple(values: &[f32], flag: &str) -> Result<[f32; 3]> {
    <[f32; 3]>::try_from(values).with_context(|| format!("{flag} expects three values"))
}

/// Group `--light` values into lights, eight values each.
fn parse_lights(values: &[String]) -> Result<Vec<Light>> {
    if values.len() % 8 != 0 {
        bail!("--light expects position (3 floats), colour (3 floats), intensity and shadow mode");
    }

    values
        .chunks_exact(8)
        .map(|chunk| -> Result<Light> {
            let mut numbers = [0.0f32; 7];
            for (number, text) in numbers.iter_mut().zip(chunk) {
                *number = text
                    .parse()
                    .with_context(|| format!("--light: `{text}` is not a number"))?;
            }
            let shadow: ShadowMode = chunk[7].parse()?;
            Ok(Light {
                position: [numbers[0], numbers[1], numbers[2]],
                colour: [numbers[3], numbers[4], numbers[5]],
                intensity: numbers[6],
                shadow,
            })
        })
        .collect()
}

/// Ask for the three directories and write a fresh settings file.
fn interactive_setup(path: &Path) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut ask = |prompt: &str| -> Result<PathBuf> {
        println!("{prompt}");
        io::stdout().flush()?;
        let answer = lines.next().context("unexpected end of input")??;
        Ok(PathBuf::from(answer.trim()))
    };

    let settings = Settings {
        ldraw_dir: Some(ask("Enter LDraw directory (parts are under this folder):")?),
        l2rib_dir: Some(ask("Enter l2rib installation directory:")?),
        cache_dir: ask("Enter temporary cache file directory:")?,
        ..Settings::default()
    };
    settings
        .save(path)
        .with_context(|| format!("Unable to write configuration to {}", path.display()))?;
    println!("Configuration complete.");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let settings_path = match &cli.settings {
        Some(path) => path.clone(),
        None => Settings::default_path()?,
    };
    if !settings_path.exists() {
        eprintln!("Configuration file not found - running initial configuration.");
        return interactive_setup(&settings_path);
    }

    let mut settings = Settings::load(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    cli.apply(&mut settings)?;

    log::info!("Translating {}", cli.input.display());
    let mut translator = Translator::from_settings(&settings);
    let (translation, geometry) = translator
        .translate_model(&cli.input)
        .with_context(|| format!("Failed to translate {}", cli.input.display()))?;
    translator.log_summary();

    let rib = Scene::new(&settings, &cli.input, translation.bound).render(&geometry);
    match &cli.output {
        Some(path) => fs::write(path, rib)
            .with_context(|| format!("Unable to open output file {}", path.display()))?,
        None => io::stdout().write_all(rib.as_bytes())?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "l2rib",
            "--camera-from",
            "1",
            "-2",
            "3",
            "--format",
            "800",
            "600",
            "--light",
            "-1",
            "-1",
            "-1",
            "1",
            "1",
            "1",
            "0.5",
            "map",
            "--no-cache",
            "--lines",
            "house.ldr",
        ])
        .unwrap();

        let mut settings = Settings::default();
        cli.apply(&mut settings).unwrap();

        assert_eq!(cli.input, PathBuf::from("house.ldr"));
        assert_eq!(settings.camera_from, [1.0, -2.0, 3.0]);
        assert_eq!(settings.format, [800, 600]);
        assert_eq!(settings.lights.len(), 1);
        assert_eq!(settings.lights[0].shadow, ShadowMode::Map);
        assert_eq!(settings.lights[0].intensity, 0.5);
        assert!(!settings.use_cache);
        assert!(settings.lines);
    }

    #[test]
    fn test_bad_light_mode() {
        let values: Vec<String> = ["0", "0", "0", "1", "1", "1", "1", "soft"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(parse_lights(&values).is_err());
    }

    #[test]
    fn test_end_to_end_output() {
        let dir = TempDir::new().unwrap();
        let model = dir.path().join("tri.ldr");
        fs::write(&model, "3 16 0 0 0 10 0 0 0 10 0\n").unwrap();

        let settings = Settings {
            cache_dir: dir.path().join("cache"),
            colour_config: Some(dir.path().join("missing.ldr")),
            ..Settings::default()
        };
        let mut translator = Translator::from_settings(&settings);
        let (translation, geometry) = translator.translate_model(&model).unwrap();
        let rib = Scene::new(&settings, &model, translation.bound).render(&geometry);

        assert!(rib.contains("Bound 0 10 0 10 0 0\n"));
        assert!(rib.contains("Translate -5 -5 "));
        assert!(rib.contains("PointsPolygons [ 3]"));
    }
}
