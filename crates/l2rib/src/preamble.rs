//! Scene description wrapped around the translated geometry.
//!
//! One shadow-map frame per light with `map` shadows, then the main frame
//! with camera, lights, an optional floor and the model centred at the
//! origin.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use l2rib_core::{Light, Settings, ShadowMode};
use l2rib_math::{Bound, Vec3};

/// Everything needed to emit the frames for one model.
pub struct Scene<'a> {
    settings: &'a Settings,
    input: &'a Path,
    bound: Bound,
    lights: Vec<Light>,

    /// Model diagonal, the unit for camera and shadow distances
    distance: f32,
}

impl<'a> Scene<'a> {
    pub fn new(settings: &'a Settings, input: &'a Path, bound: Bound) -> Self {
        Self {
            settings,
            input,
            bound,
            lights: settings.effective_lights(),
            distance: bound.diagonal(),
        }
    }

    fn raytrace(&self) -> bool {
        self.settings.raytrace
            || self
                .lights
                .iter()
                .any(|light| light.shadow == ShadowMode::Raytrace)
    }

    fn centre(&self) -> Vec3 {
        if self.bound.is_empty() {
            Vec3::ZERO
        } else {
            self.bound.centroid()
        }
    }

    fn shadow_map_name(&self, index: usize) -> String {
        format!("{}{}.tx", rib_path(&self.input.with_extension("light")), index)
    }

    /// The complete RIB stream for `geometry`.
    pub fn render(&self, geometry: &str) -> String {
        let mut out = String::with_capacity(geometry.len() * (self.shadow_maps() + 1) + 4096);
        self.write_header(&mut out);
        for (index, light) in self.lights.iter().enumerate() {
            if light.shadow == ShadowMode::Map {
                self.write_shadow_frame(&mut out, index, light, geometry);
            }
        }
        self.write_main_frame(&mut out, geometry);
        out
    }

    fn shadow_maps(&self) -> usize {
        self.lights
            .iter()
            .filter(|light| light.shadow == ShadowMode::Map)
            .count()
    }

    fn write_header(&self, out: &mut String) {
        let settings = self.settings;
        out.push_str("##RenderMan RIB-Structure 1.1\n");
        let _ = writeln!(out, "##Creator l2rib v{}", env!("CARGO_PKG_VERSION"));
        out.push('\n');
        out.push_str("##RenderMan RIB\n");
        out.push_str("version 3.04\n");
        out.push_str("Declare \"bias\" \"float\"\n");

        let shaders = settings
            .shader_dir()
            .map(|dir| format!("{}:@", rib_path(&dir)))
            .unwrap_or_else(|| "@".to_string());
        let _ = writeln!(out, "Option \"searchpath\" \"shader\" [\"{shaders}\"]");

        let mut archives: Vec<PathBuf> = settings.prebuilt_dir().into_iter().collect();
        archives.push(settings.cache_dir.clone());
        if settings.mpd_dir != Path::new(".") {
            archives.push(settings.mpd_dir.clone());
        }
        archives.push(PathBuf::from("."));
        let archives: Vec<String> = archives.iter().map(|p| rib_path(p)).collect();
        let _ = writeln!(
            out,
            "Option \"searchpath\" \"archive\" [\"{}\"]",
            archives.join(":")
        );

        let _ = writeln!(out, "Option \"shadow\" \"bias\" [{}]", self.distance * 0.01);
        out.push_str("Attribute \"trace\" \"bias\" [0.05]\n");
        let _ = writeln!(
            out,
            "Option \"user\" \"uniform int l2ribStudLogo\" [{}]",
            u8::from(settings.stud_logo)
        );
    }

    fn write_shadow_frame(&self, out: &mut String, index: usize, light: &Light, geometry: &str) {
        let size = self.settings.shadow_format;
        // Slightly wider than the model so edges stay inside the map
        let window = self.distance * 0.55;

        out.push_str("FrameBegin 1\n");
        out.push_str("Option \"user\" \"uniform string l2ribPass\" \"shadow\"\n");
        out.push_str("Option \"user\" \"uniform int l2ribLines\" [0]\n");
        out.push_str("PixelSamples 2 2\n");
        let _ = writeln!(out, "Format {size} {size} 1");
        let _ = writeln!(
            out,
            "Display \"{}\" \"shadow\" \"z\"",
            self.shadow_map_name(index)
        );
        out.push_str("Projection \"orthographic\"\n");
        let _ = writeln!(out, "ScreenWindow {} {} {} {}", -window, window, -window, window);
        out.push_str("ShadingRate 1\n");
        out.push_str("Identity\n");
        let _ = writeln!(out, "Translate 0 0 {}", self.distance);
        write_look_at(out, Vec3::from(light.position), Vec3::ZERO, Vec3::Y);
        out.push_str("WorldBegin\n");
        self.write_centring(out);
        out.push_str(geometry);
        out.push_str("WorldEnd\n");
        out.push_str("FrameEnd\n");
    }

    fn write_main_frame(&self, out: &mut String, geometry: &str) {
        let settings = self.settings;
        let camera = settings.camera_distance * self.distance;

        out.push_str("FrameBegin 1\n");
        out.push_str("Option \"user\" \"uniform string l2ribPass\" \"main\"\n");
        let _ = writeln!(
            out,
            "Option \"user\" \"uniform int l2ribLines\" [{}]",
            u8::from(settings.lines)
        );
        let samples = settings.pixel_samples;
        let _ = writeln!(out, "PixelSamples {samples} {samples}");
        let _ = writeln!(out, "Format {} {} 1", settings.format[0], settings.format[1]);
        let _ = writeln!(out, "ShadingRate {}", settings.shading_rate);
        if settings.tiff {
            let _ = writeln!(
                out,
                "Display \"{}\" \"tiff\" \"rgba\"",
                rib_path(&self.input.with_extension("tif"))
            );
        } else {
            let _ = writeln!(
                out,
                "Display \"{}\" \"framebuffer\" \"rgba\"",
                rib_path(self.input)
            );
        }
        out.push_str("Projection \"perspective\" \"fov\" [45]\n");
        let far = camera + (self.distance * 4.0).max(self.distance * settings.floor * 4.0);
        let _ = writeln!(out, "Clipping 0.1 {far}");
        out.push_str("Identity\n");
        let _ = writeln!(out, "Translate 0 0 {camera}");
        write_look_at(
            out,
            Vec3::from(settings.camera_from),
            Vec3::from(settings.camera_to),
            Vec3::from(settings.camera_up),
        );

        self.write_lights(out);
        let [r, g, b] = settings.background;
        let _ = writeln!(out, "Imager \"background\" \"background\" [{r} {g} {b}]");

        out.push_str("WorldBegin\n");
        self.write_centring(out);
        if settings.floor != 0.0 {
            self.write_floor(out);
        }

        // Default material for geometry that inherits its colour
        out.push_str("AttributeBegin\n");
        if self.raytrace() {
            out.push_str(
                "Attribute \"visibility\" \"int trace\" [1] \"string transmission\" [\"opaque\"]\n",
            );
        }
        out.push_str("Color 1 1 1\n");
        out.push_str("Attribute \"user\" \"uniform color edgecolor\" [0 0 0]\n");
        out.push_str("Opacity 1 1 1\n");
        out.push_str("Surface \"plastic\" \"Ks\" [0.8]\n");
        out.push_str(geometry);
        out.push_str("AttributeEnd\n");
        out.push_str("WorldEnd\n");
        out.push_str("FrameEnd\n");
    }

    fn write_lights(&self, out: &mut String) {
        for (index, light) in self.lights.iter().enumerate() {
            let [x, y, z] = light.position;
            let [r, g, b] = light.colour;
            let common = format!("\"from\" [{x} {y} {z}] \"to\" [0 0 0]");
            let tail = format!(
                "\"intensity\" [{}] \"lightcolor\" [{r} {g} {b}]",
                light.intensity
            );
            match light.shadow {
                ShadowMode::None => {
                    let _ = writeln!(
                        out,
                        "LightSource \"distantlight\" \"distantlight{index}\" {common} {tail}"
                    );
                }
                ShadowMode::Raytrace => {
                    let _ = writeln!(
                        out,
                        "LightSource \"shadowdistant\" \"rtshadowdistant{index}\" {common} \"shadowname\" [\"raytrace\"] {tail}"
                    );
                }
                ShadowMode::Map | ShadowMode::Cache => {
                    let _ = writeln!(
                        out,
                        "LightSource \"shadowdistant\" \"shadowdistant{index}\" {common} \"shadowname\" [\"{}\"] {tail}",
                        self.shadow_map_name(index)
                    );
                }
            }
        }
    }

    fn write_centring(&self, out: &mut String) {
        let c = -self.centre();
        let _ = writeln!(out, "Translate {} {} {}", c.x, c.y, c.z);
    }

    /// Grey patch under the model; +Y points down in LDraw, so the floor
    /// sits at the maximum Y.
    fn write_floor(&self, out: &mut String) {
        let half = self.distance * self.settings.floor;
        let y = if self.bound.is_empty() { 0.0 } else { self.bound.y.max };

        out.push_str("AttributeBegin\n");
        out.push_str("Attribute \"identifier\" \"string name\" [\"l2ribfloor\"]\n");
        out.push_str("Color 0.5 0.5 0.5\n");
        out.push_str("Surface \"matte\"\n");
        out.push_str("Patch \"bilinear\" \"P\" [");
        for (x, z) in [(-half, -half), (half, -half), (-half, half), (half, half)] {
            let _ = write!(out, " {x} {y} {z}");
        }
        out.push_str("]\n");
        out.push_str("AttributeEnd\n");
    }
}

/// Left-handed look-at, written as a `ConcatTransform`.
pub fn write_look_at(out: &mut String, from: Vec3, to: Vec3, up: Vec3) {
    let view = (to - from).normalize_or_zero();
    let axis_x = view.cross(up).normalize_or_zero();
    let new_up = axis_x.cross(view);

    let _ = writeln!(
        out,
        "ConcatTransform [{} {} {} 0 {} {} {} 0 {} {} {} 0 0 0 0 1]",
        axis_x.x, new_up.x, view.x, axis_x.y, new_up.y, view.y, axis_x.z, new_up.z, view.z
    );
}

/// Paths in RIB always use forward slashes.
fn rib_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> Bound {
        Bound::from_points([Vec3::ZERO, Vec3::new(20.0, 24.0, 20.0)])
    }

    #[test]
    fn test_look_at_down_z() {
        let mut out = String::new();
        write_look_at(&mut out, Vec3::ZERO, Vec3::Z, Vec3::Y);

        let values: Vec<f32> = out
            .trim()
            .trim_start_matches("ConcatTransform [")
            .trim_end_matches(']')
            .split_whitespace()
            .map(|v| v.parse().unwrap())
            .collect();
        // view (0,0,1), x = view cross up = (-1,0,0), up = x cross view = (0,1,0)
        let expected = [
            -1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ];
        assert_eq!(values.len(), 16);
        for (v, e) in values.iter().zip(expected) {
            assert!((v - e).abs() < 1e-6, "{out}");
        }
    }

    #[test]
    fn test_look_at_degenerate_up_has_no_nan() {
        let mut out = String::new();
        write_look_at(&mut out, Vec3::ZERO, Vec3::Y, Vec3::Y);
        assert!(!out.contains("NaN"));
    }

    #[test]
    fn test_default_scene() {
        let settings = Settings::default();
        let scene = Scene::new(&settings, Path::new("house.ldr"), cube());
        let rib = scene.render("GEOMETRY\n");

        assert!(rib.starts_with("##RenderMan RIB-Structure 1.1\n"));
        assert!(rib.contains("Option \"searchpath\" \"archive\" [\"cache:.\"]\n"));
        assert!(rib.contains("Display \"house.ldr\" \"framebuffer\" \"rgba\"\n"));
        assert!(rib.contains("LightSource \"distantlight\" \"distantlight0\" \"from\" [-1 -1 -1] \"to\" [0 0 0] \"intensity\" [1] \"lightcolor\" [1 1 1]\n"));
        assert!(rib.contains("Translate -10 -12 -10\n"));
        assert_eq!(rib.matches("FrameBegin").count(), 1);
        assert_eq!(rib.matches("GEOMETRY").count(), 1);
        assert!(!rib.contains("l2ribfloor"));
        assert!(rib.ends_with("GEOMETRY\nAttributeEnd\nWorldEnd\nFrameEnd\n"));
    }

    #[test]
    fn test_shadow_map_lights_add_frames() {
        let settings = Settings {
            lights: vec![
                Light {
                    shadow: ShadowMode::Map,
                    ..Light::default()
                },
                Light::default(),
            ],
            shadow_format: 512,
            ..Settings::default()
        };
        let scene = Scene::new(&settings, Path::new("house.ldr"), cube());
        let rib = scene.render("GEOMETRY\n");

        assert_eq!(rib.matches("FrameBegin").count(), 2);
        assert_eq!(rib.matches("GEOMETRY").count(), 2);
        assert!(rib.contains("Format 512 512 1\n"));
        assert!(rib.contains("Display \"house.light0.tx\" \"shadow\" \"z\"\n"));
        assert!(rib.contains("\"shadowname\" [\"house.light0.tx\"]"));
        let shadow = rib.find("l2ribPass\" \"shadow\"").unwrap();
        let main = rib.find("l2ribPass\" \"main\"").unwrap();
        assert!(shadow < main);
    }

    #[test]
    fn test_raytrace_light_enables_visibility() {
        let settings = Settings {
            lights: vec![Light {
                shadow: ShadowMode::Raytrace,
                ..Light::default()
            }],
            ..Settings::default()
        };
        let rib = Scene::new(&settings, Path::new("a.ldr"), cube()).render("");
        assert!(rib.contains("\"rtshadowdistant0\""));
        assert!(rib.contains("Attribute \"visibility\" \"int trace\" [1]"));
    }

    #[test]
    fn test_floor_and_tiff() {
        let settings = Settings {
            floor: 2.0,
            tiff: true,
            lines: true,
            ..Settings::default()
        };
        let rib = Scene::new(&settings, Path::new("models/a.ldr"), cube()).render("");
        assert!(rib.contains("Display \"models/a.tif\" \"tiff\" \"rgba\"\n"));
        assert!(rib.contains("\"string name\" [\"l2ribfloor\"]"));
        assert!(rib.contains("Option \"user\" \"uniform int l2ribLines\" [1]"));
    }

    #[test]
    fn test_empty_model_is_centred_at_origin() {
        let settings = Settings::default();
        let rib = Scene::new(&settings, Path::new("a.ldr"), Bound::EMPTY).render("");
        assert!(rib.contains("Translate -0 -0 -0\n") || rib.contains("Translate 0 0 0\n"));
        assert!(!rib.contains("NaN"));
    }
}
