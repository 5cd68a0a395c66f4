#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod geom;
pub mod texture;

use std::fmt;

use geom::{GeomMesh, GeomMeshDiagnostics, KleinFigure, TessellationError, TessellationOptions, tessellate};
use serde::{Deserialize, Serialize};
use texture::{ImageFetcher, MipmapError, MipmapPyramid, TextureSampling, load_pyramid};
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {}

#[cfg(all(feature = "parallel", target_arch = "wasm32"))]
#[wasm_bindgen]
pub async fn initialize_parallel(worker_count: Option<u32>) -> Result<(), wasm_bindgen::JsError> {
    let threads = worker_count
        .map(|count| count.max(1) as usize)
        .or_else(|| {
            std::thread::available_parallelism()
                .map(|value| value.get())
                .ok()
        })
        .unwrap_or(1);

    wasm_bindgen_rayon::init_thread_pool(threads)
        .await
        .map_err(|err| wasm_bindgen::JsError::new(&format!("could not start rayon thread pool: {err:?}")))
}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                println!("{}", format!($($t)*));
            }
        }
    }};
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Tessellation(#[from] TessellationError),
    #[error(transparent)]
    Texture(#[from] MipmapError),
    #[error("unknown slider `{0}`")]
    UnknownSlider(String),
    #[error("slider value must be finite, got {0}")]
    NonFiniteValue(f64),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Scene lighting around the figure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LightingSettings {
    pub ambient_color: u32,
    pub ambient_intensity: f64,
    /// Point light carried by the camera.
    pub point_color: u32,
    pub point_intensity: f64,
}

impl Default for LightingSettings {
    fn default() -> Self {
        Self {
            ambient_color: 0x00cc_cccc,
            ambient_intensity: 0.4,
            point_color: 0x00ff_ffff,
            point_intensity: 0.8,
        }
    }
}

/// Phong material parameters for the textured figure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaterialSettings {
    pub color: u32,
    pub specular: u32,
    pub shininess: f64,
    /// The figure is one-sided, so both faces are lit.
    pub double_sided: bool,
}

impl Default for MaterialSettings {
    fn default() -> Self {
        Self {
            color: 0x00ff_ffff,
            specular: 0x0011_1111,
            shininess: 30.0,
            double_sided: true,
        }
    }
}

/// Where the harness places the figure in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Placement {
    pub position: [f64; 3],
    pub scale: f64,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 200.0],
            scale: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    pub tessellation: TessellationOptions,
    pub lighting: LightingSettings,
    pub material: MaterialSettings,
    pub placement: Placement,
    /// Sampler state for loaded textures. Its `repeat` must stay `[1, 1]`:
    /// the engine bakes texture repeat into the mesh UVs via
    /// `tessellation.uv_repeat`.
    pub sampling: TextureSampling,
}

impl EngineSettings {
    /// Checks everything except the tessellation, which is validated by
    /// actually building the mesh.
    fn validate(&self) -> Result<(), EngineError> {
        let lighting = &self.lighting;
        for (name, intensity) in [
            ("ambientIntensity", lighting.ambient_intensity),
            ("pointIntensity", lighting.point_intensity),
        ] {
            if !intensity.is_finite() || intensity < 0.0 {
                return Err(EngineError::InvalidSettings(format!(
                    "{name} must be finite and >= 0, got {intensity}"
                )));
            }
        }
        for (name, color) in [
            ("ambientColor", lighting.ambient_color),
            ("pointColor", lighting.point_color),
            ("material.color", self.material.color),
            ("material.specular", self.material.specular),
        ] {
            if color > 0x00ff_ffff {
                return Err(EngineError::InvalidSettings(format!(
                    "{name} {color:#x} is not a 24-bit colour"
                )));
            }
        }
        let placement = &self.placement;
        if !placement.scale.is_finite()
            || placement.scale <= 0.0
            || placement.position.iter().any(|c| !c.is_finite())
        {
            return Err(EngineError::InvalidSettings(
                "placement must be finite with a positive scale".to_string(),
            ));
        }
        self.sampling.validate()?;
        if self.sampling.repeat != [1.0, 1.0] {
            return Err(EngineError::InvalidSettings(format!(
                "sampling.repeat must stay [1, 1], texture repeat is set with tessellation.uvRepeat (got {:?})",
                self.sampling.repeat
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sliders
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SliderId {
    Slices,
    Stacks,
    UvRepeat,
    AmbientIntensity,
    PointIntensity,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SliderRange {
    min: f64,
    max: f64,
    step: f64,
}

impl SliderId {
    const ALL: [Self; 5] = [
        Self::Slices,
        Self::Stacks,
        Self::UvRepeat,
        Self::AmbientIntensity,
        Self::PointIntensity,
    ];

    fn key(self) -> &'static str {
        match self {
            Self::Slices => "slices",
            Self::Stacks => "stacks",
            Self::UvRepeat => "uv_repeat",
            Self::AmbientIntensity => "ambient_intensity",
            Self::PointIntensity => "point_intensity",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Slices => "Slices",
            Self::Stacks => "Stacks",
            Self::UvRepeat => "Texture repeat",
            Self::AmbientIntensity => "Ambient light",
            Self::PointIntensity => "Point light",
        }
    }

    fn range(self) -> SliderRange {
        match self {
            Self::Slices | Self::Stacks => SliderRange {
                min: 1.0,
                max: 128.0,
                step: 1.0,
            },
            Self::UvRepeat => SliderRange {
                min: 0.25,
                max: 16.0,
                step: 0.25,
            },
            Self::AmbientIntensity | Self::PointIntensity => SliderRange {
                min: 0.0,
                max: 2.0,
                step: 0.05,
            },
        }
    }

    /// Matches a slider by key or display name, ignoring case and padding.
    fn lookup(id_or_name: &str) -> Option<Self> {
        let normalized = normalize_name(id_or_name);
        if normalized.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|slider| slider.key() == normalized || normalize_name(slider.name()) == normalized)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliderSpec {
    pub id: String,
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub value: f64,
}

fn snap_to_slider(value: f64, range: SliderRange) -> f64 {
    let clamped = clamp(value, range.min, range.max);
    let snapped = range.min + ((clamped - range.min) / range.step).round() * range.step;
    clamp(snapped, range.min, range.max)
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Public entry point for consumers.
///
/// Holds the current mesh and texture. Every change is built completely
/// before it replaces the installed state, so a failed update leaves the
/// previous mesh or texture in place.
#[wasm_bindgen]
#[derive(Debug)]
pub struct Engine {
    settings: EngineSettings,
    mesh: GeomMesh,
    diagnostics: GeomMeshDiagnostics,
    mesh_revision: u32,
    texture: Option<MipmapPyramid>,
    texture_revision: u32,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    #[must_use]
    pub fn with_settings(settings: EngineSettings) -> Self {
        let mut engine = Self {
            settings,
            mesh: GeomMesh::default(),
            diagnostics: GeomMeshDiagnostics::default(),
            mesh_revision: 0,
            texture: None,
            texture_revision: 0,
        };
        if let Err(err) = engine.retessellate(settings.tessellation) {
            log::error!("initial tessellation failed: {err}");
        }
        engine
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[must_use]
    pub fn mesh(&self) -> &GeomMesh {
        &self.mesh
    }

    #[must_use]
    pub fn diagnostics(&self) -> &GeomMeshDiagnostics {
        &self.diagnostics
    }

    #[must_use]
    pub fn texture(&self) -> Option<&MipmapPyramid> {
        self.texture.as_ref()
    }

    pub fn set_resolution(&mut self, slices: usize, stacks: usize) -> Result<(), EngineError> {
        let options = TessellationOptions {
            slices,
            stacks,
            ..self.settings.tessellation
        };
        self.retessellate(options)
    }

    pub fn set_uv_repeat(&mut self, uv_repeat: f64) -> Result<(), EngineError> {
        let options = self.settings.tessellation.with_uv_repeat(uv_repeat);
        self.retessellate(options)
    }

    #[must_use]
    pub fn sliders(&self) -> Vec<SliderSpec> {
        SliderId::ALL
            .into_iter()
            .map(|slider| {
                let range = slider.range();
                SliderSpec {
                    id: slider.key().to_string(),
                    name: slider.name().to_string(),
                    min: range.min,
                    max: range.max,
                    step: range.step,
                    value: self.slider_value(slider),
                }
            })
            .collect()
    }

    /// Sets a slider by id or name and returns the value actually applied
    /// after clamping and step snapping.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn set_slider_value(&mut self, id_or_name: &str, value: f64) -> Result<f64, EngineError> {
        if !value.is_finite() {
            return Err(EngineError::NonFiniteValue(value));
        }
        let slider = SliderId::lookup(id_or_name)
            .ok_or_else(|| EngineError::UnknownSlider(id_or_name.to_string()))?;
        let applied = snap_to_slider(value, slider.range());

        match slider {
            SliderId::Slices => {
                self.set_resolution(applied as usize, self.settings.tessellation.stacks)?;
            }
            SliderId::Stacks => {
                self.set_resolution(self.settings.tessellation.slices, applied as usize)?;
            }
            SliderId::UvRepeat => self.set_uv_repeat(applied)?,
            SliderId::AmbientIntensity => self.settings.lighting.ambient_intensity = applied,
            SliderId::PointIntensity => self.settings.lighting.point_intensity = applied,
        }
        Ok(applied)
    }

    /// Replaces all settings at once. Nothing is committed unless the new
    /// settings validate and produce a mesh.
    pub fn configure(&mut self, settings: EngineSettings) -> Result<(), EngineError> {
        settings.validate()?;
        let (mesh, diagnostics) = tessellate(&KleinFigure, settings.tessellation)?;
        self.settings = settings;
        self.install_mesh(mesh, diagnostics);
        Ok(())
    }

    /// Installs the outcome of a texture load. On failure the current
    /// texture stays installed and the error is returned.
    pub fn install_texture(
        &mut self,
        result: Result<MipmapPyramid, MipmapError>,
    ) -> Result<(), EngineError> {
        match result {
            Ok(pyramid) => {
                self.install_pyramid(pyramid);
                Ok(())
            }
            Err(err) => {
                log::warn!("texture load failed, keeping previous texture: {err}");
                Err(err.into())
            }
        }
    }

    /// Loads a pyramid with the engine's sampling settings and installs it.
    pub async fn load_texture<F: ImageFetcher>(
        &mut self,
        fetcher: &F,
        template: &str,
        max_level: u32,
    ) -> Result<(), EngineError> {
        let result = load_pyramid(fetcher, template, max_level, self.settings.sampling).await;
        self.install_texture(result)
    }

    #[allow(clippy::cast_precision_loss)]
    fn slider_value(&self, slider: SliderId) -> f64 {
        let settings = &self.settings;
        match slider {
            SliderId::Slices => settings.tessellation.slices as f64,
            SliderId::Stacks => settings.tessellation.stacks as f64,
            SliderId::UvRepeat => settings.tessellation.uv_repeat,
            SliderId::AmbientIntensity => settings.lighting.ambient_intensity,
            SliderId::PointIntensity => settings.lighting.point_intensity,
        }
    }

    fn retessellate(&mut self, options: TessellationOptions) -> Result<(), EngineError> {
        match tessellate(&KleinFigure, options) {
            Ok((mesh, diagnostics)) => {
                self.settings.tessellation = options;
                self.install_mesh(mesh, diagnostics);
                Ok(())
            }
            Err(err) => {
                log::warn!("keeping previous mesh: {err}");
                Err(err.into())
            }
        }
    }

    fn install_pyramid(&mut self, pyramid: MipmapPyramid) {
        log::debug!("installing texture with {} levels", pyramid.level_count());
        self.texture = Some(pyramid);
        self.texture_revision = self.texture_revision.wrapping_add(1);
    }

    fn install_mesh(&mut self, mesh: GeomMesh, diagnostics: GeomMeshDiagnostics) {
        debug_log!("mesh updated: {}", diagnostics.summary());
        for warning in &diagnostics.warnings {
            log::warn!("{warning}");
        }
        self.mesh = mesh;
        self.diagnostics = diagnostics;
        self.mesh_revision = self.mesh_revision.wrapping_add(1);
    }
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    #[must_use]
    pub fn new() -> Engine {
        Engine::with_settings(EngineSettings::default())
    }

    /// Incremented every time a new mesh is installed.
    #[wasm_bindgen(getter)]
    #[must_use]
    pub fn mesh_revision(&self) -> u32 {
        self.mesh_revision
    }

    #[wasm_bindgen(getter)]
    #[must_use]
    pub fn texture_revision(&self) -> u32 {
        self.texture_revision
    }

    /// Slider specs for UI generation.
    #[wasm_bindgen(js_name = get_sliders)]
    pub fn js_get_sliders(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.sliders()).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = set_slider_value)]
    pub fn js_set_slider_value(&mut self, id_or_name: &str, value: f64) -> Result<f64, JsValue> {
        self.set_slider_value(id_or_name, value).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = set_resolution)]
    pub fn js_set_resolution(&mut self, slices: u32, stacks: u32) -> Result<(), JsValue> {
        self.set_resolution(slices as usize, stacks as usize)
            .map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = set_uv_repeat)]
    pub fn js_set_uv_repeat(&mut self, uv_repeat: f64) -> Result<(), JsValue> {
        self.set_uv_repeat(uv_repeat).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = get_settings)]
    pub fn js_get_settings(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.settings).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = configure)]
    pub fn js_configure(&mut self, settings: JsValue) -> Result<(), JsValue> {
        let settings: EngineSettings =
            serde_wasm_bindgen::from_value(settings).map_err(to_js_error)?;
        self.configure(settings).map_err(to_js_error)
    }

    /// The current mesh as `{ positions, normals, uvs, indices }`.
    #[wasm_bindgen(js_name = get_mesh)]
    pub fn js_get_mesh(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.mesh.to_buffers()).map_err(to_js_error)
    }

    #[wasm_bindgen]
    #[must_use]
    pub fn mesh_positions(&self) -> Vec<f32> {
        self.mesh.to_buffers().positions
    }

    #[wasm_bindgen]
    #[must_use]
    pub fn mesh_normals(&self) -> Vec<f32> {
        self.mesh.to_buffers().normals
    }

    #[wasm_bindgen]
    #[must_use]
    pub fn mesh_uvs(&self) -> Vec<f32> {
        self.mesh.to_buffers().uvs
    }

    #[wasm_bindgen]
    #[must_use]
    pub fn mesh_indices(&self) -> Vec<u32> {
        self.mesh.indices.clone()
    }

    #[wasm_bindgen]
    #[must_use]
    pub fn diagnostics_summary(&self) -> String {
        self.diagnostics.summary()
    }

    #[wasm_bindgen]
    #[must_use]
    pub fn has_texture(&self) -> bool {
        self.texture.is_some()
    }

    /// Level extents and sampler state of the installed texture.
    #[wasm_bindgen(js_name = get_texture_info)]
    pub fn js_get_texture_info(&self) -> Result<JsValue, JsValue> {
        let texture = self
            .texture
            .as_ref()
            .ok_or_else(|| js_error("no texture installed"))?;
        serde_wasm_bindgen::to_value(&texture.info()).map_err(to_js_error)
    }

    /// RGBA8 pixels of one texture level; level 0 is the base image.
    #[wasm_bindgen]
    pub fn texture_level(&self, level: u32) -> Result<Vec<u8>, JsValue> {
        self.texture
            .as_ref()
            .and_then(|texture| texture.level_data(level as usize))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| js_error(&format!("texture level {level} is not available")))
    }

    /// Installs a pyramid produced by `load_texture`.
    #[wasm_bindgen(js_name = install_texture)]
    pub fn js_install_texture(&mut self, pyramid: TexturePyramid) {
        self.install_pyramid(pyramid.0);
    }
}

/// A loaded mip chain on its way from `load_texture` to the engine.
#[wasm_bindgen]
#[derive(Debug)]
pub struct TexturePyramid(MipmapPyramid);

#[wasm_bindgen]
impl TexturePyramid {
    #[wasm_bindgen(getter)]
    #[must_use]
    pub fn level_count(&self) -> u32 {
        u32::try_from(self.0.level_count()).unwrap_or(u32::MAX)
    }
}

/// Fetches `template` for levels `0..=max_level` relative to `base_url`.
///
/// The returned promise rejects if any level fails, in which case nothing
/// should be installed.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub async fn load_texture(
    base_url: String,
    template: String,
    max_level: u32,
    sampling: JsValue,
) -> Result<TexturePyramid, JsValue> {
    let sampling: TextureSampling = if sampling.is_undefined() || sampling.is_null() {
        TextureSampling::default()
    } else {
        serde_wasm_bindgen::from_value(sampling).map_err(to_js_error)?
    };
    let fetcher = texture::HttpImageFetcher::new(base_url);
    load_pyramid(&fetcher, &template, max_level, sampling)
        .await
        .map(TexturePyramid)
        .map_err(to_js_error)
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen::JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}
