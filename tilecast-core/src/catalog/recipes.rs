//! Recipe directives (§4.4): a small declarative map attached to a
//! source, preprocessed into per-band sources (Landsat-8 band expansion)
//! and applied per-pixel after each window read (reflectance/imagery
//! normalization, band selection, per-pixel expressions, stretches).
//!
//! Unknown directives are ignored with a `tracing::warn`, not a hard
//! error, so catalog records written against a newer directive set
//! degrade gracefully against an older binary.

use ndarray::{Array2, Array3, Axis};
use tracing::warn;

use super::Source;
use crate::error::{RenderError, RenderResult};
use crate::pixels::PixelCollection;

/// A single recognized recipe directive, tagged by name in the source's
/// `recipes` map.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeDirective {
    Resample(String),
    Nodata(f64),
    Colormap(Vec<(u8, [u8; 4])>),
    Landsat8,
    Imagery,
    RgbBands(Vec<usize>),
    Expr(Vec<String>),
    LinearStretch(StretchMode),
    MaskOutliers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StretchMode {
    Global,
    PerBand,
}

/// Parses the recognized directives out of a source's `recipes` map,
/// logging and skipping anything unrecognized.
pub fn parse_directives(source: &Source) -> Vec<RecipeDirective> {
    let mut directives = Vec::new();

    for (key, value) in &source.recipes {
        let directive = match key.as_str() {
            "resample" => value.as_str().map(|s| RecipeDirective::Resample(s.to_string())),
            "nodata" => value.as_f64().map(RecipeDirective::Nodata),
            "landsat8" => Some(RecipeDirective::Landsat8),
            "imagery" => Some(RecipeDirective::Imagery),
            "mask_outliers" => Some(RecipeDirective::MaskOutliers),
            "rgb_bands" => value.as_array().map(|arr| {
                RecipeDirective::RgbBands(
                    arr.iter().filter_map(serde_json::Value::as_u64).map(|b| b as usize).collect(),
                )
            }),
            "expr" => value.as_str().map(|s| {
                RecipeDirective::Expr(s.split(',').map(|e| e.trim().to_string()).collect())
            }),
            "linear_stretch" => value.as_str().and_then(|s| match s {
                "global" => Some(RecipeDirective::LinearStretch(StretchMode::Global)),
                "per_band" => Some(RecipeDirective::LinearStretch(StretchMode::PerBand)),
                _ => None,
            }),
            "colormap" => value.as_object().map(|obj| {
                RecipeDirective::Colormap(
                    obj.iter()
                        .filter_map(|(k, v)| {
                            let index: u8 = k.parse().ok()?;
                            let rgba = v.as_array()?;
                            let get = |i: usize| rgba.get(i).and_then(serde_json::Value::as_u64).unwrap_or(255) as u8;
                            Some((index, [get(0), get(1), get(2), get(3)]))
                        })
                        .collect(),
                )
            }),
            _ => {
                warn!(directive = key, source = %source.name, "ignoring unrecognized recipe directive");
                None
            }
        };

        if let Some(directive) = directive {
            directives.push(directive);
        }
    }

    directives
}

/// Scene identifiers for the `landsat8` sources in `sources`, in first-seen
/// order. A source's `name` is the catalog's own per-scene key: expansion
/// in `preprocess` clones it onto every band source it produces, so it
/// survives to identify which expanded sources came from the same scene.
fn landsat8_scene_order(sources: &[Source]) -> Vec<String> {
    let mut seen = Vec::new();
    for source in sources {
        if source.recipes.contains_key("landsat8") && !seen.contains(&source.name) {
            seen.push(source.name.clone());
        }
    }
    seen
}

/// Number of distinct Landsat-8 scenes among `sources`, for sizing the
/// per-scene pansharpen pass in the mosaic compositor.
pub fn landsat8_scene_count(sources: &[Source]) -> usize {
    landsat8_scene_order(sources).len()
}

/// Expands `landsat8` sources into one `Source` per logical band, mapping
/// `r`/`g`/`b`/`pan` to a 4-band canvas block and substituting the band
/// number into the URL template, mirroring the predecessor's
/// `recipes.preprocess`. Each scene gets its own 4-band block
/// (`scene_index*4 + logical_offset`) so that two Landsat-8 scenes
/// overlapping the same tile never write into each other's bands.
pub fn preprocess(sources: Vec<Source>) -> Vec<Source> {
    const BAND_MAPPING: [(&str, usize); 4] = [("r", 0), ("g", 1), ("b", 2), ("pan", 3)];
    let scene_order = landsat8_scene_order(&sources);

    sources
        .into_iter()
        .flat_map(|source| {
            if !source.recipes.contains_key("landsat8") {
                return vec![source];
            }
            let scene_base = scene_order.iter().position(|n| *n == source.name).unwrap_or(0) * 4;

            BAND_MAPPING
                .iter()
                .filter_map(|(logical, offset)| {
                    let physical = source.band_info.get(*logical)?;
                    let mut expanded = source.clone();
                    expanded.url = source.url.replace("{band}", physical);
                    expanded.band = Some(scene_base + *offset);
                    Some(expanded)
                })
                .collect()
        })
        .collect()
}

/// Brovey-pansharpens a composited 4-band (r, g, b, pan) canvas — the
/// output of pasting a `landsat8`-expanded source's per-band windows onto
/// one canvas — into the final 3-band RGB output, mirroring the
/// predecessor's scene-grouping postprocess step. A no-op composited
/// canvas (no pan band, only r/g/b) never reaches this: callers only
/// invoke it when the canvas has 4 bands.
pub fn pansharpen_brovey(canvas: PixelCollection) -> PixelCollection {
    let (height, width) = (canvas.height(), canvas.width());
    let mut rgb = Array3::<f32>::zeros((3, height, width));
    let mut mask = canvas.mask.clone();

    for row in 0..height {
        for col in 0..width {
            if canvas.mask[[row, col]] {
                continue;
            }
            let r = canvas.data[[0, row, col]];
            let g = canvas.data[[1, row, col]];
            let b = canvas.data[[2, row, col]];
            let pan = canvas.data[[3, row, col]];
            let intensity = r + g + b;
            if intensity <= f32::EPSILON {
                mask[[row, col]] = true;
                continue;
            }
            rgb[[0, row, col]] = (pan * r / intensity).clamp(0.0, 1.0);
            rgb[[1, row, col]] = (pan * g / intensity).clamp(0.0, 1.0);
            rgb[[2, row, col]] = (pan * b / intensity).clamp(0.0, 1.0);
        }
    }

    PixelCollection::new(rgb, mask, canvas.bounds)
}

/// Pansharpens each of `n_scenes` independent 4-band blocks in `canvas`
/// (band layout from `preprocess`'s per-scene offsets) and merges the
/// resulting 3-band RGB outputs, first-seen scene wins where more than
/// one scene produced a valid pixel. Two overlapping Landsat-8 scenes
/// each pansharpen against their own r/g/b/pan, never the other's.
pub fn pansharpen_brovey_scenes(canvas: PixelCollection, n_scenes: usize) -> PixelCollection {
    if n_scenes == 0 {
        return canvas;
    }

    let (height, width) = (canvas.height(), canvas.width());
    let mut rgb = Array3::<f32>::zeros((3, height, width));
    let mut mask = Array2::<bool>::from_elem((height, width), true);

    for scene_index in 0..n_scenes {
        let base = scene_index * 4;
        if base + 4 > canvas.bands() {
            continue;
        }

        let mut scene_data = Array3::<f32>::zeros((4, height, width));
        for b in 0..4 {
            scene_data
                .index_axis_mut(Axis(0), b)
                .assign(&canvas.data.index_axis(Axis(0), base + b));
        }
        let scene_canvas = PixelCollection::new(scene_data, canvas.mask.clone(), canvas.bounds);
        let sharpened = pansharpen_brovey(scene_canvas);

        for row in 0..height {
            for col in 0..width {
                if mask[[row, col]] && !sharpened.mask[[row, col]] {
                    for b in 0..3 {
                        rgb[[b, row, col]] = sharpened.data[[b, row, col]];
                    }
                    mask[[row, col]] = false;
                }
            }
        }
    }

    PixelCollection::new(rgb, mask, canvas.bounds)
}

/// Applies per-source recipe transforms to a freshly-read window.
pub fn apply(directives: &[RecipeDirective], mut pixels: PixelCollection, source: &Source) -> RenderResult<PixelCollection> {
    for directive in directives {
        pixels = match directive {
            RecipeDirective::Landsat8 => apply_landsat8(pixels, source)?,
            RecipeDirective::Imagery => apply_imagery_normalize(pixels),
            RecipeDirective::RgbBands(order) => select_bands(pixels, order)?,
            RecipeDirective::LinearStretch(mode) => linear_stretch(pixels, *mode),
            RecipeDirective::MaskOutliers => mask_outliers(pixels),
            RecipeDirective::Expr(exprs) => evaluate_expr(pixels, exprs)?,
            RecipeDirective::Colormap(entries) => {
                pixels.colormap = Some(crate::pixels::ColorMap::from_entries(entries.iter().copied()));
                pixels
            }
            // Resample/Nodata are consumed before the window read, not here.
            RecipeDirective::Resample(_) | RecipeDirective::Nodata(_) => pixels,
        };
    }
    Ok(pixels)
}

fn apply_landsat8(mut pixels: PixelCollection, source: &Source) -> RenderResult<PixelCollection> {
    let sun_elevation = source.meta["L1_METADATA_FILE"]["IMAGE_ATTRIBUTES"]["SUN_ELEVATION"]
        .as_f64()
        .unwrap_or(45.0);
    let multi_reflect = source.meta["L1_METADATA_FILE"]["RADIOMETRIC_RESCALING"]["REFLECTANCE_MULT_BAND"]
        .as_f64()
        .unwrap_or(1.0);
    let add_reflect = source.meta["L1_METADATA_FILE"]["RADIOMETRIC_RESCALING"]["REFLECTANCE_ADD_BAND"]
        .as_f64()
        .unwrap_or(0.0);
    let sin_elev = sun_elevation.to_radians().sin().max(f64::EPSILON);

    let (min_val, max_val) = reflectance_bounds(&pixels, multi_reflect, add_reflect, sin_elev, source);

    pixels.data.mapv_inplace(|raw| {
        let reflectance = ((raw as f64) * multi_reflect + add_reflect) / sin_elev * 10_000.0;
        if reflectance > 0.0 {
            (((reflectance - min_val) / (max_val - min_val).max(f64::EPSILON)).clamp(0.0, 1.0)) as f32
        } else {
            0.0
        }
    });

    Ok(pixels)
}

fn reflectance_bounds(
    pixels: &PixelCollection,
    multi_reflect: f64,
    add_reflect: f64,
    sin_elev: f64,
    source: &Source,
) -> (f64, f64) {
    let band = source.band.unwrap_or(0).to_string();
    let default_min = 0.0;
    let default_max = 65535.0;
    let min_val = source.meta["values"][&band]["min"].as_f64().unwrap_or(default_min);
    let max_val = source.meta["values"][&band]["max"].as_f64().unwrap_or(default_max);

    if (min_val - default_min).abs() < f64::EPSILON && (max_val - default_max).abs() < f64::EPSILON {
        let mut samples: Vec<f64> = pixels
            .data
            .iter()
            .zip(pixels.mask.iter())
            .filter(|(_, &masked)| !masked)
            .map(|(&v, _)| ((v as f64) * multi_reflect + add_reflect) / sin_elev * 10_000.0)
            .collect();
        if samples.is_empty() {
            return (min_val, max_val);
        }
        samples.sort_by(f64::total_cmp);
        let p2 = percentile(&samples, 0.02);
        let p98 = percentile(&samples, 0.98);
        (min_val.max(p2), max_val.min(p98))
    } else {
        (min_val, max_val)
    }
}

fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    let idx = ((sorted.len() as f64 - 1.0) * fraction).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn apply_imagery_normalize(mut pixels: PixelCollection) -> PixelCollection {
    let max = pixels.data.iter().cloned().fold(f32::MIN, f32::max).max(1.0);
    if max > 1.0 {
        pixels.data.mapv_inplace(|v| v / max);
    }
    pixels
}

fn select_bands(pixels: PixelCollection, order: &[usize]) -> RenderResult<PixelCollection> {
    let bands = pixels.bands();
    for &index in order {
        if index >= bands {
            return Err(RenderError::InvalidTileRequest(format!(
                "rgb_bands index {index} out of range for a {bands}-band source"
            )));
        }
    }

    let (height, width) = (pixels.height(), pixels.width());
    let mut reordered = Array3::<f32>::zeros((order.len(), height, width));
    for (dst, &src) in order.iter().enumerate() {
        reordered
            .index_axis_mut(Axis(0), dst)
            .assign(&pixels.data.index_axis(Axis(0), src));
    }

    Ok(PixelCollection::new(reordered, pixels.mask, pixels.bounds).with_band(pixels.band))
}

fn linear_stretch(mut pixels: PixelCollection, mode: StretchMode) -> PixelCollection {
    match mode {
        StretchMode::Global => {
            let (min, max) = min_max(pixels.data.iter().copied());
            stretch_in_place(&mut pixels.data, min, max);
        }
        StretchMode::PerBand => {
            for mut band in pixels.data.axis_iter_mut(Axis(0)) {
                let (min, max) = min_max(band.iter().copied());
                band.mapv_inplace(|v| normalize(v, min, max));
            }
        }
    }
    pixels
}

fn min_max(values: impl Iterator<Item = f32>) -> (f32, f32) {
    values.fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

fn normalize(value: f32, min: f32, max: f32) -> f32 {
    if max > min {
        (value - min) / (max - min)
    } else {
        0.0
    }
}

fn stretch_in_place(data: &mut Array3<f32>, min: f32, max: f32) {
    data.mapv_inplace(|v| normalize(v, min, max));
}

/// Flags points more than 100 median-absolute-deviations from the median
/// as masked, to strip DEM edge artifacts (per §4.4's `mask_outliers`).
fn mask_outliers(mut pixels: PixelCollection) -> PixelCollection {
    let mut values: Vec<f32> = pixels
        .data
        .iter()
        .zip(pixels.mask.iter())
        .filter(|(_, &masked)| !masked)
        .map(|(&v, _)| v)
        .collect();
    if values.is_empty() {
        return pixels;
    }
    values.sort_by(f32::total_cmp);
    let median = values[values.len() / 2];
    let mut deviations: Vec<f32> = values.iter().map(|&v| (v - median).abs()).collect();
    deviations.sort_by(f32::total_cmp);
    let mad = deviations[deviations.len() / 2].max(f32::EPSILON);

    let (height, width) = (pixels.height(), pixels.width());
    for row in 0..height {
        for col in 0..width {
            if pixels.mask[[row, col]] {
                continue;
            }
            let v = pixels.data[[0, row, col]];
            if (v - median).abs() > 100.0 * mad {
                pixels.mask[[row, col]] = true;
            }
        }
    }
    pixels
}

/// Evaluates simple per-pixel arithmetic expressions over bands
/// `b1..bN`, one output band per expression. NaN results become 0; the
/// output mask is the logical-AND of the contributing bands' masks,
/// which here is just the shared per-pixel mask since masks aren't
/// tracked per band.
fn evaluate_expr(pixels: PixelCollection, exprs: &[String]) -> RenderResult<PixelCollection> {
    let (height, width) = (pixels.height(), pixels.width());
    let mut output = Array3::<f32>::zeros((exprs.len(), height, width));

    for (band_index, expr) in exprs.iter().enumerate() {
        let compiled = expr::compile(expr)
            .map_err(|err| RenderError::InvalidTileRequest(format!("invalid expr {expr:?}: {err}")))?;
        for row in 0..height {
            for col in 0..width {
                let bands: Vec<f32> = (0..pixels.bands()).map(|b| pixels.data[[b, row, col]]).collect();
                let value = compiled.eval(&bands);
                output[[band_index, row, col]] = if value.is_nan() { 0.0 } else { value };
            }
        }
    }

    Ok(PixelCollection::new(output, pixels.mask, pixels.bounds).with_band(pixels.band))
}

/// A minimal recursive-descent evaluator for `expr` directives: `+ - * /`
/// over numeric literals and `b1`, `b2`, … band references.
mod expr {
    #[derive(Debug, Clone)]
    enum Token {
        Number(f32),
        Band(usize),
        Plus,
        Minus,
        Star,
        Slash,
        LParen,
        RParen,
    }

    fn tokenize(src: &str) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        let chars: Vec<char> = src.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            match c {
                ' ' | '\t' => {}
                '+' => tokens.push(Token::Plus),
                '-' => tokens.push(Token::Minus),
                '*' => tokens.push(Token::Star),
                '/' => tokens.push(Token::Slash),
                '(' => tokens.push(Token::LParen),
                ')' => tokens.push(Token::RParen),
                'b' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && chars[end].is_ascii_digit() {
                        end += 1;
                    }
                    let index: usize = chars[start..end]
                        .iter()
                        .collect::<String>()
                        .parse()
                        .map_err(|_| format!("bad band reference at {i}"))?;
                    tokens.push(Token::Band(index.saturating_sub(1)));
                    i = end - 1;
                }
                c if c.is_ascii_digit() || c == '.' => {
                    let start = i;
                    let mut end = start;
                    while end < chars.len() && (chars[end].is_ascii_digit() || chars[end] == '.') {
                        end += 1;
                    }
                    let number: f32 = chars[start..end]
                        .iter()
                        .collect::<String>()
                        .parse()
                        .map_err(|_| format!("bad number at {start}"))?;
                    tokens.push(Token::Number(number));
                    i = end - 1;
                }
                other => return Err(format!("unexpected character {other:?}")),
            }
            i += 1;
        }
        Ok(tokens)
    }

    #[derive(Debug, Clone)]
    enum Node {
        Number(f32),
        Band(usize),
        Binary(Box<Node>, char, Box<Node>),
    }

    pub struct Compiled {
        root: Node,
    }

    impl Compiled {
        pub fn eval(&self, bands: &[f32]) -> f32 {
            eval_node(&self.root, bands)
        }
    }

    fn eval_node(node: &Node, bands: &[f32]) -> f32 {
        match node {
            Node::Number(n) => *n,
            Node::Band(i) => bands.get(*i).copied().unwrap_or(f32::NAN),
            Node::Binary(lhs, op, rhs) => {
                let l = eval_node(lhs, bands);
                let r = eval_node(rhs, bands);
                match op {
                    '+' => l + r,
                    '-' => l - r,
                    '*' => l * r,
                    '/' => l / r,
                    _ => f32::NAN,
                }
            }
        }
    }

    struct Parser {
        tokens: Vec<Token>,
        pos: usize,
    }

    impl Parser {
        fn peek(&self) -> Option<&Token> {
            self.tokens.get(self.pos)
        }

        fn bump(&mut self) -> Option<Token> {
            let t = self.tokens.get(self.pos).cloned();
            self.pos += 1;
            t
        }

        fn parse_expr(&mut self) -> Result<Node, String> {
            let mut node = self.parse_term()?;
            loop {
                match self.peek() {
                    Some(Token::Plus) => {
                        self.bump();
                        node = Node::Binary(Box::new(node), '+', Box::new(self.parse_term()?));
                    }
                    Some(Token::Minus) => {
                        self.bump();
                        node = Node::Binary(Box::new(node), '-', Box::new(self.parse_term()?));
                    }
                    _ => break,
                }
            }
            Ok(node)
        }

        fn parse_term(&mut self) -> Result<Node, String> {
            let mut node = self.parse_factor()?;
            loop {
                match self.peek() {
                    Some(Token::Star) => {
                        self.bump();
                        node = Node::Binary(Box::new(node), '*', Box::new(self.parse_factor()?));
                    }
                    Some(Token::Slash) => {
                        self.bump();
                        node = Node::Binary(Box::new(node), '/', Box::new(self.parse_factor()?));
                    }
                    _ => break,
                }
            }
            Ok(node)
        }

        fn parse_factor(&mut self) -> Result<Node, String> {
            match self.bump() {
                Some(Token::Number(n)) => Ok(Node::Number(n)),
                Some(Token::Band(b)) => Ok(Node::Band(b)),
                Some(Token::LParen) => {
                    let node = self.parse_expr()?;
                    match self.bump() {
                        Some(Token::RParen) => Ok(node),
                        _ => Err("expected closing paren".into()),
                    }
                }
                Some(Token::Minus) => Ok(Node::Binary(
                    Box::new(Node::Number(0.0)),
                    '-',
                    Box::new(self.parse_factor()?),
                )),
                other => Err(format!("unexpected token {other:?}")),
            }
        }
    }

    pub fn compile(src: &str) -> Result<Compiled, String> {
        let tokens = tokenize(src)?;
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.parse_expr()?;
        Ok(Compiled { root })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expr_evaluates_band_arithmetic() {
        let compiled = expr::compile("b1 - b2").unwrap();
        assert_eq!(compiled.eval(&[5.0, 2.0]), 3.0);
    }

    #[test]
    fn expr_respects_precedence() {
        let compiled = expr::compile("b1 + b2 * 2").unwrap();
        assert_eq!(compiled.eval(&[1.0, 3.0]), 7.0);
    }

    #[test]
    fn pansharpen_collapses_pan_band_into_rgb() {
        use crate::geometry::{Bounds, Crs};
        use ndarray::Array2;

        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let mut data = Array3::<f32>::zeros((4, 1, 1));
        data[[0, 0, 0]] = 0.2;
        data[[1, 0, 0]] = 0.3;
        data[[2, 0, 0]] = 0.5;
        data[[3, 0, 0]] = 0.8;
        let canvas = PixelCollection::new(data, Array2::from_elem((1, 1), false), bounds);

        let sharpened = pansharpen_brovey(canvas);

        assert_eq!(sharpened.bands(), 3);
        assert!(!sharpened.mask[[0, 0]]);
        assert!((sharpened.data[[0, 0, 0]] - 0.16).abs() < 1e-6);
        assert!((sharpened.data[[2, 0, 0]] - 0.4).abs() < 1e-6);
    }

    fn landsat_source(name: &str) -> Source {
        use std::collections::BTreeMap;

        let mut recipes = BTreeMap::new();
        recipes.insert("landsat8".to_string(), serde_json::Value::Bool(true));
        let mut band_info = BTreeMap::new();
        for band in ["r", "g", "b", "pan"] {
            band_info.insert(band.to_string(), band.to_string());
        }

        Source {
            url: "https://example.test/{band}.tif".to_string(),
            name: name.to_string(),
            resolution: 15.0,
            band_info,
            meta: serde_json::Value::Null,
            recipes,
            acquired_at: None,
            band: None,
            priority: 1.0,
            coverage: 1.0,
            geom: None,
            mask: None,
            filename: None,
            min_zoom: 0,
            max_zoom: 22,
        }
    }

    #[test]
    fn preprocess_assigns_each_landsat8_scene_its_own_band_block() {
        let sources = vec![landsat_source("scene-a"), landsat_source("scene-b")];
        let expanded = preprocess(sources);

        let bands_for = |name: &str| -> Vec<usize> {
            let mut bands: Vec<usize> = expanded
                .iter()
                .filter(|s| s.name == name)
                .filter_map(|s| s.band)
                .collect();
            bands.sort_unstable();
            bands
        };

        assert_eq!(bands_for("scene-a"), vec![0, 1, 2, 3]);
        assert_eq!(bands_for("scene-b"), vec![4, 5, 6, 7]);
    }

    #[test]
    fn pansharpen_brovey_scenes_does_not_cross_contaminate_overlapping_scenes() {
        use crate::geometry::{Bounds, Crs};
        use ndarray::Array2;

        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        // Scene 0 (bands 0-3) is fully valid; scene 1 (bands 4-7) is
        // entirely masked out, as if its window didn't cover this pixel.
        let mut data = Array3::<f32>::zeros((8, 1, 1));
        data[[0, 0, 0]] = 0.2;
        data[[1, 0, 0]] = 0.3;
        data[[2, 0, 0]] = 0.5;
        data[[3, 0, 0]] = 0.8;
        data[[4, 0, 0]] = 0.9;
        data[[5, 0, 0]] = 0.9;
        data[[6, 0, 0]] = 0.9;
        data[[7, 0, 0]] = 0.9;
        let canvas = PixelCollection::new(data, Array2::from_elem((1, 1), false), bounds);

        let merged = pansharpen_brovey_scenes(canvas, 2);

        assert_eq!(merged.bands(), 3);
        assert!(!merged.mask[[0, 0]]);
        // Matches `pansharpen_collapses_pan_band_into_rgb`'s expectation for
        // scene 0's inputs; scene 1's (0.9, 0.9, 0.9, 0.9) never reaches it.
        assert!((merged.data[[0, 0, 0]] - 0.16).abs() < 1e-6);
        assert!((merged.data[[2, 0, 0]] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn pansharpen_masks_zero_intensity_pixels() {
        use crate::geometry::{Bounds, Crs};
        use ndarray::Array2;

        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let data = Array3::<f32>::zeros((4, 1, 1));
        let canvas = PixelCollection::new(data, Array2::from_elem((1, 1), false), bounds);

        let sharpened = pansharpen_brovey(canvas);
        assert!(sharpened.mask[[0, 0]]);
    }
}
