// ============================================================
// Layer 4: Synthetic Anomalies
// ============================================================
// When a layout has no anomalous images for a subset, we make
// some: half of the normal images are copied with a noise
// texture blended into a random, smooth-edged region, and the
// region is written out as the ground-truth mask.
//
//   normal rows ──┬── kept as normal (first half)
//                 └── AnomalyGenerator ──▶ image.png + mask.png
//
// The generated files live in a TempDir owned by the returned
// dataset (and every dataset derived from it). Nothing is
// written next to the source images.

use image::{GrayImage, Luma, Rgb, RgbImage};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::{fs, path::Path, sync::Arc};

use crate::data::dataset::{read_image, AnomalyDataset};
use crate::domain::error::{DataError, DataResult};
use crate::domain::labels::{DirType, LabelName, Split};
use crate::domain::sample::SampleRecord;

/// Fraction of the source rows turned into anomalies.
pub const ANOMALOUS_RATIO: f64 = 0.5;

/// Opacity range of the original image inside the anomalous region.
const BETA_RANGE: (f32, f32) = (0.01, 0.2);

/// Noise grid resolutions (cells per side) to pick from.
const NOISE_SCALES: [u32; 5] = [2, 4, 8, 16, 32];

const MAX_MASK_ATTEMPTS: usize = 8;

// ─── Value noise ──────────────────────────────────────────────────────────────
/// Smooth noise in [0, 1]: random values on a coarse grid,
/// interpolated with smoothstep weights.
fn value_noise(rng: &mut StdRng, width: u32, height: u32, cells: u32) -> Vec<f32> {
    let gw = cells + 1;
    let gh = cells + 1;
    let grid: Vec<f32> = (0..gw * gh).map(|_| rng.gen::<f32>()).collect();
    let at = |gx: u32, gy: u32| grid[(gy * gw + gx) as usize];
    let smooth = |t: f32| t * t * (3.0 - 2.0 * t);

    let mut out = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        let fy = y as f32 / height.max(1) as f32 * cells as f32;
        let gy = (fy.floor() as u32).min(cells - 1);
        let ty = smooth(fy - gy as f32);
        for x in 0..width {
            let fx = x as f32 / width.max(1) as f32 * cells as f32;
            let gx = (fx.floor() as u32).min(cells - 1);
            let tx = smooth(fx - gx as f32);

            let top    = at(gx, gy) * (1.0 - tx) + at(gx + 1, gy) * tx;
            let bottom = at(gx, gy + 1) * (1.0 - tx) + at(gx + 1, gy + 1) * tx;
            out.push(top * (1.0 - ty) + bottom * ty);
        }
    }
    out
}

// ─── AnomalyGenerator ─────────────────────────────────────────────────────────
/// Blends a random noise texture into a random region of an image.
pub struct AnomalyGenerator {
    rng: StdRng,
}

impl AnomalyGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Region mask: thresholded value noise, retried a few times when
    /// it comes out empty, falling back to a centred rectangle.
    fn region(&mut self, width: u32, height: u32) -> GrayImage {
        for _ in 0..MAX_MASK_ATTEMPTS {
            let cells = *NOISE_SCALES.choose(&mut self.rng).unwrap_or(&4);
            let noise = value_noise(&mut self.rng, width, height, cells);
            let mask  = GrayImage::from_fn(width, height, |x, y| {
                let v = noise[(y * width + x) as usize];
                Luma([if v > 0.6 { 255 } else { 0 }])
            });
            if mask.pixels().any(|p| p[0] > 0) {
                return mask;
            }
        }

        GrayImage::from_fn(width, height, |x, y| {
            let inside = x >= width / 4 && x < width - width / 4 && y >= height / 4 && y < height - height / 4;
            Luma([if inside { 255 } else { 0 }])
        })
    }

    /// Returns the augmented image and its 0/255 mask.
    pub fn augment(&mut self, image: &RgbImage) -> (RgbImage, GrayImage) {
        let (w, h) = image.dimensions();
        let mask   = self.region(w, h);

        let cells   = *NOISE_SCALES.choose(&mut self.rng).unwrap_or(&4);
        let texture: Vec<Vec<f32>> = (0..3).map(|_| value_noise(&mut self.rng, w, h, cells)).collect();
        let beta    = self.rng.gen_range(BETA_RANGE.0..BETA_RANGE.1);

        let out = RgbImage::from_fn(w, h, |x, y| {
            let src = image.get_pixel(x, y);
            if mask.get_pixel(x, y)[0] == 0 {
                return *src;
            }
            let idx = (y * w + x) as usize;
            let mut px = [0u8; 3];
            for c in 0..3 {
                let v = beta * src[c] as f32 + (1.0 - beta) * texture[c][idx] * 255.0;
                px[c] = v.round().clamp(0.0, 255.0) as u8;
            }
            Rgb(px)
        });

        (out, mask)
    }
}

// ─── Dataset construction ─────────────────────────────────────────────────────
/// Turn `anomalous_ratio` of the (all-normal) `source` rows into
/// synthetic anomalies written to `image_dir` / `mask_dir`.
///
/// Normal rows come first, in source order, followed by the
/// generated anomalous rows.
pub fn make_synthetic_samples(
    source:          &[SampleRecord],
    image_dir:       &Path,
    mask_dir:        &Path,
    anomalous_ratio: f64,
    seed:            Option<u64>,
) -> DataResult<Vec<SampleRecord>> {
    if let Some(bad) = source.iter().find(|s| s.is_anomalous()) {
        return Err(DataError::AbnormalSource { path: bad.image_path.clone() });
    }
    for dir in [image_dir, mask_dir] {
        if !dir.is_dir() {
            return Err(DataError::NotADirectory {
                path: dir.to_path_buf(),
                msg:  "synthetic output directory".into(),
            });
        }
    }

    let mut generator = AnomalyGenerator::new(seed);
    let n_anomalous   = ((source.len() as f64) * anomalous_ratio).floor() as usize;

    let mut order: Vec<usize> = (0..source.len()).collect();
    order.shuffle(&mut generator.rng);
    let mut picked = order[..n_anomalous].to_vec();
    picked.sort_unstable();

    let width = if n_anomalous > 0 { n_anomalous.ilog10() as usize + 1 } else { 1 };

    let mut normal: Vec<SampleRecord> = source
        .iter()
        .enumerate()
        .filter(|(i, _)| picked.binary_search(i).is_err())
        .map(|(_, s)| SampleRecord {
            depth_path: None,
            split: Split::Test,
            ..s.clone()
        })
        .collect();

    let mut anomalous = Vec::with_capacity(n_anomalous);
    for (n, &i) in picked.iter().enumerate() {
        let image         = read_image(&source[i].image_path)?;
        let (aug, mask)   = generator.augment(&image);
        let file_name     = format!("{n:0width$}.png");
        let image_path    = image_dir.join(&file_name);
        let mask_path     = mask_dir.join(&file_name);

        aug.save(&image_path).map_err(|source| DataError::Image { path: image_path.clone(), source })?;
        mask.save(&mask_path).map_err(|source| DataError::Image { path: mask_path.clone(), source })?;

        anomalous.push(
            SampleRecord::new(image_path, DirType::Abnormal, LabelName::Abnormal, Split::Test)
                .with_mask(mask_path),
        );
    }

    tracing::info!(
        "Generated {} synthetic anomalies from {} normal images",
        anomalous.len(),
        source.len(),
    );

    normal.append(&mut anomalous);
    Ok(normal)
}

/// Build a dataset of normal + synthetic anomalous samples from an
/// all-normal dataset. The generated files live as long as the
/// returned dataset (or anything split from it).
pub fn synthetic_from_dataset(dataset: &AnomalyDataset, seed: Option<u64>) -> DataResult<AnomalyDataset> {
    if !dataset.is_setup() {
        return Err(DataError::NotSetUp);
    }

    let root = tempfile::Builder::new()
        .prefix("anomaly-kit-synthetic-")
        .tempdir()
        .map_err(|source| DataError::Io { path: std::env::temp_dir(), source })?;

    let image_dir = root.path().join("abnormal");
    let mask_dir  = root.path().join("ground_truth");
    for dir in [&image_dir, &mask_dir] {
        fs::create_dir_all(dir).map_err(|source| DataError::Io { path: dir.clone(), source })?;
    }

    let samples = make_synthetic_samples(dataset.samples(), &image_dir, &mask_dir, ANOMALOUS_RATIO, seed)?;

    let mut out = dataset.with_samples(samples);
    out.attach_scratch(Arc::new(root));
    Ok(out)
}
