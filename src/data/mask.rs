// ============================================================
// Layer 4: Mask Utilities
// ============================================================
// Binary-mask helpers shared by the dataset (ground-truth boxes
// for the detection task) and the inferencer (thresholding and
// segmentation outlines):
//
//   masks_to_boxes   → one box per 8-connected foreground blob
//   compute_mask     → threshold + opening with a disk of radius 4
//   find_boundaries  → pixels whose 4-neighbourhood changes value
//   dilate           → grow by a (2r + 1) × (2r + 1) square
//
// Masks are GrayImage with values 0 / 255; any non-zero pixel is
// foreground. The morphology comes from imageproc, which never
// treats out-of-image pixels as background, so borders do not erode.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::HashMap;

/// A single-channel floating point anomaly heat map.
pub type AnomalyMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Radius of the disk used to open thresholded masks.
pub const OPENING_RADIUS: u8 = 4;

fn binarize(mask: &GrayImage, is_fg: impl Fn(u8) -> bool) -> GrayImage {
    let (w, h) = mask.dimensions();
    GrayImage::from_fn(w, h, |x, y| Luma([if is_fg(mask.get_pixel(x, y)[0]) { 255 } else { 0 }]))
}

// ─── Morphology ───────────────────────────────────────────────────────────────
/// Chebyshev dilation: every pixel within `radius` of the foreground
/// (in both axes) becomes foreground.
pub fn dilate(mask: &GrayImage, radius: u8) -> GrayImage {
    morphology::dilate(mask, Norm::LInf, radius)
}

// ─── Thresholding ─────────────────────────────────────────────────────────────
/// Threshold an anomaly map into a 0/255 mask and clean it with an
/// opening by a disk of radius [`OPENING_RADIUS`].
pub fn compute_mask(anomaly_map: &AnomalyMap, threshold: f32) -> GrayImage {
    let (w, h) = anomaly_map.dimensions();
    let raw = GrayImage::from_fn(w, h, |x, y| {
        Luma([if anomaly_map.get_pixel(x, y)[0] > threshold { 255 } else { 0 }])
    });
    morphology::open(&raw, Norm::L2, OPENING_RADIUS)
}

/// Pixels where the mask changes value between 4-neighbours.
/// Both sides of an edge are marked.
pub fn find_boundaries(mask: &GrayImage) -> GrayImage {
    let binary = binarize(mask, |v| v > 0);
    let grown  = morphology::dilate(&binary, Norm::L1, 1);
    let shrunk = morphology::erode(&binary, Norm::L1, 1);

    let (w, h) = binary.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let edge = grown.get_pixel(x, y)[0] != shrunk.get_pixel(x, y)[0];
        Luma([if edge { 255 } else { 0 }])
    })
}

// ─── Boxes ────────────────────────────────────────────────────────────────────
/// Bounding boxes `[x1, y1, x2, y2]` (inclusive pixel coordinates) of every
/// 8-connected foreground component, in raster order of first pixel.
pub fn masks_to_boxes(mask: &GrayImage) -> Vec<[f32; 4]> {
    let binary = binarize(mask, |v| v > 0);
    let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

    let mut order: Vec<u32> = Vec::new();
    let mut extents: HashMap<u32, [u32; 4]> = HashMap::new();

    for (x, y, p) in labels.enumerate_pixels() {
        let label = p[0];
        if label == 0 {
            continue;
        }
        extents
            .entry(label)
            .and_modify(|b| {
                b[0] = b[0].min(x);
                b[1] = b[1].min(y);
                b[2] = b[2].max(x);
                b[3] = b[3].max(y);
            })
            .or_insert_with(|| {
                order.push(label);
                [x, y, x, y]
            });
    }

    order
        .iter()
        .filter_map(|label| extents.get(label))
        .map(|b| [b[0] as f32, b[1] as f32, b[2] as f32, b[3] as f32])
        .collect()
}

/// Same as [`masks_to_boxes`] for a flattened `[H, W]` float mask;
/// values above 0.5 are foreground.
pub fn mask_values_to_boxes(values: &[f32], height: usize, width: usize) -> Vec<[f32; 4]> {
    let mask = GrayImage::from_fn(width as u32, height as u32, |x, y| {
        let v = values.get(y as usize * width + x as usize).copied().unwrap_or(0.0);
        Luma([if v > 0.5 { 255 } else { 0 }])
    });
    masks_to_boxes(&mask)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn fill(mask: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..=y1 {
            for x in x0..=x1 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }

    #[test]
    fn test_boxes_per_component() {
        let mut mask = GrayImage::new(10, 10);
        fill(&mut mask, 1, 1, 3, 2);
        fill(&mut mask, 6, 5, 8, 9);
        // Diagonal neighbour joins the second blob (8-connectivity)
        mask.put_pixel(9, 4, Luma([255]));

        let boxes = masks_to_boxes(&mask);
        assert_eq!(boxes, vec![[1.0, 1.0, 3.0, 2.0], [6.0, 4.0, 9.0, 9.0]]);
    }

    #[test]
    fn test_mixed_foreground_values_form_one_blob() {
        let mut mask = GrayImage::new(6, 3);
        mask.put_pixel(1, 1, Luma([128]));
        mask.put_pixel(2, 1, Luma([255]));
        assert_eq!(masks_to_boxes(&mask), vec![[1.0, 1.0, 2.0, 1.0]]);
    }

    #[test]
    fn test_empty_mask_has_no_boxes() {
        assert!(masks_to_boxes(&GrayImage::new(4, 4)).is_empty());
        assert!(mask_values_to_boxes(&[0.0; 16], 4, 4).is_empty());
    }

    #[test]
    fn test_float_mask_boxes() {
        let mut values = vec![0.0; 16];
        values[5] = 1.0;
        values[10] = 1.0;
        assert_eq!(mask_values_to_boxes(&values, 4, 4), vec![[1.0, 1.0, 2.0, 2.0]]);
    }

    #[test]
    fn test_compute_mask_removes_specks() {
        let mut map = AnomalyMap::new(32, 32);
        // A single hot pixel is smaller than the opening disk
        map.put_pixel(2, 2, Luma([0.9]));
        // A large blob survives
        for y in 10..25 {
            for x in 10..25 {
                map.put_pixel(x, y, Luma([0.8]));
            }
        }
        let mask = compute_mask(&map, 0.5);
        assert_eq!(mask.get_pixel(2, 2)[0], 0);
        assert_eq!(mask.get_pixel(17, 17)[0], 255);
        assert_eq!(mask.get_pixel(0, 31)[0], 0);
    }

    #[test]
    fn test_boundaries_are_thick() {
        let mut mask = GrayImage::new(6, 1);
        fill(&mut mask, 3, 0, 5, 0);
        let b = find_boundaries(&mask);
        let row: Vec<u8> = (0..6).map(|x| b.get_pixel(x, 0)[0]).collect();
        assert_eq!(row, vec![0, 0, 255, 255, 0, 0]);
    }

    #[test]
    fn test_dilate_grows_a_square() {
        let mut mask = GrayImage::new(9, 9);
        mask.put_pixel(4, 4, Luma([255]));
        let grown = dilate(&mask, 3);
        assert_eq!(grown.pixels().filter(|p| p[0] > 0).count(), 49);
        assert_eq!(grown.get_pixel(1, 1)[0], 255);
        assert_eq!(grown.get_pixel(0, 4)[0], 0);
    }
}
