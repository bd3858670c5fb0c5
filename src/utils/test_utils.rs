use nalgebra::Point3;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::io::input::{Point, SliceInfo};
use crate::io::output::{write_gp_file, write_slice_info};
use crate::io::ContourStore;

/// Point at (x, 0, 0).
pub fn point(label: &str, slice_id: &str, time_frame: u32, x: f64) -> Point {
    point_at(label, slice_id, time_frame, x, 0.0)
}

/// Point at (x, y, 0).
pub fn point_at(label: &str, slice_id: &str, time_frame: u32, x: f64, y: f64) -> Point {
    Point::new(label, Point3::new(x, y, 0.0), slice_id, time_frame)
}

pub fn frames(values: &[u32]) -> BTreeSet<u32> {
    values.iter().copied().collect()
}

/// Axial slice with unit orientation, identified by `slice_id`.
pub fn slice_info(slice_id: &str, time_frame: u32) -> SliceInfo {
    SliceInfo {
        slice_id: slice_id.to_string(),
        sop_instance_uid: format!("1.2.826.0.1.{}.{}", slice_id, time_frame),
        time_frame,
        ipp_x: -120.0,
        ipp_y: -95.5,
        ipp_z: 10.0,
        iop_0: 1.0,
        iop_1: 0.0,
        iop_2: 0.0,
        iop_3: 0.0,
        iop_4: 1.0,
        iop_5: 0.0,
        pixel_spacing_x: 1.25,
        pixel_spacing_y: 1.25,
    }
}

/// Creates `root/name` holding a GP file with `points` and a SliceInfo file
/// with one row per slice the points reference, plus one unreferenced slice.
pub fn write_case(root: &Path, name: &str, points: &[Point], config: &Config) -> PathBuf {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();

    let store = ContourStore::from_points(points.to_vec());
    write_gp_file(&store, dir.join(&config.contour_file)).unwrap();

    let mut slices: Vec<SliceInfo> = Vec::new();
    for p in points {
        if !slices.iter().any(|s| s.slice_id == p.slice_id) {
            slices.push(slice_info(&p.slice_id, p.time_frame));
        }
    }
    slices.push(slice_info("unused", 0));
    write_slice_info(&slices, dir.join(&config.metadata_file)).unwrap();

    dir
}
