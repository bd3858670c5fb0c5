use anyhow::Context;
use csv::WriterBuilder;
use std::path::Path;

use crate::io::input::SliceInfo;
use crate::io::ContourStore;

/// Writes a store back out in GP file layout, tab separated with a header row.
pub fn write_gp_file<P: AsRef<Path>>(store: &ContourStore, path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .context(format!("Could not create output directory: {:?}", parent))?;
    }
    let mut wtr = WriterBuilder::new().delimiter(b'\t').from_path(path)?;

    wtr.write_record([
        "x",
        "y",
        "z",
        "contour_type",
        "slice_id",
        "weight",
        "time_frame",
    ])?;

    for point in store.iter() {
        wtr.write_record(&[
            point.coordinate.x.to_string(),
            point.coordinate.y.to_string(),
            point.coordinate.z.to_string(),
            point.label.clone(),
            point.slice_id.clone(),
            point.weight.to_string(),
            point.time_frame.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes SliceInfo rows; the header comes from the field names.
pub fn write_slice_info<P: AsRef<Path>>(slices: &[SliceInfo], path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .context(format!("Could not create output directory: {:?}", parent))?;
    }
    let mut wtr = WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    for slice in slices {
        wtr.serialize(slice)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Slice rows that still have at least one point after processing, in file order.
pub fn referenced_slices(store: &ContourStore, slices: &[SliceInfo]) -> Vec<SliceInfo> {
    let used = store.slice_ids();
    slices
        .iter()
        .filter(|s| used.contains(s.slice_id.as_str()))
        .cloned()
        .collect()
}
