use anyhow::{Context, Result};
use csv::ReaderBuilder;
use log::warn;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Utility: detect whether the file uses comma or tab as delimiter.
fn detect_delimiter<P: AsRef<Path>>(path: P) -> Result<u8> {
    let file = File::open(&path).with_context(|| {
        format!(
            "failed to open file for delimiter sniffing: {:?}",
            path.as_ref()
        )
    })?;
    let mut reader = BufReader::new(file);
    let mut first_line = String::new();
    reader
        .read_line(&mut first_line)
        .with_context(|| "failed to read first line for delimiter detection")?;

    let tabs = first_line.matches('\t').count();
    let commas = first_line.matches(',').count();

    if tabs >= commas && tabs > 0 {
        Ok(b'\t')
    } else {
        Ok(b',')
    }
}

/// A single labelled sample from a GP file.
///
/// Points are never edited in place; moving a sample to another contour type
/// goes through [`Point::relabel`], which yields a fresh value.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub label: String,
    pub coordinate: Point3<f64>,
    pub slice_id: String,
    pub time_frame: u32,
    pub weight: f64,
}

impl Point {
    pub fn new(
        label: impl Into<String>,
        coordinate: Point3<f64>,
        slice_id: impl Into<String>,
        time_frame: u32,
    ) -> Self {
        Point {
            label: label.into(),
            coordinate,
            slice_id: slice_id.into(),
            time_frame,
            weight: 1.0,
        }
    }

    /// Copy of this point under another contour type.
    pub fn relabel(&self, label: &str) -> Point {
        Point {
            label: label.to_string(),
            ..self.clone()
        }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        nalgebra::distance(&self.coordinate, &other.coordinate)
    }

    pub fn is_finite(&self) -> bool {
        self.coordinate.coords.iter().all(|c| c.is_finite())
    }

    /// Reads all points of a GP file.
    ///
    /// Expected column order (header row is skipped, names are not checked):
    ///
    /// ```text
    /// x, y, z, contour_type, slice_id, weight, time_frame
    /// ```
    pub fn read_gp_file<P: AsRef<Path>>(path: P) -> Result<Vec<Point>> {
        let path = path.as_ref();
        let delim = detect_delimiter(path)?;
        let file = File::open(path)
            .with_context(|| format!("failed to open GP file {}", path.display()))?;
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delim)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut points = Vec::new();
        for result in rdr.records() {
            match result {
                Ok(record) => match record.deserialize::<GpRecord>(None) {
                    Ok(row) => points.push(row.into()),
                    Err(e) => warn!("{}: skipping invalid record: {}", path.display(), e),
                },
                Err(e) => warn!("{}: skipping invalid row: {}", path.display(), e),
            }
        }

        Ok(points)
    }
}

/// Raw GP file row, positional.
#[derive(Debug, Deserialize)]
struct GpRecord {
    x: f64,
    y: f64,
    z: f64,
    contour_type: String,
    slice_id: String,
    weight: f64,
    time_frame: u32,
}

impl From<GpRecord> for Point {
    fn from(r: GpRecord) -> Self {
        Point {
            label: r.contour_type,
            coordinate: Point3::new(r.x, r.y, r.z),
            slice_id: r.slice_id,
            time_frame: r.time_frame,
            weight: r.weight,
        }
    }
}

/// One row of a SliceInfo file: DICOM geometry for an annotated slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceInfo {
    pub slice_id: String,
    pub sop_instance_uid: String,
    pub time_frame: u32,
    pub ipp_x: f64,
    pub ipp_y: f64,
    pub ipp_z: f64,
    pub iop_0: f64,
    pub iop_1: f64,
    pub iop_2: f64,
    pub iop_3: f64,
    pub iop_4: f64,
    pub iop_5: f64,
    pub pixel_spacing_x: f64,
    pub pixel_spacing_y: f64,
}

impl SliceInfo {
    pub fn read_slice_info<P: AsRef<Path>>(path: P) -> Result<Vec<SliceInfo>> {
        let path = path.as_ref();
        let delim = detect_delimiter(path)?;
        let file = File::open(path)
            .with_context(|| format!("failed to open SliceInfo file {}", path.display()))?;
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delim)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut slices = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            // unlike GP rows, a broken slice row makes the whole case unusable
            let record =
                result.with_context(|| format!("{}: unreadable row {}", path.display(), row + 1))?;
            let slice: SliceInfo = record
                .deserialize(None)
                .with_context(|| format!("{}: invalid row {}", path.display(), row + 1))?;
            slices.push(slice);
        }
        Ok(slices)
    }
}
