pub mod input;
pub mod labels;
pub mod output;

use anyhow::{bail, Context};
use input::{Point, SliceInfo};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Per-case point model: contour type -> points in insertion order.
///
/// A label is never kept with an empty point list; every removal path drops
/// the key once its last point is gone. Labels iterate in the order they
/// first appeared, so an exported file keeps the label order of its input
/// (rows of one label are grouped together).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContourStore {
    points: BTreeMap<String, Vec<Point>>,
    order: Vec<String>,
}

impl ContourStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups points under their own label, keeping file order within a label.
    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Self {
        let mut store = Self::new();
        for p in points {
            store.push(p);
        }
        store
    }

    pub fn push(&mut self, point: Point) {
        if !self.points.contains_key(&point.label) {
            self.order.push(point.label.clone());
        }
        self.points
            .entry(point.label.clone())
            .or_default()
            .push(point);
    }

    /// Appends a copy of `point` under `label`.
    pub fn add_point(&mut self, label: &str, point: &Point) {
        self.push(point.relabel(label));
    }

    pub fn contains(&self, label: &str) -> bool {
        self.points.contains_key(label)
    }

    pub fn get(&self, label: &str) -> Option<&[Point]> {
        self.points.get(label).map(|v| v.as_slice())
    }

    pub fn remove_label(&mut self, label: &str) -> Option<Vec<Point>> {
        self.order.retain(|l| l != label);
        self.points.remove(label)
    }

    /// Replaces the points of `label`; an empty list removes the label.
    pub fn set_label(&mut self, label: &str, points: Vec<Point>) {
        if points.is_empty() {
            self.remove_label(label);
        } else {
            if !self.points.contains_key(label) {
                self.order.push(label.to_string());
            }
            self.points.insert(label.to_string(), points);
        }
    }

    /// Labels in first-appearance order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|k| k.as_str())
    }

    /// All points, grouped by label in first-appearance order.
    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.order
            .iter()
            .filter_map(|label| self.points.get(label))
            .flatten()
    }

    /// Total number of points over all labels.
    pub fn len(&self) -> usize {
        self.points.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn time_frames(&self) -> BTreeSet<u32> {
        self.iter().map(|p| p.time_frame).collect()
    }

    pub fn slice_ids(&self) -> HashSet<&str> {
        self.iter().map(|p| p.slice_id.as_str()).collect()
    }

    /// Points of `label` whose frame is in `frames`, ordered by frame.
    ///
    /// The sort is stable: points sharing a frame keep their insertion order.
    /// The valve and apex rules index into this sequence, so the order is
    /// part of their contract.
    pub fn timeframe_points(&self, label: &str, frames: &BTreeSet<u32>) -> Vec<Point> {
        let mut selected: Vec<Point> = self
            .get(label)
            .unwrap_or_default()
            .iter()
            .filter(|p| frames.contains(&p.time_frame))
            .cloned()
            .collect();
        selected.sort_by_key(|p| p.time_frame);
        selected
    }

    /// True when `label` has at least one point on the image `slice_id` at
    /// `time_frame`.
    pub fn has_points_on_image(&self, label: &str, slice_id: &str, time_frame: u32) -> bool {
        self.get(label).is_some_and(|pts| {
            pts.iter()
                .any(|p| p.slice_id == slice_id && p.time_frame == time_frame)
        })
    }

    pub fn frame_points(&self, label: &str, slice_id: &str, time_frame: u32) -> Vec<&Point> {
        self.get(label)
            .unwrap_or_default()
            .iter()
            .filter(|p| p.slice_id == slice_id && p.time_frame == time_frame)
            .collect()
    }

    /// Drops non-finite points and exact duplicates, then empty labels.
    /// Returns the number of points removed.
    pub fn clean(&mut self) -> usize {
        let before = self.len();
        for pts in self.points.values_mut() {
            let mut seen = HashSet::new();
            pts.retain(|p| {
                let c = &p.coordinate;
                let key = (
                    p.slice_id.clone(),
                    p.time_frame,
                    (c.x.to_bits(), c.y.to_bits(), c.z.to_bits()),
                );
                p.is_finite() && seen.insert(key)
            });
        }
        self.points.retain(|_, pts| !pts.is_empty());
        let points = &self.points;
        self.order.retain(|label| points.contains_key(label));
        before - self.len()
    }
}

/// Everything loaded for one case directory.
#[derive(Debug, Clone)]
pub struct CaseData {
    pub name: String,
    pub store: ContourStore,
    pub slices: Vec<SliceInfo>,
}

/// Input and output locations of one case.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseFiles {
    pub dir: PathBuf,
    pub contour: PathBuf,
    pub metadata: PathBuf,
    pub output_contour: PathBuf,
    pub output_metadata: PathBuf,
}

impl CaseFiles {
    pub fn new(dir: &Path, config: &Config) -> Self {
        CaseFiles {
            dir: dir.to_path_buf(),
            contour: dir.join(&config.contour_file),
            metadata: dir.join(&config.metadata_file),
            output_contour: dir.join(&config.output_contour_file),
            output_metadata: dir.join(&config.output_metadata_file),
        }
    }

    /// Case identifier: the directory's last component.
    pub fn case_name(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.dir.display().to_string())
    }
}

/// Parses both input files of a case and cleans the point set.
pub fn load_case(files: &CaseFiles) -> anyhow::Result<CaseData> {
    let name = files.case_name();

    let points = Point::read_gp_file(&files.contour)
        .with_context(|| format!("Failed to load contours from {}", files.contour.display()))?;
    if points.is_empty() {
        bail!(
            "Contour file {} was empty, this data is required",
            files.contour.display()
        );
    }

    let slices = SliceInfo::read_slice_info(&files.metadata).with_context(|| {
        format!(
            "Failed to load slice metadata from {}",
            files.metadata.display()
        )
    })?;

    let mut store = ContourStore::from_points(points);
    let removed = store.clean();
    if removed > 0 {
        debug!("{}: cleaning removed {} points", name, removed);
    }
    info!(
        "{}: loaded {} points over {} labels, {} slices",
        name,
        store.len(),
        store.labels().count(),
        slices.len()
    );

    Ok(CaseData {
        name,
        store,
        slices,
    })
}

/// Writes the cleaned GP file and the SliceInfo rows still referenced by it.
pub fn export_case(case: &CaseData, files: &CaseFiles) -> anyhow::Result<()> {
    let slices = output::referenced_slices(&case.store, &case.slices);
    if slices.len() < case.slices.len() {
        debug!(
            "{}: dropping {} unreferenced slice rows",
            case.name,
            case.slices.len() - slices.len()
        );
    }

    output::write_gp_file(&case.store, &files.output_contour).with_context(|| {
        format!(
            "Failed to write contours to {}",
            files.output_contour.display()
        )
    })?;
    output::write_slice_info(&slices, &files.output_metadata).with_context(|| {
        format!(
            "Failed to write slice metadata to {}",
            files.output_metadata.display()
        )
    })?;
    Ok(())
}
