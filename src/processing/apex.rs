use log::debug;
use nalgebra::{Point3, Vector3};
use std::collections::{BTreeMap, BTreeSet};

use super::valves::is_valve_position;
use super::StepError;
use crate::io::input::Point;
use crate::io::labels::{APEX_POINT, LAX_LV_EXTENT};
use crate::io::ContourStore;

/// Derives one `APEX_POINT` per frame from the LV extents.
///
/// Every third point of the frame-ordered extent sequence is the apical end
/// of a sample; the candidates of a frame are averaged. Must run before valve
/// reclassification, which deletes `LAX_LV_EXTENT`.
pub fn find_apex_landmark(
    store: &mut ContourStore,
    frames: &BTreeSet<u32>,
) -> Result<(), StepError> {
    if !store.contains(LAX_LV_EXTENT) {
        return Err(StepError::MissingLabel(LAX_LV_EXTENT));
    }

    let mut candidates: BTreeMap<u32, Vec<Point>> = BTreeMap::new();
    for (index, point) in store
        .timeframe_points(LAX_LV_EXTENT, frames)
        .into_iter()
        .enumerate()
    {
        if !is_valve_position(index) {
            candidates.entry(point.time_frame).or_default().push(point);
        }
    }
    if candidates.is_empty() {
        return Err(StepError::NoCandidates(APEX_POINT));
    }

    let done: BTreeSet<u32> = store
        .get(APEX_POINT)
        .unwrap_or_default()
        .iter()
        .map(|p| p.time_frame)
        .collect();

    for (frame, points) in candidates {
        if done.contains(&frame) {
            debug!("apex: frame {} already has an apex point", frame);
            continue;
        }
        let sum = points
            .iter()
            .fold(Vector3::<f64>::zeros(), |acc, p| acc + p.coordinate.coords);
        let mean = Point3::from(sum / points.len() as f64);

        let mut apex = points[0].relabel(APEX_POINT);
        apex.coordinate = mean;
        store.push(apex);
    }
    Ok(())
}
