use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::StepError;
use crate::io::input::Point;
use crate::io::labels::{
    RV_INSERT, SAX_LV_EPICARDIAL, SAX_RV_ENDOCARDIAL, SAX_RV_FREEWALL, SAX_RV_SEPTUM,
};
use crate::io::ContourStore;

/// Splits `SAX_RV_ENDOCARDIAL` into `SAX_RV_SEPTUM` and `SAX_RV_FREEWALL`.
///
/// An RV point belongs to the septum when the LV epicardium on the same slice
/// and frame comes within `max_distance` of it. RV points outside `frames`
/// stay under `SAX_RV_ENDOCARDIAL`.
pub fn find_timeframe_septum(
    store: &mut ContourStore,
    frames: &BTreeSet<u32>,
    max_distance: f64,
) -> Result<(), StepError> {
    let rv_endo = store
        .get(SAX_RV_ENDOCARDIAL)
        .ok_or(StepError::MissingLabel(SAX_RV_ENDOCARDIAL))?;
    let lv_epi = store
        .get(SAX_LV_EPICARDIAL)
        .ok_or(StepError::MissingLabel(SAX_LV_EPICARDIAL))?;

    let mut epi_by_slice: HashMap<(&str, u32), Vec<&Point>> = HashMap::new();
    for p in lv_epi.iter().filter(|p| frames.contains(&p.time_frame)) {
        epi_by_slice
            .entry((p.slice_id.as_str(), p.time_frame))
            .or_default()
            .push(p);
    }

    let mut septum = Vec::new();
    let mut freewall = Vec::new();
    let mut remaining = Vec::new();
    for p in rv_endo {
        if !frames.contains(&p.time_frame) {
            remaining.push(p.clone());
            continue;
        }
        let nearest = epi_by_slice
            .get(&(p.slice_id.as_str(), p.time_frame))
            .map(|epi| {
                epi.iter()
                    .map(|q| p.distance(q))
                    .fold(f64::INFINITY, f64::min)
            })
            .unwrap_or(f64::INFINITY);

        if nearest <= max_distance {
            septum.push(p.relabel(SAX_RV_SEPTUM));
        } else {
            freewall.push(p.relabel(SAX_RV_FREEWALL));
        }
    }

    if septum.is_empty() {
        return Err(StepError::NoCandidates(SAX_RV_SEPTUM));
    }
    debug!(
        "septum: {} septal, {} free wall points",
        septum.len(),
        freewall.len()
    );

    store.set_label(SAX_RV_ENDOCARDIAL, remaining);
    for p in septum.into_iter().chain(freewall) {
        store.push(p);
    }
    Ok(())
}

/// Adds two `RV_INSERT` points per slice and frame: the farthest-apart pair of
/// septal points, i.e. the ends of the septal arc.
///
/// Slices that already carry inserts for a frame are left as they are.
pub fn find_timeframe_septum_inserts(
    store: &mut ContourStore,
    frames: &BTreeSet<u32>,
) -> Result<(), StepError> {
    let septum = store
        .get(SAX_RV_SEPTUM)
        .ok_or(StepError::MissingLabel(SAX_RV_SEPTUM))?;

    let mut groups: BTreeMap<(&str, u32), Vec<&Point>> = BTreeMap::new();
    for p in septum.iter().filter(|p| frames.contains(&p.time_frame)) {
        groups
            .entry((p.slice_id.as_str(), p.time_frame))
            .or_default()
            .push(p);
    }

    let mut usable = 0;
    let mut inserts = Vec::new();
    for ((slice_id, frame), points) in &groups {
        if points.len() < 2 {
            continue;
        }
        usable += 1;
        if !store.frame_points(RV_INSERT, slice_id, *frame).is_empty() {
            continue;
        }
        let (a, b) = farthest_pair(points);
        inserts.push(a.relabel(RV_INSERT));
        inserts.push(b.relabel(RV_INSERT));
    }

    if usable == 0 {
        return Err(StepError::NoCandidates(RV_INSERT));
    }
    debug!("inserts: {} new points", inserts.len());

    for p in inserts {
        store.push(p);
    }
    Ok(())
}

/// Finds the pair of farthest points; expects at least two.
fn farthest_pair<'a>(points: &[&'a Point]) -> (&'a Point, &'a Point) {
    let mut max_dist = -1.0;
    let mut farthest = (points[0], points[0]);

    for i in 0..points.len() {
        for j in i + 1..points.len() {
            let dist = points[i].distance(points[j]);
            if dist > max_dist {
                max_dist = dist;
                farthest = (points[i], points[j]);
            }
        }
    }
    farthest
}
