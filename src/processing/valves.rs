use log::debug;
use std::collections::BTreeSet;

use super::StepError;
use crate::io::labels::{
    AORTA_VALVE, LAX_LA_EXTENT, LAX_LV_EXTENT, LAX_RV_EXTENT, MITRAL_VALVE, TRICUSPID_VALVE,
};
use crate::io::ContourStore;

/// How one family of long-axis extent points maps onto a valve label.
struct ExtentRule {
    source: &'static str,
    target: &'static str,
    /// A point is dropped when any of these labels has a point on its image
    /// (same slice, same frame).
    exclude_if_image_has: &'static [&'static str],
}

// LV before LA: the LV rule looks for LA extents, which the LA rule consumes.
const EXTENT_RULES: [ExtentRule; 3] = [
    ExtentRule {
        source: LAX_LV_EXTENT,
        target: MITRAL_VALVE,
        // aorta or atrial extent on the image means a 3-chamber view, where the
        // LV extent does not sit on the mitral annulus
        exclude_if_image_has: &[AORTA_VALVE, LAX_LA_EXTENT],
    },
    ExtentRule {
        source: LAX_LA_EXTENT,
        target: MITRAL_VALVE,
        exclude_if_image_has: &[],
    },
    ExtentRule {
        source: LAX_RV_EXTENT,
        target: TRICUSPID_VALVE,
        exclude_if_image_has: &[],
    },
];

/// Extent samples come in triplets: two annulus points followed by one
/// apical/roof point. True for the annulus positions of a frame-ordered
/// extent sequence.
pub fn is_valve_position(index: usize) -> bool {
    (index + 1) % 3 != 0
}

/// Converts LV/LA extents into `MITRAL_VALVE` and RV extents into
/// `TRICUSPID_VALVE`, then deletes the extent labels.
///
/// Absent extent labels are skipped, so running this on an already processed
/// store changes nothing.
pub fn reclassify_valve_landmarks(
    store: &mut ContourStore,
    frames: &BTreeSet<u32>,
) -> Result<(), StepError> {
    for rule in EXTENT_RULES.iter() {
        if let Some(forwarded) = extent_to_valve(store, rule, frames) {
            debug!(
                "{} -> {}: forwarded {} points",
                rule.source, rule.target, forwarded
            );
        }
    }
    Ok(())
}

/// Applies one rule. Returns the number of points appended to the target
/// label, or `None` when the source label is absent.
fn extent_to_valve(
    store: &mut ContourStore,
    rule: &ExtentRule,
    frames: &BTreeSet<u32>,
) -> Option<usize> {
    if !store.contains(rule.source) {
        return None;
    }

    // selection is computed against the untouched store, then applied in one go
    let selected: Vec<_> = store
        .timeframe_points(rule.source, frames)
        .into_iter()
        .enumerate()
        .filter(|(_, point)| {
            !rule.exclude_if_image_has.iter().any(|label| {
                store.has_points_on_image(label, &point.slice_id, point.time_frame)
            })
        })
        .filter(|(index, _)| is_valve_position(*index))
        .map(|(_, point)| point)
        .collect();

    for point in &selected {
        store.add_point(rule.target, point);
    }
    store.remove_label(rule.source);
    Some(selected.len())
}

#[cfg(test)]
mod valve_tests {
    use super::*;
    use crate::io::input::Point;
    use crate::utils::test_utils::{frames, point};

    fn extent_points(label: &str, n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| point(label, &format!("s{}", i), i as u32, i as f64))
            .collect()
    }

    #[test]
    fn test_four_extent_points_forward_three() {
        let mut store = ContourStore::from_points(extent_points(LAX_LV_EXTENT, 4));

        reclassify_valve_landmarks(&mut store, &frames(&[0, 1, 2, 3])).unwrap();

        assert!(!store.contains(LAX_LV_EXTENT));
        let mitral = store.get(MITRAL_VALVE).unwrap();
        let slices: Vec<&str> = mitral.iter().map(|p| p.slice_id.as_str()).collect();
        assert_eq!(slices, vec!["s0", "s1", "s3"]);
        assert!(mitral.iter().all(|p| p.label == MITRAL_VALVE));
    }

    #[test]
    fn test_keep_rule_count_matches_triplets() {
        for k in 0..13 {
            let mut store = ContourStore::from_points(extent_points(LAX_RV_EXTENT, k));
            let all = frames(&(0..k as u32).collect::<Vec<_>>());

            reclassify_valve_landmarks(&mut store, &all).unwrap();

            let forwarded = store.get(TRICUSPID_VALVE).map_or(0, |p| p.len());
            assert_eq!(forwarded, k - k / 3, "k = {}", k);
            assert!(!store.contains(LAX_RV_EXTENT));
        }
    }

    #[test]
    fn test_forwarded_positions_are_not_multiples_of_three() {
        let mut store = ContourStore::from_points(extent_points(LAX_LA_EXTENT, 9));
        reclassify_valve_landmarks(&mut store, &frames(&(0..9).collect::<Vec<_>>())).unwrap();

        let xs: Vec<f64> = store
            .get(MITRAL_VALVE)
            .unwrap()
            .iter()
            .map(|p| p.coordinate.x)
            .collect();
        assert_eq!(xs, vec![0.0, 1.0, 3.0, 4.0, 6.0, 7.0]);
    }

    #[test]
    fn test_lv_extent_excluded_on_aorta_image() {
        let mut points = extent_points(LAX_LV_EXTENT, 3);
        points.push(point(AORTA_VALVE, "s0", 0, 0.0));
        let mut store = ContourStore::from_points(points);

        reclassify_valve_landmarks(&mut store, &frames(&[0, 1, 2])).unwrap();

        let mitral = store.get(MITRAL_VALVE).unwrap();
        assert_eq!(mitral.len(), 1);
        assert_eq!(mitral[0].slice_id, "s1");
        assert!(store.contains(AORTA_VALVE));
    }

    #[test]
    fn test_aorta_in_another_frame_does_not_exclude() {
        let mut points: Vec<Point> = (0..3)
            .map(|i| point(LAX_LV_EXTENT, "s0", 5, i as f64))
            .collect();
        points.push(point(AORTA_VALVE, "s0", 0, 0.0));
        let mut store = ContourStore::from_points(points);

        reclassify_valve_landmarks(&mut store, &frames(&[5])).unwrap();

        let mitral = store.get(MITRAL_VALVE).unwrap();
        assert_eq!(mitral.len(), 2);
        assert!(mitral.iter().all(|p| p.time_frame == 5 && p.slice_id == "s0"));
        assert!(!store.contains(LAX_LV_EXTENT));
    }

    #[test]
    fn test_lv_extent_excluded_on_atrial_extent_slice() {
        let mut points = extent_points(LAX_LV_EXTENT, 2);
        points.push(point(LAX_LA_EXTENT, "s1", 1, 10.0));
        let mut store = ContourStore::from_points(points);

        reclassify_valve_landmarks(&mut store, &frames(&[0, 1])).unwrap();

        // s0 comes from the LV extent, the LA extent itself is the first of its triplet
        let mitral = store.get(MITRAL_VALVE).unwrap();
        let xs: Vec<f64> = mitral.iter().map(|p| p.coordinate.x).collect();
        assert_eq!(xs, vec![0.0, 10.0]);
        assert!(!store.contains(LAX_LV_EXTENT));
        assert!(!store.contains(LAX_LA_EXTENT));
    }

    #[test]
    fn test_excluded_points_still_advance_the_index() {
        let mut points = extent_points(LAX_LV_EXTENT, 4);
        points.push(point(AORTA_VALVE, "s0", 0, 0.0));
        let mut store = ContourStore::from_points(points);

        reclassify_valve_landmarks(&mut store, &frames(&[0, 1, 2, 3])).unwrap();

        let slices: Vec<&str> = store
            .get(MITRAL_VALVE)
            .unwrap()
            .iter()
            .map(|p| p.slice_id.as_str())
            .collect();
        assert_eq!(slices, vec!["s1", "s3"]);
    }

    #[test]
    fn test_rv_extent_ignores_aorta() {
        let mut points = extent_points(LAX_RV_EXTENT, 2);
        points.push(point(AORTA_VALVE, "s0", 0, 0.0));
        let mut store = ContourStore::from_points(points);

        reclassify_valve_landmarks(&mut store, &frames(&[0, 1])).unwrap();

        assert_eq!(store.get(TRICUSPID_VALVE).unwrap().len(), 2);
    }

    #[test]
    fn test_source_removed_when_nothing_passes() {
        let mut points = extent_points(LAX_LV_EXTENT, 3);
        points.push(point(AORTA_VALVE, "s0", 0, 0.0));
        points.push(point(AORTA_VALVE, "s1", 0, 0.0));
        let mut store = ContourStore::from_points(points);

        reclassify_valve_landmarks(&mut store, &frames(&[0, 1, 2])).unwrap();

        assert!(!store.contains(LAX_LV_EXTENT));
        assert!(!store.contains(MITRAL_VALVE));
    }

    #[test]
    fn test_points_outside_requested_frames_are_dropped() {
        let mut store = ContourStore::from_points(extent_points(LAX_RV_EXTENT, 6));

        reclassify_valve_landmarks(&mut store, &frames(&[3, 4])).unwrap();

        let xs: Vec<f64> = store
            .get(TRICUSPID_VALVE)
            .unwrap()
            .iter()
            .map(|p| p.coordinate.x)
            .collect();
        assert_eq!(xs, vec![3.0, 4.0]);
        assert!(!store.contains(LAX_RV_EXTENT));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        // three samples in frame 1 listed before one in frame 0
        let mut store = ContourStore::from_points(vec![
            point(LAX_RV_EXTENT, "a", 1, 1.0),
            point(LAX_RV_EXTENT, "b", 1, 2.0),
            point(LAX_RV_EXTENT, "c", 1, 3.0),
            point(LAX_RV_EXTENT, "d", 0, 4.0),
        ]);

        reclassify_valve_landmarks(&mut store, &frames(&[0, 1])).unwrap();

        // ordered: d, a, b, c -> position 2 (b) is dropped
        let slices: Vec<&str> = store
            .get(TRICUSPID_VALVE)
            .unwrap()
            .iter()
            .map(|p| p.slice_id.as_str())
            .collect();
        assert_eq!(slices, vec!["d", "a", "c"]);
    }

    #[test]
    fn test_existing_valve_points_are_kept() {
        let mut points = vec![point(MITRAL_VALVE, "m", 0, 99.0)];
        points.extend(extent_points(LAX_LV_EXTENT, 4));
        let mut store = ContourStore::from_points(points);

        reclassify_valve_landmarks(&mut store, &frames(&[0, 1, 2, 3])).unwrap();

        let mitral = store.get(MITRAL_VALVE).unwrap();
        assert_eq!(mitral.len(), 4);
        assert_eq!(mitral[0].slice_id, "m");
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let mut points = extent_points(LAX_LV_EXTENT, 5);
        points.extend(extent_points(LAX_RV_EXTENT, 3));
        let mut store = ContourStore::from_points(points);
        let all = frames(&[0, 1, 2, 3, 4]);

        reclassify_valve_landmarks(&mut store, &all).unwrap();
        let once = store.clone();
        reclassify_valve_landmarks(&mut store, &all).unwrap();

        assert_eq!(store, once);
    }
}
