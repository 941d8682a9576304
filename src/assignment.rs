use crate::detection::Detection;
use crate::track::Track;
use munkres::{solve_assignment, Position, WeightMatrix, Weights};

/// Cost of padding cells and forbidden pairs.
pub(crate) const GATED_COST: f32 = 100000.0;

// small enough to never outweigh a real IoU difference
const CONFIDENCE_TIE_BREAK: f32 = 1e-4;

#[derive(Debug, Clone, Copy)]
pub(crate) struct CostParams {
    pub min_iou: f32,
    pub max_cosine_distance: f32,
    pub appearance_weight: f32,
}

/// Matching cost, or `None` when the pair is gated out.
pub(crate) fn match_cost(track: &Track, det: &Detection, params: &CostParams) -> Option<f32> {
    let iou = track.predicted_bbox().iou(det.bbox());
    if iou < params.min_iou {
        return None;
    }

    let motion = 1.0 - iou;
    let appearance = det
        .embedding()
        .and_then(|e| track.appearance_distance(e));

    let cost = match appearance {
        Some(d) if d > params.max_cosine_distance => return None,
        Some(d) => (1.0 - params.appearance_weight) * motion + params.appearance_weight * d,
        None => motion,
    };

    Some(cost + CONFIDENCE_TIE_BREAK * (1.0 - det.confidence()))
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Matching {
    /// `(track index, detection index)`
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Minimum-cost bipartite matching between `track_idx` of `tracks` and
/// `det_idx` of `dets`. Indices in the result refer to the full slices.
pub(crate) fn min_cost_matching(
    tracks: &[Track],
    track_idx: &[usize],
    dets: &[Detection],
    det_idx: &[usize],
    params: &CostParams,
) -> Matching {
    if track_idx.is_empty() || det_idx.is_empty() {
        return Matching {
            matches: vec![],
            unmatched_tracks: track_idx.to_vec(),
            unmatched_detections: det_idx.to_vec(),
        };
    }

    let n = track_idx.len().max(det_idx.len());
    let cost = |(r, c): (usize, usize)| {
        if r < track_idx.len() && c < det_idx.len() {
            match_cost(&tracks[track_idx[r]], &dets[det_idx[c]], params).unwrap_or(GATED_COST)
        } else {
            GATED_COST
        }
    };

    // the solver reduces `mat` in place; `costs` keeps the originals
    let mut mat = WeightMatrix::from_fn(n, &cost);
    let costs = WeightMatrix::from_fn(n, &cost);
    let solved = match solve_assignment(&mut mat) {
        Ok(solved) => solved,
        Err(err) => {
            log::warn!("assignment could not be solved: {:?}", err);
            vec![]
        }
    };

    let mut matches = Vec::new();
    for Position { row, column } in solved {
        if row < track_idx.len()
            && column < det_idx.len()
            && costs.element_at(Position { row, column }) < GATED_COST
        {
            matches.push((track_idx[row], det_idx[column]));
        }
    }

    let unmatched_tracks = track_idx
        .iter()
        .copied()
        .filter(|t| !matches.iter().any(|&(m, _)| m == *t))
        .collect();

    let unmatched_detections = det_idx
        .iter()
        .copied()
        .filter(|d| !matches.iter().any(|&(_, m)| m == *d))
        .collect();

    Matching {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}
