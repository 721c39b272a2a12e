//! ByteTrack-style identity tracker.
//!
//! Confident detections are associated with existing tracks first; weak
//! detections may only extend tracks that are still unmatched, and never start
//! new ones.
use super::bbox_iou;
use std::collections::HashSet;

/// Minimum IoU for a detection to continue a track.
const MATCH_IOU: f64 = 0.3;

/// Tracker input: a box and its score.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub bbox: [f64; 4],
    pub score: f64,
}

/// A track matched in the current update.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedBox {
    pub id: u32,
    /// Index of the matched candidate in the update's input slice.
    pub candidate: usize,
}

#[derive(Clone, Debug)]
struct Track {
    id: u32,
    bbox: [f64; 4],
    lost_for: usize,
    candidate: Option<usize>,
}

pub struct ByteTracker {
    tracks: Vec<Track>,
    next_id: u32,
    track_buffer: usize,
    // Candidates at or above this score may start tracks.
    high_score: f64,
}

impl ByteTracker {
    /// `track_buffer` is how many consecutive frames a track may go unmatched
    /// before it is dropped. Candidates scoring at least `high_score` are
    /// matched first and may start new tracks.
    pub fn new(track_buffer: usize, high_score: f64) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            track_buffer,
            high_score,
        }
    }

    /// Associates this frame's candidates with tracks and returns the tracks
    /// matched in this frame.
    pub fn update(&mut self, candidates: &[Candidate]) -> Vec<TrackedBox> {
        for track in &mut self.tracks {
            track.candidate = None;
        }

        let (strong, weak): (Vec<usize>, Vec<usize>) =
            (0..candidates.len()).partition(|&i| candidates[i].score >= self.high_score);

        let existing = self.tracks.len();
        let all_tracks: Vec<usize> = (0..existing).collect();
        let used = self.associate(&all_tracks, &strong, candidates);

        let unmatched: Vec<usize> = (0..existing)
            .filter(|&t| self.tracks[t].candidate.is_none())
            .collect();
        self.associate(&unmatched, &weak, candidates);

        for &ci in strong.iter().filter(|ci| !used.contains(ci)) {
            self.tracks.push(Track {
                id: self.next_id,
                bbox: candidates[ci].bbox,
                lost_for: 0,
                candidate: Some(ci),
            });
            self.next_id += 1;
        }

        for track in self.tracks.iter_mut().take(existing) {
            if track.candidate.is_none() {
                track.lost_for += 1;
            }
        }
        let buffer = self.track_buffer;
        self.tracks.retain(|t| t.lost_for <= buffer);

        self.tracks
            .iter()
            .filter_map(|t| {
                t.candidate.map(|candidate| TrackedBox {
                    id: t.id,
                    candidate,
                })
            })
            .collect()
    }

    /// Greedy highest-IoU-first matching between the given tracks and
    /// candidates. Returns the candidate indices that were consumed.
    fn associate(
        &mut self,
        track_indices: &[usize],
        candidate_indices: &[usize],
        candidates: &[Candidate],
    ) -> HashSet<usize> {
        let mut pairs = Vec::new();
        for &ti in track_indices {
            for &ci in candidate_indices {
                let iou = bbox_iou(&self.tracks[ti].bbox, &candidates[ci].bbox);
                if iou >= MATCH_IOU {
                    pairs.push((ti, ci, iou));
                }
            }
        }
        pairs.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut used_tracks = HashSet::new();
        let mut used_candidates = HashSet::new();
        for (ti, ci, _) in pairs {
            if used_tracks.contains(&ti) || used_candidates.contains(&ci) {
                continue;
            }
            used_tracks.insert(ti);
            used_candidates.insert(ci);
            let track = &mut self.tracks[ti];
            track.bbox = candidates[ci].bbox;
            track.lost_for = 0;
            track.candidate = Some(ci);
        }
        used_candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(x1: f64, y1: f64, x2: f64, y2: f64, score: f64) -> Candidate {
        Candidate {
            bbox: [x1, y1, x2, y2],
            score,
        }
    }

    #[test]
    fn test_new_candidates_get_unique_ids() {
        let mut tracker = ByteTracker::new(5, 0.5);
        let tracks = tracker.update(&[
            cand(0.0, 0.0, 50.0, 50.0, 0.9),
            cand(100.0, 100.0, 150.0, 150.0, 0.8),
        ]);
        assert_eq!(tracks.len(), 2);
        assert_ne!(tracks[0].id, tracks[1].id);
    }

    #[test]
    fn test_id_is_stable_across_frames() {
        let mut tracker = ByteTracker::new(5, 0.5);
        let first = tracker.update(&[cand(10.0, 10.0, 60.0, 60.0, 0.9)]);
        let second = tracker.update(&[cand(12.0, 12.0, 62.0, 62.0, 0.9)]);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, first[0].id);
    }

    #[test]
    fn test_candidate_index_follows_input_order() {
        let mut tracker = ByteTracker::new(5, 0.5);
        tracker.update(&[cand(0.0, 0.0, 50.0, 50.0, 0.9)]);
        let tracks = tracker.update(&[
            cand(300.0, 300.0, 350.0, 350.0, 0.9),
            cand(1.0, 1.0, 51.0, 51.0, 0.9),
        ]);
        let existing = tracks.iter().find(|t| t.id == 1).expect("track 1 kept");
        assert_eq!(existing.candidate, 1);
    }

    #[test]
    fn test_track_dropped_after_buffer() {
        let mut tracker = ByteTracker::new(2, 0.5);
        tracker.update(&[cand(10.0, 10.0, 60.0, 60.0, 0.9)]);
        tracker.update(&[]);
        tracker.update(&[]);
        tracker.update(&[]);
        let tracks = tracker.update(&[cand(10.0, 10.0, 60.0, 60.0, 0.9)]);
        assert_eq!(tracks[0].id, 2);
    }

    #[test]
    fn test_track_survives_within_buffer() {
        let mut tracker = ByteTracker::new(3, 0.5);
        let first = tracker.update(&[cand(10.0, 10.0, 60.0, 60.0, 0.9)]);
        tracker.update(&[]);
        tracker.update(&[]);
        let later = tracker.update(&[cand(12.0, 12.0, 62.0, 62.0, 0.9)]);
        assert_eq!(later[0].id, first[0].id);
    }

    #[test]
    fn test_weak_candidate_extends_existing_track() {
        let mut tracker = ByteTracker::new(5, 0.5);
        let first = tracker.update(&[cand(10.0, 10.0, 60.0, 60.0, 0.9)]);
        let second = tracker.update(&[cand(12.0, 12.0, 62.0, 62.0, 0.3)]);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, first[0].id);
    }

    #[test]
    fn test_weak_candidate_does_not_start_track() {
        let mut tracker = ByteTracker::new(5, 0.5);
        assert!(tracker.update(&[cand(10.0, 10.0, 60.0, 60.0, 0.3)]).is_empty());
    }

    #[test]
    fn test_configured_score_starts_track_on_first_frame() {
        let mut tracker = ByteTracker::new(30, 0.3);
        let first = tracker.update(&[cand(10.0, 10.0, 60.0, 60.0, 0.45)]);
        assert_eq!(first.len(), 1);
        let id = first[0].id;

        for _ in 0..9 {
            let tracks = tracker.update(&[cand(10.0, 10.0, 60.0, 60.0, 0.45)]);
            assert_eq!(tracks.len(), 1);
            assert_eq!(tracks[0].id, id);
        }
    }
}
