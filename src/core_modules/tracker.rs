// THEORY:
// The `tracker` module adds memory to the engine. It takes the stateless list of
// `ObjectDescriptor`s from one frame and associates them with the objects it was
// tracking in earlier frames, so that the same physical object keeps the same
// identifier for as long as it stays in view.
//
// This module solves the data association problem with a global greedy
// nearest-neighbor policy:
// 1.  **Scoring**: every (descriptor, tracked object) pair within
//     `max_match_distance` becomes a candidate, scored by Euclidean centroid
//     distance.
// 2.  **Matching**: candidates are committed smallest distance first. Committing
//     a pair removes both sides from further consideration. Ties are broken by
//     descriptor order, then by the lower existing identifier, so a run is fully
//     reproducible. No backtracking: this is an approximation of optimal
//     assignment that holds up because objects move continuously between frames.
// 3.  **Lifecycle**:
//     - **Birth**: an unmatched descriptor mints the next identifier.
//     - **Tracking**: a matched object takes the descriptor's centroid and color
//       and its lost counter resets.
//     - **Retirement**: an unmatched object's lost counter grows; once it exceeds
//       `max_frames_lost` the object is dropped. Identifiers are never reused.
//
// The retained state is an explicit value (`TrackerState`) owned by whoever
// drives the frames. Nothing else reads or writes it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{info, trace};

use crate::core_modules::color::Rgb;
use crate::core_modules::descriptor::ObjectDescriptor;
use crate::error::{ConfigError, StateError};

/// Matching limits for the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Largest centroid displacement, in pixels, still treated as the same object.
    pub max_match_distance: f64,
    /// Frames an object may go unseen before its identifier is retired.
    pub max_frames_lost: u32,
}

impl TrackerConfig {
    pub fn new(max_match_distance: f64, max_frames_lost: u32) -> Result<Self, ConfigError> {
        let config = Self {
            max_match_distance,
            max_frames_lost,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.max_match_distance.is_finite() || self.max_match_distance <= 0.0 {
            return Err(ConfigError::NonPositiveMatchDistance(self.max_match_distance));
        }
        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_match_distance: 25.0,
            max_frames_lost: 5,
        }
    }
}

/// One object's lineage across frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub identifier: u64,
    pub last_centroid: (f64, f64),
    pub last_color: Rgb,
    pub frames_since_seen: u32,
}

impl TrackedObject {
    fn new(identifier: u64, descriptor: &ObjectDescriptor) -> Self {
        Self {
            identifier,
            last_centroid: descriptor.centroid,
            last_color: descriptor.average_color,
            frames_since_seen: 0,
        }
    }

    fn refresh(&mut self, descriptor: &ObjectDescriptor) {
        self.last_centroid = descriptor.centroid;
        self.last_color = descriptor.average_color;
        self.frames_since_seen = 0;
    }

    fn distance_to(&self, centroid: (f64, f64)) -> f64 {
        let dx = self.last_centroid.0 - centroid.0;
        let dy = self.last_centroid.1 - centroid.1;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Everything the tracker remembers between frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerState {
    objects: Vec<TrackedObject>,
    next_identifier: u64,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            next_identifier: 1,
        }
    }
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn objects(&self) -> &[TrackedObject] {
        &self.objects
    }

    pub fn get(&self, identifier: u64) -> Option<&TrackedObject> {
        self.objects.iter().find(|o| o.identifier == identifier)
    }

    /// The identifier the next new object will receive.
    pub fn next_identifier(&self) -> u64 {
        self.next_identifier
    }

    pub fn to_json(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restores state serialized with [`TrackerState::to_json`], rejecting any
    /// state that could hand out a duplicate identifier.
    pub fn from_json(json: &str) -> Result<Self, StateError> {
        let state: TrackerState = serde_json::from_str(json)?;
        state.validate()?;
        Ok(state)
    }

    pub fn validate(&self) -> Result<(), StateError> {
        if self.next_identifier == 0 {
            return Err(StateError::ZeroNextIdentifier);
        }
        if self.next_identifier == u64::MAX {
            return Err(StateError::IdentifiersExhausted);
        }
        let mut seen = HashSet::new();
        for object in &self.objects {
            if !seen.insert(object.identifier) {
                return Err(StateError::DuplicateIdentifier(object.identifier));
            }
            if object.identifier >= self.next_identifier {
                return Err(StateError::IdentifierNotBelowNext {
                    identifier: object.identifier,
                    next_identifier: self.next_identifier,
                });
            }
        }
        Ok(())
    }

    fn mint(&mut self) -> u64 {
        let identifier = self.next_identifier;
        self.next_identifier = self.next_identifier.saturating_add(1);
        identifier
    }
}

/// A candidate pairing of descriptor `descriptor` with tracked object `object`.
struct Candidate {
    distance: f64,
    descriptor: usize,
    identifier: u64,
    object: usize,
}

/// Assigns identifiers to `descriptors` and advances `state` by one frame.
///
/// The returned descriptors are in input order. Any identifier already present
/// on an input descriptor is replaced.
pub fn assign(
    mut descriptors: Vec<ObjectDescriptor>,
    config: &TrackerConfig,
    state: &mut TrackerState,
) -> Vec<ObjectDescriptor> {
    // --- 1. Scoring ---
    let mut candidates: Vec<Candidate> = Vec::new();
    for (i, descriptor) in descriptors.iter().enumerate() {
        for (j, object) in state.objects.iter().enumerate() {
            let distance = object.distance_to(descriptor.centroid);
            if distance <= config.max_match_distance {
                candidates.push(Candidate {
                    distance,
                    descriptor: i,
                    identifier: object.identifier,
                    object: j,
                });
            }
        }
    }
    candidates.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.descriptor.cmp(&b.descriptor))
            .then(a.identifier.cmp(&b.identifier))
    });

    // --- 2. Greedy matching ---
    let mut descriptor_matched = vec![false; descriptors.len()];
    let mut object_matched = vec![false; state.objects.len()];
    for candidate in &candidates {
        if descriptor_matched[candidate.descriptor] || object_matched[candidate.object] {
            continue;
        }
        descriptor_matched[candidate.descriptor] = true;
        object_matched[candidate.object] = true;

        let descriptor = &mut descriptors[candidate.descriptor];
        descriptor.identifier = Some(candidate.identifier);
        state.objects[candidate.object].refresh(descriptor);
        trace!(
            identifier = candidate.identifier,
            distance = candidate.distance,
            "Matched tracked object"
        );
    }

    // --- 3. Lost objects ---
    let mut retained = Vec::with_capacity(state.objects.len() + descriptors.len());
    for (object, matched) in state.objects.drain(..).zip(object_matched) {
        if matched {
            retained.push(object);
            continue;
        }
        let mut lost = object;
        lost.frames_since_seen = lost.frames_since_seen.saturating_add(1);
        if lost.frames_since_seen <= config.max_frames_lost {
            retained.push(lost);
        } else {
            info!(identifier = lost.identifier, "Retiring lost object");
        }
    }
    state.objects = retained;

    // --- 4. New objects ---
    for (descriptor, matched) in descriptors.iter_mut().zip(descriptor_matched) {
        if matched {
            continue;
        }
        let identifier = state.mint();
        descriptor.identifier = Some(identifier);
        state.objects.push(TrackedObject::new(identifier, descriptor));
        info!(identifier, centroid = ?descriptor.centroid, "New tracked object");
    }

    descriptors
}

/// Owns a tracker configuration and its retained state.
#[derive(Debug, Clone)]
pub struct IdentityTracker {
    config: TrackerConfig,
    state: TrackerState,
}

impl IdentityTracker {
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        Self::with_state(config, TrackerState::default())
    }

    pub fn with_state(config: TrackerConfig, state: TrackerState) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, state })
    }

    pub fn assign(&mut self, descriptors: Vec<ObjectDescriptor>) -> Vec<ObjectDescriptor> {
        assign(descriptors, &self.config, &mut self.state)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn into_state(self) -> TrackerState {
        self.state
    }

    /// Forgets every tracked object. The identifier counter keeps counting.
    pub fn clear(&mut self) {
        self.state.objects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::contour::{Contour, Point};

    fn at(x: f64, y: f64) -> ObjectDescriptor {
        ObjectDescriptor {
            contour: Contour::from_points(vec![Point::new(0, 0)]),
            area: 100.0,
            centroid: (x, y),
            average_color: [255, 255, 255],
            identifier: None,
        }
    }

    fn ids(descriptors: &[ObjectDescriptor]) -> Vec<u64> {
        descriptors.iter().map(|d| d.identifier.unwrap()).collect()
    }

    fn tracker(max_match_distance: f64, max_frames_lost: u32) -> IdentityTracker {
        IdentityTracker::new(TrackerConfig::new(max_match_distance, max_frames_lost).unwrap())
            .unwrap()
    }

    #[test]
    fn first_object_gets_identifier_one() {
        let mut tracker = tracker(10.0, 3);
        let out = tracker.assign(vec![at(50.0, 50.0)]);
        assert_eq!(ids(&out), vec![1]);
        assert_eq!(tracker.state().next_identifier(), 2);
    }

    #[test]
    fn slowly_moving_object_keeps_its_identifier() {
        let mut tracker = tracker(10.0, 3);
        for step in 0..20 {
            let out = tracker.assign(vec![at(10.0 + step as f64 * 9.5, 40.0)]);
            assert_eq!(ids(&out), vec![1]);
        }
        assert_eq!(tracker.state().objects().len(), 1);
    }

    #[test]
    fn jump_beyond_match_distance_creates_new_identifier() {
        let mut tracker = tracker(10.0, 3);
        tracker.assign(vec![at(50.0, 50.0)]);
        let out = tracker.assign(vec![at(70.0, 50.0)]);
        assert_eq!(ids(&out), vec![2]);

        let old = tracker.state().get(1).expect("identifier 1 retained");
        assert_eq!(old.frames_since_seen, 1);
        assert_eq!(old.last_centroid, (50.0, 50.0));
    }

    #[test]
    fn lost_object_is_retired_only_after_max_frames_lost() {
        let mut tracker = tracker(10.0, 3);
        tracker.assign(vec![at(50.0, 50.0)]);
        for absent in 1..=3 {
            tracker.assign(Vec::new());
            assert_eq!(tracker.state().get(1).unwrap().frames_since_seen, absent);
        }
        tracker.assign(Vec::new());
        assert!(tracker.state().get(1).is_none());
    }

    #[test]
    fn reappearing_object_resets_lost_counter() {
        let mut tracker = tracker(10.0, 3);
        tracker.assign(vec![at(50.0, 50.0)]);
        tracker.assign(Vec::new());
        tracker.assign(Vec::new());
        let out = tracker.assign(vec![at(52.0, 51.0)]);
        assert_eq!(ids(&out), vec![1]);
        assert_eq!(tracker.state().get(1).unwrap().frames_since_seen, 0);
    }

    #[test]
    fn identifiers_are_never_reused() {
        let mut tracker = tracker(5.0, 0);
        tracker.assign(vec![at(10.0, 10.0)]);
        tracker.assign(Vec::new());
        assert!(tracker.state().objects().is_empty());
        let out = tracker.assign(vec![at(10.0, 10.0)]);
        assert_eq!(ids(&out), vec![2]);
    }

    #[test]
    fn globally_smallest_pair_is_committed_first() {
        let mut tracker = tracker(6.0, 3);
        tracker.assign(vec![at(0.0, 0.0), at(4.0, 0.0)]);
        // Object 2 is closest to the first descriptor (distance 1), which leaves
        // object 1 with only the second descriptor at distance 8.
        let out = tracker.assign(vec![at(3.0, 0.0), at(8.0, 0.0)]);
        assert_eq!(ids(&out), vec![2, 3]);
        assert_eq!(tracker.state().get(1).unwrap().frames_since_seen, 1);
    }

    #[test]
    fn distance_ties_favor_earlier_descriptor() {
        let mut tracker = tracker(5.0, 3);
        tracker.assign(vec![at(5.0, 0.0)]);
        let out = tracker.assign(vec![at(2.0, 0.0), at(8.0, 0.0)]);
        assert_eq!(ids(&out), vec![1, 2]);
    }

    #[test]
    fn distance_ties_favor_lower_identifier() {
        let mut tracker = tracker(5.0, 3);
        tracker.assign(vec![at(0.0, 0.0), at(6.0, 0.0)]);
        let out = tracker.assign(vec![at(3.0, 0.0)]);
        assert_eq!(ids(&out), vec![1]);
        assert_eq!(tracker.state().get(2).unwrap().frames_since_seen, 1);
    }

    #[test]
    fn matched_object_takes_new_centroid_and_color() {
        let mut tracker = tracker(10.0, 3);
        tracker.assign(vec![at(10.0, 10.0)]);
        let mut moved = at(13.0, 14.0);
        moved.average_color = [1, 2, 3];
        tracker.assign(vec![moved]);
        let object = tracker.state().get(1).unwrap();
        assert_eq!(object.last_centroid, (13.0, 14.0));
        assert_eq!(object.last_color, [1, 2, 3]);
    }

    #[test]
    fn identical_runs_produce_identical_assignments() {
        let frames: Vec<Vec<(f64, f64)>> = vec![
            vec![(10.0, 10.0), (40.0, 40.0), (70.0, 10.0)],
            vec![(12.0, 11.0), (41.0, 38.0)],
            vec![(15.0, 12.0), (90.0, 90.0), (43.0, 37.0), (71.0, 12.0)],
            vec![(30.0, 30.0)],
        ];
        let run = || {
            let mut tracker = tracker(8.0, 1);
            frames
                .iter()
                .map(|frame| ids(&tracker.assign(frame.iter().map(|&(x, y)| at(x, y)).collect())))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn free_function_matches_tracker_instance() {
        let config = TrackerConfig::new(10.0, 2).unwrap();
        let mut state = TrackerState::new();
        let first = assign(vec![at(1.0, 1.0), at(30.0, 30.0)], &config, &mut state);
        let second = assign(vec![at(31.0, 29.0)], &config, &mut state);
        assert_eq!(ids(&first), vec![1, 2]);
        assert_eq!(ids(&second), vec![2]);
        assert_eq!(state.get(1).unwrap().frames_since_seen, 1);
    }

    #[test]
    fn rejects_non_positive_match_distance() {
        assert!(matches!(
            TrackerConfig::new(0.0, 3),
            Err(ConfigError::NonPositiveMatchDistance(_))
        ));
        assert!(TrackerConfig::new(-4.0, 3).is_err());
        assert!(TrackerConfig::new(f64::NAN, 3).is_err());
    }

    #[test]
    fn state_survives_json_round_trip() {
        let mut tracker = tracker(10.0, 3);
        tracker.assign(vec![at(5.0, 5.0), at(50.0, 50.0)]);
        tracker.assign(vec![at(6.0, 5.0)]);
        let json = tracker.state().to_json().unwrap();
        let restored = TrackerState::from_json(&json).unwrap();
        assert_eq!(&restored, tracker.state());

        let mut resumed = IdentityTracker::with_state(*tracker.config(), restored).unwrap();
        let out = resumed.assign(vec![at(50.0, 51.0), at(200.0, 200.0)]);
        assert_eq!(ids(&out), vec![2, 3]);
    }

    #[test]
    fn rejects_state_that_would_alias_identifiers() {
        let duplicate = r#"{"objects":[
            {"identifier":1,"last_centroid":[0.0,0.0],"last_color":[0,0,0],"frames_since_seen":0},
            {"identifier":1,"last_centroid":[5.0,5.0],"last_color":[0,0,0],"frames_since_seen":0}
        ],"next_identifier":2}"#;
        assert!(matches!(
            TrackerState::from_json(duplicate),
            Err(StateError::DuplicateIdentifier(1))
        ));

        let stale_counter = r#"{"objects":[
            {"identifier":4,"last_centroid":[0.0,0.0],"last_color":[0,0,0],"frames_since_seen":0}
        ],"next_identifier":4}"#;
        assert!(matches!(
            TrackerState::from_json(stale_counter),
            Err(StateError::IdentifierNotBelowNext { identifier: 4, next_identifier: 4 })
        ));

        assert!(matches!(
            TrackerState::from_json("not json"),
            Err(StateError::Parse(_))
        ));

        let exhausted = format!(r#"{{"objects":[],"next_identifier":{}}}"#, u64::MAX);
        assert!(matches!(
            TrackerState::from_json(&exhausted),
            Err(StateError::IdentifiersExhausted)
        ));
    }

    #[test]
    fn unbounded_retention_does_not_overflow_the_lost_counter() {
        let mut tracker = tracker(10.0, u32::MAX);
        tracker.assign(vec![at(50.0, 50.0)]);
        tracker.state.objects[0].frames_since_seen = u32::MAX - 1;

        tracker.assign(Vec::new());
        tracker.assign(Vec::new());

        let object = tracker.state().get(1).expect("never retired");
        assert_eq!(object.frames_since_seen, u32::MAX);
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn births_and_retirements_are_logged_at_info() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut tracker = tracker(10.0, 0);
            tracker.assign(vec![at(50.0, 50.0)]);
            tracker.assign(Vec::new());
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("New tracked object"));
        assert!(output.contains("Retiring lost object"));
    }
}
