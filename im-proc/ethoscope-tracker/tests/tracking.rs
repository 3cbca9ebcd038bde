use ethoscope_tracker::{
    AdaptiveBgTracker, NoPosition, PositionHistory, Tracker, TrackerConfig, TrackerKind,
};
use ethoscope_types::{DataPoint, Variable, VariableKind};
use image::{GrayImage, Luma};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

const W: u32 = 100;
const H: u32 = 60;

fn arena() -> GrayImage {
    GrayImage::from_pixel(W, H, Luma([200]))
}

fn full_mask() -> GrayImage {
    GrayImage::from_pixel(W, H, Luma([255]))
}

/// A 12x4 dark fly centred near `(cx, cy)`.
fn with_fly(mut img: GrayImage, cx: i32, cy: i32) -> GrayImage {
    draw_filled_rect_mut(&mut img, Rect::at(cx - 6, cy - 2).of_size(12, 4), Luma([40]));
    img
}

fn point_at(x: i32, y: i32) -> DataPoint {
    DataPoint::new([
        Variable::new(VariableKind::X, x),
        Variable::new(VariableKind::Y, y),
    ])
}

#[test_log::test]
fn finds_a_moving_fly() {
    let mut tracker = TrackerConfig::default().build();
    assert_eq!(tracker.kind(), TrackerKind::AdaptiveBg);
    let mask = full_mask();

    assert_eq!(
        tracker.find_position(&arena(), &mask, 0),
        Err(NoPosition::Initialising)
    );

    let first = tracker
        .find_position(&with_fly(arena(), 30, 30), &mask, 100)
        .unwrap();
    assert_eq!(first.len(), 1);
    let p = &first[0];
    assert!((p.get(VariableKind::X).unwrap() - 30).abs() <= 2);
    assert!((p.get(VariableKind::Y).unwrap() - 30).abs() <= 2);
    assert!(p.get(VariableKind::Width).unwrap() > p.get(VariableKind::Height).unwrap());
    let phi = p.get(VariableKind::Phi).unwrap();
    assert!(phi <= 2 || phi >= 178, "horizontal fly, got phi {phi}");
    // log10(1/100) with no previous position
    assert_eq!(p.get(VariableKind::XyDistance), Some(-2000));
    assert_eq!(p.get(VariableKind::MLogLikelihood), Some(0));

    let second = tracker
        .find_position(&with_fly(arena(), 60, 30), &mask, 200)
        .unwrap();
    let p = &second[0];
    assert!((p.get(VariableKind::X).unwrap() - 60).abs() <= 2);
    let xy = p.get(VariableKind::XyDistance).unwrap();
    // log10(0.01 + 0.3) is about -0.509
    assert!((xy + 509).abs() <= 15, "xy_dist {xy}");
}

#[test]
fn picks_the_candidate_resembling_the_fly() {
    let mut tracker = TrackerConfig::default().build();
    let mask = full_mask();
    tracker.find_position(&arena(), &mask, 0).unwrap_err();
    tracker
        .find_position(&with_fly(arena(), 30, 30), &mask, 100)
        .unwrap();

    let mut frame = with_fly(arena(), 30, 30);
    draw_filled_rect_mut(&mut frame, Rect::at(70, 20).of_size(12, 12), Luma([40]));
    let found = tracker.find_position(&frame, &mask, 200).unwrap();
    let p = &found[0];
    assert!((p.get(VariableKind::X).unwrap() - 30).abs() <= 2);
    assert!(p.get(VariableKind::MLogLikelihood).unwrap() < 750);
}

#[test]
fn background_keeps_learning_while_candidates_are_too_distant() {
    // every ambiguous frame is too distant
    let cfg = TrackerConfig {
        max_distance: -1.0,
        ..Default::default()
    };
    let mut tracker = AdaptiveBgTracker::new(&cfg);
    let mask = full_mask();
    tracker.find_position(&arena(), &mask, 0).unwrap_err();
    let square_mean = |tracker: &AdaptiveBgTracker| {
        tracker.background().mean().unwrap().get_pixel(76, 26)[0]
    };
    let initial = square_mean(&tracker);

    let mut frame = with_fly(arena(), 20, 30);
    draw_filled_rect_mut(&mut frame, Rect::at(70, 20).of_size(12, 12), Luma([40]));
    assert!(matches!(
        tracker.find_position(&frame, &mask, 100),
        Err(NoPosition::TooDistant { .. })
    ));
    let mut previous = square_mean(&tracker);
    assert!(previous < initial, "background mean {previous} from {initial}");

    for t_ms in [200, 300, 400] {
        let _ = tracker.find_position(&frame, &mask, t_ms);
        let now = square_mean(&tracker);
        assert!(now < previous, "background mean {now} after {previous}");
        previous = now;
    }
}

#[test]
fn rejects_bad_frames() {
    let mut tracker = TrackerConfig::default().build();
    let mask = full_mask();
    tracker.find_position(&arena(), &mask, 1000).unwrap_err();

    assert_eq!(
        tracker.find_position(&arena(), &mask, 500),
        Err(NoPosition::TimeWentBackwards {
            t_ms: 500,
            previous_ms: 1000
        })
    );
    assert_eq!(
        tracker.find_position(&arena(), &mask, 1100),
        Err(NoPosition::NoForeground)
    );

    let mut half_dark = arena();
    draw_filled_rect_mut(&mut half_dark, Rect::at(0, 0).of_size(W / 2, H), Luma([40]));
    assert!(matches!(
        tracker.find_position(&half_dark, &mask, 1200),
        Err(NoPosition::ForegroundTooLarge { .. })
    ));

    let small_mask = GrayImage::from_pixel(10, 10, Luma([255]));
    assert_eq!(
        tracker.find_position(&arena(), &small_mask, 1300),
        Err(NoPosition::SizeMismatch)
    );
}

#[test]
fn single_object_tracker_joins_fragments() {
    let cfg = TrackerConfig {
        kind: TrackerKind::SingleObject,
        ..Default::default()
    };
    let mut tracker = cfg.build();
    let mask = full_mask();
    tracker.find_position(&arena(), &mask, 0).unwrap_err();

    let mut frame = arena();
    draw_filled_rect_mut(&mut frame, Rect::at(20, 28).of_size(5, 4), Luma([40]));
    draw_filled_rect_mut(&mut frame, Rect::at(35, 28).of_size(5, 4), Luma([40]));
    let found = tracker.find_position(&frame, &mask, 100).unwrap();
    let p = &found[0];
    assert!((p.get(VariableKind::X).unwrap() - 30).abs() <= 2);
    assert!(p.get(VariableKind::Width).unwrap() >= 15);
}

#[test]
fn history_infers_short_gaps_only() {
    let mut history = PositionHistory::new(250_000, 30_000);

    let out = history.record(0, Ok(vec![point_at(10, 20)]));
    assert_eq!(out[0].get(VariableKind::IsInferred), Some(0));

    let out = history.record(1_000, Err(NoPosition::NoForeground));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].get(VariableKind::X), Some(10));
    assert_eq!(out[0].get(VariableKind::IsInferred), Some(1));
    assert_eq!(history.last_non_inferred_time(), Some(0));

    let out = history.record(40_000, Err(NoPosition::NoForeground));
    assert!(out.is_empty());
    assert_eq!(history.last_time_point(), Some(40_000));
}

#[test]
fn history_without_observation_emits_nothing() {
    let mut history = TrackerConfig::default().history();
    assert!(history.record(0, Err(NoPosition::Initialising)).is_empty());
    assert!(history.is_empty());
}

#[test]
fn history_is_pruned_to_its_window() {
    let mut history = PositionHistory::new(10_000, 30_000);
    for i in 0..100u64 {
        history.record(i * 1_000, Ok(vec![point_at(i as i32, 0)]));
    }
    let entries = history.entries();
    let oldest = entries.front().unwrap().0;
    let newest = entries.back().unwrap().0;
    assert_eq!(newest, 99_000);
    assert!(newest - oldest <= 10_000);
    assert_eq!(history.last_positions().unwrap()[0].get(VariableKind::X), Some(99));
}
