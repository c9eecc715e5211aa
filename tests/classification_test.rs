//! Face position classification and the rule-based movement table


use proptest::prelude::*;
use robot_head_tracking::{
    geometry::{CenterBox, FaceBox},
    movement_policy::{MovementTable, MovementVector},
    position::{classify, PositionLabel},
};
use test_helpers::face;

fn reference_center() -> CenterBox {
    CenterBox::new((50, 50), (270, 190))
}

#[test]
fn test_centered_scenario() {
    let label = classify(Some(&face(50, 200, 150, 100)), &reference_center());
    assert_eq!(label, PositionLabel::Centered);
}

#[test]
fn test_right_scenario() {
    let label = classify(Some(&face(50, 360, 150, 260)), &reference_center());
    assert_eq!(label, PositionLabel::Right);
}

#[test]
fn test_no_face_is_not_detected() {
    assert_eq!(classify(None, &reference_center()), PositionLabel::NotDetected);
    assert_eq!(
        classify(None, &CenterBox::for_frame(640, 480, 150)),
        PositionLabel::NotDetected
    );
}

#[test]
fn test_center_box_for_frame() {
    let center = CenterBox::for_frame(320, 240, 150);
    assert_eq!(center.top_left, (85, 45));
    assert_eq!(center.bottom_right, (235, 195));
}

#[test]
fn test_all_corners() {
    let center = CenterBox::for_frame(320, 240, 150);
    let cases = [
        (face(0, 310, 20, 290), PositionLabel::TopRight),
        (face(0, 30, 20, 10), PositionLabel::TopLeft),
        (face(220, 310, 240, 290), PositionLabel::BottomRight),
        (face(220, 30, 240, 10), PositionLabel::BottomLeft),
        (face(0, 170, 20, 150), PositionLabel::Top),
        (face(220, 170, 240, 150), PositionLabel::Bottom),
        (face(110, 30, 130, 10), PositionLabel::Left),
    ];
    for (face, expected) in cases {
        assert_eq!(classify(Some(&face), &center), expected, "face {face:?}");
    }
}

#[test]
fn test_half_pixel_past_corner_stays_centered() {
    let center = CenterBox::for_frame(320, 240, 150);
    // (234 + 237) / 2 floors to 235, the right edge itself
    assert_eq!(classify(Some(&face(100, 237, 140, 234)), &center), PositionLabel::Centered);
    // (84 + 85) / 2 floors to 84, past the left edge
    assert_eq!(classify(Some(&face(100, 85, 140, 84)), &center), PositionLabel::Left);
    // (195 + 196) / 2 floors to 195, the bottom edge itself
    assert_eq!(classify(Some(&face(195, 170, 196, 150)), &center), PositionLabel::Centered);
}

#[test]
fn test_inverted_box_rejected() {
    assert!(FaceBox::new(150, 200, 50, 100).is_err());
    assert!(FaceBox::new(50, 100, 150, 200).is_err());
}

#[test]
fn test_movement_table_matches_fixed_values() {
    let table = MovementTable::default();
    let expected = [
        (PositionLabel::Right, MovementVector::new(-0.05, 0.0)),
        (PositionLabel::Left, MovementVector::new(0.05, 0.0)),
        (PositionLabel::Top, MovementVector::new(0.0, -0.06)),
        (PositionLabel::Bottom, MovementVector::new(0.0, 0.07)),
        (PositionLabel::TopRight, MovementVector::new(-0.05, -0.06)),
        (PositionLabel::TopLeft, MovementVector::new(0.05, -0.06)),
        (PositionLabel::BottomRight, MovementVector::new(-0.05, 0.07)),
        (PositionLabel::BottomLeft, MovementVector::new(0.05, 0.07)),
    ];
    for (label, movement) in expected {
        assert_eq!(table.movement_for(label), Some(movement), "label {label}");
    }
    assert_eq!(table.movement_for(PositionLabel::Centered), None);
    assert_eq!(table.movement_for(PositionLabel::NotDetected), None);
}

#[test]
fn test_label_names_round_trip() {
    for label in PositionLabel::ALL {
        assert_eq!(label.name().parse::<PositionLabel>().unwrap(), label);
    }
}

proptest! {
    #[test]
    fn classify_never_panics(
        top in -1000i32..1000,
        left in -1000i32..1000,
        height in 0i32..500,
        width in 0i32..500,
    ) {
        let face = FaceBox::new(top, left + width, top + height, left).unwrap();
        let label = classify(Some(&face), &CenterBox::for_frame(320, 240, 150));
        prop_assert!(PositionLabel::ALL.contains(&label));
    }

    #[test]
    fn corrective_labels_always_move(index in 0usize..8) {
        let label = PositionLabel::ALL[index];
        let movement = MovementTable::default().movement_for(label);
        prop_assert!(movement.is_some_and(|m| m != MovementVector::ZERO));
    }
}
