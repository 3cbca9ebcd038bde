use ethoscope_types::{DataPoint, Error, Rect, Roi, Variable, VariableKind};
use image::GrayImage;

fn rect_polygon(x: i32, y: i32, w: i32, h: i32) -> Vec<(i32, i32)> {
    vec![(x, y), (x + w - 1, y), (x + w - 1, y + h - 1), (x, y + h - 1)]
}

#[test]
fn feature_dict_reproduces_rect() {
    let roi = Roi::new(vec![(12, 40), (70, 33), (81, 90), (20, 97)], 4, None).unwrap();
    let features = roi.get_feature_dict();
    assert_eq!(features.idx, 4);
    assert_eq!(features.value, 4);
    assert_eq!(Rect::from(features), roi.rect());

    let json = serde_json::to_string(&features).unwrap();
    let back: ethoscope_types::RoiFeatures = serde_json::from_str(&json).unwrap();
    assert_eq!(Rect::from(back), roi.rect());
}

#[test]
fn apply_crops_to_rect() {
    let mut frame = GrayImage::new(100, 80);
    frame.put_pixel(25, 35, image::Luma([200]));
    let roi = Roi::new(rect_polygon(20, 30, 10, 10), 1, None).unwrap();
    let (crop, mask) = roi.apply(&frame).unwrap();
    assert_eq!(crop.dimensions(), (10, 10));
    assert_eq!(mask.dimensions(), (10, 10));
    assert_eq!(crop.get_pixel(5, 5)[0], 200);
}

#[test]
fn apply_outside_frame_names_the_roi() {
    let frame = GrayImage::new(100, 80);
    let roi = Roi::new(rect_polygon(90, 30, 20, 10), 17, None).unwrap();
    let err = roi.apply(&frame).unwrap_err();
    match &err {
        Error::RoiOutOfBounds { idx, frame_width, .. } => {
            assert_eq!(*idx, 17);
            assert_eq!(*frame_width, 100);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("ROI 17"));
}

#[test]
fn datapoint_to_absolute() {
    let roi = Roi::new(rect_polygon(200, 10, 50, 50), 2, None).unwrap();
    let dp = DataPoint::new([
        Variable::new(VariableKind::X, 5),
        Variable::new(VariableKind::Y, 6),
        Variable::new(VariableKind::Phi, 45),
    ]);
    let abs = dp.to_absolute(&roi);
    assert_eq!(abs.get(VariableKind::X), Some(205));
    assert_eq!(abs.get(VariableKind::Y), Some(16));
    assert_eq!(abs.get(VariableKind::Phi), Some(45));
}
