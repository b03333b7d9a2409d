//! Round-trip properties across encode/decode pairs.

use std::path::Path;

use ndarray::Array2;
use serde_json::json;

use crate::format::formats::{BBoxTextCodec, EncodeOptions, NativeJsonCodec};
use crate::format::image_data::test_png;
use crate::format::legend::{Legend, LegendMode};
use crate::model::{AnnotationDocument, GeometryKind, Shape};

fn comprehensive_document() -> AnnotationDocument {
    let mut doc = AnnotationDocument::new("scene.png", 64, 48);
    doc.image_data = Some(test_png(64, 48));
    doc.flags.insert("reviewed".into(), true);
    doc.flags.insert("difficult".into(), false);
    doc.other_data
        .insert("annotatorName".into(), json!("test-rig"));
    doc.other_data
        .insert("session".into(), json!({"id": 12, "tags": ["a", "b"]}));

    doc.shapes.push(
        Shape::rectangle("car", (10.5, 12.25), (40.0, 30.75))
            .with_group_id(4)
            .with_description("parked"),
    );
    let mut poly = Shape::new("sky", GeometryKind::Polygon).with_points(vec![
        (0.0, 0.0),
        (64.0, 0.0),
        (64.0, 10.0),
        (0.0, 10.0),
    ]);
    poly.flags.insert("occluded".into(), false);
    poly.other_data.insert("confidence".into(), json!(0.75));
    doc.shapes.push(poly);
    doc.shapes
        .push(Shape::new("mark", GeometryKind::Point).with_points(vec![(33.0, 21.0)]));

    doc
}

#[test]
fn test_native_json_roundtrip() {
    let original = comprehensive_document();
    let bytes =
        NativeJsonCodec::encode(&original, &EncodeOptions::new().with_image_data(true)).unwrap();
    let decoded = NativeJsonCodec::decode(&bytes, Path::new("labels/scene.json")).unwrap();

    assert_eq!(decoded, original);
}

#[test]
fn test_native_json_roundtrip_with_mask() {
    let mut original = comprehensive_document();
    original.shapes[0].mask =
        Some(Array2::from_shape_fn((18, 29), |(y, x)| x * y % 3 == 0));

    let bytes =
        NativeJsonCodec::encode(&original, &EncodeOptions::new().with_image_data(true)).unwrap();
    let decoded = NativeJsonCodec::decode(&bytes, Path::new("scene.json")).unwrap();

    assert_eq!(decoded.shapes[0].mask, original.shapes[0].mask);
    assert_eq!(decoded, original);
}

#[test]
fn test_bbox_text_roundtrip_within_one_pixel() {
    let legend = Legend::from_labels(["person", "car", "bicycle"]);
    let shapes = vec![
        Shape::rectangle("car", (100.0, 120.0), (180.0, 320.0)),
        Shape::rectangle("person", (0.0, 0.0), (37.0, 81.0)),
        Shape::rectangle("bicycle", (311.0, 17.0), (640.0, 480.0)),
    ];
    let (width, height) = (640, 480);

    let mut mode = LegendMode::Fixed(legend.clone());
    let bytes = BBoxTextCodec::encode(&shapes, width, height, &mut mode).unwrap();
    let decoded = BBoxTextCodec::decode(&bytes, width, height, &legend).unwrap();

    assert_eq!(decoded.len(), shapes.len());
    for (orig, back) in shapes.iter().zip(&decoded) {
        assert_eq!(back.label, orig.label);
        assert_eq!(back.kind, GeometryKind::Rectangle);
        for (po, pb) in orig.points.iter().zip(&back.points) {
            // Integer truncation on decode allows up to one pixel of drift.
            assert!((po.0 - pb.0).abs() <= 1.0, "{:?} vs {:?}", po, pb);
            assert!((po.1 - pb.1).abs() <= 1.0, "{:?} vs {:?}", po, pb);
        }
    }
}

#[test]
fn test_bbox_text_roundtrip_with_generated_legend() {
    let shapes = vec![
        Shape::rectangle("car", (10.0, 10.0), (50.0, 50.0)),
        Shape::rectangle("person", (60.0, 60.0), (90.0, 90.0)),
    ];
    let mut mode = LegendMode::generating();
    let bytes = BBoxTextCodec::encode(&shapes, 100, 100, &mut mode).unwrap();

    // Decoding against the legend the encode produced restores the labels.
    let decoded = BBoxTextCodec::decode(&bytes, 100, 100, mode.legend()).unwrap();
    assert_eq!(decoded[0].label, "car");
    assert_eq!(decoded[1].label, "person");
}
