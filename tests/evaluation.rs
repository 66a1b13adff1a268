use std::{fs, path::Path};

use handeval::{
    config::Dataset,
    detection::PrecomputedRecognizer,
    evaluate::Evaluation,
    landmark::{HandLandmarks, HandPair, Landmark},
    pck::PckCalculator,
    pipeline::{Prerendered, Rotated},
};
use serde_json::{json, Value};

const RIGHT_HAND: [[f32; 2]; 21] = [
    [0.70, 0.90],
    [0.78, 0.85],
    [0.85, 0.78],
    [0.88, 0.70],
    [0.90, 0.62],
    [0.75, 0.60],
    [0.75, 0.50],
    [0.75, 0.43],
    [0.75, 0.37],
    [0.68, 0.58],
    [0.68, 0.47],
    [0.68, 0.40],
    [0.68, 0.33],
    [0.62, 0.60],
    [0.61, 0.50],
    [0.60, 0.43],
    [0.60, 0.38],
    [0.56, 0.64],
    [0.54, 0.56],
    [0.53, 0.51],
    [0.52, 0.46],
];

fn right_hand() -> HandLandmarks {
    HandLandmarks::from_fn(|i| Landmark::new(RIGHT_HAND[i][0], RIGHT_HAND[i][1]))
}

fn left_hand() -> HandLandmarks {
    HandLandmarks::from_fn(|i| Landmark::new(1.0 - RIGHT_HAND[i][0], RIGHT_HAND[i][1]))
}

fn hand_value(hand: &HandLandmarks) -> Value {
    hand.iter()
        .map(|lm| json!({"x": lm.x().to_string(), "y": lm.y().to_string()}))
        .collect()
}

fn detections(hands: &[(&HandLandmarks, &str, f32)]) -> Value {
    json!({
        "hand_landmarks": hands.iter().map(|(lm, _, _)| hand_value(lm)).collect::<Vec<_>>(),
        "gestures": hands
            .iter()
            .map(|(_, gesture, score)| json!([{"category_name": gesture, "score": score}]))
            .collect::<Vec<_>>(),
    })
}

fn write_json(path: &Path, value: &Value) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
}

fn annotations(images: &[&str]) -> Value {
    images
        .iter()
        .map(|image| {
            json!({
                "image": image,
                "landmarks": [hand_value(&left_hand()), hand_value(&right_hand())],
                "extra_points": {},
            })
        })
        .collect()
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"").unwrap();
}

#[test]
fn evaluate_dataset_with_bounds() {
    let root = tempfile::tempdir().unwrap();
    let root = root.path();
    let ir = Dataset {
        images: root.join("IR"),
        annotations: root.join("IR_annotations"),
    };
    let rgb = Dataset {
        images: root.join("RGB"),
        annotations: root.join("RGB_annotation"),
    };
    let det = root.join("detections");
    let (left, right) = (left_hand(), right_hand());

    write_json(
        &ir.annotations.join("ir.json"),
        &annotations(&["frame1.png", "frame2.png"]),
    );
    write_json(&rgb.annotations.join("rgb.json"), &annotations(&["hand.png"]));

    // Detector output on the untransformed images, used for the bounds.
    write_json(&det.join("hand.png.json"), &detections(&[(&right, "Open_Palm", 0.9)]));
    write_json(
        &det.join("frame1.png.json"),
        &detections(&[(&left, "None", 0.5), (&right, "None", 0.5)]),
    );
    write_json(&det.join("frame2.png.json"), &detections(&[(&left, "None", 0.5)]));

    // Detector output on the pipeline outputs.
    for name in ["frame1.png", "frame2.png"] {
        touch(&root.join(format!("siggraph17/{name}_siggraph17.png")));
        touch(&root.join(format!("clahe/{name}_clahe.png")));
    }
    write_json(
        &det.join("frame1.png_siggraph17.png.json"),
        &detections(&[(&right, "Open_Palm", 0.9), (&left, "Closed_Fist", 0.2)]),
    );
    write_json(
        &det.join("frame1.png_clahe.png.json"),
        &detections(&[(&right, "Open_Palm", 0.8)]),
    );
    write_json(&det.join("frame2.png_siggraph17.png.json"), &detections(&[]));
    write_json(&det.join("frame2.png_clahe.png.json"), &detections(&[]));

    let mut evaluation = Evaluation::new(
        PckCalculator::default(),
        PrecomputedRecognizer::new(&det),
        Prerendered::new("siggraph17", root.join("siggraph17"), "siggraph17"),
        Prerendered::new("clahe", root.join("clahe"), "clahe"),
    );
    evaluation.compute_bounds(&rgb, &ir).unwrap();
    assert_eq!(evaluation.calculator().upper_bound(), Some(0.5));
    assert_eq!(evaluation.calculator().lower_bound(), Some(0.75));

    let report = evaluation.evaluate(&ir).unwrap();
    assert_eq!(report.threshold, 0.05);
    assert_eq!(report.upper_bound, Some(0.5));
    assert_eq!(report.lower_bound, Some(0.75));
    assert_eq!(report.images.len(), 2);
    assert_eq!(report.images[0].image, "frame1.png");
    assert_eq!(report.images[0].hands_found, 2);
    assert_eq!(report.images[0].pck, HandPair::new(1.0, 1.0));
    assert_eq!(report.images[1].hands_found, 0);
    assert_eq!(report.images[1].pck, HandPair::new(0.0, 0.0));
    assert_eq!(report.final_pck, 0.5);

    let path = root.join("report.json");
    report.write(&path).unwrap();
    let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["final_pck"], json!(0.5));
    assert_eq!(written["images"][0]["pck"], json!({"Left": 1.0, "Right": 1.0}));
}

#[test]
fn evaluate_rotated_images() {
    let root = tempfile::tempdir().unwrap();
    let root = root.path();
    let ir = Dataset {
        images: root.join("IR"),
        annotations: root.join("IR_annotations"),
    };
    let det = root.join("detections");
    let work = root.join("rotated");

    fs::create_dir_all(&ir.images).unwrap();
    image::RgbImage::new(4, 2)
        .save(ir.images.join("frame1.png"))
        .unwrap();
    write_json(&ir.annotations.join("ir.json"), &annotations(&["frame1.png"]));

    touch(&root.join("siggraph17/frame1.png_siggraph17.png"));
    touch(&root.join("clahe/frame1.png_clahe.png"));
    // Only the right hand is found, in rotated coordinates.
    let right = right_hand().rotate_90_ccw();
    write_json(
        &det.join("frame1.png_siggraph17.png.json"),
        &detections(&[(&right, "Thumb_Down", 0.3)]),
    );
    write_json(&det.join("frame1.png_clahe.png.json"), &detections(&[]));

    let mut evaluation = Evaluation::new(
        PckCalculator::default(),
        PrecomputedRecognizer::new(&det),
        Prerendered::new("siggraph17", root.join("siggraph17"), "siggraph17"),
        Prerendered::new("clahe", root.join("clahe"), "clahe"),
    )
    .with_rotation(Rotated::new(&work));

    let report = evaluation.evaluate(&ir).unwrap();
    assert_eq!(report.images[0].hands_found, 1);
    assert_eq!(report.images[0].pck, HandPair::new(0.0, 1.0));
    assert_eq!(report.final_pck, 0.5);

    let rotated = image::open(work.join("frame1.png_rotated.png")).unwrap();
    assert_eq!((rotated.width(), rotated.height()), (2, 4));
}

#[test]
fn missing_pipeline_output_fails() {
    let root = tempfile::tempdir().unwrap();
    let root = root.path();
    let ir = Dataset {
        images: root.join("IR"),
        annotations: root.join("IR_annotations"),
    };
    write_json(&ir.annotations.join("ir.json"), &annotations(&["frame9.png"]));

    let mut evaluation = Evaluation::new(
        PckCalculator::default(),
        PrecomputedRecognizer::new(root.join("detections")),
        Prerendered::new("siggraph17", root.join("siggraph17"), "siggraph17"),
        Prerendered::new("clahe", root.join("clahe"), "clahe"),
    );
    let err = evaluation.evaluate(&ir).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("frame9.png"), "{msg}");
    assert!(msg.contains("siggraph17"), "{msg}");
}
