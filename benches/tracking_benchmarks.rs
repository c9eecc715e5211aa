//! Benchmarks for the per-detection control path

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use robot_head_tracking::{
    controller::{HeadTrackingController, TrackingMode},
    geometry::{CenterBox, FaceBox},
    model::MovementModel,
    position::classify,
    robot::{HeadCommander, SimulatedRobot},
};
use std::sync::Arc;

fn random_faces(count: usize) -> Vec<FaceBox> {
    (0..count)
        .filter_map(|_| {
            let top = (rand::random::<f64>() * 200.0) as i32;
            let left = (rand::random::<f64>() * 280.0) as i32;
            FaceBox::new(top, left + 40, top + 40, left).ok()
        })
        .collect()
}

fn benchmark_classify(c: &mut Criterion) {
    let center = CenterBox::for_frame(320, 240, 150);
    let faces = random_faces(100);

    c.bench_function("classify_100", |b| {
        b.iter(|| {
            for face in &faces {
                black_box(classify(Some(black_box(face)), &center));
            }
        });
    });
}

fn benchmark_cycles(c: &mut Criterion) {
    let mut group = c.benchmark_group("detection_cycle");
    let center = CenterBox::for_frame(320, 240, 150);
    let faces = random_faces(100);

    for mode in [TrackingMode::Training, TrackingMode::Inference] {
        let robot = Arc::new(SimulatedRobot::default());
        let model = MovementModel::new(10, 64, 0.001, 42);
        let mut controller =
            HeadTrackingController::new(model, HeadCommander::with_defaults(robot), mode);
        group.bench_function(mode.to_string(), |b| {
            let mut faces = faces.iter().cycle();
            b.iter(|| black_box(controller.on_detection(faces.next(), &center, mode)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_classify, benchmark_cycles);
criterion_main!(benches);
