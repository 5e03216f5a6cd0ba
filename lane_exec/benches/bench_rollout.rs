//! # Rollout Benchmark

use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use lane_lib::{
    ctrl::{Controller, MpcController, MpcParams, MpcSolver, OpenLoopController},
    dynamics::{VehicleDynamics, VehicleParams},
    reference::{Reference, SineLane},
    rollout::RolloutEngine,
    state::AbsoluteState,
};

fn rollout_benchmark(c: &mut Criterion) {
    // ---- Build the models ----

    let vehicle = VehicleParams::default();
    let dynamics = Arc::new(VehicleDynamics::new(vehicle.clone()));
    let lane = SineLane::default();
    let reference: Arc<dyn Reference> = Arc::new(lane);
    let engine = RolloutEngine::new(&*dynamics, &*reference);

    let s0 = AbsoluteState::new(0.0, 0.0, lane.initial_heading_rad(), 0.0, 0.0);

    let solver = MpcSolver::new(
        MpcParams::default(),
        vehicle.cost,
        dynamics.clone(),
        reference.clone()
    );

    // ---- Open-loop plan ----

    c.bench_function("MpcSolver::solve_absolute::100", |b| {
        b.iter(|| solver.solve_absolute(&s0, 100).unwrap())
    });

    let plan = solver.solve_absolute(&s0, 500).unwrap();
    let open_loop = Controller::Precomputed(OpenLoopController::new(plan.controls));

    c.bench_function("RolloutEngine::run::OP::500", |b| {
        b.iter(|| engine.run(&open_loop, s0, 500).unwrap())
    });

    // ---- Receding horizon ----

    let mpc = Controller::Optimizing(MpcController::new(solver.clone()));

    let mut group = c.benchmark_group("receding_horizon");
    group.sample_size(10);
    group.bench_function("RolloutEngine::run::MPC::50", |b| {
        b.iter(|| engine.run(&mpc, s0, 50).unwrap())
    });
    group.finish();
}

criterion_group!(benches, rollout_benchmark);
criterion_main!(benches);
