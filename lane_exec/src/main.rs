//! Lane keeping comparison executable entry point.
//!
//! # Architecture
//!
//! A run consists of:
//!
//!     - Initialise the session and logging
//!     - Load parameters and, if needed, the learned controller
//!     - Solve the open-loop plan from the initial state
//!     - For each requested controller:
//!         - Run a closed loop rollout
//!         - Save its state, control and value tables
//!     - Compare the rollouts against the reference, using the open-loop
//!       rollout as the control baseline when it was run
//!     - Save the comparison report

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::{WrapErr, eyre}};
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;

// Internal
use lane_lib::{
    analysis::ComparativeAnalyzer,
    ctrl::{
        Controller, ControllerKind, LearnedController, MpcController, MpcSolver,
        OpenLoopController,
    },
    dynamics::{Dynamics, VehicleDynamics},
    params::SimParams,
    persist,
    reference::Reference,
    rollout::RolloutEngine,
};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
    time::format_secs,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Solver iteration records are only wanted at debug detail, even when
/// tracing rollouts.
const SOLVER_LOG_TARGET: &str = "lane_lib::ctrl::mpc";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Compare lane keeping controllers in closed loop simulation.
#[derive(Debug, StructOpt)]
#[structopt(name = "lane_exec")]
struct Opt {
    /// Controllers to run, any of ADP, MPC and OP. All are run if none are
    /// given.
    #[structopt(short, long)]
    methods: Vec<ControllerKind>,

    /// Directory containing the learned controller's actor.json and
    /// critic.json, required when running ADP.
    #[structopt(long, parse(from_os_str))]
    policy_dir: Option<PathBuf>,

    /// Directory in which the session directory is created.
    #[structopt(short, long, parse(from_os_str), default_value = "sessions")]
    output_dir: PathBuf,

    /// Simulation parameter file, defaults are used if not given.
    #[structopt(short, long, parse(from_os_str))]
    params: Option<PathBuf>,

    /// Log at trace level.
    #[structopt(short, long)]
    verbose: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new("lane_sim", &opt.output_dir)
        .wrap_err("Failed to create the session")?;

    let level = if opt.verbose {
        LevelFilter::Trace
    }
    else {
        LevelFilter::Info
    };
    logger_init(level, &[(SOLVER_LOG_TARGET, LevelFilter::Debug)], &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Lane Keeping Simulation\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI arguments: {:?}", opt);

    // Requested controllers in order, each at most once
    let mut methods: Vec<ControllerKind> = Vec::new();
    for kind in &opt.methods {
        if !methods.contains(kind) {
            methods.push(*kind);
        }
    }
    if methods.is_empty() {
        methods = ControllerKind::ALL.to_vec();
    }

    // ---- LOAD PARAMETERS ----

    let params: SimParams = match &opt.params {
        Some(path) => util::params::load(path)
            .wrap_err_with(|| format!("Could not load simulation params from {:?}", path))?,
        None => {
            info!("No parameter file given, using defaults");
            SimParams::default()
        }
    };
    debug!("Parameters: {:#?}", params);

    session.save("params.json", &params)
        .wrap_err("Failed to save the parameters")?;

    let mut learned = if methods.contains(&ControllerKind::Learned) {
        let dir = opt.policy_dir
            .as_ref()
            .ok_or_else(|| eyre!("A policy directory must be given to run ADP"))?;

        let ctrl = LearnedController::load(dir)
            .wrap_err_with(|| format!("Failed to load the learned controller from {:?}", dir))?;
        info!("Learned controller loaded from {:?}", dir);

        Some(ctrl)
    }
    else {
        None
    };

    // ---- INITIALISE MODELS ----

    let dynamics: Arc<dyn Dynamics> = Arc::new(VehicleDynamics::new(params.vehicle.clone()));
    let reference: Arc<dyn Reference> = Arc::from(params.lane.build());
    let solver = MpcSolver::new(
        params.mpc,
        params.vehicle.cost,
        dynamics.clone(),
        reference.clone()
    );
    let initial_state = params.initial_state();

    info!("Initial state: {:?}", initial_state);

    // ---- OPEN-LOOP PLAN ----

    info!("Solving the open-loop plan over {} steps", params.open_loop.steps);

    let plan = solver
        .solve_absolute(&initial_state, params.open_loop.steps)
        .wrap_err("Failed to solve the open-loop plan")?;

    info!(
        "Open-loop plan solved in {} iterations, cost {:.6e}",
        plan.iterations, plan.cost
    );

    persist::save_controls(
        &session.arch_root,
        persist::control_file_name(ControllerKind::Precomputed),
        &plan.controls
    ).wrap_err("Failed to save the open-loop plan")?;

    // ---- ROLLOUTS ----

    let engine = RolloutEngine::new(&*dynamics, &*reference);
    let mut rollouts = Vec::with_capacity(methods.len());

    for kind in &methods {
        let controller = match kind {
            ControllerKind::Learned => Controller::Learned(
                learned
                    .take()
                    .ok_or_else(|| eyre!("Learned controller has not been loaded"))?
            ),
            ControllerKind::Optimizing => Controller::Optimizing(MpcController::new(solver.clone())),
            ControllerKind::Precomputed => Controller::Precomputed(
                OpenLoopController::new(plan.controls.clone())
            ),
        };

        let rollout = engine
            .run(&controller, initial_state, params.sim.steps)
            .wrap_err_with(|| format!("{} rollout failed", kind))?;

        persist::save_rollout(&session.arch_root, &rollout)
            .wrap_err_with(|| format!("Failed to save the {} rollout", kind))?;

        rollouts.push(rollout);
    }

    // ---- COMPARISON ----

    let baseline = if methods.contains(&ControllerKind::Precomputed) {
        Some(ControllerKind::Precomputed)
    }
    else {
        None
    };

    let analyzer = ComparativeAnalyzer::new(&*reference);
    let report = analyzer
        .analyse(&rollouts, baseline)
        .wrap_err("Failed to compare the rollouts")?;

    info!("CALCULATION TIME:");
    for rollout in &rollouts {
        info!("    {}: {}", rollout.kind(), format_secs(rollout.decision_time()));
    }

    info!("MAX LATERAL ERROR:");
    for s in &report.summaries {
        info!("    {}: {:.3e} m", s.controller, s.max_abs_lat_error_m);
    }

    info!("MAX HEADING ERROR:");
    for s in &report.summaries {
        info!("    {}: {:.3e} deg", s.controller, s.max_abs_head_error_deg);
    }

    if baseline.is_some() {
        info!("MEAN CONTROL DEVIATION FROM OPEN-LOOP:");
        for s in &report.summaries {
            if let Some(d) = s.mean_abs_control_deviation_rad {
                info!("    {}: {:.3e} rad", s.controller, d);
            }
        }
    }

    session.save("comparison.json", &report)
        .wrap_err("Failed to save the comparison report")?;

    session.exit();

    Ok(())
}
