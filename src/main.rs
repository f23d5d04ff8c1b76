//! edgesolve command-line interface.
//!
//! ```sh
//! edgesolve generate --cells 5 --out data
//! edgesolve maxwell --data-dir data --scaling 1.0 --time-format yaml
//! edgesolve vdp-check
//! ```

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use edgesolve::config::{ParameterList, SolverOptions};
use edgesolve::driver::maxwell::{self, MaxwellOptions, ProblemSource};
use edgesolve::driver::vdp::{self, VdpOptions};
use edgesolve::dynamic::ValidateFunction;
use edgesolve::mesh::HexComplex;
use edgesolve::parallel::{Comm, UniverseComm};
use edgesolve::solver::AcceptancePolicy;
use edgesolve::utils::TimeFormat;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "edgesolve")]
#[command(about = "Preconditioned CG for shifted edge-element (Maxwell) operators")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve (S + scaling M1) x = b with CG and report pass/fail.
    Maxwell {
        /// Directory with S.txt, M1.txt, M0.txt, D0.txt and coords.txt.
        #[arg(long, default_value = ".")]
        data_dir: PathBuf,
        /// Build the hex complex with this many cells per direction instead of reading files.
        #[arg(long)]
        cells: Option<usize>,
        /// Print timings to screen.
        #[arg(long, overrides_with = "notimings", action = ArgAction::SetTrue)]
        timings: bool,
        /// Do not print timings.
        #[arg(long, overrides_with = "timings", action = ArgAction::SetTrue)]
        notimings: bool,
        /// Timings format (table-fixed | table-scientific | yaml).
        #[arg(long, default_value = "table-fixed")]
        time_format: TimeFormat,
        /// Scale of the mass term.
        #[arg(long, default_value_t = 1.0)]
        scaling: f64,
        /// Preconditioner parameter list (TOML). Defaults to the reference RefMaxwell setup.
        #[arg(long)]
        params: Option<PathBuf>,
        /// Solver options (TOML, fields of `SolverOptions`).
        #[arg(long)]
        solver: Option<PathBuf>,
        /// Relative residual tolerance (overrides --solver).
        #[arg(long)]
        tolerance: Option<f64>,
        /// CG iteration limit (overrides --solver).
        #[arg(long)]
        max_iters: Option<usize>,
        /// A run passes only if CG converges in fewer iterations than this.
        #[arg(long, default_value_t = 50)]
        accept_iters: usize,
    },
    /// Write the discrete operators of an n×n×n hex mesh as MatrixMarket files.
    Generate {
        #[arg(long, default_value_t = 5)]
        cells: usize,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Check the derivatives of the Van der Pol time-step constraint.
    VdpCheck {
        /// Seed for the random point and directions.
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 0.1)]
        dt: f64,
        /// Finite-difference order (1-4).
        #[arg(long, default_value_t = 1)]
        order: usize,
        #[arg(long, default_value_t = 13)]
        steps: usize,
        /// Print the finite-difference tables.
        #[arg(short, long)]
        verbose: bool,
    },
}

fn load_solver_options(path: Option<&PathBuf>) -> anyhow::Result<SolverOptions> {
    match path {
        None => Ok(SolverOptions::default()),
        Some(p) => {
            let text = std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing solver options {}", p.display()))
        }
    }
}

/// Returns whether the run passed.
fn execute(command: Commands) -> anyhow::Result<bool> {
    let comm: Arc<dyn Comm> = Arc::new(UniverseComm::world());
    let root = comm.rank() == 0;
    match command {
        Commands::Maxwell {
            data_dir,
            cells,
            timings: _,
            notimings,
            time_format,
            scaling,
            params,
            solver,
            tolerance,
            max_iters,
            accept_iters,
        } => {
            let mut solver = load_solver_options(solver.as_ref())?;
            if let Some(tol) = tolerance {
                solver.tolerance = tol;
            }
            if let Some(n) = max_iters {
                solver.max_iterations = n;
            }
            let params = match params {
                Some(p) => ParameterList::from_file(&p).context("loading preconditioner parameters")?,
                None => maxwell::default_params(),
            };
            let opts = MaxwellOptions {
                source: cells.map_or(ProblemSource::Files(data_dir), ProblemSource::Generated),
                scaling,
                params,
                solver,
                acceptance: AcceptancePolicy::new(accept_iters),
                timings: !notimings,
                time_format,
            };
            let report = maxwell::run(comm.clone(), &opts).context("maxwell run failed")?;
            if root {
                if let Some(t) = &report.timings {
                    println!("{t}");
                }
                println!("{}", report.message());
            }
            Ok(report.accepted)
        }
        Commands::Generate { cells, out } => {
            let mesh = HexComplex::generate(cells)?;
            mesh.write_to_dir(&out)
                .with_context(|| format!("writing operators to {}", out.display()))?;
            if root {
                println!(
                    "wrote {} edges / {} nodes to {}",
                    mesh.num_edges(),
                    mesh.num_nodes(),
                    out.display()
                );
            }
            Ok(true)
        }
        Commands::VdpCheck { seed, dt, order, steps, verbose } => {
            let validator = ValidateFunction::new(order, steps, 20, 11)?;
            let report = vdp::run(&VdpOptions { dt, seed, validator })?;
            if root {
                for o in &report.outcomes {
                    if verbose {
                        print!("{}", o.report);
                    }
                    println!("{:<34} {}", o.name, if o.passed { "ok" } else { "FAILED" });
                }
                println!("{}", report.message());
            }
            Ok(report.passed())
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };
    match execute(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
