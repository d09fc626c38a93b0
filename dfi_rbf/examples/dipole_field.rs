use dfi_rbf::{
    create_evaluation_grid, generate_shell_points,
    interpolant_config::InterpolantSettings,
    progress::{closure_sink, ProgressMsg},
    DfiInterpolator, FieldTestFunctions, Params,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Log fit milestones; override with e.g. RUST_LOG=dfi_rbf=debug
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Sample a dipole field inside the shell 2 <= |p| <= 4
    let num_points = 300usize;
    let points = generate_shell_points(num_points, 2.0, 4.0, Some(42));
    let moment = [0.0, 0.0, 1.0];
    let fields = FieldTestFunctions::dipole(&points, moment);

    let interpolant_settings = InterpolantSettings::builder(1.0).build();

    let (sink, listener) = closure_sink(64, |msg: ProgressMsg| match msg {
        ProgressMsg::SystemAssembled {
            num_points,
            elapsed_secs,
        } => {
            let size = 3 * num_points;
            println!("Assembled {size}x{size} system in {elapsed_secs:.3}s")
        }
        ProgressMsg::Factorised {
            min_pivot_ratio,
            elapsed_secs,
        } => {
            println!("Factorised in {elapsed_secs:.3}s (relative pivot {min_pivot_ratio:e})")
        }
        ProgressMsg::Message { message } => println!("{message}"),
    });

    // Fit the interpolant
    let dfi = DfiInterpolator::builder(points, fields, interpolant_settings)
        .params(Params::builder().parallel_assembly(true).build())
        .progress_callback(sink)
        .build()?;

    println!("Max fit residual: {:e}", dfi.max_fit_residual());

    // Evaluate on a grid in the x-z plane through the middle of the shell
    let n = 25;
    let targets = create_evaluation_grid(&[(2.5, 3.5), (0.0, 0.0), (-0.5, 0.5)], &[n, 1, n]);
    let interpolated = dfi.evaluate(&targets);
    let exact = FieldTestFunctions::dipole(&targets, moment);

    let mut max_err = 0.0f64;
    let mut max_div = 0.0f64;
    for i in 0..targets.nrows() {
        for k in 0..3 {
            max_err = max_err.max((interpolated[(i, k)] - exact[(i, k)]).abs());
        }
        let p = [targets[(i, 0)], targets[(i, 1)], targets[(i, 2)]];
        max_div = max_div.max(dfi.divergence(p).abs());
    }

    println!("Max grid error vs analytic dipole: {:e}", max_err);
    println!("Max |div B| on grid: {:e}", max_div);

    // Persist the model and read it back
    let path = std::env::temp_dir().join("dipole_field_model.json");
    dfi.save_model(&path)?;
    let loaded = DfiInterpolator::load_model(&path, None)?;
    println!(
        "Reloaded model with {} samples, B(3, 0, 0) = {:?}",
        loaded.num_points(),
        loaded.evaluate_point([3.0, 0.0, 0.0])
    );

    drop(dfi);
    listener.join().ok();

    Ok(())
}
