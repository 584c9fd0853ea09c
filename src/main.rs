use std::io::{stderr, stdin, stdout};

use tracing_subscriber::EnvFilter;

use metaquery::cli::{load_context, run_interactive, run_query, Cli};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("metaquery=warn")),
        )
        .with_writer(stderr)
        .init();

    let cli = Cli::parse_args();
    let context = load_context(&cli)?;

    if let Some(query) = &cli.query {
        run_query(context.as_ref(), query, cli.format, &mut stdout().lock())?;
    } else {
        run_interactive(
            context.as_ref(),
            &mut stdin().lock(),
            cli.format,
            &mut stdout().lock(),
            &mut stderr(),
        )?;
    }

    Ok(())
}
