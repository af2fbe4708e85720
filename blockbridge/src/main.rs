use blockbridge::{
    app::App,
    cli::{ClapCliOptions, CliOptions},
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let options: CliOptions = ClapCliOptions::parse().try_into()?;
    let print = !options.quiet;
    App::new(options, print).run()
}
