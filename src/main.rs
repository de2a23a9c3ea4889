use clap::Parser;

use darkscope::{
    cli::{Args, Command},
    command,
    result::Result,
};

fn initialize_logger(debug: bool) -> Result<()> {
    let filter = if debug {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    let config = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("darkscope")
        .build();

    simplelog::TermLogger::init(
        filter,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli_args = Args::parse();

    initialize_logger(cli_args.debug)?;

    match cli_args.command {
        Command::Detect {
            snapshot,
            format,
            out_file,
        } => {
            command::detect::execute(
                &cli_args.config,
                &snapshot,
                format,
                out_file.as_deref(),
            )
            .await
        }
        Command::Watch { snapshot, script } => {
            command::watch::execute(&cli_args.config, &snapshot, &script).await
        }
    }
}
