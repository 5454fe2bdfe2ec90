use clap::Parser;
use layerscope_tui::Cli;
use layerscope_tui::ExitReason;
use layerscope_tui::available_panel_names;
use layerscope_tui::run_main;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    if cli.list_panels {
        print_panels();
        return Ok(());
    }

    let outcome = run_main(cli).await?;
    if outcome.exit == ExitReason::Cancelled {
        std::process::exit(130);
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_panels() {
    for name in available_panel_names() {
        println!("{name}");
    }
}
