//! `video-thumbnails` command entry point

use clap::{CommandFactory, Parser, error::ErrorKind};

use video_thumbnails::cli::{
    Cli, Command, UsageError, load_config, run_video_thumbnails, summary_lines,
};
use video_thumbnails::services::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Command::VideoThumbnails(args) = cli.command;
    let (settings_path, config) = match load_config(&args, |key| std::env::var(key).ok()) {
        Ok(loaded) => loaded,
        Err(e) => match e.downcast_ref::<UsageError>() {
            Some(usage) => Cli::command()
                .error(ErrorKind::MissingRequiredArgument, usage)
                .exit(),
            None => return Err(e),
        },
    };

    init_tracing(config.log_format);

    tracing::info!("Starting video thumbnail migration");
    let outcome = run_video_thumbnails(&settings_path, &config).await?;

    for line in summary_lines(&outcome) {
        println!("{line}");
    }
    Ok(())
}
