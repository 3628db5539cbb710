use std::{io::Write as _, path::PathBuf};

use anyhow::Context as _;
use clap::{ArgGroup, Parser, ValueEnum};
use tourboard::{
    BoardResult, Config, LocalEditor, PromotionFlow, Subject, pipeline,
    promote::KrpanoTool,
    version,
};

#[derive(Parser, Debug)]
#[command(
    name = "tourboard",
    version,
    about = "Build layered render boards and promote them into panorama tours"
)]
#[command(group(
    ArgGroup::new("action")
        .args(["info", "create", "update", "save_as_preview", "new_batch"])
        .multiple(false)
))]
struct Cli {
    /// Subject to process, or `ALL` for every non-reserved subject.
    subject: String,

    /// Print information about the latest render batch and existing composites.
    #[arg(short, long)]
    info: bool,

    /// Create composites from the latest renders, or a first tour from the previews.
    #[arg(short, long, value_enum)]
    create: Option<CreateTarget>,

    /// Update composites or backgrounds from the latest renders, or replace the tour panoramas.
    #[arg(short, long, value_enum)]
    update: Option<UpdateTarget>,

    /// Re-export the flattened preview of every composite.
    #[arg(short, long)]
    save_as_preview: bool,

    /// Allocate and create today's next render batch directory.
    #[arg(short, long)]
    new_batch: bool,

    /// Delete the panorama backup after an update without asking.
    #[arg(short, long)]
    yes: bool,

    /// Print detailed information during the process.
    #[arg(short, long)]
    verbose: bool,

    /// Print the most detailed information.
    #[arg(short, long)]
    debug: bool,

    /// Configuration file.
    #[arg(long, env = "TOURBOARD_CONFIG", default_value = "tourboard.json")]
    config: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CreateTarget {
    Images,
    Vtour,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum UpdateTarget {
    Images,
    Backgrounds,
    Vtour,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let cfg = Config::load(&cli.config)?;
    tracing::info!(base_path = %cfg.base_path.display(), "loaded configuration");
    tracing::debug!(?cli, "arguments");

    let subjects = cfg.resolve_subjects(&cli.subject)?;
    for subject in &subjects {
        tracing::info!(%subject, "processing subject");
        run(&cli, &cfg, subject).with_context(|| format!("subject '{subject}'"))?;
    }
    Ok(())
}

fn init_tracing(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose || cli.info {
        "info"
    } else {
        "warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, cfg: &Config, subject: &Subject) -> BoardResult<()> {
    let editor = LocalEditor::new();

    if cli.info {
        pipeline::info(cfg, subject)?;
    } else if cli.new_batch {
        let dir = pipeline::allocate_batch(cfg, subject, &version::today_stamp())?;
        println!("{}", dir.display());
    } else if cli.save_as_preview {
        pipeline::save_as_preview(cfg, &editor, subject)?;
    } else if let Some(target) = cli.create {
        match target {
            CreateTarget::Images => {
                let outcome = pipeline::create_images(cfg, &editor, subject)?;
                report("created", outcome.processed.len(), outcome.skipped.len());
            }
            CreateTarget::Vtour => promote(cli, cfg, subject, PromotionFlow::Create)?,
        }
    } else if let Some(target) = cli.update {
        match target {
            UpdateTarget::Images => {
                let outcome = pipeline::update_images(cfg, &editor, subject)?;
                report("updated", outcome.processed.len(), outcome.skipped.len());
            }
            UpdateTarget::Backgrounds => {
                let outcome = pipeline::update_backgrounds(cfg, &editor, subject)?;
                report("updated", outcome.processed.len(), outcome.skipped.len());
            }
            UpdateTarget::Vtour => promote(cli, cfg, subject, PromotionFlow::Update)?,
        }
    } else {
        tracing::warn!("no action given; see --help");
    }
    Ok(())
}

fn report(verb: &str, processed: usize, skipped: usize) {
    tracing::info!("{verb} {processed} composites, skipped {skipped}");
}

fn promote(cli: &Cli, cfg: &Config, subject: &Subject, flow: PromotionFlow) -> BoardResult<()> {
    let tool = KrpanoTool::from_config(cfg);
    let assume_yes = cli.yes;
    let mut confirm = |question: &str| assume_yes || ask(question);
    let report = pipeline::promote(cfg, &tool, subject, flow, &mut confirm)?;
    if let Some(backup) = report.backup_kept {
        tracing::warn!(backup = %backup.display(), "backup kept");
    }
    Ok(())
}

fn ask(question: &str) -> bool {
    eprint!("{question} [y/N] ");
    let _ = std::io::stderr().flush();
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
