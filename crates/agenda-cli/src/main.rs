use std::io::Write;
use std::path::{Path, PathBuf};

use agenda_engine::{
    assemble, transcribe_template, AgendaGenerator, GeneratorConfig, MemoryBlobStore, Meeting,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "agenda")]
#[command(about = "Fill meeting agenda spreadsheets from role sign-ups.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fill a template for a meeting and write the agenda workbook.
    Generate(GenerateArgs),
    /// Print the agenda data a meeting would be filled with, as JSON.
    Preview(PreviewArgs),
    /// Print the text transcription of a template's first sheet.
    Transcribe(TranscribeArgs),
}

#[derive(Debug, Args)]
#[group(id = "source", required = true, multiple = false)]
struct TemplateSource {
    /// Template workbook on the local filesystem.
    #[arg(long, value_name = "PATH")]
    template: Option<PathBuf>,

    /// Template in the configured blob store (`scheme://bucket/object`).
    #[arg(long, value_name = "URI")]
    storage_path: Option<String>,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    /// Meeting JSON (date, club name, role slots).
    #[arg(long, value_name = "PATH")]
    meeting: PathBuf,

    #[command(flatten)]
    source: TemplateSource,

    /// Role mapping JSON produced by template analysis. Without it the label scan is used.
    #[arg(long, value_name = "PATH")]
    structure: Option<PathBuf>,

    /// Generator config JSON. `AGENDA_*` environment variables override it.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output directory.
    #[arg(long, value_name = "DIR", default_value = ".")]
    out: PathBuf,
}

#[derive(Debug, Parser)]
struct PreviewArgs {
    /// Meeting JSON (date, club name, role slots).
    #[arg(long, value_name = "PATH")]
    meeting: PathBuf,
}

#[derive(Debug, Parser)]
struct TranscribeArgs {
    /// Template workbook.
    #[arg(long, value_name = "PATH")]
    template: PathBuf,
}

fn read_meeting(path: &Path) -> Result<Meeting> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read meeting {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid meeting json in {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<GeneratorConfig> {
    let config = match path {
        Some(path) => GeneratorConfig::from_json_file(path)?,
        None => GeneratorConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

fn generate(args: GenerateArgs) -> Result<()> {
    let meeting = read_meeting(&args.meeting)?;
    let config = load_config(args.config.as_deref())?;
    let structure = args
        .structure
        .as_deref()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read structure {}", path.display()))
        })
        .transpose()?;

    let agenda = match (&args.source.template, &args.source.storage_path) {
        (Some(template), _) => {
            let bytes = std::fs::read(template)
                .with_context(|| format!("failed to read template {}", template.display()))?;
            AgendaGenerator::new(config, MemoryBlobStore::new()).generate_from_bytes(
                &meeting,
                &bytes,
                structure.as_deref(),
            )?
        }
        (None, Some(storage_path)) => {
            let store = config.storage.open_store()?;
            AgendaGenerator::with_boxed_store(config, store).generate_from_path(
                &meeting,
                storage_path,
                structure.as_deref(),
            )?
        }
        (None, None) => anyhow::bail!("one of --template or --storage-path is required"),
    };

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    let out = args.out.join(&agenda.filename);
    std::fs::write(&out, &agenda.bytes)
        .with_context(|| format!("failed to write {}", out.display()))?;
    log::debug!("content-disposition: {}", agenda.content_disposition());

    println!(
        "{} ({} fill, {} written, {} skipped, {} row(s) inserted)",
        out.display(),
        agenda.strategy,
        agenda.report.written,
        agenda.report.skipped,
        agenda.inserted_rows
    );
    Ok(())
}

fn preview(args: PreviewArgs) -> Result<()> {
    let meeting = read_meeting(&args.meeting)?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, &assemble(&meeting))?;
    handle.write_all(b"\n")?;
    Ok(())
}

fn transcribe(args: TranscribeArgs) -> Result<()> {
    let bytes = std::fs::read(&args.template)
        .with_context(|| format!("failed to read template {}", args.template.display()))?;
    print!("{}", transcribe_template(&bytes)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Generate(args) => generate(args),
        Command::Preview(args) => preview(args),
        Command::Transcribe(args) => transcribe(args),
    }
}
