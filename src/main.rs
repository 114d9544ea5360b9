//! pdfpass command-line interface
//!
//! Adds or removes password protection on one or more PDF files.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use tracing::{debug, error, info, warn};

use pdfpass::engine::{progress_callback, ConfirmationSource};
use pdfpass::utils::logging::{init_logging, LogLevel};
use pdfpass::{
    BatchOrchestrator, CancellationFlag, CipherStrength, EngineConfig, Error, InteractiveConfirmation,
    JobBuilder, LopdfCodec, OutputPolicy, PolicyConfirmation, ReportFormat,
    ReportGenerator, Secret,
};

const EXIT_USAGE: i32 = 2;

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    let config = match effective_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(EXIT_USAGE);
        }
    };

    if let Err(e) = init_logging(config.log_level, config.log_file.as_deref()) {
        eprintln!("Warning: {}", e);
    }

    if let Some(path) = matches.get_one::<PathBuf>("save-config") {
        match config.save(path) {
            Ok(()) => info!(path = %path.display(), "settings saved"),
            Err(e) => {
                error!("{}", e);
                process::exit(EXIT_USAGE);
            }
        }
    }

    let unattended = matches.get_flag("yes");
    let job = match build_job(&matches, &config) {
        Ok(job) => job,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            process::exit(EXIT_USAGE);
        }
    };

    let confirmation: Arc<dyn ConfirmationSource> = if unattended {
        Arc::new(PolicyConfirmation)
    } else {
        Arc::new(InteractiveConfirmation::stdio())
    };

    let mut concurrency = matches
        .get_one::<usize>("jobs")
        .copied()
        .unwrap_or(config.max_concurrent_files);
    if !unattended && concurrency > 1 {
        debug!(requested = concurrency, "interactive prompts force sequential processing");
        concurrency = 1;
    }

    let cancellation = CancellationFlag::new();
    let on_interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing files in progress");
            on_interrupt.cancel();
        }
    });

    let orchestrator = BatchOrchestrator::new(Arc::new(LopdfCodec::new()), confirmation)
        .with_concurrency(concurrency)
        .with_cancellation(cancellation)
        .with_progress(progress_callback(|event| {
            println!(
                "[{}/{}] {}",
                event.index,
                event.total,
                event.current_file.display()
            );
        }));

    let result = orchestrator.run(job).await;

    match ReportGenerator::render(&result, ReportFormat::PlainText) {
        Ok(summary) => print!("\n{}", summary),
        Err(e) => error!("cannot render summary: {}", e),
    }

    if let Some(path) = matches.get_one::<PathBuf>("report") {
        let format = matches
            .get_one::<String>("format")
            .and_then(|f| f.parse().ok())
            .unwrap_or_default();
        if let Err(e) = ReportGenerator::write(&result, format, path).await {
            error!(path = %path.display(), "cannot write report: {}", e);
        }
    }

    process::exit(result.exit_code());
}

fn build_cli() -> Command {
    Command::new("pdfpass")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Add or remove password protection on PDF files in batch")
        .arg(Arg::new("inputs")
            .value_name("INPUT")
            .help("PDF files to process")
            .num_args(1..)
            .value_parser(clap::value_parser!(PathBuf))
            .required(true))

        // Operation
        .arg(Arg::new("add")
            .long("add")
            .action(ArgAction::SetTrue)
            .help("Apply password protection"))
        .arg(Arg::new("remove")
            .long("remove")
            .action(ArgAction::SetTrue)
            .help("Remove password protection"))
        .group(ArgGroup::new("operation")
            .args(["add", "remove"])
            .required(true)
            .multiple(false))

        // Output placement
        .arg(Arg::new("output")
            .short('o')
            .long("output")
            .value_name("FILE")
            .value_parser(clap::value_parser!(PathBuf))
            .conflicts_with("output-dir")
            .help("Output file (single input only)"))
        .arg(Arg::new("output-dir")
            .long("output-dir")
            .value_name("DIR")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Directory for output files"))

        // Passwords
        .arg(Arg::new("password")
            .short('p')
            .long("password")
            .value_name("PASSWORD")
            .help("Current password (--remove) or user password (--add); prompted if omitted"))
        .arg(Arg::new("owner-password")
            .long("owner-password")
            .value_name("PASSWORD")
            .requires("add")
            .help("Owner password; defaults to the user password"))
        .arg(Arg::new("existing-password")
            .long("existing-password")
            .value_name("PASSWORD")
            .requires("add")
            .help("Password that opens inputs which are already protected"))

        // Permissions
        .arg(Arg::new("no-print")
            .long("no-print")
            .action(ArgAction::SetTrue)
            .help("Disable printing permission"))
        .arg(Arg::new("no-modify")
            .long("no-modify")
            .action(ArgAction::SetTrue)
            .help("Disable modify permission"))
        .arg(Arg::new("no-copy")
            .long("no-copy")
            .action(ArgAction::SetTrue)
            .help("Disable copy/extract permission"))
        .arg(Arg::new("no-annotate")
            .long("no-annotate")
            .action(ArgAction::SetTrue)
            .help("Disable annotation permission"))
        .arg(Arg::new("cipher")
            .long("cipher")
            .value_parser(["rc4-40", "rc4-128"])
            .help("Cipher strength for --add"))

        // Backup and overwrite
        .arg(Arg::new("no-backup")
            .long("no-backup")
            .action(ArgAction::SetTrue)
            .help("Do not back up inputs before processing"))
        .arg(Arg::new("backup-dir")
            .long("backup-dir")
            .value_name("DIR")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Directory for backups (default: next to each input)"))
        .arg(Arg::new("overwrite")
            .long("overwrite")
            .action(ArgAction::SetTrue)
            .help("Overwrite existing output files without asking"))
        .arg(Arg::new("keep-copy")
            .long("keep-copy")
            .action(ArgAction::SetTrue)
            .requires("remove")
            .help("Write an unprotected copy even when an input has no password"))

        // Execution
        .arg(Arg::new("jobs")
            .short('j')
            .long("jobs")
            .value_name("N")
            .value_parser(clap::value_parser!(usize))
            .help("Files to process at once (requires --yes to exceed 1)"))
        .arg(Arg::new("yes")
            .short('y')
            .long("yes")
            .action(ArgAction::SetTrue)
            .help("Never prompt; use unattended defaults"))

        // Settings and reporting
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Settings file (JSON/YAML)"))
        .arg(Arg::new("save-config")
            .long("save-config")
            .value_name("FILE")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Save the effective settings as JSON"))
        .arg(Arg::new("report")
            .long("report")
            .value_name("FILE")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Write a report of the run"))
        .arg(Arg::new("format")
            .long("format")
            .value_parser(["text", "json"])
            .default_value("text")
            .help("Report format"))

        // Logging
        .arg(Arg::new("log-level")
            .short('l')
            .long("log-level")
            .value_parser(["error", "warn", "info", "debug", "trace"])
            .help("Logging verbosity"))
        .arg(Arg::new("log-file")
            .long("log-file")
            .value_name("FILE")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Also write logs to this file"))
}

/// Settings file (if any) with command-line overrides applied
fn effective_config(matches: &ArgMatches) -> pdfpass::Result<EngineConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.log_level = level.parse::<LogLevel>().map_err(Error::ConfigError)?;
    }
    if let Some(path) = matches.get_one::<PathBuf>("log-file") {
        config.log_file = Some(path.clone());
    }
    if matches.get_flag("no-backup") {
        config.create_backup = false;
    }
    if let Some(dir) = matches.get_one::<PathBuf>("backup-dir") {
        config.backup_directory = Some(dir.clone());
    }
    if matches.get_flag("overwrite") {
        config.overwrite_without_ask = true;
    }
    if let Some(dir) = matches.get_one::<PathBuf>("output-dir") {
        config.output_directory = Some(dir.clone());
    }
    if matches.get_flag("keep-copy") {
        config.keep_unprotected_copies = true;
    }
    if let Some(cipher) = matches.get_one::<String>("cipher") {
        config.cipher_strength = cipher.parse::<CipherStrength>().map_err(Error::ConfigError)?;
    }
    if let Some(jobs) = matches.get_one::<usize>("jobs") {
        config.max_concurrent_files = *jobs;
    }

    let permissions = &mut config.default_permissions;
    permissions.print &= !matches.get_flag("no-print");
    permissions.modify &= !matches.get_flag("no-modify");
    permissions.copy &= !matches.get_flag("no-copy");
    permissions.annotate &= !matches.get_flag("no-annotate");

    config.validate()?;
    Ok(config)
}

fn build_job(matches: &ArgMatches, config: &EngineConfig) -> pdfpass::Result<pdfpass::Job> {
    let inputs: Vec<PathBuf> = matches
        .get_many::<PathBuf>("inputs")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let builder = if matches.get_flag("add") {
        let user = password_arg(matches, "password", "User password: ")?;
        let owner = matches
            .get_one::<String>("owner-password")
            .map(|s| Secret::new(s.as_str()))
            .unwrap_or_default();
        let mut builder = JobBuilder::add(user, owner)
            .permissions(config.permissions())
            .cipher(config.cipher_strength);
        if let Some(existing) = matches.get_one::<String>("existing-password") {
            builder = builder.existing_password(existing.as_str());
        }
        builder
    } else {
        let current = password_arg(matches, "password", "Current password: ")?;
        JobBuilder::remove(current).keep_unprotected_copy(config.keep_unprotected_copies)
    };

    let output = match matches.get_one::<PathBuf>("output") {
        Some(path) => OutputPolicy::Explicit(path.clone()),
        None => config.output_policy(),
    };

    let job = builder
        .inputs(inputs)
        .output(output)
        .backup(config.backup_policy())
        .overwrite(config.overwrite_policy())
        .build()?;
    Ok(job)
}

/// Password from the command line, or read from the terminal without echo
fn password_arg(matches: &ArgMatches, id: &str, prompt: &str) -> pdfpass::Result<Secret> {
    if let Some(value) = matches.get_one::<String>(id) {
        return Ok(Secret::new(value.as_str()));
    }
    let entered = rpassword::prompt_password(prompt)?;
    Ok(Secret::from(entered))
}
