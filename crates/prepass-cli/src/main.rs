use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::info;

use prepass_core::{
    init_tracing, prepass_file, Backend, BackendConfig, JsonBackend, PrepassConfig, PrepassError,
    PrepassOutput,
};

fn cli() -> Command {
    Command::new("prepass")
        .version(prepass_core::VERSION)
        .about("Normalizes a contract source for an alternate compiler backend")
        .arg(
            Arg::new("main_contract")
                .value_name("MAIN_CONTRACT")
                .help("Contract to compile")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("source")
                .value_name("SOURCE")
                .help("Source file containing or importing the main contract")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::new("print_ir")
                .long("print-ir")
                .help("Print the backend output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("runs")
                .long("runs")
                .value_name("N")
                .help("Optimizer iteration count")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("yul_details")
                .long("yul-details")
                .help("Enable detailed Yul optimization")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("inliner")
                .long("inliner")
                .help("Enable the inliner")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("JSON file with backend settings"),
        )
        .arg(
            Arg::new("include")
                .long("include")
                .value_name("DIR")
                .help("Additional import search directory")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("out_dir")
                .long("out-dir")
                .value_name("DIR")
                .help("Write the rewritten source and metadata to this directory"),
        )
}

fn build_config(matches: &ArgMatches) -> Result<PrepassConfig> {
    let mut backend = match matches.get_one::<String>("config") {
        Some(path) => BackendConfig::from_json_file(Path::new(path))
            .with_context(|| format!("loading backend settings from {path}"))?,
        None => BackendConfig::default(),
    };
    if let Some(runs) = matches.get_one::<u32>("runs") {
        backend.runs = *runs;
    }
    backend.yul_details |= matches.get_flag("yul_details");
    backend.inliner |= matches.get_flag("inliner");

    Ok(PrepassConfig {
        main_contract: matches
            .get_one::<String>("main_contract")
            .cloned()
            .unwrap_or_default(),
        print_ir: matches.get_flag("print_ir"),
        include_paths: matches
            .get_many::<String>("include")
            .map(|dirs| dirs.map(PathBuf::from).collect())
            .unwrap_or_default(),
        backend,
    })
}

fn write_outputs(dir: &Path, source: &Path, output: &PrepassOutput) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());

    let sol = dir.join(format!("{stem}.prepass.sol"));
    fs::write(&sol, &output.source).with_context(|| format!("writing {}", sol.display()))?;
    let json = dir.join(format!("{stem}.prepass.json"));
    fs::write(&json, serde_json::to_string_pretty(output)?)
        .with_context(|| format!("writing {}", json.display()))?;

    info!(source = %sol.display(), metadata = %json.display(), "wrote outputs");
    Ok(())
}

fn run(matches: &ArgMatches) -> Result<()> {
    let config = build_config(matches)?;
    let source = PathBuf::from(
        matches
            .get_one::<String>("source")
            .context("missing SOURCE argument")?,
    );

    let output = prepass_file(&source, &config)?;
    let ir = JsonBackend.compile(&output.source, &output.metadata, &config.backend)?;

    match matches.get_one::<String>("out_dir") {
        Some(dir) => write_outputs(Path::new(dir), &source, &output)?,
        None if !config.print_ir => println!("{}", output.source),
        None => {}
    }
    if config.print_ir {
        println!("{ir}");
    }

    for warning in &output.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<PrepassError>()
        .map(|e| e.exit_code() as u8)
        .unwrap_or(1)
}

fn main() -> ExitCode {
    init_tracing();
    let matches = cli().get_matches();

    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}
