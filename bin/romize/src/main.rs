use romizer::*;

use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

fn main() -> Result<(), romize::Error> {
    env_logger::init();

    let matches = Command::new("Class file romizer")
        .version(clap::crate_version!())
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Merge the constant pools of class files into one shared pool, relocating their code")
        .arg(
            Arg::new("output")
                .long("output-dir")
                .short('o')
                .value_name("DIRECTORY")
                .value_parser(value_parser!(PathBuf))
                .default_value(".")
                .help("Directory into which the shared constant pool is written"),
        )
        .arg(
            Arg::new("pool-file")
                .long("pool-file")
                .value_name("FILE_NAME")
                .help("File name of the shared constant pool"),
        )
        .arg(
            Arg::new("no-sort")
                .long("no-sort")
                .action(ArgAction::SetTrue)
                .help("Keep constants in the order they were first seen"),
        )
        .arg(
            Arg::new("no-compact")
                .long("no-compact")
                .action(ArgAction::SetTrue)
                .help("Keep constants that nothing refers to"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Class files to romize")
                .value_parser(value_parser!(PathBuf))
                .num_args(1..)
                .required(true),
        )
        .get_matches();

    let mut settings = romize::Settings::new(
        matches
            .get_one::<PathBuf>("output")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(".")),
    );
    if let Some(pool_file_name) = matches.get_one::<String>("pool-file") {
        settings.pool_file_name = pool_file_name.clone();
    }
    settings.sort_by_ldc_usage = !matches.get_flag("no-sort");
    settings.compact = !matches.get_flag("no-compact");

    let mut romizer = romize::Romizer::new(settings);
    for class_file in matches.get_many::<PathBuf>("INPUT").into_iter().flatten() {
        log::info!("Reading '{}'", class_file.display());
        romizer.read_class(class_file)?;
    }
    romizer.finish()?;

    let pool = romizer.shared_pool();
    log::info!(
        "Shared {} constants across {} classes",
        pool.entry_count(),
        romizer.classes().len()
    );
    romizer.save_pool()?;

    Ok(())
}
