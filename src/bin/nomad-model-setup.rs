use std::path::PathBuf;

use nomad::config;
use nomad::logging;
use nomad::weights;

fn main() {
    let mut config_path = None;
    let mut cache_dir = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--cache-dir" => match args.next() {
                Some(value) => cache_dir = Some(PathBuf::from(value)),
                None => fail_usage("--cache-dir needs a value"),
            },
            "--config" => match args.next() {
                Some(value) => config_path = Some(PathBuf::from(value)),
                None => fail_usage("--config needs a value"),
            },
            "--help" | "-h" => {
                print_help();
                return;
            }
            other => fail_usage(&format!("unknown argument '{other}'")),
        }
    }

    if let Err(err) = logging::init() {
        eprintln!("File logging disabled: {err}");
        logging::init_stderr_only();
    }

    let settings = match config::load_settings(config_path.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Failed to load settings: {err}");
            std::process::exit(1);
        }
    };
    let cache_dir = cache_dir.unwrap_or(settings.cache_dir);

    match weights::ensure_weights(&settings.weights, &cache_dir) {
        Ok(paths) => {
            println!("{}", paths.wav2vec.display());
            println!("{}", paths.nomad.display());
        }
        Err(err) => {
            eprintln!("Failed to prepare NOMAD weights: {err}");
            std::process::exit(1);
        }
    }
}

fn fail_usage(message: &str) -> ! {
    eprintln!("{message}");
    print_help();
    std::process::exit(2);
}

fn print_help() {
    println!("Usage: nomad-model-setup [--cache-dir <path>] [--config <path>]");
}
