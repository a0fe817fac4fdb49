use spectra::app::AppOptions;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    spectra::app::run(options)
}

fn parse_args(args: Vec<String>) -> anyhow::Result<AppOptions> {
    let mut out = AppOptions::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--catalog" => {
                index += 1;
                out.catalog = Some(path_value(&args, index, "--catalog")?);
            }
            "--dir" => {
                index += 1;
                out.dir = Some(path_value(&args, index, "--dir")?);
            }
            "--null-audio" => out.null_audio = true,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn path_value(args: &[String], index: usize, flag: &str) -> anyhow::Result<PathBuf> {
    let Some(value) = args.get(index) else {
        anyhow::bail!("{flag} requires a path");
    };
    if value.trim().is_empty() {
        anyhow::bail!("{flag} cannot be empty");
    }
    Ok(PathBuf::from(value.trim()))
}

fn print_help() {
    println!("Spectra");
    println!("  --catalog <file>  Play the tracks listed in a JSON catalog");
    println!("  --dir <path>      Scan a music directory instead of a catalog");
    println!("  --null-audio      Run without an audio device");
}
