//! `checkmate`: smoke-test a folder full of chess engines.
//!
//! Every executable found is probed for its protocol. xboard engines are
//! then made to play short games against themselves, which shakes out
//! engines that crash, hang, send illegal moves or refuse to quit. Wire
//! traffic is logged to `checkmate.log`.
//!
//! ```text
//! checkmate ~/engines -s -i 2
//! checkmate -f engines.txt -x exclude.txt -p xboard -y
//! ```

use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use cecp_driver::harness::{
    find_engines, read_blacklist, read_engine_list, run_all, Discovered, ExcludeList, ProtocolFilter,
    RunConfig,
};
use cecp_driver::SessionConfig;
use clap::Parser;
use env_logger::{Env, Target};
use log::warn;

const BLACKLIST: &str = "blacklist";

#[derive(Parser, Debug)]
#[command(name = "checkmate", about = "Probe chess engines and play test games against the xboard ones")]
struct Cli {
    /// Engine executables or folders containing them
    targets: Vec<String>,

    /// Also look one level into subfolders
    #[arg(short = 's', long)]
    subfolders: bool,

    /// File listing engine executables, one absolute path per line
    #[arg(short = 'f', long)]
    file: Option<PathBuf>,

    /// File listing engines or folders to leave out
    #[arg(short = 'x', long)]
    exclude: Option<PathBuf>,

    /// Skip engines listed in the blacklist file
    #[arg(short = 'b', long)]
    use_blacklist: bool,

    /// Append engines that refuse to quit to the blacklist file
    #[arg(short = 'g', long)]
    gen_blacklist: bool,

    /// Games per engine
    #[arg(short = 'i', long, default_value_t = 1)]
    iterations: u32,

    /// Protocols to test
    #[arg(short = 'p', long, value_enum, default_value_t = ProtocolFilter::Both)]
    protocol: ProtocolFilter,

    /// Don't ask for confirmation
    #[arg(short = 'y', long)]
    yes: bool,

    #[arg(long, default_value = "checkmate.log")]
    log: PathBuf,

    #[arg(long, default_value_t = 160)]
    max_plies: usize,

    #[arg(long, default_value_t = 100)]
    move_time_ms: u64,
}

fn init_logging(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    env_logger::Builder::from_env(Env::default().default_filter_or("debug"))
        .target(Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn collect_engines(cli: &Cli) -> Result<Discovered, Box<dyn std::error::Error>> {
    let mut found = find_engines(&cli.targets, cli.subfolders);
    if let Some(list) = &cli.file {
        let listed = read_engine_list(list)?;
        found.engines.extend(listed.engines);
        found.warnings.extend(listed.warnings);
    }
    if let Some(exclude) = &cli.exclude {
        ExcludeList::from_file(exclude)?.apply(&mut found.engines);
    }
    if cli.use_blacklist {
        read_blacklist(Path::new(BLACKLIST))?.apply(&mut found.engines);
    }
    Ok(found)
}

fn confirm() -> io::Result<bool> {
    print!("Continue? (Y/n) ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "" | "y" | "yes"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(&cli.log) {
        eprintln!("cannot open log file {}: {err}", cli.log.display());
        return ExitCode::FAILURE;
    }

    let found = match collect_engines(&cli) {
        Ok(found) => found,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    for warning in &found.warnings {
        println!("{warning}");
        warn!("{warning}");
    }
    if found.engines.is_empty() {
        println!("No engines found.");
        return ExitCode::SUCCESS;
    }

    let config = RunConfig {
        iterations: cli.iterations,
        max_plies: cli.max_plies,
        move_time: Duration::from_millis(cli.move_time_ms),
        filter: cli.protocol,
        gen_blacklist: cli.gen_blacklist,
        blacklist: PathBuf::from(BLACKLIST),
        session: SessionConfig::default(),
        ..RunConfig::default()
    };

    let minutes = config.worst_case_runtime(found.engines.len()).as_secs_f64() / 60.0;
    println!("Estimated worst-case run time = {minutes:.1} minutes");
    println!("Found {} potential chess engines:", found.engines.len());
    for engine in &found.engines {
        println!("{}", engine.display());
    }

    if !cli.yes {
        match confirm() {
            Ok(true) => {}
            Ok(false) => return ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("{err}");
                return ExitCode::FAILURE;
            }
        }
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("cannot start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };
    let summary = runtime.block_on(run_all(&found.engines, &config));
    if summary.failed > 0 || summary.failed_games > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
