use hn_browse::model::TimeRange;
use hn_browse::RunOptions;

const HELP: &str = "hn-browse: search and read Hacker News from the terminal.

  --version, -V        Show version and exit
  --help,    -h        Show this help message
  --query <text>       Start with a search query
  --range <range>      Start with a time range: frontpage, day, week, month, year, all
  --item <id>          Open a single post directly";

enum Cli {
    Exit,
    Run(RunOptions),
}

fn main() {
    let options = match parse_args(std::env::args().skip(1)) {
        Ok(Cli::Exit) => return,
        Ok(Cli::Run(options)) => options,
        Err(err) => {
            eprintln!("error: {err:?}\n\n{HELP}");
            std::process::exit(2);
        }
    };

    if let Err(err) = hn_browse::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn parse_args(args: impl Iterator<Item = String>) -> anyhow::Result<Cli> {
    let mut options = RunOptions::default();
    let mut saw_flag = false;
    let mut args = args.peekable();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("hn-browse {}", hn_browse::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!("{HELP}");
                saw_flag = true;
            }
            "--query" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--query needs a value"))?;
                options.query = Some(value);
            }
            "--range" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--range needs a value"))?;
                options.time_range = Some(value.parse::<TimeRange>()?);
            }
            "--item" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--item needs a value"))?;
                anyhow::ensure!(
                    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()),
                    "--item expects a numeric id, got {value:?}"
                );
                options.item = Some(value);
            }
            other => anyhow::bail!("unknown argument {other:?}"),
        }
    }

    if saw_flag {
        Ok(Cli::Exit)
    } else {
        Ok(Cli::Run(options))
    }
}
