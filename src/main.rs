use clap::error::ErrorKind;
use clap::{Arg, ArgMatches, Command};
use slate::runner::{self, Backend, Failure};
use std::path::Path;
use std::process;

fn cli() -> Command {
    let file_arg = || {
        Arg::new("file")
            .help("The source file to use")
            .value_name("FILE")
            .required(true)
            .index(1)
    };

    Command::new("slate")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Interpreter, IL compiler and JavaScript transpiler for the Slate language")
        .subcommand_required(true)
        .subcommand(
            Command::new("run")
                .about("Interpret a source file and print its output")
                .arg(file_arg()),
        )
        .subcommand(
            Command::new("il")
                .about("Compile a source file to IL and execute it")
                .arg(file_arg())
                .arg(
                    Arg::new("disassemble")
                        .short('d')
                        .long("disassemble")
                        .help("Print the IL listing instead of running it")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("transpile")
                .about("Print the JavaScript translation of a source file")
                .arg(file_arg()),
        )
        .subcommand(Command::new("repl").about("Interactive interpreter; state persists across lines"))
        .subcommand(Command::new("il-repl").about("Interactive IL mode; every line runs on a fresh VM"))
}

fn main() {
    slate::init_tracing();

    let matches = match cli().try_get_matches() {
        Ok(matches) => matches,
        Err(error) => {
            let failure = match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = error.print();
                    process::exit(0);
                }
                ErrorKind::InvalidSubcommand | ErrorKind::UnknownArgument => Failure::UnknownCommand,
                _ => Failure::MissingArguments,
            };
            let _ = error.print();
            process::exit(failure.exit_code());
        }
    };

    if let Err(failure) = dispatch(&matches) {
        process::exit(failure.exit_code());
    }
}

fn dispatch(matches: &ArgMatches) -> Result<(), Failure> {
    match matches.subcommand() {
        Some(("run", args)) => runner::run_file(file_path(args)?, Backend::Interpreter),
        Some(("il", args)) if args.get_flag("disassemble") => disassemble(file_path(args)?),
        Some(("il", args)) => runner::run_file(file_path(args)?, Backend::Il),
        Some(("transpile", args)) => runner::transpile_file(file_path(args)?),
        Some(("repl", _)) => {
            slate::start_repl();
            Ok(())
        }
        Some(("il-repl", _)) => {
            slate::start_il_repl();
            Ok(())
        }
        _ => Err(Failure::UnknownCommand),
    }
}

fn file_path(args: &ArgMatches) -> Result<&Path, Failure> {
    args.get_one::<String>("file")
        .map(Path::new)
        .ok_or(Failure::MissingArguments)
}

fn disassemble(path: &Path) -> Result<(), Failure> {
    let source = runner::read_source(path)?;
    let filename = path.display().to_string();
    let chunk = slate::parse(&source)
        .and_then(|program| slate::compile(&program))
        .map_err(|error| {
            error.report(&source, Some(&filename));
            Failure::of(&error)
        })?;
    print!("{}", chunk.disassemble());
    Ok(())
}
