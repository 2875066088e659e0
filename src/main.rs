use ansi_term::Color::Red;
use ratc::cli::command;
use structopt::StructOpt;

fn main() {
    env_logger::init();
    command::terminal_init();

    if let Err(err) = command::root(command::CommandRoot::from_args()) {
        eprintln!("{} {:#}", Red.bold().paint("error:"), err);
        std::process::exit(1);
    }
}
