mod cli;
mod vision;

fn main() {
    if let Err(err) = cli::handle_commands() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}
