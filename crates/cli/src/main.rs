fn main() {
    if let Err(error) = forum_cli::logging::init() {
        eprintln!("{error:#}");
    }

    if let Err(error) = forum_cli::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
