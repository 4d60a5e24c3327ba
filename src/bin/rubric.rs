use rubric::cli;

fn main() {
    std::process::exit(cli::run());
}
