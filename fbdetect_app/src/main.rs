mod app;
mod config;
mod error;
mod trace;

fn main() {
    if let Err(e) = app::App::run(std::env::args().skip(1)) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
