fn main() {
    if let Err(err) = hazmat_questions::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
