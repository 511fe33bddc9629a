fn main() {
    if let Err(err) = csv_sieve::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
