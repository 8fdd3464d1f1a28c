fn main() {
    if let Err(err) = pim_tools::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
