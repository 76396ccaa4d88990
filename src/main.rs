fn main() {
    if let Err(err) = alluvial_layout::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
