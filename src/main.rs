fn main() {
    #[cfg(feature = "cli")]
    fx2image::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("fx2image: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
